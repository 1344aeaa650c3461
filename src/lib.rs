//! Library crate for summit-quiz-back, exposing modules for binaries and integration tests.

/// Environment and file configuration, scoring rules included.
pub mod config;
/// Persistence backends for the event document and its content.
pub mod dao;
/// Request and response payloads of the HTTP and SSE surfaces.
pub mod dto;
/// Service errors and their HTTP mapping.
pub mod error;
/// Axum routers and handlers.
pub mod routes;
/// Operations behind the routes and the background tasks.
pub mod services;
/// Shared application state, round engines and the mutation unit.
pub mod state;
