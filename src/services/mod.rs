/// Loading of the seed content file.
pub mod content_loader;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Quiz master operations.
pub mod operator_service;
/// Read-only projections of the event.
pub mod public_service;
/// Background expiry of question and steal timers.
pub mod reconciler;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and content seeding.
pub mod storage_supervisor;
/// Team device operations.
pub mod team_service;
