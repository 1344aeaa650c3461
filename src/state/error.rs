use thiserror::Error;

/// Rejection raised by a round engine. A rejected operation never mutates the
/// draft it was given in a way that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Wrong round, phase or status for the requested transition.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Unknown team, package, question or event.
    #[error("not found: {0}")]
    NotFound(String),
}

impl GameError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        GameError::Validation(message.into())
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        GameError::Precondition(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        GameError::NotFound(message.into())
    }
}

/// Result alias used across the round engines.
pub type GameResult<T> = Result<T, GameError>;
