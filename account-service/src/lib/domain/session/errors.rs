use thiserror::Error;

/// Errors raised by refresh-token persistence.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}
