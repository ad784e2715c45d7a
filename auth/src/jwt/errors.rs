use thiserror::Error;

/// Error type for JWT operations.
///
/// `TokenExpired` is only ever returned for a token whose signature verified;
/// every other decoding failure is `InvalidToken`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("Signing secret must be at least {min} bytes, got {actual}")]
    WeakSecret { min: usize, actual: usize },

    #[error("Access and refresh tokens must use distinct secrets")]
    SharedSecret,

    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is expired")]
    TokenExpired,

    #[error("Token is invalid: {0}")]
    InvalidToken(String),
}
