use auth::JwtError;
use auth::PasswordError;
use thiserror::Error;

use crate::domain::account::errors::AccountError;
use crate::domain::session::errors::SessionError;
use crate::domain::validation::ValidationErrors;

/// Failures of the authentication and token-lifecycle flows.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account temporarily locked")]
    AccountLocked { retry_after_secs: u64 },

    #[error("Email address has not been verified")]
    EmailUnverified,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token generation failed: {0}")]
    TokenGenerationFailure(String),

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("An account with this email already exists")]
    EmailAlreadyExists(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Error raised by an [`AccountNotifier`](super::ports::AccountNotifier).
#[derive(Debug, Clone, Error)]
#[error("Notification failed: {0}")]
pub struct NotifierError(pub String);

impl From<AccountError> for AuthError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(id) => AuthError::NotFound(id),
            AccountError::EmailAlreadyExists(email) => AuthError::EmailAlreadyExists(email),
            other => AuthError::ServerError(other.to_string()),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        AuthError::ServerError(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::ServerError(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::TokenExpired => AuthError::TokenExpired,
            JwtError::InvalidToken(_) => AuthError::TokenInvalid,
            JwtError::EncodingFailed(msg) => AuthError::TokenGenerationFailure(msg),
            other => AuthError::ServerError(other.to_string()),
        }
    }
}
