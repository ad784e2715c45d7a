use thiserror::Error;

use crate::domain::session::errors::SessionError;

/// Error for AccountId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for display name validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisplayNameError {
    #[error("Name must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Name cannot exceed {max} characters")]
    TooLong { max: usize },
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Please provide a valid email address")]
    InvalidFormat(String),
}

/// Error for phone number validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Invalid phone number format")]
    InvalidFormat,
}

/// Error for role parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Password complexity violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordStrengthError {
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Password cannot exceed {max} characters")]
    TooLong { max: usize },

    #[error(
        "Password must include at least 1 uppercase, 1 lowercase, 1 number, and 1 special character"
    )]
    MissingCharacterClass,
}

/// Top-level error for account persistence and lookup.
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(#[from] AccountIdError),

    #[error("Stored account is corrupt: {0}")]
    CorruptRecord(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("An account with this email already exists")]
    EmailAlreadyExists(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionError),
}
