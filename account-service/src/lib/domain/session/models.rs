use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::account::models::AccountId;

/// Session record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the server knows about the client a refresh token was handed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub device_id: Option<String>,
}

impl DeviceDescriptor {
    /// Key used to scope per-device revocation: the client-supplied device
    /// id, or the user agent when none was given.
    pub fn key(&self) -> Option<&str> {
        self.device_id
            .as_deref()
            .or(self.user_agent.as_deref())
            .filter(|key| !key.is_empty())
    }
}

/// Persisted refresh token. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub account_id: AccountId,
    pub token_digest: String,
    pub jti: String,
    pub device: DeviceDescriptor,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued refresh token about to be stored.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub account_id: AccountId,
    pub token: &'a str,
    pub jti: &'a str,
    pub device: DeviceDescriptor,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// How many concurrent refresh tokens an account may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// One active refresh token per account.
    #[default]
    Single,
    /// One active refresh token per (account, device).
    PerDevice,
}

/// Which existing records a new token replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationScope {
    Account,
    Device(String),
}

impl SessionPolicy {
    pub fn scope_for(&self, device: &DeviceDescriptor) -> RevocationScope {
        match (self, device.key()) {
            (SessionPolicy::PerDevice, Some(key)) => RevocationScope::Device(key.to_string()),
            _ => RevocationScope::Account,
        }
    }
}
