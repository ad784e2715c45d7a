use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

/// A captured handler response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Storage behind the response cache middleware.
///
/// Best-effort: implementations may drop entries at any time, and a failed
/// write must never fail the request.
#[async_trait]
pub trait ResponseCache: Send + Sync + 'static {
    /// Fetch a fresh entry. Expired entries are evicted and reported absent.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<CachedResponse>;

    /// Store or overwrite an entry.
    async fn set(&self, key: String, entry: CachedResponse);

    async fn evict(&self, key: &str);

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}
