use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use moka::future::Cache;
use moka::Expiry;

use crate::domain::cache::CachedResponse;
use crate::domain::cache::ResponseCache;
use crate::domain::clock::Clock;

/// Lets moka drop each entry at its own `expires_at`.
struct EntryExpiry {
    clock: Arc<dyn Clock>,
}

impl EntryExpiry {
    fn remaining(&self, entry: &CachedResponse) -> Duration {
        (entry.expires_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

impl Expiry<String, CachedResponse> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedResponse,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value))
    }
}

/// Process-local response cache, bounded to `max_entries`.
///
/// Not shared across instances. Freshness is always judged against the
/// injected clock, so an entry moka still holds is reported absent once its
/// `expires_at` has passed.
pub struct InMemoryResponseCache {
    entries: Cache<String, CachedResponse>,
}

impl InMemoryResponseCache {
    pub fn new(max_entries: u64, clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries.max(1))
            .expire_after(EntryExpiry { clock })
            .build();

        Self { entries }
    }

    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<CachedResponse> {
        let entry = self.entries.get(key).await?;
        if entry.is_fresh(now) {
            return Some(entry);
        }

        self.entries.invalidate(key).await;
        None
    }

    async fn set(&self, key: String, entry: CachedResponse) {
        self.entries.insert(key, entry).await;
    }

    async fn evict(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_str()).await;
        }
        self.entries.run_pending_tasks().await;

        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::clock::ManualClock;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn cache(max_entries: u64) -> (InMemoryResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now()));
        (InMemoryResponseCache::new(max_entries, clock.clone()), clock)
    }

    fn entry(body: &str, expires_at: DateTime<Utc>) -> CachedResponse {
        CachedResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_returned() {
        let (cache, _) = cache(10);
        cache
            .set("k".to_string(), entry("a", now() + Duration::seconds(60)))
            .await;

        let hit = cache.get("k", now()).await.unwrap();

        assert_eq!(hit.body, b"a");
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_read() {
        let (cache, clock) = cache(10);
        cache
            .set("k".to_string(), entry("a", now() + Duration::seconds(60)))
            .await;
        clock.advance(Duration::seconds(60));

        assert!(cache.get("k", clock.now()).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (cache, _) = cache(10);
        let expiry = now() + Duration::seconds(60);
        cache.set("k".to_string(), entry("a", expiry)).await;
        cache.set("k".to_string(), entry("b", expiry)).await;

        assert_eq!(cache.get("k", now()).await.unwrap().body, b"b");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let (cache, _) = cache(2);
        let expiry = now() + Duration::hours(1);
        for key in ["a", "b", "c", "d"] {
            cache.set(key.to_string(), entry(key, expiry)).await;
        }

        assert!(cache.len().await <= 2);
    }

    #[tokio::test]
    async fn test_entry_already_expired_at_insert_is_never_served() {
        let (cache, _) = cache(10);
        cache
            .set("k".to_string(), entry("a", now() - Duration::seconds(1)))
            .await;

        assert!(cache.get("k", now()).await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_counts_removed() {
        let (cache, clock) = cache(10);
        cache
            .set("old".to_string(), entry("a", now() + Duration::seconds(1)))
            .await;
        cache
            .set("new".to_string(), entry("b", now() + Duration::seconds(60)))
            .await;
        clock.advance(Duration::seconds(1));

        assert_eq!(cache.purge_expired(clock.now()).await, 1);
        cache.evict("new").await;
        assert!(cache.is_empty().await);
    }
}
