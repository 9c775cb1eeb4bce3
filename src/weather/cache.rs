use super::types::WeatherRecord;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// A cached record and the instant after which it must not be served.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: WeatherRecord,
    pub expires_at: Instant,
    ttl: Duration,
}

/// Lets moka reclaim each entry once its own TTL has passed.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// City-keyed weather cache with per-entry expiry. Keys are case-insensitive.
#[derive(Clone)]
pub struct WeatherCache {
    inner: Cache<String, CacheEntry>,
}

pub fn normalize_key(city: &str) -> String {
    city.to_lowercase()
}

impl WeatherCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { inner }
    }

    pub async fn get(&self, city: &str) -> Option<WeatherRecord> {
        self.get_at(city, Instant::now()).await
    }

    pub(crate) async fn get_at(&self, city: &str, now: Instant) -> Option<WeatherRecord> {
        let key = normalize_key(city);
        let entry = self.inner.get(&key).await?;

        if now >= entry.expires_at {
            self.inner.invalidate(&key).await;
            return None;
        }

        Some(entry.value)
    }

    pub async fn put(&self, city: &str, record: WeatherRecord, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            tracing::warn!("TTL {:?} for city {} overflows the clock, not caching", ttl, city);
            return;
        };

        let entry = CacheEntry {
            value: record,
            expires_at,
            ttl,
        };
        self.inner.insert(normalize_key(city), entry).await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
