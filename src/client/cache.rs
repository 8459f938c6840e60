//! Time-based metadata cache shared across completion requests

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{LabelSet, MetadataClient, MetadataMap};
use crate::errors::PromqlResult;
use crate::typechecker::Matcher;

/// Shape of a metadata query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    LabelNames(Option<String>),
    LabelValues {
        label: String,
        metric: Option<String>,
        matchers: Option<String>,
    },
    Metadata,
    Series {
        metric: String,
        matchers: Option<String>,
        label: Option<String>,
    },
}

#[derive(Debug, Clone)]
enum CachedValue {
    Strings(Vec<String>),
    Metadata(MetadataMap),
    Series(Vec<LabelSet>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    inserted: Instant,
}

fn matchers_key(matchers: Option<&[Matcher]>) -> Option<String> {
    matchers.map(|list| {
        list.iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(",")
    })
}

/// Default bound on the number of cached answers
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Caching decorator over another [`MetadataClient`].
///
/// Successful answers are kept for `max_age`; failures are never cached.
/// Entries are keyed by the full query shape, so `label_values("job")` and
/// `label_values("job", Some("up"))` are cached separately. Metric names
/// are filtered from the cached `__name__` values, so typing a longer
/// prefix never reaches the inner client.
///
/// At most `max_entries` answers are held. A full cache first drops
/// expired entries, then the oldest one.
pub struct CachedMetadataClient<C> {
    inner: C,
    max_age: Duration,
    max_entries: usize,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl<C: MetadataClient> CachedMetadataClient<C> {
    pub fn new(inner: C, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: DashMap::new(),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.inserted.elapsed() >= self.max_age
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let fresh = {
            let entry = self.entries.get(key)?;
            (!self.is_expired(&entry)).then(|| entry.value.clone())
        };
        if fresh.is_none() {
            // A fresh entry stored in between is kept
            self.entries.remove_if(key, |_, entry| self.is_expired(entry));
        }
        fresh
    }

    fn evict(&self) {
        self.entries.retain(|_, entry| !self.is_expired(entry));
        if self.entries.len() < self.max_entries {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.inserted)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(key = ?key, "metadata cache full, evicted oldest entry");
        }
    }

    fn store(&self, key: CacheKey, value: CachedValue) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict();
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    fn lookup_strings(&self, key: &CacheKey) -> Option<Vec<String>> {
        match self.lookup(key)? {
            CachedValue::Strings(values) => Some(values),
            _ => None,
        }
    }
}

#[async_trait]
impl<C: MetadataClient> MetadataClient for CachedMetadataClient<C> {
    async fn label_names(&self, metric_name: Option<&str>) -> PromqlResult<Vec<String>> {
        let key = CacheKey::LabelNames(metric_name.map(str::to_string));
        if let Some(names) = self.lookup_strings(&key) {
            return Ok(names);
        }
        let names = self.inner.label_names(metric_name).await?;
        self.store(key, CachedValue::Strings(names.clone()));
        Ok(names)
    }

    async fn label_values(
        &self,
        label_name: &str,
        metric_name: Option<&str>,
        matchers: Option<&[Matcher]>,
    ) -> PromqlResult<Vec<String>> {
        let key = CacheKey::LabelValues {
            label: label_name.to_string(),
            metric: metric_name.map(str::to_string),
            matchers: matchers_key(matchers),
        };
        if let Some(values) = self.lookup_strings(&key) {
            return Ok(values);
        }
        let values = self
            .inner
            .label_values(label_name, metric_name, matchers)
            .await?;
        self.store(key, CachedValue::Strings(values.clone()));
        Ok(values)
    }

    async fn metric_metadata(&self) -> PromqlResult<MetadataMap> {
        if let Some(CachedValue::Metadata(metadata)) = self.lookup(&CacheKey::Metadata) {
            return Ok(metadata);
        }
        let metadata = self.inner.metric_metadata().await?;
        self.store(CacheKey::Metadata, CachedValue::Metadata(metadata.clone()));
        Ok(metadata)
    }

    async fn series(
        &self,
        metric_name: &str,
        matchers: Option<&[Matcher]>,
        label_name: Option<&str>,
    ) -> PromqlResult<Vec<LabelSet>> {
        let key = CacheKey::Series {
            metric: metric_name.to_string(),
            matchers: matchers_key(matchers),
            label: label_name.map(str::to_string),
        };
        if let Some(CachedValue::Series(series)) = self.lookup(&key) {
            return Ok(series);
        }
        let series = self.inner.series(metric_name, matchers, label_name).await?;
        self.store(key, CachedValue::Series(series.clone()));
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PromqlError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingClient {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn answer(&self, values: &[&str]) -> PromqlResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PromqlError::http("http://prometheus", "connection refused"));
            }
            Ok(values.iter().map(|v| v.to_string()).collect())
        }
    }

    #[async_trait]
    impl MetadataClient for CountingClient {
        async fn label_names(&self, _metric_name: Option<&str>) -> PromqlResult<Vec<String>> {
            self.answer(&["job", "instance"])
        }

        async fn label_values(
            &self,
            label_name: &str,
            _metric_name: Option<&str>,
            _matchers: Option<&[Matcher]>,
        ) -> PromqlResult<Vec<String>> {
            if label_name == "__name__" {
                self.answer(&["up", "go_goroutines"])
            } else {
                self.answer(&["api"])
            }
        }

        async fn metric_metadata(&self) -> PromqlResult<MetadataMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MetadataMap::new())
        }

        async fn series(
            &self,
            _metric_name: &str,
            _matchers: Option<&[Matcher]>,
            _label_name: Option<&str>,
        ) -> PromqlResult<Vec<LabelSet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_repeated_query_hits_cache() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::from_secs(3600));
        let first = cache.label_names(None).await.unwrap();
        let second = cache.label_names(None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.inner().calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_query_shape_is_part_of_the_key() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::from_secs(3600));
        cache.label_values("job", None, None).await.unwrap();
        cache.label_values("job", Some("up"), None).await.unwrap();
        cache.label_values("job", Some("up"), None).await.unwrap();
        assert_eq!(cache.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::ZERO);
        cache.metric_metadata().await.unwrap();
        cache.metric_metadata().await.unwrap();
        assert_eq!(cache.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let client = CountingClient {
            fail: true,
            ..Default::default()
        };
        let cache = CachedMetadataClient::new(client, Duration::from_secs(3600));
        assert!(cache.label_names(None).await.is_err());
        assert!(cache.label_names(None).await.is_err());
        assert_eq!(cache.inner().calls(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_metric_name_prefixes_share_one_fetch() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::from_secs(3600));
        for prefix in ["g", "go", "go_", "go_g", "go_go"] {
            assert_eq!(
                cache.metric_names(Some(prefix)).await.unwrap(),
                vec!["go_goroutines"]
            );
        }
        assert_eq!(cache.metric_names(None).await.unwrap(), vec!["up", "go_goroutines"]);
        assert_eq!(cache.inner().calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_full_cache_evicts_oldest() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::from_secs(3600))
            .with_max_entries(2);
        cache.label_names(None).await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.label_names(Some("up")).await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.label_names(Some("go_goroutines")).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.inner().calls(), 3);

        cache.label_names(Some("go_goroutines")).await.unwrap();
        assert_eq!(cache.inner().calls(), 3);
        cache.label_names(None).await.unwrap();
        assert_eq!(cache.inner().calls(), 4);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_when_full() {
        let cache = CachedMetadataClient::new(CountingClient::default(), Duration::ZERO)
            .with_max_entries(2);
        for metric in ["a", "b", "c", "d"] {
            cache.label_names(Some(metric)).await.unwrap();
        }
        assert!(cache.len() <= 2);
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let cache = Arc::new(CachedMetadataClient::new(
            CountingClient::default(),
            Duration::from_secs(3600),
        ));
        cache.metric_names(Some("go")).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.metric_names(Some("go")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec!["go_goroutines"]);
        }
        assert_eq!(cache.inner().calls(), 1);
    }
}
