//! Query-level memoization in front of a [`PostFetcher`].
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use pulse_common::{CacheCounters, CacheStats};
use tokio::time::Instant;

use crate::fetcher::PostFetcher;
use crate::post::Post;

struct Entry {
    posts: Vec<Post>,
    stored_at: Instant,
}

/// Caches fetch results per `(query, limit)` for a fixed TTL, bounded by an LRU.
///
/// Empty batches are not stored, so a transient upstream failure is retried on the
/// next request instead of being served for the whole TTL.
pub struct CachedFetcher {
    inner: Arc<dyn PostFetcher>,
    entries: Mutex<LruCache<(String, usize), Entry>>,
    ttl: Duration,
    counters: CacheCounters,
}

impl CachedFetcher {
    pub fn new(inner: Arc<dyn PostFetcher>, capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            inner,
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            counters: CacheCounters::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        self.counters.snapshot(entries.len(), entries.cap().get())
    }

    fn lookup(&self, key: &(String, usize)) -> Option<Vec<Post>> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let fresh = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.posts.clone()),
            Some(_) => None,
            None => return None,
        };
        if fresh.is_none() {
            entries.pop(key);
        }
        fresh
    }

    fn store(&self, key: (String, usize), posts: &[Post]) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let entry = Entry {
            posts: posts.to_vec(),
            stored_at: Instant::now(),
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.counters.evicted();
            }
        }
    }
}

#[async_trait]
impl PostFetcher for CachedFetcher {
    async fn fetch(&self, query: &str, limit: usize) -> Vec<Post> {
        let key = (query.to_string(), limit);
        if let Some(posts) = self.lookup(&key) {
            self.counters.hit();
            tracing::debug!(query, limit, "fetch.cache.hit");
            return posts;
        }
        self.counters.miss();

        let posts = self.inner.fetch(query, limit).await;
        if !posts.is_empty() {
            self.store(key, &posts);
        }
        posts
    }
}
