//! Common types and utilities shared across the sentiment-pulse crates.
//!
//! This crate holds the shared error type and the observability helpers. It stays
//! dependency-light so every other crate in the workspace can depend on it.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`PulseError`]: failures surfaced outside the crate that detected them
//! - [`CacheCounters`] and [`CacheStats`]: hit/miss/eviction bookkeeping for the bounded caches
//!
//! # Examples
//!
//! ```rust
//! use pulse_common::PulseError;
//!
//! let err = PulseError::Config("chunk_size must be at least 1".into());
//! assert_eq!(err.to_string(), "Configuration error: chunk_size must be at least 1");
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod observability;

/// Error types used across the sentiment-pulse system.
#[derive(thiserror::Error, Debug)]
pub enum PulseError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker in the analysis pool stopped outside its own panic guard.
    #[error("Worker error: {0}")]
    Worker(String),
}

/// Point-in-time view of a bounded cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Lock-free counters shared by readers and writers of a cache.
///
/// ```rust
/// use pulse_common::CacheCounters;
///
/// let counters = CacheCounters::default();
/// counters.hit();
/// counters.miss();
/// counters.miss();
/// let stats = counters.snapshot(2, 8);
/// assert_eq!((stats.hits, stats.misses, stats.evictions), (1, 2, 0));
/// ```
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, len: usize, capacity: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len,
            capacity,
        }
    }
}
