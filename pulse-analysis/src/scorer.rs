//! Text → sentiment scalar, memoized by exact text.
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use pulse_common::{CacheCounters, CacheStats};
use vader_sentiment::SentimentIntensityAnalyzer;

/// Memoization size used when configuration does not say otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Opaque scorer behind [`SentimentScorer`]. Implementations should return a value in
/// `[-1, 1]`; anything else is clamped, and non-finite results count as neutral.
pub trait SentimentBackend: Send + Sync {
    fn score_raw(&self, text: &str) -> f64;
}

/// Lexicon-based VADER scorer; reports the `compound` polarity.
pub struct VaderBackend {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderBackend {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentBackend for VaderBackend {
    fn score_raw(&self, text: &str) -> f64 {
        self.analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
    }
}

fn normalize(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Shared, bounded memo of backend scores.
///
/// Safe to call from every worker at once. The backend runs outside the lock, so two
/// workers missing on the same text may both score it; the second insert replaces the
/// first and is not counted as an eviction.
///
/// ```
/// use std::num::NonZeroUsize;
/// use pulse_analysis::SentimentScorer;
///
/// let scorer = SentimentScorer::vader(NonZeroUsize::new(16).unwrap());
/// assert_eq!(scorer.score(""), 0.0);
/// let happy = scorer.score("I love this, it is great!");
/// assert!(happy > 0.05);
/// assert_eq!(scorer.score("I love this, it is great!"), happy);
/// assert_eq!(scorer.stats().hits, 1);
/// ```
pub struct SentimentScorer {
    backend: Arc<dyn SentimentBackend>,
    cache: Mutex<LruCache<String, f64>>,
    counters: CacheCounters,
}

impl SentimentScorer {
    pub fn new(backend: Arc<dyn SentimentBackend>, capacity: NonZeroUsize) -> Self {
        Self {
            backend,
            cache: Mutex::new(LruCache::new(capacity)),
            counters: CacheCounters::default(),
        }
    }

    pub fn vader(capacity: NonZeroUsize) -> Self {
        Self::new(Arc::new(VaderBackend::new()), capacity)
    }

    /// Score `text` in `[-1, 1]`. Empty text is exactly `0.0` and never reaches the backend.
    pub fn score(&self, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }

        {
            let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(&score) = cache.get(text) {
                self.counters.hit();
                return score;
            }
        }
        self.counters.miss();

        let score = normalize(self.backend.score_raw(text));

        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((evicted, _)) = cache.push(text.to_owned(), score) {
            if evicted != text {
                self.counters.evicted();
                tracing::trace!(len = cache.len(), "sentiment.cache.evicted");
            }
        }
        score
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        self.counters.snapshot(cache.len(), cache.cap().get())
    }
}
