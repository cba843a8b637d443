//! Sentiment analysis of social posts.
//!
//! - [`SentimentScorer`]: text → score in `[-1, 1]`, memoized in a bounded LRU
//! - [`PostAnalyzer`]: title score plus the average of the first usable comments
//! - [`BatchProcessor`]: chunked fan-out over a fixed pool of worker tasks
//! - [`TimeSeriesAggregator`]: counts per class in fixed-width buckets
//! - [`SentimentPipeline`]: the whole fetch → analyze → aggregate pass for one query
pub mod aggregate;
pub mod analyzer;
pub mod batch;
pub mod pipeline;
pub mod scorer;

pub use aggregate::{MissingTimestamps, SentimentClass, TimeBucket, TimeSeriesAggregator};
pub use analyzer::{AnalysisError, AnalyzedPost, PostAnalyzer};
pub use batch::{BatchOutcome, BatchProcessor};
pub use pipeline::{ReportStatus, SentimentPipeline, SentimentReport};
pub use scorer::{SentimentBackend, SentimentScorer, VaderBackend};
