//! fetch → analyze → aggregate for one query.
use std::sync::Arc;
use std::time::Instant;

use pulse_common::CacheStats;
use pulse_social::PostFetcher;
use serde::Serialize;

use crate::aggregate::{TimeBucket, TimeSeriesAggregator};
use crate::analyzer::{round2, AnalyzedPost};
use crate::batch::BatchProcessor;

pub const DEFAULT_FETCH_LIMIT: usize = 50;
pub const NO_RESULTS_MESSAGE: &str = "No Reddit posts found. Please try another search term.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    MissingQuery,
    NoResults,
}

/// Everything a caller gets back for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SentimentReport {
    pub query: String,
    pub status: ReportStatus,
    /// Newest first; undated posts last.
    pub posts: Vec<AnalyzedPost>,
    pub time_series: Vec<TimeBucket>,
    pub processing_time_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SentimentReport {
    fn missing_query() -> Self {
        Self {
            query: String::new(),
            status: ReportStatus::MissingQuery,
            posts: Vec::new(),
            time_series: Vec::new(),
            processing_time_secs: 0.0,
            error_message: None,
        }
    }
}

pub struct SentimentPipeline {
    fetcher: Arc<dyn PostFetcher>,
    batch: BatchProcessor,
    aggregator: TimeSeriesAggregator,
    fetch_limit: usize,
}

impl SentimentPipeline {
    pub fn new(
        fetcher: Arc<dyn PostFetcher>,
        batch: BatchProcessor,
        aggregator: TimeSeriesAggregator,
    ) -> Self {
        Self {
            fetcher,
            batch,
            aggregator,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    pub fn scorer_stats(&self) -> CacheStats {
        self.batch.analyzer().scorer().stats()
    }

    pub async fn run(&self, query: &str) -> SentimentReport {
        self.run_with_limit(query, self.fetch_limit).await
    }

    /// Analyze up to `limit` posts for `query`. A blank query makes no upstream call.
    pub async fn run_with_limit(&self, query: &str, limit: usize) -> SentimentReport {
        let query = query.trim();
        if query.is_empty() {
            return SentimentReport::missing_query();
        }

        let started = Instant::now();
        let posts = self.fetcher.fetch(query, limit).await;
        let fetched = posts.len();

        let mut analyzed = self.batch.process(posts).await;
        analyzed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let time_series = if analyzed.is_empty() {
            Vec::new()
        } else {
            self.aggregator.aggregate(&analyzed)
        };

        let (status, error_message) = if fetched == 0 {
            (ReportStatus::NoResults, Some(NO_RESULTS_MESSAGE.to_string()))
        } else {
            (ReportStatus::Ok, None)
        };
        let processing_time_secs = round2(started.elapsed().as_secs_f64());

        tracing::info!(
            query,
            fetched,
            analyzed = analyzed.len(),
            processing_time_secs,
            "pipeline.done"
        );

        SentimentReport {
            query: query.to_string(),
            status,
            posts: analyzed,
            time_series,
            processing_time_secs,
            error_message,
        }
    }

    /// Only the bucketed series; empty when the query is blank or nothing was analyzed.
    pub async fn time_series(&self, query: &str) -> Vec<TimeBucket> {
        self.run(query).await.time_series
    }
}
