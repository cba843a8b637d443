use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pulse_analysis::{
    BatchProcessor, MissingTimestamps, PostAnalyzer, SentimentPipeline, SentimentScorer,
    TimeSeriesAggregator,
};
use pulse_config::{MissingTimestampPolicy, PulseConfig, RedditConfig};
use pulse_social::reddit::RedditApi;
use pulse_social::{CachedFetcher, CommentSource, PostFetcher};

fn non_zero(value: usize, field: &str) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value).with_context(|| format!("pipeline.{field} must be at least 1"))
}

fn missing_timestamps(policy: MissingTimestampPolicy) -> MissingTimestamps {
    match policy {
        MissingTimestampPolicy::Drop => MissingTimestamps::Drop,
        MissingTimestampPolicy::Spread => MissingTimestamps::Spread,
    }
}

/// Reddit client for the configured access mode.
pub fn build_reddit(cfg: &RedditConfig) -> Result<Arc<RedditApi>> {
    let api = match cfg.credentials() {
        Some((id, secret)) => {
            RedditApi::app_only(&cfg.auth_url, &cfg.api_url, &cfg.user_agent, id, secret)
        }
        None => RedditApi::anonymous(&cfg.public_url, &cfg.user_agent),
    }
    .context("building Reddit client")?;

    let api = api
        .with_subreddit(cfg.subreddit.clone())
        .with_sort(cfg.sort.clone())
        .with_http_policy(Duration::from_secs(cfg.timeout_secs), cfg.retries);
    tracing::info!(
        authenticated = api.is_authenticated(),
        subreddit = %cfg.subreddit,
        "reddit.client.ready"
    );
    Ok(Arc::new(api))
}

/// Wire fetcher, analyzer, pool and aggregator from configuration.
pub fn build_pipeline(cfg: &PulseConfig) -> Result<SentimentPipeline> {
    let reddit = build_reddit(&cfg.reddit)?;
    let p = &cfg.pipeline;

    let raw: Arc<dyn PostFetcher> = reddit.clone();
    let fetcher = CachedFetcher::new(
        raw,
        non_zero(p.fetch_cache_capacity, "fetch_cache_capacity")?,
        Duration::from_secs(p.fetch_cache_ttl_secs),
    );

    let scorer = SentimentScorer::vader(non_zero(
        p.sentiment_cache_capacity,
        "sentiment_cache_capacity",
    )?);
    let comments: Arc<dyn CommentSource> = reddit;
    let analyzer = PostAnalyzer::new(Arc::new(scorer))
        .with_comment_source(comments)
        .with_comments_per_post(p.comments_per_post);

    let batch = BatchProcessor::new(Arc::new(analyzer))
        .with_chunk_size(p.chunk_size)
        .with_workers(p.workers);

    let aggregator =
        TimeSeriesAggregator::new(p.interval_count, time::Duration::minutes(p.interval_minutes))
            .with_missing_timestamps(missing_timestamps(p.missing_timestamps));

    Ok(
        SentimentPipeline::new(Arc::new(fetcher), batch, aggregator)
            .with_fetch_limit(cfg.reddit.fetch_limit),
    )
}
