//! Chunked fan-out of post analysis over a fixed worker pool.
//!
//! Each call to [`BatchProcessor::process_detailed`] starts `workers` tasks that pull
//! jobs from one bounded queue. Chunks are submitted one at a time and the collector
//! waits for every reply of a chunk (the barrier) before submitting the next one. A
//! chunk with any failed or panicked post contributes nothing.
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use pulse_common::PulseError;
use pulse_social::Post;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};

use crate::analyzer::{AnalysisError, AnalyzedPost, PostAnalyzer};

pub const DEFAULT_CHUNK_SIZE: usize = 4;
pub const DEFAULT_WORKERS: usize = 3;

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("worker panicked: {0}")]
    Panicked(String),
}

type JobResult = (usize, Result<AnalyzedPost, JobError>);

struct Job {
    slot: usize,
    post: Post,
    reply: mpsc::UnboundedSender<JobResult>,
}

/// What a batch run produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub analyzed: Vec<AnalyzedPost>,
    pub failed_chunks: usize,
    /// Posts dropped because their chunk failed.
    pub skipped_posts: usize,
}

pub struct BatchProcessor {
    analyzer: Arc<PostAnalyzer>,
    chunk_size: usize,
    workers: usize,
}

impl BatchProcessor {
    pub fn new(analyzer: Arc<PostAnalyzer>) -> Self {
        Self {
            analyzer,
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn analyzer(&self) -> &Arc<PostAnalyzer> {
        &self.analyzer
    }

    /// Analyze every post. Output order follows chunks, not timestamps.
    pub async fn process(&self, posts: Vec<Post>) -> Vec<AnalyzedPost> {
        self.process_detailed(posts).await.analyzed
    }

    pub async fn process_detailed(&self, posts: Vec<Post>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if posts.is_empty() {
            return outcome;
        }

        let total = posts.len();
        let (job_tx, job_rx) = mpsc::channel::<Job>(self.chunk_size);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut pool = JoinSet::new();
        for worker in 0..self.workers {
            pool.spawn(worker_loop(worker, job_rx.clone(), self.analyzer.clone()));
        }

        let mut remaining = posts.into_iter();
        let mut index = 0usize;
        loop {
            let chunk: Vec<Post> = remaining.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let expected = chunk.len();

            let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
            for (slot, post) in chunk.into_iter().enumerate() {
                let job = Job {
                    slot,
                    post,
                    reply: reply_tx.clone(),
                };
                if job_tx.send(job).await.is_err() {
                    tracing::error!(chunk = index, "batch.queue.closed");
                    break;
                }
            }
            drop(reply_tx);

            let mut replies = Vec::with_capacity(expected);
            while let Some(reply) = reply_rx.recv().await {
                replies.push(reply);
            }

            match settle_chunk(expected, replies) {
                Ok(analyzed) => {
                    tracing::debug!(chunk = index, posts = expected, "batch.chunk.done");
                    outcome.analyzed.extend(analyzed);
                }
                Err(reason) => {
                    tracing::warn!(chunk = index, posts = expected, %reason, "batch.chunk.failed");
                    outcome.failed_chunks += 1;
                    outcome.skipped_posts += expected;
                }
            }
            index += 1;
        }

        drop(job_tx);
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                let err = worker_failure(e);
                tracing::error!(error = %err, "batch.worker.join_failed");
            }
        }

        tracing::info!(
            total,
            analyzed = outcome.analyzed.len(),
            failed_chunks = outcome.failed_chunks,
            "batch.done"
        );
        outcome
    }
}

async fn worker_loop(
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    analyzer: Arc<PostAnalyzer>,
) {
    loop {
        // The lock is held while waiting so exactly one idle worker sits on the queue.
        let next = jobs.lock().await.recv().await;
        let Some(Job { slot, post, reply }) = next else {
            break;
        };

        let result = match AssertUnwindSafe(analyzer.analyze(&post)).catch_unwind().await {
            Ok(analyzed) => analyzed.map_err(JobError::from),
            Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
        };
        if reply.send((slot, result)).is_err() {
            tracing::debug!(worker, slot, "batch.reply.dropped");
        }
    }
    tracing::trace!(worker, "batch.worker.exit");
}

fn worker_failure(e: JoinError) -> PulseError {
    if e.is_panic() {
        let payload = e.into_panic();
        PulseError::Worker(format!("worker panicked: {}", panic_message(payload.as_ref())))
    } else {
        PulseError::Worker(format!("worker cancelled: {e}"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Results of one chunk, or why the chunk is dropped.
fn settle_chunk(
    expected: usize,
    mut replies: Vec<JobResult>,
) -> Result<Vec<AnalyzedPost>, String> {
    if replies.len() != expected {
        return Err(format!("{} of {expected} posts reported back", replies.len()));
    }
    replies.sort_by_key(|(slot, _)| *slot);
    replies
        .into_iter()
        .map(|(_, r)| r.map_err(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{SentimentBackend, SentimentScorer};
    use std::num::NonZeroUsize;

    struct Echo;

    impl SentimentBackend for Echo {
        fn score_raw(&self, text: &str) -> f64 {
            text.parse().unwrap_or(0.0)
        }
    }

    #[tokio::test]
    async fn crashed_worker_becomes_worker_error() {
        let crashed = tokio::spawn(async { panic!("queue poisoned") })
            .await
            .unwrap_err();
        match worker_failure(crashed) {
            PulseError::Worker(msg) => assert_eq!(msg, "worker panicked: queue poisoned"),
            other => panic!("unexpected error: {other:?}"),
        }

        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let cancelled = handle.await.unwrap_err();
        assert!(matches!(
            worker_failure(cancelled),
            PulseError::Worker(msg) if msg.starts_with("worker cancelled")
        ));
    }

    fn processor() -> BatchProcessor {
        let scorer = SentimentScorer::new(Arc::new(Echo), NonZeroUsize::new(64).unwrap());
        BatchProcessor::new(Arc::new(PostAnalyzer::new(Arc::new(scorer))))
    }

    fn post(i: usize) -> Post {
        Post::new(format!("p{i}"), format!("0.{i}"), format!("https://x/{i}"), None)
    }

    #[tokio::test]
    async fn empty_input_gives_empty_output() {
        let outcome = processor().process_detailed(Vec::new()).await;
        assert!(outcome.analyzed.is_empty());
        assert_eq!(outcome.failed_chunks, 0);
    }

    #[tokio::test]
    async fn every_post_is_analyzed_exactly_once() {
        let posts: Vec<Post> = (0..10).map(post).collect();
        let out = processor().process(posts).await;
        let mut urls: Vec<_> = out.iter().map(|a| a.url.clone()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 10);
    }

    #[tokio::test]
    async fn order_within_chunks_is_preserved() {
        let posts: Vec<Post> = (0..6).map(post).collect();
        let out = processor().process(posts).await;
        let titles: Vec<_> = out.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["0.0", "0.1", "0.2", "0.3", "0.4", "0.5"]);
    }

    #[tokio::test]
    async fn failing_post_drops_only_its_chunk() {
        let mut posts: Vec<Post> = (0..9).map(post).collect();
        posts[5].title = None;
        let outcome = processor().with_chunk_size(4).process_detailed(posts).await;
        assert_eq!(outcome.failed_chunks, 1);
        assert_eq!(outcome.skipped_posts, 4);
        assert_eq!(outcome.analyzed.len(), 5);
        assert!(outcome.analyzed.iter().all(|a| a.url != "https://x/4"));
    }

    #[test]
    fn short_chunk_is_a_failure() {
        assert!(settle_chunk(2, Vec::new()).is_err());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
