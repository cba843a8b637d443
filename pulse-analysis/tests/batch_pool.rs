use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulse_analysis::{BatchProcessor, PostAnalyzer, SentimentBackend, SentimentScorer};
use pulse_social::{Comment, CommentSource, Post};

struct Neutral;

impl SentimentBackend for Neutral {
    fn score_raw(&self, text: &str) -> f64 {
        if text == "boom" {
            panic!("scorer exploded");
        }
        0.0
    }
}

/// Slow comment source that records how many expansions run at once.
#[derive(Default)]
struct Gauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl CommentSource for Gauge {
    async fn top_level_comments(&self, _post: &Post) -> anyhow::Result<Vec<Comment>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![Comment::new("fine")])
    }
}

fn processor(gauge: Option<Arc<Gauge>>) -> BatchProcessor {
    let scorer = SentimentScorer::new(Arc::new(Neutral), NonZeroUsize::new(32).unwrap());
    let mut analyzer = PostAnalyzer::new(Arc::new(scorer));
    if let Some(gauge) = gauge {
        analyzer = analyzer.with_comment_source(gauge);
    }
    BatchProcessor::new(Arc::new(analyzer))
}

fn deferred(i: usize) -> Post {
    Post::new(format!("p{i}"), format!("title {i}"), format!("https://x/{i}"), None)
        .with_deferred_comments()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_never_exceeds_configured_workers() {
    let gauge = Arc::new(Gauge::default());
    let posts: Vec<Post> = (0..20).map(deferred).collect();

    let out = processor(Some(gauge.clone())).process(posts).await;

    assert_eq!(out.len(), 20);
    assert_eq!(gauge.calls.load(Ordering::SeqCst), 20);
    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency was {peak}");
    assert!(peak >= 2, "pool did not fan out (peak {peak})");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn custom_pool_size_is_respected() {
    let gauge = Arc::new(Gauge::default());
    let posts: Vec<Post> = (0..12).map(deferred).collect();

    let out = processor(Some(gauge.clone()))
        .with_workers(1)
        .with_chunk_size(6)
        .process(posts)
        .await;

    assert_eq!(out.len(), 12);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_post_drops_only_its_chunk() {
    let mut posts: Vec<Post> = (0..12)
        .map(|i| Post::new(format!("p{i}"), format!("title {i}"), format!("https://x/{i}"), None))
        .collect();
    posts[1].title = Some("boom".into());

    let outcome = processor(None).process_detailed(posts).await;

    assert_eq!(outcome.failed_chunks, 1);
    assert_eq!(outcome.skipped_posts, 4);
    assert_eq!(outcome.analyzed.len(), 8);
    let mut urls: Vec<_> = outcome.analyzed.iter().map(|a| a.url.as_str()).collect();
    urls.sort();
    assert_eq!(
        urls,
        [
            "https://x/10",
            "https://x/11",
            "https://x/4",
            "https://x/5",
            "https://x/6",
            "https://x/7",
            "https://x/8",
            "https://x/9"
        ]
    );
}

#[tokio::test]
async fn pool_survives_a_panic_and_keeps_serving() {
    let processor = processor(None).with_workers(1).with_chunk_size(1);
    let mut posts: Vec<Post> = (0..3)
        .map(|i| Post::new(format!("p{i}"), format!("title {i}"), format!("https://x/{i}"), None))
        .collect();
    posts[0].title = Some("boom".into());

    let outcome = processor.process_detailed(posts).await;

    assert_eq!(outcome.failed_chunks, 1);
    assert_eq!(outcome.analyzed.len(), 2);
}

#[tokio::test]
async fn result_count_never_exceeds_input() {
    for n in [0usize, 1, 3, 4, 5, 8, 13] {
        let posts: Vec<Post> = (0..n)
            .map(|i| Post::new(format!("p{i}"), "t", format!("https://x/{i}"), None))
            .collect();
        let out = processor(None).process(posts).await;
        assert_eq!(out.len(), n);
    }
}
