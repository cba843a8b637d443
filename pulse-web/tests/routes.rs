use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use pulse_analysis::{
    BatchProcessor, PostAnalyzer, SentimentBackend, SentimentPipeline, SentimentScorer,
    TimeSeriesAggregator,
};
use pulse_social::{Post, PostFetcher};
use pulse_web::{router, AppState};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

struct Echo;

impl SentimentBackend for Echo {
    fn score_raw(&self, text: &str) -> f64 {
        text.parse().unwrap_or(0.0)
    }
}

#[derive(Default)]
struct Stub {
    calls: AtomicUsize,
    last_limit: AtomicUsize,
}

#[async_trait]
impl PostFetcher for Stub {
    async fn fetch(&self, query: &str, limit: usize) -> Vec<Post> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_limit.store(limit, Ordering::SeqCst);
        if query == "nobody" {
            return Vec::new();
        }
        let now = OffsetDateTime::now_utc();
        vec![
            Post::new("a", "0.9", "https://x/a", Some(now - Duration::minutes(2))),
            Post::new("b", "-0.9", "https://x/b", Some(now - Duration::minutes(1))),
            Post::new("c", "0.0", "https://x/c", Some(now - Duration::minutes(25))),
        ]
    }
}

fn app() -> (Arc<Stub>, axum::Router) {
    let stub = Arc::new(Stub::default());
    let scorer = SentimentScorer::new(Arc::new(Echo), NonZeroUsize::new(16).unwrap());
    let batch = BatchProcessor::new(Arc::new(PostAnalyzer::new(Arc::new(scorer))));
    let pipeline = SentimentPipeline::new(stub.clone(), batch, TimeSeriesAggregator::default());
    (stub, router(AppState::new(Arc::new(pipeline))))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (_, app) = app();
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}

#[tokio::test]
async fn sentiment_report_lists_posts_newest_first() {
    let (_, app) = app();
    let resp = app
        .oneshot(get("/api/sentiment?company_name=tesla"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["query"], "tesla");
    let urls: Vec<_> = v["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, ["https://x/b", "https://x/a", "https://x/c"]);
    assert_eq!(v["time_series"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn missing_name_skips_fetch() {
    let (stub, app) = app();
    let resp = app.oneshot(get("/api/sentiment")).await.unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["status"], "missing_query");
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_posts_reports_no_results() {
    let (_, app) = app();
    let resp = app
        .oneshot(get("/api/sentiment?company_name=nobody"))
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["status"], "no_results");
    assert_eq!(
        v["error_message"],
        "No Reddit posts found. Please try another search term."
    );
}

#[tokio::test]
async fn limit_parameter_reaches_fetcher() {
    let (stub, app) = app();
    app.oneshot(get("/api/sentiment?company_name=tesla&limit=7"))
        .await
        .unwrap();
    assert_eq!(stub.last_limit.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn form_post_runs_the_pipeline() {
    let (_, app) = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("company_name=tesla"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["posts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn sentiment_data_counts_classes() {
    let (_, app) = app();
    let resp = app
        .oneshot(get("/sentiment-data?company_name=tesla"))
        .await
        .unwrap();
    let v = body_json(resp).await;
    let buckets = v.as_array().unwrap();
    assert_eq!(buckets.len(), 12);
    let sum = |key: &str| buckets.iter().map(|b| b[key].as_u64().unwrap()).sum::<u64>();
    assert_eq!((sum("positive"), sum("negative"), sum("neutral"), sum("total")), (1, 1, 1, 3));
}

#[tokio::test]
async fn sentiment_data_without_name_is_empty_list() {
    let (stub, app) = app();
    let resp = app.oneshot(get("/sentiment-data")).await.unwrap();
    assert_eq!(body_json(resp).await, Value::Array(Vec::new()));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}
