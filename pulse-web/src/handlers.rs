use axum::extract::{Query, State};
use axum::{Form, Json};
use pulse_analysis::{SentimentReport, TimeBucket};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

/// Query string or form body naming the entity to analyze.
#[derive(Debug, Default, Deserialize)]
pub struct CompanyQuery {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CompanyQuery {
    fn name(&self) -> &str {
        self.company_name.as_deref().unwrap_or_default()
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn report(state: &AppState, query: &CompanyQuery) -> SentimentReport {
    let limit = query.limit.unwrap_or_else(|| state.pipeline.fetch_limit());
    state.pipeline.run_with_limit(query.name(), limit).await
}

/// `GET /api/sentiment?company_name=...`
pub async fn sentiment(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> Json<SentimentReport> {
    Json(report(&state, &query).await)
}

/// `POST /` with a `company_name` form field.
pub async fn sentiment_form(
    State(state): State<AppState>,
    Form(query): Form<CompanyQuery>,
) -> Json<SentimentReport> {
    Json(report(&state, &query).await)
}

/// `GET /sentiment-data?company_name=...`: buckets only, `[]` without a name.
pub async fn sentiment_data(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> Json<Vec<TimeBucket>> {
    Json(state.pipeline.time_series(query.name()).await)
}
