use std::sync::Arc;

use pulse_social::{Comment, CommentSource, Comments, Post};
use serde::Serialize;
use time::OffsetDateTime;

use crate::scorer::SentimentScorer;

/// How many usable comments feed the average unless configured otherwise.
pub const DEFAULT_COMMENTS_PER_POST: usize = 2;

/// Summary of one post. Built once by [`PostAnalyzer::analyze`] and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedPost {
    pub title: String,
    pub title_sentiment: f64,
    /// `0.0` when the post had no usable comments.
    pub avg_comment_sentiment: f64,
    pub url: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("post {id} has no title")]
    MissingTitle { id: String },
    #[error("loading comments for post {id}: {source}")]
    Comments {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Two decimals, rounded from the exact binary value: `0.425` is stored just below the
/// tie and becomes `0.42`, where scaling by 100 first would give `0.43`.
pub fn round2(x: f64) -> f64 {
    format!("{x:.2}").parse().unwrap_or(x)
}

fn usable(comment: &Comment) -> Option<&str> {
    comment.body.as_deref().filter(|b| !b.trim().is_empty())
}

pub struct PostAnalyzer {
    scorer: Arc<SentimentScorer>,
    comment_source: Option<Arc<dyn CommentSource>>,
    comments_per_post: usize,
}

impl PostAnalyzer {
    pub fn new(scorer: Arc<SentimentScorer>) -> Self {
        Self {
            scorer,
            comment_source: None,
            comments_per_post: DEFAULT_COMMENTS_PER_POST,
        }
    }

    /// Source used to expand [`Comments::Deferred`]. Without one, deferred comments count as none.
    pub fn with_comment_source(mut self, source: Arc<dyn CommentSource>) -> Self {
        self.comment_source = Some(source);
        self
    }

    pub fn with_comments_per_post(mut self, n: usize) -> Self {
        self.comments_per_post = n;
        self
    }

    pub fn scorer(&self) -> &Arc<SentimentScorer> {
        &self.scorer
    }

    pub async fn analyze(&self, post: &Post) -> Result<AnalyzedPost, AnalysisError> {
        let title = post.title.as_deref().ok_or_else(|| AnalysisError::MissingTitle {
            id: post.id.clone(),
        })?;
        let title_sentiment = round2(self.scorer.score(title));

        let fetched;
        let comments: &[Comment] = match &post.comments {
            Comments::Loaded(list) => list,
            Comments::Deferred => match &self.comment_source {
                Some(source) => {
                    fetched = source.top_level_comments(post).await.map_err(|e| {
                        AnalysisError::Comments {
                            id: post.id.clone(),
                            source: e,
                        }
                    })?;
                    &fetched
                }
                None => {
                    tracing::debug!(post = %post.id, "analyze.comments.no_source");
                    &[]
                }
            },
        };

        let scores: Vec<f64> = comments
            .iter()
            .filter_map(usable)
            .take(self.comments_per_post)
            .map(|body| self.scorer.score(body))
            .collect();
        let avg_comment_sentiment = if scores.is_empty() {
            0.0
        } else {
            round2(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        Ok(AnalyzedPost {
            title: title.to_string(),
            title_sentiment,
            avg_comment_sentiment,
            url: post.url.clone(),
            created_at: post.created_at,
        })
    }
}
