use crate::post::{Comment, Post};
use async_trait::async_trait;

/// Source of post batches for a free-text query.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Return up to `limit` posts, newest first where the platform supports it.
    ///
    /// Never fails: upstream errors are logged by the implementation and come back
    /// as an empty batch.
    async fn fetch(&self, query: &str, limit: usize) -> Vec<Post>;
}

/// Expands comments a fetcher left as [`crate::Comments::Deferred`].
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Top-level comments of `post` in platform order. Stubs without a body may be included.
    async fn top_level_comments(&self, post: &Post) -> anyhow::Result<Vec<Comment>>;
}
