//! Social network clients and the post model the analysis pipeline consumes.
//!
//! The pipeline only sees [`Post`]/[`Comment`] values and the [`PostFetcher`] /
//! [`CommentSource`] traits. Reddit is the one concrete platform; [`CachedFetcher`]
//! memoizes search batches in front of any fetcher.
pub mod cache;
pub mod fetcher;
pub mod post;
pub mod reddit;

pub use cache::CachedFetcher;
pub use fetcher::{CommentSource, PostFetcher};
pub use post::{Comment, Comments, Post};
