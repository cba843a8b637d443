//! Reddit integration: HTTP client wrapper, listing extraction and response models.
pub mod client;
pub mod extract;
pub mod types;

pub use client::{RedditApi, RedditError};
