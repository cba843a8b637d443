//! Small JSON-over-HTTP client used for the Reddit API.
//!
//! Retries 429 and 5xx replies and transport failures with exponential
//! backoff, honouring `Retry-After`. Query and form values under secret-looking
//! keys are redacted before they reach a log line, and credentials are only
//! ever logged by kind. Setting `PULSE_HTTP_RAW=1` adds full request and
//! response logging under the `http.raw` target.
//!
//! ```no_run
//! # async fn demo() -> Result<(), pulse_http::HttpError> {
//! let client = pulse_http::HttpClient::new("https://www.reddit.com")?
//!     .with_user_agent("SentimentPulse/0.1")?;
//! let listing: serde_json::Value = client
//!     .get_json("r/all/search.json", pulse_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

mod auth;
mod client;
mod error;
mod redact;
mod retry;

pub use auth::{Auth, RequestOpts};
pub use client::HttpClient;
pub use error::HttpError;
pub use redact::{redact_pairs, RAW_ENV};
