//! Thin wrapper around Reddit search and comment endpoints.
//!
//! Two access modes:
//! - app-only OAuth (client-credentials grant) against `oauth.reddit.com`, with the
//!   bearer token cached until shortly before it expires;
//! - anonymous access to the public `.json` endpoints when no credentials are configured.
use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use pulse_http::{Auth, HttpClient, HttpError, RequestOpts};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::fetcher::{CommentSource, PostFetcher};
use crate::post::{Comment, Post};
use crate::reddit::extract::{comments_from_thread, posts_from_listing};
use crate::reddit::types::{AccessTokenResponse, CommentData, LinkData, Listing};

/// Reddit caps search pages at 100 items.
pub const MAX_SEARCH_LIMIT: usize = 100;
const COMMENT_FETCH_LIMIT: usize = 20;
/// Refresh the token this long before Reddit says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum RedditError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("reddit auth failed: {0}")]
    Auth(String),
}

#[derive(Clone)]
struct AppCredentials {
    client_id: String,
    client_secret: String,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct RedditApi {
    api: HttpClient,
    auth: Option<(HttpClient, AppCredentials)>,
    token: Mutex<Option<CachedToken>>,
    subreddit: String,
    sort: String,
}

impl RedditApi {
    /// Client for the public `.json` endpoints (no credentials).
    pub fn anonymous(public_url: &str, user_agent: &str) -> Result<Self, RedditError> {
        let api = HttpClient::new(public_url)?.with_user_agent(user_agent)?;
        Ok(Self {
            api,
            auth: None,
            token: Mutex::new(None),
            subreddit: "all".into(),
            sort: "new".into(),
        })
    }

    /// Client using app-only OAuth: tokens from `auth_url`, API calls to `api_url`.
    pub fn app_only(
        auth_url: &str,
        api_url: &str,
        user_agent: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, RedditError> {
        let api = HttpClient::new(api_url)?.with_user_agent(user_agent)?;
        let auth_http = HttpClient::new(auth_url)?.with_user_agent(user_agent)?;
        Ok(Self {
            api,
            auth: Some((
                auth_http,
                AppCredentials {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                },
            )),
            token: Mutex::new(None),
            subreddit: "all".into(),
            sort: "new".into(),
        })
    }

    pub fn with_subreddit(mut self, subreddit: impl Into<String>) -> Self {
        self.subreddit = subreddit.into();
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Apply one timeout/retry policy to every request this client makes.
    pub fn with_http_policy(mut self, timeout: Duration, retries: usize) -> Self {
        self.api = self.api.with_timeout(timeout).with_retries(retries);
        if let Some((auth_http, creds)) = self.auth.take() {
            self.auth = Some((auth_http.with_timeout(timeout).with_retries(retries), creds));
        }
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Public endpoints need the `.json` suffix; OAuth endpoints reject it.
    fn endpoint(&self, path: &str) -> String {
        if self.auth.is_some() {
            path.to_string()
        } else {
            format!("{path}.json")
        }
    }

    async fn bearer(&self) -> Result<Option<String>, RedditError> {
        let Some((auth_http, creds)) = &self.auth else {
            return Ok(None);
        };

        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(Some(cached.value.clone()));
            }
        }

        let form: [(&str, Cow<'_, str>); 1] = [("grant_type", "client_credentials".into())];
        let resp: AccessTokenResponse = auth_http
            .post_form(
                "api/v1/access_token",
                &form,
                RequestOpts {
                    auth: Some(Auth::Basic {
                        user: &creds.client_id,
                        password: Some(&creds.client_secret),
                    }),
                    ..Default::default()
                },
            )
            .await?;

        if resp.access_token.trim().is_empty() {
            return Err(RedditError::Auth("token endpoint returned an empty token".into()));
        }

        let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(
            expires_in = resp.expires_in,
            scope = ?resp.scope,
            "reddit.token.refreshed"
        );
        *slot = Some(CachedToken {
            value: resp.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(Some(resp.access_token))
    }

    /// Search `r/<subreddit>` for `query`. Blank queries return nothing without a request.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Post>, RedditError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let bearer = self.bearer().await?;

        let mut params: Vec<(&str, Cow<'_, str>)> = vec![
            ("q", query.into()),
            ("sort", self.sort.as_str().into()),
            ("limit", limit.to_string().into()),
            ("type", "link".into()),
            ("raw_json", "1".into()),
        ];
        if self.subreddit != "all" {
            params.push(("restrict_sr", "1".into()));
        }

        let path = self.endpoint(&format!("r/{}/search", self.subreddit));
        let listing: Listing<LinkData> = self
            .api
            .get_json(
                &path,
                RequestOpts {
                    auth: bearer.as_deref().map(Auth::Bearer),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await?;

        tracing::debug!(
            query,
            dist = ?listing.data.dist,
            after = ?listing.data.after,
            "reddit.search.page"
        );
        Ok(posts_from_listing(listing))
    }

    /// Top-level comments of the post with id `post_id`.
    pub async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, RedditError> {
        let bearer = self.bearer().await?;
        let path = self.endpoint(&format!("comments/{post_id}"));
        let thread: Vec<Listing<CommentData>> = self
            .api
            .get_json(
                &path,
                RequestOpts {
                    auth: bearer.as_deref().map(Auth::Bearer),
                    query: Some(vec![
                        ("depth", "1".into()),
                        ("limit", COMMENT_FETCH_LIMIT.to_string().into()),
                        ("raw_json", "1".into()),
                    ]),
                    ..Default::default()
                },
            )
            .await?;
        Ok(comments_from_thread(thread))
    }
}

#[async_trait]
impl PostFetcher for RedditApi {
    async fn fetch(&self, query: &str, limit: usize) -> Vec<Post> {
        match self.search(query, limit).await {
            Ok(posts) => {
                tracing::info!(query, count = posts.len(), "reddit.fetch.ok");
                posts
            }
            Err(e) => {
                tracing::error!(query, error = %e, "Error fetching Reddit data");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CommentSource for RedditApi {
    async fn top_level_comments(&self, post: &Post) -> anyhow::Result<Vec<Comment>> {
        Ok(self.comments(&post.id).await?)
    }
}
