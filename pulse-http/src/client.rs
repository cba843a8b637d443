use std::borrow::Cow;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::auth::{Auth, RequestOpts};
use crate::error::{excerpt, upstream_message, HttpError};
use crate::redact::{
    curl_line, raw_logging, redact_headers, redact_pairs, FormFields,
    RAW_MAX_BODY,
};
use crate::retry::RetryBudget;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RETRIES: usize = 2;

/// JSON client anchored at one base URL.
#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    user_agent: Option<HeaderValue>,
    timeout: Duration,
    retries: usize,
}

/// A fully read response.
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn upstream_id(&self) -> String {
        self.header("x-request-id")
            .or_else(|| self.header("x-reddit-loid"))
            .unwrap_or("-")
            .to_owned()
    }
}

/// Everything about a request that stays fixed across attempts.
struct Call<'a> {
    id: String,
    method: Method,
    url: Url,
    timeout: Duration,
    form: Option<FormFields<'a>>,
    opts: RequestOpts<'a>,
}

impl HttpClient {
    /// Client for `base`; relative paths are joined underneath it.
    ///
    /// ```no_run
    /// use pulse_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://oauth.reddit.com")?;
    /// assert_eq!(client.timeout(), Duration::from_secs(15));
    /// assert_eq!(client.retries(), 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let with_slash = if base.ends_with('/') {
            Cow::Borrowed(base)
        } else {
            Cow::Owned(format!("{base}/"))
        };
        let base = Url::parse(&with_slash).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sent on every request. Reddit throttles generic agents.
    pub fn with_user_agent(mut self, agent: &str) -> Result<Self, HttpError> {
        let value = HeaderValue::from_str(agent)
            .map_err(|e| HttpError::Build(format!("bad user agent: {e}")))?;
        self.user_agent = Some(value);
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let call = self.call(Method::GET, path, None, opts)?;
        self.execute(call).await
    }

    /// POST `application/x-www-form-urlencoded` fields and decode a JSON reply.
    pub async fn post_form<T>(
        &self,
        path: &str,
        form: &[(&str, Cow<'_, str>)],
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let call = self.call(Method::POST, path, Some(form), opts)?;
        self.execute(call).await
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            self.base.join(path.trim_start_matches('/'))
        };
        joined.map_err(|e| HttpError::Url(e.to_string()))
    }

    fn call<'a>(
        &self,
        method: Method,
        path: &str,
        form: Option<FormFields<'a>>,
        opts: RequestOpts<'a>,
    ) -> Result<Call<'a>, HttpError> {
        Ok(Call {
            id: uuid::Uuid::new_v4().simple().to_string(),
            method,
            url: self.resolve(path)?,
            timeout: opts.timeout.unwrap_or(self.timeout),
            form,
            opts,
        })
    }

    fn build(&self, call: &Call<'_>) -> Result<RequestBuilder, HttpError> {
        let mut rb = self
            .inner
            .request(call.method.clone(), call.url.clone())
            .timeout(call.timeout);

        if let Some(agent) = &self.user_agent {
            rb = rb.header(USER_AGENT, agent.clone());
        }
        if let Some(query) = &call.opts.query {
            let flat: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&flat);
        }
        if let Some(fields) = call.form {
            let flat: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.form(&flat);
        }
        match &call.opts.auth {
            Some(auth) => auth.apply(rb),
            None => Ok(rb),
        }
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Reply, reqwest::Error> {
        let started = Instant::now();
        let resp = rb.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();
        Ok(Reply {
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }

    async fn execute<T: DeserializeOwned>(&self, call: Call<'_>) -> Result<T, HttpError> {
        let mut budget =
            RetryBudget::new(call.opts.retries.unwrap_or(self.retries), call.timeout);
        let auth = call.opts.auth.as_ref().map_or("none", Auth::kind);
        let query = call
            .opts
            .query
            .as_deref()
            .map(redact_pairs)
            .unwrap_or_default();

        loop {
            let rb = self.build(&call)?;
            tracing::debug!(
                call_id = %call.id,
                attempt = budget.used + 1,
                retries = budget.max,
                method = %call.method,
                host = call.url.host_str().unwrap_or("-"),
                path = call.url.path(),
                query = ?query,
                timeout_ms = call.timeout.as_millis() as u64,
                auth,
                "http.send"
            );
            if raw_logging() {
                let curl = curl_line(&call.method, &call.url, call.form);
                tracing::debug!(target: "http.raw", call_id = %call.id, %curl, "request");
            }

            let reply = match self.send(rb).await {
                Ok(reply) => reply,
                Err(err) => match budget.after_transport_error() {
                    Some(wait) => {
                        tracing::warn!(
                            call_id = %call.id,
                            attempt = budget.used,
                            wait_ms = wait.as_millis() as u64,
                            error = %err,
                            "http.retry.transport"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    None => {
                        tracing::warn!(call_id = %call.id, error = %err, "http.failed.transport");
                        return Err(HttpError::Network(err.to_string()));
                    }
                },
            };
            self.trace_reply(&call.id, &reply);

            if reply.status.is_success() {
                return decode(&call.id, &reply.body);
            }

            let message = upstream_message(&reply.body);
            if let Some(wait) = budget.after_status(reply.status, &reply.headers) {
                tracing::warn!(
                    call_id = %call.id,
                    status = %reply.status,
                    attempt = budget.used,
                    wait_ms = wait.as_millis() as u64,
                    %message,
                    "http.retry.status"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let request_id = reply.upstream_id();
            tracing::warn!(
                call_id = %call.id,
                status = %reply.status,
                %message,
                %request_id,
                "http.failed.status"
            );
            return Err(HttpError::Api {
                status: reply.status,
                message,
                request_id,
            });
        }
    }

    fn trace_reply(&self, call_id: &str, reply: &Reply) {
        tracing::debug!(
            call_id,
            status = %reply.status,
            elapsed_ms = reply.elapsed.as_millis() as u64,
            bytes = reply.body.len(),
            request_id = %reply.upstream_id(),
            ratelimit_used = ?reply.header("x-ratelimit-used"),
            ratelimit_remaining = ?reply.header("x-ratelimit-remaining"),
            ratelimit_reset = ?reply.header("x-ratelimit-reset"),
            "http.reply"
        );
        if raw_logging() {
            let end = reply.body.len().min(RAW_MAX_BODY);
            tracing::info!(
                target: "http.raw",
                call_id,
                status = %reply.status,
                headers = ?redact_headers(&reply.headers),
                body = %String::from_utf8_lossy(&reply.body[..end]),
                truncated = end < reply.body.len(),
                "response"
            );
        }
    }
}

fn decode<T: DeserializeOwned>(call_id: &str, body: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice(body).map_err(|e| {
        let snippet = excerpt(body);
        tracing::warn!(
            call_id,
            line = e.line(),
            column = e.column(),
            error = %e,
            %snippet,
            "http.decode_failed"
        );
        HttpError::Decode {
            reason: e.to_string(),
            snippet,
        }
    })
}
