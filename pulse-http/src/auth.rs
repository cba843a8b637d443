use std::borrow::Cow;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::RequestBuilder;

use crate::HttpError;

/// How a request authenticates.
///
/// ```
/// use pulse_http::Auth;
///
/// let basic = Auth::Basic { user: "client-id", password: Some("secret") };
/// assert_eq!(basic.kind(), "basic");
/// assert_eq!(Auth::Bearer("t").kind(), "bearer");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
    /// `Authorization: Basic ...`, as OAuth token endpoints expect.
    Basic {
        user: &'a str,
        password: Option<&'a str>,
    },
    None,
}

impl Auth<'_> {
    /// Label safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Basic { .. } => "basic",
            Auth::None => "none",
        }
    }

    pub(crate) fn apply(&self, rb: RequestBuilder) -> Result<RequestBuilder, HttpError> {
        Ok(match self {
            Auth::Bearer(raw) => rb.bearer_auth(clean_bearer(raw)?),
            Auth::Basic { user, password } => rb.basic_auth(user, *password),
            Auth::None => rb,
        })
    }
}

/// Per-request overrides; unset fields fall back to the client defaults.
///
/// ```
/// use pulse_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Some(Auth::Bearer("token")),
///     query: Some(vec![("q", "rust".into())]),
/// };
/// assert_eq!(opts.query.as_ref().map(Vec::len), Some(1));
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

/// Token with surrounding quotes and all whitespace removed, rejected when
/// it could not travel in a header.
pub(crate) fn clean_bearer(raw: &str) -> Result<String, HttpError> {
    let token: String = raw
        .trim()
        .trim_matches(['"', '\''])
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if token.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !token.is_ascii() || token.bytes().any(|b| b.is_ascii_control()) {
        return Err(HttpError::Build(
            "bearer token has non-ASCII or control bytes".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| HttpError::Build(format!("bad authorization header: {e}")))?;
    Ok(token)
}
