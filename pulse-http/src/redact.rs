use std::borrow::Cow;
use std::env;

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

/// Set to `1`, `true` or `yes` to log full requests and responses under target `http.raw`.
pub const RAW_ENV: &str = "PULSE_HTTP_RAW";
pub(crate) const RAW_MAX_BODY: usize = 64 * 1024;

const HIDDEN: &str = "<redacted>";

const SENSITIVE_PARAMS: &[&str] = &[
    "access_token",
    "refresh_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "password",
    "bearer",
];

const SENSITIVE_HEADERS: &[&str] = &["authorization", "set-cookie", "cookie"];

pub(crate) fn raw_logging() -> bool {
    env::var(RAW_ENV).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

fn sensitive(key: &str) -> bool {
    SENSITIVE_PARAMS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(key))
}

/// Copy `pairs`, hiding values of secret-looking keys.
///
/// ```
/// use std::borrow::Cow;
///
/// let pairs: Vec<(&str, Cow<'_, str>)> =
///     vec![("q", "tesla".into()), ("client_secret", "hunter2".into())];
/// let redacted = pulse_http::redact_pairs(&pairs);
/// assert_eq!(redacted[0], ("q".to_string(), "tesla".to_string()));
/// assert_eq!(redacted[1].1, "<redacted>");
/// ```
pub fn redact_pairs(pairs: &[(&str, Cow<'_, str>)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            let shown = if sensitive(k) { HIDDEN } else { v.as_ref() };
            ((*k).to_owned(), shown.to_owned())
        })
        .collect()
}

pub(crate) fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                HIDDEN
            } else {
                value.to_str().unwrap_or("")
            };
            (name.as_str().to_owned(), shown.to_owned())
        })
        .collect()
}

/// Urlencoded body fields.
pub(crate) type FormFields<'a> = &'a [(&'a str, Cow<'a, str>)];

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A curl line that reproduces the request without auth, query string or secret form fields.
pub(crate) fn curl_line(method: &Method, url: &Url, form: Option<FormFields<'_>>) -> String {
    let mut line = format!("curl -X{method}");
    for (k, v) in form.map(redact_pairs).unwrap_or_default() {
        line.push_str(" --data-urlencode ");
        line.push_str(&shell_quote(&format!("{k}={v}")));
    }
    let mut target = url.clone();
    target.set_query(None);
    line.push(' ');
    line.push_str(&shell_quote(target.as_str()));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn curl_hides_secrets_and_query() {
        let url = Url::parse("https://www.reddit.com/api/v1/access_token?token=abc").unwrap();
        let form: Vec<(&str, Cow<'_, str>)> = vec![
            ("grant_type", "client_credentials".into()),
            ("client_secret", "hunter2".into()),
        ];
        let curl = curl_line(&Method::POST, &url, Some(form.as_slice()));
        assert!(curl.starts_with("curl -XPOST"));
        assert!(curl.contains("grant_type=client_credentials"));
        assert!(!curl.contains("hunter2"));
        assert!(!curl.contains("token=abc"));
    }

    #[test]
    fn curl_quotes_form_values() {
        let url = Url::parse("https://example.com/x").unwrap();
        let form: Vec<(&str, Cow<'_, str>)> = vec![("q", "it's".into())];
        let curl = curl_line(&Method::POST, &url, Some(form.as_slice()));
        assert!(curl.contains(r"--data-urlencode 'q=it'\''s'"));
        assert!(curl_line(&Method::GET, &url, None).ends_with(" 'https://example.com/x'"));
    }

    #[test]
    fn header_values_for_credentials_are_hidden() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-ratelimit-used", HeaderValue::from_static("3"));
        let shown = redact_headers(&headers);
        assert!(shown.contains(&("authorization".into(), HIDDEN.into())));
        assert!(shown.contains(&("x-ratelimit-used".into(), "3".into())));
    }

    #[test]
    fn key_matching_ignores_case() {
        let pairs: Vec<(&str, Cow<'_, str>)> = vec![("Access_Token", "x".into())];
        assert_eq!(redact_pairs(&pairs)[0].1, HIDDEN);
    }
}
