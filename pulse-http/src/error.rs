use reqwest::StatusCode;
use thiserror::Error;

/// Longest body excerpt kept in errors and trace events.
pub(crate) const SNIPPET_MAX: usize = 500;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad url: {0}")]
    Url(String),
    #[error("could not build request: {0}")]
    Build(String),
    #[error("transport failure: {0}")]
    Network(String),
    #[error("response did not decode ({reason}); body starts with: {snippet}")]
    Decode { reason: String, snippet: String },
    #[error("upstream answered {status}: {message} (request id {request_id})")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// Status code of an upstream rejection; transport and decode failures have none.
    pub fn status(&self) -> Option<StatusCode> {
        if let HttpError::Api { status, .. } = self {
            Some(*status)
        } else {
            None
        }
    }
}

/// Lossy UTF-8 excerpt of `body`, cut on a char boundary.
pub(crate) fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= SNIPPET_MAX {
        return text.into_owned();
    }
    let cut = (0..=SNIPPET_MAX)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}

/// Best human-readable message in an error body.
///
/// Understands `{"message"}`, `{"error": ".."}`, `{"error": {"message"}}` and
/// Reddit's `{"json": {"errors": [[code, message, field]]}}`.
pub(crate) fn upstream_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return excerpt(body);
    };
    let text = |v: &serde_json::Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_owned);

    ["/message", "/error", "/error/message", "/json/errors/0/1"]
        .iter()
        .find_map(|ptr| value.pointer(ptr).and_then(text))
        .unwrap_or_else(|| excerpt(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_come_from_known_envelopes() {
        let cases: [(&[u8], &str); 5] = [
            (br#"{"message": "Unauthorized", "error": 401}"#, "Unauthorized"),
            (br#"{"error": "invalid_grant"}"#, "invalid_grant"),
            (br#"{"error": {"message": "quota"}}"#, "quota"),
            (br#"{"json": {"errors": [["RATELIMIT", "slow down", "x"]]}}"#, "slow down"),
            (b"<html>oops</html>", "<html>oops</html>"),
        ];
        for (body, want) in cases {
            assert_eq!(upstream_message(body), want);
        }
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let long = "é".repeat(400);
        let cut = excerpt(long.as_bytes());
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= SNIPPET_MAX + 3);
        assert_eq!(excerpt(b"short"), "short");
    }

    #[test]
    fn only_api_errors_carry_a_status() {
        let api = HttpError::Api {
            status: StatusCode::FORBIDDEN,
            message: "no".into(),
            request_id: "-".into(),
        };
        assert_eq!(api.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(HttpError::Network("reset".into()).status(), None);
    }
}
