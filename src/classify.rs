//! Turns terminal non-2xx responses into [`ApiError`] values.

use crate::{ApiError, Envelope};
use bytes::Bytes;
use serde::Deserialize;

/// Common shape of JSON error bodies.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl ErrorBody {
    /// First non-empty of `message`, `detail`, `error`.
    fn message(self) -> Option<String> {
        [self.message, self.detail, self.error]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }
}

/// Reads the body of a non-2xx response and builds the structured error.
///
/// A body read fault still produces an [`ApiError`]: the status is kept, the message
/// describes the failure and the body is empty.
pub(crate) async fn classify(envelope: &mut Envelope) -> ApiError {
    let status = envelope.status();
    match envelope.bytes().await {
        Ok(body) => {
            let error = from_body(status, body);
            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    message = %error.message,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    message = %error.message,
                    "Server error (5xx)"
                );
            }
            error
        }
        Err(e) => {
            tracing::warn!(status = status.as_u16(), error = %e, "Failed to read error response");
            ApiError::new(
                status,
                format!("failed to read error response: {}", e),
                Bytes::new(),
            )
        }
    }
}

/// Builds the error from a fully read body.
pub(crate) fn from_body(status: http::StatusCode, body: Bytes) -> ApiError {
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::message)
        .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());

    ApiError {
        status,
        message,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};

    fn message_for(body: &'static str) -> String {
        from_body(StatusCode::BAD_REQUEST, Bytes::from_static(body.as_bytes())).message
    }

    #[test]
    fn test_message_preferred_over_error() {
        assert_eq!(message_for(r#"{"error":"e","message":"m"}"#), "m");
    }

    #[test]
    fn test_detail_preferred_over_error() {
        assert_eq!(message_for(r#"{"error":"e","detail":"d"}"#), "d");
    }

    #[test]
    fn test_error_field_used_alone() {
        assert_eq!(message_for(r#"{"error":"e"}"#), "e");
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        assert_eq!(message_for(r#"{"message":"","error":"e"}"#), "e");
    }

    #[test]
    fn test_non_json_body_used_verbatim() {
        assert_eq!(message_for("Service Unavailable"), "Service Unavailable");
    }

    #[test]
    fn test_json_without_known_fields_uses_raw_text() {
        assert_eq!(message_for(r#"{"code":"E42"}"#), r#"{"code":"E42"}"#);
        assert_eq!(message_for(r#"["a"]"#), r#"["a"]"#);
    }

    #[test]
    fn test_numeric_code_does_not_break_parsing() {
        assert_eq!(message_for(r#"{"code":42,"message":"m"}"#), "m");
    }

    #[tokio::test]
    async fn test_classify_keeps_status_and_raw_body() {
        let raw = r#"{"message":"user not found"}"#;
        let mut envelope = Envelope::new(StatusCode::NOT_FOUND, HeaderMap::new(), raw);

        let error = classify(&mut envelope).await;

        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.message, "user not found");
        assert_eq!(error.body, raw);
        assert!(error.is_not_found());
    }
}
