//! Decoded responses.
//!
//! A [`Response`] is what a 2xx [`Envelope`] becomes once its body has been read and
//! decoded. The raw bytes stay alongside the decoded value.

use crate::{Envelope, Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// A decoded 2xx response.
///
/// # Examples
///
/// ```no_run
/// use callpipe::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), callpipe::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let response = client.get("/users/123").send::<User>().await?;
///
/// println!("User: {}", response.data.name);
/// println!("{:?} {} in {:?}", response.version, response.status, response.latency);
/// if response.was_retried() {
///     println!("Took {} attempts, raw body: {}", response.attempts, response.text());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded body.
    pub data: T,

    /// The body exactly as received.
    pub body: Bytes,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The HTTP protocol version.
    pub version: Version,

    /// The response headers.
    pub headers: HeaderMap,

    /// The final URL of the exchange, when the transport reports one.
    pub url: Option<Url>,

    /// Time from dispatch until the response arrived, retries and waits included.
    pub latency: Duration,

    /// Number of send attempts.
    pub attempts: usize,
}

impl<T: DeserializeOwned> Response<T> {
    /// Drains `envelope` and decodes its body as JSON.
    pub(crate) async fn decode(
        mut envelope: Envelope,
        attempts: usize,
        latency: Duration,
    ) -> Result<Self> {
        let status = envelope.status();
        let body = envelope.bytes().await.map_err(Error::BodyRead)?;

        let data = serde_json::from_slice::<T>(&body).map_err(|e| {
            let raw_response = String::from_utf8_lossy(&body).into_owned();
            tracing::error!(
                error = %e,
                raw_response = %raw_response,
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response,
                serde_error: e.to_string(),
                status,
            }
        })?;

        Ok(Self {
            data,
            body,
            status,
            version: envelope.version(),
            headers: std::mem::take(envelope.headers_mut()),
            url: envelope.url().cloned(),
            latency,
            attempts,
        })
    }
}

impl<T> Response<T> {
    /// The raw body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `true` when more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// A header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: u32,
    }

    #[tokio::test]
    async fn test_decode_carries_exchange_details() {
        let mut headers = HeaderMap::new();
        headers.insert("x-page", HeaderValue::from_static("2"));
        let envelope = Envelope::new(StatusCode::CREATED, headers, r#"{"id":7}"#);

        let response = Response::<Item>::decode(envelope, 2, Duration::from_millis(5))
            .await
            .unwrap();

        assert_eq!(response.data.id, 7);
        assert_eq!(response.body, r#"{"id":7}"#);
        assert_eq!(response.text(), r#"{"id":7}"#);
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.version, Version::HTTP_11);
        assert_eq!(response.header("x-page"), Some("2"));
        assert!(response.url.is_none());
        assert!(response.was_retried());
    }

    #[tokio::test]
    async fn test_decode_failure_reports_raw_body() {
        let envelope = Envelope::new(StatusCode::OK, HeaderMap::new(), "<html>");

        let err = Response::<Item>::decode(envelope, 1, Duration::ZERO)
            .await
            .unwrap_err();

        match err {
            Error::DeserializationFailed {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, "<html>");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }
}
