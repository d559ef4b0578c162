//! The raw response as it travels through the pipeline.
//!
//! An [`Envelope`] carries the status line, headers and a single-use body. Reading the
//! body drains it. The executor buffers the body before response middleware runs and
//! re-installs a fresh view over the buffer before each step, so every consumer sees
//! the full body.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

enum Body {
    Stream(reqwest::Response),
    Buffered(Bytes),
    Drained,
}

/// Status, headers and a (possibly re-buffered) body.
///
/// Dropping an envelope releases the underlying connection back to the transport.
pub struct Envelope {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    url: Option<Url>,
    body: Body,
}

impl Envelope {
    /// Creates an envelope around an already-buffered body.
    ///
    /// Useful for [`Transport`](crate::Transport) test doubles.
    ///
    /// # Examples
    ///
    /// ```
    /// use callpipe::Envelope;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let envelope = Envelope::new(StatusCode::CREATED, HeaderMap::new(), r#"{"id":"123"}"#);
    /// assert_eq!(envelope.status(), StatusCode::CREATED);
    /// assert_eq!(envelope.buffered().unwrap().as_ref(), br#"{"id":"123"}"#);
    /// ```
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
            url: None,
            body: Body::Buffered(body.into()),
        }
    }

    /// Wraps a live reqwest response. The body stays unread until someone drains it.
    pub fn from_reqwest(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            version: response.version(),
            headers: response.headers().clone(),
            url: Some(response.url().clone()),
            body: Body::Stream(response),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The HTTP protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The final URL of the exchange, when the transport reports one.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns `true` if the status is in `200..300`.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Peeks at the buffered body without draining it.
    ///
    /// Returns `None` if the body is still a live stream or has been drained.
    pub fn buffered(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Drains a buffered body.
    ///
    /// Returns `None` if the body is a live stream or was already drained; in both
    /// cases the body is left untouched.
    pub fn take_buffered(&mut self) -> Option<Bytes> {
        match std::mem::replace(&mut self.body, Body::Drained) {
            Body::Buffered(bytes) => Some(bytes),
            other => {
                self.body = other;
                None
            }
        }
    }

    /// Installs a fresh readable view over `bytes` as the body.
    pub fn restore(&mut self, bytes: Bytes) {
        self.body = Body::Buffered(bytes);
    }

    /// Returns `true` once the body has been read and not restored.
    pub fn is_drained(&self) -> bool {
        matches!(self.body, Body::Drained)
    }

    /// Drains the body, reading a live stream to the end if needed.
    ///
    /// A drained body yields empty bytes. On a read fault the stream is closed and the
    /// body is left drained.
    pub async fn bytes(&mut self) -> Result<Bytes, reqwest::Error> {
        match std::mem::replace(&mut self.body, Body::Drained) {
            Body::Stream(response) => response.bytes().await,
            Body::Buffered(bytes) => Ok(bytes),
            Body::Drained => Ok(Bytes::new()),
        }
    }

    /// Drains the body as UTF-8 text, replacing invalid sequences.
    pub async fn text(&mut self) -> Result<String, reqwest::Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drains the body and decodes it as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> crate::Result<T> {
        let bytes = self.bytes().await.map_err(crate::Error::BodyRead)?;
        serde_json::from_slice(&bytes).map_err(|e| crate::Error::DeserializationFailed {
            raw_response: String::from_utf8_lossy(&bytes).into_owned(),
            serde_error: e.to_string(),
            status: self.status,
        })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            Body::Stream(_) => "stream",
            Body::Buffered(_) => "buffered",
            Body::Drained => "drained",
        };
        f.debug_struct("Envelope")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .field("body", &body)
            .finish()
    }
}
