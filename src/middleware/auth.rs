//! Authentication and static header middleware.

use super::RequestMiddleware;
use crate::{error::BoxError, Error, Result};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::str::FromStr;

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Supported authentication schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `X-API-Key: <key>`
    ApiKey,
    /// `Authorization: Basic <credentials>`; credentials must already be base64 encoded.
    Basic,
}

impl FromStr for AuthScheme {
    type Err = UnsupportedScheme;

    fn from_str(tag: &str) -> std::result::Result<Self, Self::Err> {
        match tag {
            "Bearer" => Ok(AuthScheme::Bearer),
            "APIKey" => Ok(AuthScheme::ApiKey),
            "Basic" => Ok(AuthScheme::Basic),
            other => Err(UnsupportedScheme(other.to_string())),
        }
    }
}

/// An authentication scheme tag that is not one of `Bearer`, `APIKey` or `Basic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedScheme(pub String);

impl fmt::Display for UnsupportedScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported auth type: {}", self.0)
    }
}

impl std::error::Error for UnsupportedScheme {}

/// Sets an authentication header on every request.
///
/// The scheme tag is checked at dispatch: an unsupported tag aborts the call before
/// anything is sent.
///
/// # Examples
///
/// ```
/// use callpipe::{middleware::AuthMiddleware, Client};
///
/// # fn example() -> Result<(), callpipe::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .middleware(AuthMiddleware::new("Bearer", "secret-token"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    scheme: String,
    value: String,
}

impl AuthMiddleware {
    /// Creates a middleware for the given scheme tag and credential.
    pub fn new(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    /// Shorthand for a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("Bearer", token)
    }
}

impl RequestMiddleware for AuthMiddleware {
    fn handle(&self, request: &mut reqwest::Request) -> std::result::Result<(), BoxError> {
        let scheme: AuthScheme = self.scheme.parse()?;
        let (name, value) = match scheme {
            AuthScheme::Bearer => (AUTHORIZATION, format!("Bearer {}", self.value)),
            AuthScheme::ApiKey => (API_KEY_HEADER, self.value.clone()),
            AuthScheme::Basic => (AUTHORIZATION, format!("Basic {}", self.value)),
        };
        let mut value = HeaderValue::try_from(value)?;
        value.set_sensitive(true);
        request.headers_mut().insert(name, value);
        Ok(())
    }
}

/// Sets a fixed group of headers on every request, replacing existing values.
#[derive(Debug, Clone)]
pub struct HeaderMiddleware {
    headers: HeaderMap,
}

impl HeaderMiddleware {
    /// Creates a middleware from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a header name or value is invalid.
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::try_from(name.as_ref())
                .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::try_from(value.as_ref())
                .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
            map.insert(name, value);
        }
        Ok(Self { headers: map })
    }
}

impl RequestMiddleware for HeaderMiddleware {
    fn handle(&self, request: &mut reqwest::Request) -> std::result::Result<(), BoxError> {
        for (name, value) in &self.headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> reqwest::Request {
        reqwest::Request::new(
            http::Method::GET,
            url::Url::parse("http://localhost/").unwrap(),
        )
    }

    #[test]
    fn test_bearer() {
        let mut req = request();
        AuthMiddleware::bearer("token").handle(&mut req).unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer token");
    }

    #[test]
    fn test_api_key() {
        let mut req = request();
        AuthMiddleware::new("APIKey", "key").handle(&mut req).unwrap();
        assert_eq!(req.headers()["x-api-key"], "key");
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_basic() {
        let mut req = request();
        AuthMiddleware::new("Basic", "dXNlcjpwYXNz")
            .handle(&mut req)
            .unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_unsupported_scheme_faults() {
        let mut req = request();
        let err = AuthMiddleware::new("Digest", "x")
            .handle(&mut req)
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported auth type: Digest");
        assert!(req.headers().is_empty());
    }

    #[test]
    fn test_invalid_header_value_faults() {
        let mut req = request();
        assert!(AuthMiddleware::bearer("bad\nvalue").handle(&mut req).is_err());
    }

    #[test]
    fn test_header_middleware_overwrites() {
        let mut req = request();
        req.headers_mut()
            .insert("x-env", HeaderValue::from_static("dev"));
        HeaderMiddleware::new([("X-Env", "prod"), ("X-Team", "core")])
            .unwrap()
            .handle(&mut req)
            .unwrap();
        assert_eq!(req.headers()["x-env"], "prod");
        assert_eq!(req.headers()["x-team"], "core");
    }

    #[test]
    fn test_header_middleware_rejects_bad_name() {
        assert!(matches!(
            HeaderMiddleware::new([("bad name", "v")]),
            Err(Error::ConfigurationError(_))
        ));
    }
}
