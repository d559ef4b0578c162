//! Outbound request descriptors and the fluent builder that assembles them.

use crate::{Client, Envelope, Error, Response, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

/// A fully specified request, prior to dispatch.
///
/// Built once and consumed once by [`Client::execute`].
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,

    /// The request path, joined against the client's base URL.
    pub path: String,

    /// Request headers. Setting a header twice keeps the last value.
    pub headers: HeaderMap,

    /// Query parameters. Keys may repeat.
    pub query: Vec<(String, String)>,

    /// The request body. `None` sends no body at all.
    pub body: Option<Bytes>,

    /// Cancels waiting for the response and between retries.
    pub cancel: CancellationToken,
}

impl Request {
    /// Creates a request with no headers, query, or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}

/// Joins `base` and `path` with exactly one slash between them.
///
/// An empty path returns `base` unchanged.
///
/// # Examples
///
/// ```
/// use callpipe::request::join_url;
///
/// assert_eq!(join_url("https://api.example.com/", "/users"), "https://api.example.com/users");
/// assert_eq!(join_url("https://api.example.com", "users"), "https://api.example.com/users");
/// assert_eq!(join_url("https://api.example.com/v1", ""), "https://api.example.com/v1");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    let base = base.strip_suffix('/').unwrap_or(base);
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}/{}", base, path)
}

/// Form-encodes query pairs, sorted by key.
///
/// Pairs sharing a key keep their insertion order. Returns `None` when there are no
/// pairs.
///
/// # Examples
///
/// ```
/// use callpipe::request::encode_query;
///
/// let pairs = vec![
///     ("tag".to_string(), "b".to_string()),
///     ("page".to_string(), "1".to_string()),
///     ("tag".to_string(), "a c".to_string()),
/// ];
/// assert_eq!(encode_query(&pairs).as_deref(), Some("page=1&tag=b&tag=a+c"));
/// assert_eq!(encode_query(&[]), None);
/// ```
pub fn encode_query(pairs: &[(String, String)]) -> Option<String> {
    if pairs.is_empty() {
        return None;
    }
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in sorted {
        serializer.append_pair(key, value);
    }
    Some(serializer.finish())
}

/// Fluent builder for a single request.
///
/// Faults while building (an invalid header, a body that fails to serialize) are held
/// until the request is sent, and returned without touching the network.
///
/// # Examples
///
/// ```no_run
/// use callpipe::Client;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewUser { name: String }
///
/// #[derive(Deserialize)]
/// struct User { id: String }
///
/// # async fn example() -> Result<(), callpipe::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let created = client
///     .post("/users")
///     .with_header("X-Request-Id", "abc")
///     .with_json(&NewUser { name: "Alice".to_string() })
///     .send::<User>()
///     .await?;
/// println!("Created user {}", created.data.id);
/// # Ok(())
/// # }
/// ```
#[must_use = "requests do nothing until sent"]
pub struct RequestBuilder {
    client: Client,
    request: Request,
    error: Option<Error>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, request: Request) -> Self {
        Self {
            client,
            request,
            error: None,
        }
    }

    /// Sets the method to GET and the path.
    pub fn get(self, path: impl Into<String>) -> Self {
        self.method(Method::GET, path)
    }

    /// Sets the method to POST and the path.
    pub fn post(self, path: impl Into<String>) -> Self {
        self.method(Method::POST, path)
    }

    /// Sets the method to PUT and the path.
    pub fn put(self, path: impl Into<String>) -> Self {
        self.method(Method::PUT, path)
    }

    /// Sets the method to DELETE and the path.
    pub fn delete(self, path: impl Into<String>) -> Self {
        self.method(Method::DELETE, path)
    }

    /// Sets the method to PATCH and the path.
    pub fn patch(self, path: impl Into<String>) -> Self {
        self.method(Method::PATCH, path)
    }

    fn method(mut self, method: Method, path: impl Into<String>) -> Self {
        self.request.method = method;
        self.request.path = path.into();
        self
    }

    /// Uses `cancel` to stop waiting for this request.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.request.cancel = cancel;
        self
    }

    /// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.request.body = Some(Bytes::from(body));
                self.request
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Err(e) => self.error = Some(Error::SerializationFailed(e.to_string())),
        }
        self
    }

    /// Sets the raw request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Sets a header, replacing any previous value.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)));
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)));
        match name.and_then(|name| value.map(|value| (name, value))) {
            Ok((name, value)) => {
                self.request.headers.insert(name, value);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Sets several headers.
    pub fn with_headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.with_header(name, value))
    }

    /// Adds a query parameter. Repeated keys are kept.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    /// Adds several query parameters.
    pub fn with_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.request
            .query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the assembled descriptor, or the first fault recorded while building.
    pub fn build(self) -> Result<Request> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.request),
        }
    }

    /// Sends the request and decodes a successful JSON body into `T`.
    pub async fn send<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let client = self.client.clone();
        client.execute_json(self.build()?).await
    }

    /// Sends the request and returns the envelope without decoding it.
    ///
    /// Non-2xx statuses still fail with [`Error::Api`].
    pub async fn send_raw(self) -> Result<Envelope> {
        let client = self.client.clone();
        client.execute(self.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RequestBuilder {
        let client = Client::builder()
            .base_url("http://localhost")
            .build()
            .unwrap();
        client.request()
    }

    #[test]
    fn test_join_url_slash_combinations() {
        let expected = "http://h/api/v1";
        assert_eq!(join_url("http://h/", "/api/v1"), expected);
        assert_eq!(join_url("http://h/", "api/v1"), expected);
        assert_eq!(join_url("http://h", "/api/v1"), expected);
        assert_eq!(join_url("http://h", "api/v1"), expected);
    }

    #[test]
    fn test_join_url_empty_path() {
        assert_eq!(join_url("http://h/", ""), "http://h/");
        assert_eq!(join_url("http://h", ""), "http://h");
    }

    #[test]
    fn test_join_url_keeps_base_path() {
        assert_eq!(join_url("http://h/v2/", "/users"), "http://h/v2/users");
    }

    #[test]
    fn test_encode_query_is_deterministic() {
        let a = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let b = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert_eq!(encode_query(&a), encode_query(&b));
        assert_eq!(encode_query(&a).as_deref(), Some("a=1&b=2"));
    }

    #[test]
    fn test_last_header_write_wins() {
        let request = builder()
            .get("/x")
            .with_header("X-Mode", "first")
            .with_headers([("X-Mode", "second")])
            .build()
            .unwrap();
        assert_eq!(request.headers["x-mode"], "second");
    }

    #[test]
    fn test_with_json_sets_body_and_content_type() {
        let request = builder()
            .post("/users")
            .with_json(&serde_json::json!({"name": "test"}))
            .build()
            .unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(request.body.unwrap(), r#"{"name":"test"}"#);
    }

    #[test]
    fn test_invalid_header_is_deferred() {
        let result = builder()
            .get("/x")
            .with_header("bad header", "v")
            .with_query("page", "1")
            .build();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_first_build_fault_is_kept() {
        let result = builder()
            .get("/x")
            .with_header("bad header", "v")
            .with_header("X-Ok", "bad\nvalue")
            .build();
        match result {
            Err(Error::ConfigurationError(msg)) => assert!(msg.contains("name"), "{}", msg),
            other => panic!("Expected ConfigurationError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_query_params_keep_repeats() {
        let request = builder()
            .get("/search")
            .with_query("tag", "a")
            .with_query_params([("tag", "b"), ("page", "2")])
            .build()
            .unwrap();
        assert_eq!(request.query.len(), 3);
    }
}
