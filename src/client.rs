//! HTTP client and request executor.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.
//!
//! Every call runs the same pipeline, each step finishing before the next starts:
//!
//! 1. join the base URL and path, append the encoded query
//! 2. build the wire request
//! 3. run request middleware
//! 4. send, through the retry engine when a [`RetryPolicy`] is configured
//! 5. buffer the body and run response middleware, if any are registered
//! 6. classify non-2xx statuses into [`Error::Api`], or decode the body

use crate::{
    classify,
    middleware::{self, RequestMiddleware, ResponseMiddleware},
    request::{encode_query, join_url, Request, RequestBuilder},
    retry::{self, RetryPolicy},
    transport::{self, Transport, TransportConfig},
    Envelope, Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client that runs every request through the middleware and retry pipeline.
///
/// The client is cheap to clone and designed to be reused: clones share the base URL,
/// middleware chains, retry policy and connection pool, none of which change after
/// [`ClientBuilder::build`].
///
/// # Examples
///
/// ```no_run
/// use callpipe::{middleware::AuthMiddleware, Client, RetryPolicy};
/// use serde::Deserialize;
/// use std::time::Duration;
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
///     .timeout(Duration::from_secs(30))
///     .retry(RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(10)))
///     .middleware(AuthMiddleware::bearer("token"))
///     .build()?;
///
/// let user = client.get("/users/123").send::<User>().await?;
/// println!("User: {}", user.data.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    default_headers: HeaderMap,
    request_middleware: Arc<[Arc<dyn RequestMiddleware>]>,
    response_middleware: Arc<[Arc<dyn ResponseMiddleware>]>,
    retry_policy: Option<RetryPolicy>,
}

/// The outcome of steps 1 to 5 for a 2xx response.
struct Dispatched {
    envelope: Envelope,
    attempts: usize,
    latency: Duration,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The base URL every request path is joined against.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Starts a new request. Defaults to `GET` on the base URL.
    pub fn request(&self) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Request::default())
    }

    /// Starts a GET request.
    pub fn get(&self, path: impl Into<String>) -> RequestBuilder {
        self.start(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: impl Into<String>) -> RequestBuilder {
        self.start(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: impl Into<String>) -> RequestBuilder {
        self.start(Method::PUT, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder {
        self.start(Method::DELETE, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder {
        self.start(Method::PATCH, path)
    }

    fn start(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Request::new(method, path))
    }

    /// Executes a request and returns the raw envelope of a 2xx response.
    ///
    /// If response middleware ran, the body is a fresh buffered view; otherwise it is
    /// still the unread stream.
    ///
    /// # Errors
    ///
    /// Non-2xx responses fail with [`Error::Api`]. See [`Error`] for the other kinds.
    pub async fn execute(&self, request: Request) -> Result<Envelope> {
        Ok(self.dispatch(request).await?.envelope)
    }

    /// Executes a request and decodes a 2xx JSON body into `T`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callpipe::{Client, Request};
    /// use http::Method;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct SearchResults { results: Vec<String> }
    ///
    /// # async fn example() -> Result<(), callpipe::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")
    ///     .build()?;
    ///
    /// let mut request = Request::new(Method::GET, "/search");
    /// request.query.push(("q".to_string(), "rust".to_string()));
    ///
    /// let response = client.execute_json::<SearchResults>(request).await?;
    /// println!("Found {} results", response.data.results.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute_json<T>(&self, request: Request) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let Dispatched {
            envelope,
            attempts,
            latency,
        } = self.dispatch(request).await?;

        Response::decode(envelope, attempts, latency).await
    }

    async fn dispatch(&self, request: Request) -> Result<Dispatched> {
        let start_time = Instant::now();
        let Request {
            method,
            path,
            headers,
            query,
            body,
            cancel,
        } = request;

        let mut address = join_url(&self.inner.base_url, &path);
        if let Some(query) = encode_query(&query) {
            address.push('?');
            address.push_str(&query);
        }
        let url = Url::parse(&address)?;

        let mut wire = reqwest::Request::new(method, url);
        let wire_headers = wire.headers_mut();
        for (name, value) in &self.inner.default_headers {
            wire_headers.insert(name.clone(), value.clone());
        }
        for (name, value) in &headers {
            wire_headers.insert(name.clone(), value.clone());
        }
        if let Some(body) = body {
            *wire.body_mut() = Some(body.into());
        }

        middleware::apply_request(&self.inner.request_middleware, &mut wire)?;

        let (mut envelope, attempts) = match &self.inner.retry_policy {
            Some(policy) => {
                retry::send_with_retry(self.inner.transport.as_ref(), wire, policy, &cancel)
                    .await?
            }
            None => {
                tracing::debug!(
                    method = %wire.method(),
                    url = %wire.url(),
                    "Executing HTTP request"
                );
                let envelope =
                    transport::send_cancellable(self.inner.transport.as_ref(), wire, &cancel)
                        .await?;
                (envelope, 1)
            }
        };
        let latency = start_time.elapsed();

        tracing::info!(
            status = envelope.status().as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        if !self.inner.response_middleware.is_empty() {
            middleware::apply_response(&self.inner.response_middleware, &mut envelope).await?;
        }

        if !envelope.is_success() {
            return Err(Error::Api(classify::classify(&mut envelope).await));
        }

        Ok(Dispatched {
            envelope,
            attempts,
            latency,
        })
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use callpipe::{ClientBuilder, RetryPolicy, TransportConfig};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), callpipe::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")
///     .transport_config(TransportConfig {
///         timeout: Some(Duration::from_secs(30)),
///         max_idle_per_host: 16,
///         ..Default::default()
///     })
///     .retry(RetryPolicy::default())
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<String>,
    default_headers: HeaderMap,
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
    request_middleware: Vec<Arc<dyn RequestMiddleware>>,
    response_middleware: Vec<Arc<dyn ResponseMiddleware>>,
    retry_policy: Option<RetryPolicy>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            transport: None,
            transport_config: TransportConfig::default(),
            request_middleware: Vec::new(),
            response_middleware: Vec::new(),
            retry_policy: None,
        }
    }

    /// Sets the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// Headers set on an individual request take precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-exchange timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport_config.timeout = Some(timeout);
        self
    }

    /// Sets pool and timeout settings for the default transport.
    ///
    /// Ignored when a custom transport is supplied.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Replaces the default pooled transport, typically with a test double.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Enables retries. Zero fields of `policy` take their defaults.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Appends a request middleware step.
    pub fn middleware(mut self, middleware: impl RequestMiddleware + 'static) -> Self {
        self.request_middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a response middleware step.
    ///
    /// Registering any response middleware makes the client buffer every response
    /// body in memory.
    pub fn response_middleware(mut self, middleware: impl ResponseMiddleware + 'static) -> Self {
        self.response_middleware.push(Arc::new(middleware));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, if it does not parse, or if the
    /// default transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;
        Url::parse(&base_url)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(transport::build_http_client(&self.transport_config)?),
        };

        let retry_policy = self.retry_policy.map(|policy| policy.with_defaults());

        tracing::debug!(
            base_url = %base_url,
            request_middleware = self.request_middleware.len(),
            response_middleware = self.response_middleware.len(),
            retry = ?retry_policy,
            "Built HTTP client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                request_middleware: self.request_middleware.into(),
                response_middleware: self.response_middleware.into(),
                retry_policy,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
