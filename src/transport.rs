//! The one-method transport seam.
//!
//! [`Transport`] is the only thing the pipeline needs from the network: hand over a
//! request, get back an [`Envelope`] or a fault. The pooled [`reqwest::Client`]
//! implements it; tests substitute scripted doubles.

use crate::{Envelope, Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends one request and returns the response envelope.
///
/// Implementations must be safe for concurrent use; the client shares one transport
/// across every call and never locks around it.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use callpipe::{Envelope, Result, Transport};
/// use http::{HeaderMap, StatusCode};
///
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl Transport for AlwaysOk {
///     async fn send(&self, _request: reqwest::Request) -> Result<Envelope> {
///         Ok(Envelope::new(StatusCode::OK, HeaderMap::new(), "{}"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a single network exchange.
    async fn send(&self, request: reqwest::Request) -> Result<Envelope>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<Envelope> {
        match self.execute(request).await {
            Ok(response) => Ok(Envelope::from_reqwest(response)),
            Err(e) if e.is_timeout() => Err(Error::Timeout),
            Err(e) => Err(Error::Network(e)),
        }
    }
}

/// Sends one request, giving up as soon as `cancel` fires.
///
/// A token that is already cancelled prevents the send from starting.
pub(crate) async fn send_cancellable(
    transport: &dyn Transport,
    request: reqwest::Request,
    cancel: &CancellationToken,
) -> Result<Envelope> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = transport.send(request) => result,
    }
}

/// Default cap on idle connections across all hosts.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 100;
/// Default cap on idle connections per host.
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 100;
/// Default idle connection timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection pool and timeout settings for the default transport.
///
/// Zero values are replaced by defaults when the client is built.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Per-exchange timeout. `None` disables it.
    pub timeout: Option<Duration>,
    /// Maximum idle connections kept across all hosts.
    pub max_idle_connections: usize,
    /// Maximum idle connections kept per host.
    pub max_idle_per_host: usize,
    /// How long an idle connection stays in the pool.
    pub idle_timeout: Duration,
}

impl TransportConfig {
    /// Returns a copy with zero values replaced by the defaults.
    pub fn with_defaults(&self) -> Self {
        let mut config = self.clone();
        if config.max_idle_connections == 0 {
            config.max_idle_connections = DEFAULT_MAX_IDLE_CONNECTIONS;
        }
        if config.max_idle_per_host == 0 {
            config.max_idle_per_host = DEFAULT_MAX_IDLE_PER_HOST;
        }
        if config.idle_timeout.is_zero() {
            config.idle_timeout = DEFAULT_IDLE_TIMEOUT;
        }
        config
    }
}

/// Builds the pooled reqwest client used when no custom transport is supplied.
pub(crate) fn build_http_client(config: &TransportConfig) -> Result<reqwest::Client> {
    let config = config.with_defaults();

    // reqwest only bounds the pool per host; the global figure is reported, not enforced.
    tracing::debug!(
        max_idle_connections = config.max_idle_connections,
        max_idle_per_host = config.max_idle_per_host,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Building pooled HTTP transport"
    );

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(config.idle_timeout);
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| Error::ConfigurationError(format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_zero_values() {
        let config = TransportConfig::default().with_defaults();
        assert_eq!(config.max_idle_connections, 100);
        assert_eq!(config.max_idle_per_host, 100);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_defaults_keep_explicit_values() {
        let config = TransportConfig {
            timeout: Some(Duration::from_secs(5)),
            max_idle_connections: 10,
            max_idle_per_host: 2,
            idle_timeout: Duration::from_secs(30),
        }
        .with_defaults();
        assert_eq!(config.max_idle_connections, 10);
        assert_eq!(config.max_idle_per_host, 2);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&TransportConfig::default()).is_ok());
    }
}
