//! Request and response middleware.
//!
//! Request middleware runs in registration order against the outgoing
//! [`reqwest::Request`] before anything is sent. The first fault aborts the call.
//!
//! Response middleware runs in registration order against the [`Envelope`] once a
//! response arrives. The body is read into memory once, and every step gets a fresh
//! readable view over that buffer, so a step may drain the body without affecting the
//! next step or the caller. This trades memory for safety and is not suited to
//! unbounded response bodies.

mod auth;
mod debug;

pub use auth::{AuthMiddleware, AuthScheme, HeaderMiddleware, UnsupportedScheme};
pub use debug::{DebugMiddleware, DebugOptions, DebugResponseMiddleware, Sink};

use crate::{error::BoxError, Envelope, Error, Result};

/// Inspects or mutates an outgoing request.
///
/// Closures taking `&mut reqwest::Request` implement this trait.
///
/// # Examples
///
/// ```
/// use callpipe::Client;
///
/// # fn example() -> Result<(), callpipe::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .middleware(|request: &mut reqwest::Request| -> Result<(), callpipe::BoxError> {
///         request
///             .headers_mut()
///             .insert("x-request-id", http::HeaderValue::from_static("abc"));
///         Ok(())
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub trait RequestMiddleware: Send + Sync {
    /// Returns an error to abort the call before dispatch.
    fn handle(&self, request: &mut reqwest::Request) -> std::result::Result<(), BoxError>;
}

impl<F> RequestMiddleware for F
where
    F: Fn(&mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, request: &mut reqwest::Request) -> std::result::Result<(), BoxError> {
        self(request)
    }
}

/// Inspects or mutates a received response.
///
/// The envelope's body is always buffered when a step runs; draining it with
/// [`Envelope::take_buffered`] is fine.
pub trait ResponseMiddleware: Send + Sync {
    /// Returns an error to abort the call.
    fn handle(&self, response: &mut Envelope) -> std::result::Result<(), BoxError>;
}

impl<F> ResponseMiddleware for F
where
    F: Fn(&mut Envelope) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, response: &mut Envelope) -> std::result::Result<(), BoxError> {
        self(response)
    }
}

/// Runs every request step in order, stopping at the first fault.
pub(crate) fn apply_request(
    chain: &[std::sync::Arc<dyn RequestMiddleware>],
    request: &mut reqwest::Request,
) -> Result<()> {
    for (index, step) in chain.iter().enumerate() {
        if let Err(e) = step.handle(request) {
            tracing::warn!(step = index, error = %e, "Request middleware aborted dispatch");
            return Err(Error::RequestMiddleware(e));
        }
    }
    Ok(())
}

/// Buffers the body once and runs every response step over a fresh view of it.
///
/// After this returns, successfully or not, the envelope holds a fresh view over the
/// same bytes. A read fault leaves the body drained.
pub(crate) async fn apply_response(
    chain: &[std::sync::Arc<dyn ResponseMiddleware>],
    response: &mut Envelope,
) -> Result<()> {
    let body = response.bytes().await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to read response body for middleware");
        Error::BodyRead(e)
    })?;

    for (index, step) in chain.iter().enumerate() {
        response.restore(body.clone());
        if let Err(e) = step.handle(response) {
            response.restore(body.clone());
            tracing::warn!(step = index, error = %e, "Response middleware failed");
            return Err(Error::ResponseMiddleware {
                status: response.status(),
                body,
                source: e,
            });
        }
    }

    response.restore(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::sync::{Arc, Mutex};

    fn request() -> reqwest::Request {
        reqwest::Request::new(
            http::Method::GET,
            url::Url::parse("http://localhost/test").unwrap(),
        )
    }

    #[test]
    fn test_request_steps_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = order.clone();
            move |_: &mut reqwest::Request| -> std::result::Result<(), BoxError> {
                order.lock().unwrap().push(1);
                Ok(())
            }
        };
        let second = {
            let order = order.clone();
            move |_: &mut reqwest::Request| -> std::result::Result<(), BoxError> {
                order.lock().unwrap().push(2);
                Ok(())
            }
        };
        let chain: Vec<Arc<dyn RequestMiddleware>> = vec![Arc::new(first), Arc::new(second)];

        apply_request(&chain, &mut request()).unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_request_fault_stops_chain() {
        let reached = Arc::new(Mutex::new(false));
        let failing = |_: &mut reqwest::Request| -> std::result::Result<(), BoxError> {
            Err("denied".into())
        };
        let after = {
            let reached = reached.clone();
            move |_: &mut reqwest::Request| -> std::result::Result<(), BoxError> {
                *reached.lock().unwrap() = true;
                Ok(())
            }
        };
        let chain: Vec<Arc<dyn RequestMiddleware>> = vec![Arc::new(failing), Arc::new(after)];

        let result = apply_request(&chain, &mut request());
        assert!(matches!(result, Err(Error::RequestMiddleware(_))));
        assert!(!*reached.lock().unwrap());
    }

    #[test]
    fn test_request_steps_mutate_headers() {
        let stamp = |request: &mut reqwest::Request| -> std::result::Result<(), BoxError> {
            request
                .headers_mut()
                .insert("x-stamp", HeaderValue::from_static("1"));
            Ok(())
        };
        let chain: Vec<Arc<dyn RequestMiddleware>> = vec![Arc::new(stamp)];
        let mut req = request();

        apply_request(&chain, &mut req).unwrap();
        assert_eq!(req.headers()["x-stamp"], "1");
    }

    #[tokio::test]
    async fn test_each_response_step_sees_full_body() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let drain = {
            let seen = seen.clone();
            move |response: &mut Envelope| -> std::result::Result<(), BoxError> {
                let body = response.take_buffered().unwrap_or_default();
                seen.lock().unwrap().push(body);
                Ok(())
            }
        };
        let chain: Vec<Arc<dyn ResponseMiddleware>> =
            vec![Arc::new(drain.clone()), Arc::new(drain)];
        let mut envelope = Envelope::new(StatusCode::OK, HeaderMap::new(), r#"{"id":"123"}"#);

        apply_response(&chain, &mut envelope).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0], r#"{"id":"123"}"#);

        let decoded: serde_json::Value = envelope.json().await.unwrap();
        assert_eq!(decoded["id"], "123");
    }

    #[tokio::test]
    async fn test_failing_response_step_restores_body() {
        let failing = |response: &mut Envelope| -> std::result::Result<(), BoxError> {
            let _ = response.take_buffered();
            Err("inspection failed".into())
        };
        let chain: Vec<Arc<dyn ResponseMiddleware>> = vec![Arc::new(failing)];
        let mut envelope = Envelope::new(StatusCode::OK, HeaderMap::new(), "payload");

        let result = apply_response(&chain, &mut envelope).await;

        match result {
            Err(Error::ResponseMiddleware { status, body, .. }) => {
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body, "payload");
            }
            other => panic!("Expected ResponseMiddleware, got {:?}", other),
        }
        assert_eq!(envelope.text().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_empty_chain_leaves_buffered_view() {
        let mut envelope = Envelope::new(StatusCode::OK, HeaderMap::new(), "payload");
        apply_response(&[], &mut envelope).await.unwrap();
        assert_eq!(envelope.buffered().unwrap(), "payload");
    }
}
