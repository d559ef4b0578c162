//! # Callpipe - an HTTP request execution pipeline
//!
//! Callpipe sits on top of a plain "send a request, get a response" transport and runs
//! every call through the same pipeline: request middleware (authentication, tracing),
//! retries with jittered exponential backoff, response middleware over a re-readable
//! buffered body, and classification of the outcome into a decoded value or a
//! structured [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use callpipe::{middleware::AuthMiddleware, Client, RetryPolicy};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callpipe::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(30))
//!         .retry(RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(10)))
//!         .middleware(AuthMiddleware::bearer("secret-token"))
//!         .build()?;
//!
//!     let user = client.get("/users/123").send::<User>().await?;
//!     println!("User: {}", user.data.name);
//!
//!     let created = client
//!         .post("/users")
//!         .with_json(&CreateUser { name: "Alice".to_string() })
//!         .send::<User>()
//!         .await?;
//!     println!("Created user with ID: {}", created.data.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Transport faults, server refusals and undecodable success bodies are distinct
//! [`Error`] variants:
//!
//! ```no_run
//! use callpipe::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com").build()?;
//! match client.get("/endpoint").send::<serde_json::Value>().await {
//!     Ok(response) => println!("Success: {:?}", response.data),
//!     Err(Error::Api(api)) if api.is_unauthorized() => eprintln!("log in first"),
//!     Err(Error::Api(api)) => eprintln!("HTTP {}: {}", api.status, api.message),
//!     Err(Error::DeserializationFailed { raw_response, .. }) => {
//!         eprintln!("Unexpected body: {}", raw_response)
//!     }
//!     Err(Error::Cancelled) => eprintln!("cancelled"),
//!     Err(e) => eprintln!("Transport problem: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! With a [`RetryPolicy`] configured, transport faults, 5xx and 429 responses are
//! re-sent up to `max_attempts` times. The wait before retry `n` (zero-indexed) is
//! drawn from `[b/2, b)` where `b = min(max_wait, base_wait * 2^n)`. Waits race the
//! request's cancellation token:
//!
//! ```no_run
//! use callpipe::{Client, RetryPolicy, retry::RetryOn5xx};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), callpipe::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .retry(RetryPolicy::default().with_predicate(RetryOn5xx))
//!     .build()?;
//!
//! let cancel = CancellationToken::new();
//! let envelope = client
//!     .get("/health")
//!     .with_cancellation(cancel.clone())
//!     .send_raw()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
mod classify;
mod client;
mod envelope;
mod error;
pub mod middleware;
pub mod request;
mod response;
pub mod retry;
mod transport;

pub use client::{Client, ClientBuilder};
pub use envelope::Envelope;
pub use error::{ApiError, BoxError, Error, Result};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use retry::{RetryPolicy, RetryPredicate};
pub use transport::{Transport, TransportConfig};
