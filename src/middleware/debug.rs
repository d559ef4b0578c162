//! curl-style request/response tracing.
//!
//! [`DebugMiddleware`] prints outgoing requests as `> ` lines and
//! [`DebugResponseMiddleware`] prints responses as `< ` lines:
//!
//! ```text
//! > POST /api/users HTTP/1.1
//! > content-type: application/json
//! >
//! {"name":"John"}
//!
//! < HTTP/1.1 201 Created
//! < content-type: application/json
//! <
//! {"id":"123"}
//! ```
//!
//! Output is best-effort: a failing sink is reported through `tracing` and never
//! aborts the call.

use super::{RequestMiddleware, ResponseMiddleware};
use crate::{error::BoxError, Envelope};
use http::HeaderMap;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Shared destination for debug output.
pub type Sink = Arc<Mutex<dyn Write + Send>>;

const RESET: &str = "\x1b[0m";
const PURPLE: &str = "\x1b[35m";
const BLUE: &str = "\x1b[34m";

fn purple(s: &str) -> String {
    format!("{PURPLE}{s}{RESET}")
}

fn blue(s: &str) -> String {
    format!("{BLUE}{s}{RESET}")
}

/// Controls what the debug middleware prints and where.
#[derive(Clone)]
pub struct DebugOptions {
    /// Highlight header names and values with ANSI colors.
    pub color: bool,
    /// Print request and response bodies.
    pub show_body: bool,
    /// Where to write. `None` writes to stdout.
    pub writer: Option<Sink>,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            color: true,
            show_body: true,
            writer: None,
        }
    }
}

impl DebugOptions {
    fn emit(&self, text: &str) {
        let result = match &self.writer {
            Some(sink) => {
                let mut writer = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                writer.write_all(text.as_bytes()).and_then(|()| writer.flush())
            }
            None => std::io::stdout().lock().write_all(text.as_bytes()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to write debug output");
        }
    }
}

impl std::fmt::Debug for DebugOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugOptions")
            .field("color", &self.color)
            .field("show_body", &self.show_body)
            .field("stdout", &self.writer.is_none())
            .finish()
    }
}

/// Prints outgoing requests.
///
/// # Examples
///
/// ```
/// use callpipe::middleware::{DebugMiddleware, DebugOptions, DebugResponseMiddleware};
/// use callpipe::Client;
///
/// # fn example() -> Result<(), callpipe::Error> {
/// let options = DebugOptions { color: false, ..Default::default() };
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .middleware(DebugMiddleware::new(options.clone()))
///     .response_middleware(DebugResponseMiddleware::new(options))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DebugMiddleware {
    options: DebugOptions,
}

impl DebugMiddleware {
    /// Creates the middleware with the given options.
    pub fn new(options: DebugOptions) -> Self {
        Self { options }
    }
}

impl RequestMiddleware for DebugMiddleware {
    fn handle(&self, request: &mut reqwest::Request) -> Result<(), BoxError> {
        let url = request.url();
        let mut target = url.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let mut out = format!(
            "> {} {} {:?}\n",
            request.method(),
            target,
            request.version()
        );
        write_headers(&mut out, self.options.color, ">", request.headers());

        if self.options.show_body {
            if let Some(body) = request.body().and_then(reqwest::Body::as_bytes) {
                write_body(&mut out, body);
            }
        }

        self.options.emit(&out);
        Ok(())
    }
}

/// Prints received responses.
///
/// Reads the whole body when `show_body` is set, so it is not suited to very large
/// responses. The body is restored for whoever reads it next.
#[derive(Debug, Clone, Default)]
pub struct DebugResponseMiddleware {
    options: DebugOptions,
}

impl DebugResponseMiddleware {
    /// Creates the middleware with the given options.
    pub fn new(options: DebugOptions) -> Self {
        Self { options }
    }
}

impl ResponseMiddleware for DebugResponseMiddleware {
    fn handle(&self, response: &mut Envelope) -> Result<(), BoxError> {
        let mut out = format!("< {:?} {}\n", response.version(), response.status());
        write_headers(&mut out, self.options.color, "<", response.headers());

        if self.options.show_body {
            if let Some(body) = response.take_buffered() {
                write_body(&mut out, &body);
                response.restore(body);
            }
        }

        self.options.emit(&out);
        Ok(())
    }
}

fn write_headers(out: &mut String, color: bool, prefix: &str, headers: &HeaderMap) {
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");

        if color {
            let _ = writeln!(out, "{} {}: {}", prefix, purple(name.as_str()), blue(&value));
        } else {
            let _ = writeln!(out, "{} {}: {}", prefix, name, value);
        }
    }
    let _ = writeln!(out, "{}", prefix);
}

fn write_body(out: &mut String, body: &[u8]) {
    if !body.is_empty() {
        out.push_str(&String::from_utf8_lossy(body));
        out.push_str("\n\n");
    }
}
