//! Example demonstrating middleware and curl-style debug output.
//!
//! This example shows how to:
//! - Attach authentication and fixed headers to every request
//! - Print requests and responses as they cross the wire
//! - Write your own request and response middleware
//!
//! Run with: `cargo run --example debug_logging`

use callpipe::middleware::{
    AuthMiddleware, DebugMiddleware, DebugOptions, DebugResponseMiddleware, HeaderMiddleware,
};
use callpipe::{BoxError, Client, Envelope, Error};
use serde::Serialize;

#[derive(Serialize)]
struct NewPost {
    title: String,
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callpipe=debug")
        .init();

    let options = DebugOptions::default();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .middleware(AuthMiddleware::bearer("demo-token"))
        .middleware(HeaderMiddleware::new([("X-Client", "callpipe-demo")])?)
        .middleware(|request: &mut reqwest::Request| -> Result<(), BoxError> {
            request
                .headers_mut()
                .insert("x-request-id", "demo-1".parse()?);
            Ok(())
        })
        .middleware(DebugMiddleware::new(options.clone()))
        .response_middleware(DebugResponseMiddleware::new(options))
        .response_middleware(|response: &mut Envelope| -> Result<(), BoxError> {
            let size = response.buffered().map_or(0, |body| body.len());
            println!("(response body is {} bytes)", size);
            Ok(())
        })
        .build()?;

    let created = client
        .post("/posts")
        .with_json(&NewPost {
            title: "Hello".to_string(),
            body: "Traced from start to finish".to_string(),
        })
        .send::<serde_json::Value>()
        .await?;

    println!();
    println!("Created: {}", created.data);

    Ok(())
}
