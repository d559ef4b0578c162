//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Tell API errors, decode failures and transport faults apart
//! - Read the message and raw body the server sent
//! - Check whether an error is worth retrying
//! - Cancel a request that is taking too long
//!
//! Run with: `cargo run --example error_handling`

use callpipe::{ApiError, Client, Error};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("callpipe=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .build()?;

    println!("=== Example 1: Handling API Errors ===");
    match client.get("/posts/999999").send::<Post>().await {
        Ok(response) => println!("Success: {:?}", response.data),
        Err(Error::Api(api)) => {
            println!("API Error!");
            println!("  Status: {}", api.status);
            println!("  Message: {}", api.message);
            println!("  Not found: {}", api.is_not_found());
            println!("  Body: {} bytes", api.body.len());
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Handling Deserialization Errors ===");
    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    match client.get("/posts/1").send::<WrongSchema>().await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::DeserializationFailed {
            raw_response,
            serde_error,
            status,
        }) => {
            println!("Deserialization Failed!");
            println!("  Status: {}", status);
            println!("  Serde error: {}", serde_error);
            println!(
                "  Raw response (first 200 chars): {}",
                raw_response.chars().take(200).collect::<String>()
            );
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 3: Checking Error Retryability ===");
    let errors = vec![
        Error::Api(ApiError::new(
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "Server error",
            "Server error",
        )),
        Error::Api(ApiError::new(
            http::StatusCode::BAD_REQUEST,
            "Bad request",
            r#"{"message":"Bad request"}"#,
        )),
        Error::Timeout,
        Error::Cancelled,
        Error::ConfigurationError("Invalid config".to_string()),
    ];

    for error in errors {
        println!("Error: {}", error);
        println!("  Is retryable: {}", error.is_retryable());
        println!("  Status code: {:?}", error.status());
        println!(
            "  Raw response: {:?}",
            error.raw_response().map(String::from_utf8_lossy)
        );
        println!();
    }

    println!("=== Example 4: Handling Network Errors ===");
    let bad_client = Client::builder()
        .base_url("https://this-domain-does-not-exist-12345.com")
        .build()?;

    match bad_client.get("/").send::<serde_json::Value>().await {
        Ok(_) => println!("Unexpected success"),
        Err(Error::Network(e)) => {
            println!("Network Error!");
            println!("  Error: {}", e);
            println!("  Is connect error: {}", e.is_connect());
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 5: Cancelling a Request ===");
    let cancel = CancellationToken::new();
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        timer.cancel();
    });

    match client
        .get("/posts")
        .with_cancellation(cancel)
        .send::<serde_json::Value>()
        .await
    {
        Ok(_) => println!("Finished before the cancel fired"),
        Err(e) if e.is_cancelled() => println!("Request was cancelled"),
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
