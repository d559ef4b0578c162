//! Example demonstrating retry policies and custom retry predicates.
//!
//! This example shows how to:
//! - Configure attempts and the backoff window
//! - Create custom retry predicates
//! - Combine predicates with AND/OR logic
//! - Use a closure as a predicate
//!
//! Run with: `cargo run --example custom_retry`

use callpipe::retry::{AndPredicate, OrPredicate, RetryOn5xx, RetryOnTimeout, RetryPredicate};
use callpipe::{Client, Envelope, Error, Result, RetryPolicy};
use std::time::Duration;

/// Custom predicate: Retry on rate limit responses (HTTP 429)
struct RetryOnRateLimit;

impl RetryPredicate for RetryOnRateLimit {
    fn should_retry(&self, outcome: &Result<Envelope>, _attempt: usize) -> bool {
        matches!(outcome, Ok(response) if response.status().as_u16() == 429)
    }
}

/// Custom predicate: Only retry for the first N attempts
struct MaxAttempts(usize);

impl RetryPredicate for MaxAttempts {
    fn should_retry(&self, _outcome: &Result<Envelope>, attempt: usize) -> bool {
        attempt <= self.0
    }
}

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(100),
        Duration::from_secs(5),
    )
}

async fn run(client: &Client) {
    match client.get("/posts/1").send::<serde_json::Value>().await {
        Ok(response) => {
            println!("Success!");
            println!("  Attempts: {}", response.attempts);
            println!("  Latency: {:?}", response.latency);
        }
        Err(e) => println!("Failed: {}", e),
    }
    println!();
}

#[tokio::main]
async fn main() -> std::result::Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callpipe=info,custom_retry=info")
        .init();

    println!("=== Example 1: Default Policy ===");
    // Transport faults, 5xx and 429 are retried up to 3 attempts.
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .retry(RetryPolicy::default())
        .build()?;
    run(&client).await;

    println!("=== Example 2: Combining Predicates with OR ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .retry(policy(4).with_predicate(OrPredicate::new(vec![
            Box::new(RetryOn5xx),
            Box::new(RetryOnTimeout),
            Box::new(RetryOnRateLimit),
        ])))
        .build()?;
    println!("This client retries on: 5xx OR timeouts OR rate limits");
    run(&client).await;

    println!("=== Example 3: Combining Predicates with AND ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        // The policy allows 5 attempts, but the predicate stops after 2
        .retry(policy(5).with_predicate(AndPredicate::new(vec![
            Box::new(RetryOn5xx),
            Box::new(MaxAttempts(2)),
        ])))
        .build()?;
    println!("This client retries on 5xx errors, but only for the first 2 attempts");
    run(&client).await;

    println!("=== Example 4: Closure Predicate ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .retry(policy(3).with_predicate(
            |outcome: &Result<Envelope>, _attempt: usize| match outcome {
                Ok(response) => response.status() == http::StatusCode::BAD_GATEWAY,
                Err(e) => !e.is_cancelled(),
            },
        ))
        .build()?;
    println!("This client retries on 502 and on any transport fault");
    run(&client).await;

    Ok(())
}
