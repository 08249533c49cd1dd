//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Tell a missing resource apart from other failures
//! - Tell rejected credentials apart from an expired token
//! - Access raw response data on errors
//!
//! Run with:
//! `OS_AUTH_URL=https://keystone:5000 OS_USERNAME=admin OS_PASSWORD=secret cargo run --example error_handling`

use inspector_client::error::UnauthorizedReason;
use inspector_client::{Client, Error, IntrospectionService};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("inspector_client=info")
        .init();

    println!("=== Example 1: Rejected Credentials ===");
    let result = Client::builder()
        .auth_url(env::var("OS_AUTH_URL")?)
        .credentials("nobody", "wrong-password")
        .connect()
        .await;
    match result {
        Ok(_) => println!("Unexpectedly authenticated"),
        Err(Error::Authentication(message)) => println!("Authentication failed: {}", message),
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    let mut client = Client::builder()
        .auth_url(env::var("OS_AUTH_URL")?)
        .credentials(env::var("OS_USERNAME")?, env::var("OS_PASSWORD")?)
        .project_name("admin")
        .connect()
        .await?;

    println!("=== Example 2: Missing Resources ===");
    match client.get_introspection_details("00000000-0000-0000-0000-000000000000").await {
        Ok(response) => println!("Data: {:?}", response.data),
        Err(Error::NotFound {
            status,
            raw_response,
            ..
        }) => {
            println!("Not found!");
            println!("  Status code: {}", status.as_u16());
            println!("  Raw response: {}", raw_response);
        }
        Err(e) => println!("Other error: {}", e),
    }

    match client.find_rule("no-such-rule").await? {
        Some(rule) => println!("Found rule {}", rule.uuid),
        None => println!("Rule no-such-rule does not exist"),
    }
    println!();

    println!("=== Example 3: Unauthorized ===");
    match client.list_rules().await {
        Ok(response) => println!("Listed rules (attempts: {})", response.attempts),
        Err(Error::Unauthorized {
            reason: UnauthorizedReason::BadCredentials,
            ..
        }) => println!("Credentials rejected; not retried"),
        Err(Error::Unauthorized {
            reason: UnauthorizedReason::TokenExpired,
            raw_response,
        }) => println!("Token rejected even after reauthenticating: {}", raw_response),
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 4: Other HTTP Errors ===");
    match client.create_introspection("not-a-node", None).await {
        Ok(_) => println!("Introspection started"),
        Err(e) => {
            println!("Error: {}", e);
            println!("  Status: {:?}", e.status());
            println!("  Raw response: {:?}", e.raw_response());
        }
    }

    Ok(())
}
