//! Example: the fixture-backed mock client.
//!
//! This example shows how to:
//! - Create mock clients that share data per username
//! - Mutate and reset mock data
//! - Use the same trait methods as the networked client
//!
//! Run with: `cargo run --example mock_backend`

use inspector_client::mock::MockClient;
use inspector_client::{ClientConfig, Error, IntrospectionService, RuleSpec};
use serde_json::json;

async fn summarize(client: &mut impl IntrospectionService) -> Result<(), Error> {
    let rules = client.all_rules().await?;
    println!("{} rule(s):", rules.data.len());
    for rule in &rules.data {
        println!("  {} - {}", rule.uuid, rule.description.as_deref().unwrap_or(""));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("inspector_client=debug")
        .init();

    let config = ClientConfig {
        username: Some("admin".to_string()),
        ..Default::default()
    };
    let mut first = MockClient::new(config.clone())?;
    let mut second = MockClient::new(config)?;

    println!("=== Session ===");
    println!("Token: {}", first.session().auth_token);
    println!("Expires: {:?}", first.session().expires_at);
    println!();

    println!("=== Fixture Data ===");
    summarize(&mut first).await?;
    println!();

    println!("=== Shared Mutations ===");
    let rule = RuleSpec::new(
        vec![json!({"op": "ge", "field": "memory_mb", "value": 65536})],
        vec![json!({"action": "set-capability", "name": "profile", "value": "large"})],
    )
    .with_description("Flag nodes with 64 GiB or more");
    first.create_rules(&rule).await?;
    first.create_introspection("node-1", None).await?;

    let job = second.get_introspection("node-1").await?;
    println!("Second client sees node-1: {:?}", job.data);
    summarize(&mut second).await?;
    println!();

    println!("=== Reset ===");
    second.reset_data();
    summarize(&mut first).await?;

    Ok(())
}
