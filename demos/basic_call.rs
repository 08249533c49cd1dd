//! Basic example: authenticate, start an introspection and read it back.
//!
//! This example shows how to:
//! - Connect through Keystone with a username and password
//! - Start introspection of a node
//! - Read the job status and the collected data
//! - Access response metadata
//!
//! Run with:
//! `OS_AUTH_URL=https://keystone:5000 OS_USERNAME=admin OS_PASSWORD=secret NODE_ID=<uuid> cargo run --example basic_call`

use inspector_client::{Client, Error, IntrospectionService};
use std::env;

fn var(name: &str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::ConfigurationError(format!("{} is not set", name)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("inspector_client=debug,basic_call=info")
        .init();

    let mut client = Client::builder()
        .auth_url(var("OS_AUTH_URL")?)
        .credentials(var("OS_USERNAME")?, var("OS_PASSWORD")?)
        .project_name(env::var("OS_PROJECT_NAME").unwrap_or_else(|_| "admin".to_string()))
        .connect()
        .await?;
    let node_id = var("NODE_ID")?;

    println!("=== Session ===");
    println!("Management URL: {}", client.session().management_url);
    println!("API prefix: {}", client.path_prefix());
    println!("Token expires: {:?}", client.session().expires_at);
    println!();

    println!("=== Start Introspection ===");
    let response = client.create_introspection(&node_id, None).await?;
    println!("Status code: {}", response.status);
    println!();

    println!("=== Introspection Status ===");
    let response = client.get_introspection(&node_id).await?;
    println!("Job: {:?}", response.data);
    println!("Request latency: {:?}", response.latency);
    println!("Was retried: {}", response.was_retried());
    println!();

    println!("=== Rules ===");
    for rule in client.all_rules().await?.data {
        println!("{}: {}", rule.uuid, rule.description.unwrap_or_default());
    }

    Ok(())
}
