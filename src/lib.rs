//! # inspector-client - a client for the hardware-introspection service
//!
//! `inspector-client` talks to a hardware-introspection service over its
//! authenticated JSON API. It gets a token from the identity service,
//! discovers which API version to use, and sends requests for introspection
//! jobs and rules. When the service rejects an expired token the client
//! reauthenticates and retries once, transparently.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inspector_client::{Client, IntrospectionService, RuleSpec};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), inspector_client::Error> {
//!     let mut client = Client::builder()
//!         .auth_url("https://keystone.example.com:5000")
//!         .credentials("admin", "secret")
//!         .project_name("admin")
//!         .connect()
//!         .await?;
//!
//!     println!("Talking to {} under {}", client.session().management_url, client.path_prefix());
//!
//!     client.create_introspection("node-1", None).await?;
//!
//!     let rule = RuleSpec::new(
//!         vec![json!({"op": "ge", "field": "memory_mb", "value": 4096})],
//!         vec![json!({"action": "set-capability", "name": "large", "value": "true"})],
//!     );
//!     let created = client.create_rules(&rule).await?;
//!     println!("Created rule: {:?}", created.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Keystone v3 authentication** - password or token auth, project/domain
//!   scoping, service catalog lookup by type, name, region and interface
//! - **Version negotiation** - uses the management URL's version when it is
//!   supported, otherwise picks one from the service's discovery document
//! - **One-shot token refresh** - an expired token triggers exactly one
//!   reauthentication and one retry; bad credentials never do
//! - **Typed errors** - not found, unauthorized, unsupported version, decode
//!   failures and other HTTP errors are distinct [`Error`] variants
//! - **Mock backend** - [`mock::MockClient`] serves the same interface from
//!   fixture data for tests
//!
//! ## Error Handling
//!
//! ```no_run
//! use inspector_client::{Error, IntrospectionService};
//!
//! # async fn example(client: &mut impl IntrospectionService) {
//! match client.get_introspection_details("node-1").await {
//!     Ok(response) => println!("Inventory: {:?}", response.data),
//!     Err(Error::NotFound { .. }) => println!("No data collected yet"),
//!     Err(Error::Unauthorized { reason, raw_response }) => {
//!         eprintln!("Rejected ({}): {}", reason, raw_response);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```

mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod mock;
mod response;
mod service;
pub mod version;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use response::{Body, Response};
pub use service::{IntrospectionService, Link, Rule, RuleSpec};
