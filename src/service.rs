//! The interface shared by the real and mock clients.
//!
//! Both [`Client`](crate::Client) and [`MockClient`](crate::mock::MockClient)
//! implement [`IntrospectionService::request`]; the resource operations are
//! provided methods built on top of it, so they behave the same against
//! either backend.

use crate::{identity::Session, metadata::RequestMetadata, response::Body, Response, Result};
use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input for [`IntrospectionService::create_rules`].
///
/// # Examples
///
/// ```
/// use inspector_client::RuleSpec;
/// use serde_json::json;
///
/// let rule = RuleSpec::new(
///     vec![json!({"op": "eq", "field": "memory_mb", "value": 1024})],
///     vec![json!({"action": "set-attribute", "path": "/extra/small", "value": true})],
/// )
/// .with_description("Flag small nodes");
///
/// let body = serde_json::to_value(&rule).unwrap();
/// assert!(body.get("uuid").is_none());
/// assert_eq!(body["description"], "Flag small nodes");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleSpec {
    /// Rule id; the service assigns one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Conditions that must all hold for the rule to apply.
    pub conditions: Vec<Value>,
    /// Actions applied when the conditions hold.
    pub actions: Vec<Value>,
}

impl RuleSpec {
    /// Creates a rule from its conditions and actions.
    pub fn new(conditions: Vec<Value>, actions: Vec<Value>) -> Self {
        Self {
            uuid: None,
            description: None,
            conditions,
            actions,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the rule id.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }
}

/// A link to a related resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

/// An introspection rule as the service returns it.
///
/// Listings may carry only the id, description and links, so the other
/// fields default to empty.
///
/// # Examples
///
/// ```
/// use inspector_client::Rule;
/// use serde_json::json;
///
/// let rule: Rule = serde_json::from_value(json!({
///     "uuid": "7459bf7c-9ff9-43a8-ba9f-48542ecda66c",
///     "description": "Flag small nodes",
///     "links": [{"href": "/v1/rules/7459bf7c-9ff9-43a8-ba9f-48542ecda66c", "rel": "self"}]
/// }))
/// .unwrap();
///
/// assert!(rule.conditions.is_empty());
/// assert_eq!(rule.self_link(), Some("/v1/rules/7459bf7c-9ff9-43a8-ba9f-48542ecda66c"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub uuid: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Rule {
    /// The `self` link, if the service sent one.
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some("self"))
            .map(|link| link.href.as_str())
    }
}

#[derive(Deserialize)]
struct RuleList {
    rules: Vec<Rule>,
}

/// A client for the introspection service.
#[async_trait]
pub trait IntrospectionService: Send {
    /// Sends one logical request.
    ///
    /// `metadata.path` is relative to the API prefix. Non-empty response
    /// bodies come back decoded; empty ones as `None`.
    async fn request(
        &mut self,
        metadata: RequestMetadata,
        body: Option<Value>,
    ) -> Result<Response<Body>>;

    /// The current identity session.
    fn session(&self) -> &Session;

    /// The API path prefix requests are sent under.
    fn path_prefix(&self) -> &str;

    /// Starts introspection of a node.
    ///
    /// `options` is sent as the request body when given.
    async fn create_introspection(
        &mut self,
        node_id: &str,
        options: Option<Value>,
    ) -> Result<Response<Body>> {
        let metadata =
            RequestMetadata::new(Method::POST, format!("introspection/{}", node_id)).expecting([202]);
        self.request(metadata, options).await
    }

    /// Fetches the introspection status of a node.
    async fn get_introspection(&mut self, node_id: &str) -> Result<Response<Body>> {
        let metadata =
            RequestMetadata::new(Method::GET, format!("introspection/{}", node_id)).expecting([200]);
        self.request(metadata, None).await
    }

    /// Aborts a running introspection.
    async fn abort_introspection(&mut self, node_id: &str) -> Result<Response<Body>> {
        let metadata = RequestMetadata::new(Method::POST, format!("introspection/{}/abort", node_id))
            .expecting([202]);
        self.request(metadata, None).await
    }

    /// Fetches the data collected for a node.
    async fn get_introspection_details(&mut self, node_id: &str) -> Result<Response<Body>> {
        let metadata = RequestMetadata::new(Method::GET, format!("introspection/{}/data", node_id))
            .expecting([200]);
        self.request(metadata, None).await
    }

    /// Creates an introspection rule.
    async fn create_rules(&mut self, rule: &RuleSpec) -> Result<Response<Body>> {
        let body = serde_json::to_value(rule)
            .map_err(|e| crate::Error::SerializationFailed(e.to_string()))?;
        let metadata = RequestMetadata::new(Method::POST, "rules").expecting([200, 201]);
        self.request(metadata, Some(body)).await
    }

    /// Lists introspection rules.
    async fn list_rules(&mut self) -> Result<Response<Body>> {
        let metadata = RequestMetadata::new(Method::GET, "rules").expecting([200]);
        self.request(metadata, None).await
    }

    /// Deletes every introspection rule.
    async fn delete_rules_all(&mut self) -> Result<Response<Body>> {
        let metadata = RequestMetadata::new(Method::DELETE, "rules").expecting([204]);
        self.request(metadata, None).await
    }

    /// Fetches one introspection rule.
    async fn get_rules(&mut self, rule_id: &str) -> Result<Response<Body>> {
        let metadata =
            RequestMetadata::new(Method::GET, format!("rules/{}", rule_id)).expecting([200]);
        self.request(metadata, None).await
    }

    /// Deletes one introspection rule.
    async fn delete_rules(&mut self, rule_id: &str) -> Result<Response<Body>> {
        let metadata =
            RequestMetadata::new(Method::DELETE, format!("rules/{}", rule_id)).expecting([204]);
        self.request(metadata, None).await
    }

    /// Lists introspection rules as typed values.
    async fn all_rules(&mut self) -> Result<Response<Vec<Rule>>> {
        let response = self.list_rules().await?.decode::<RuleList>()?;
        Ok(response.map(|list| list.rules))
    }

    /// Fetches one rule, or `None` if the service doesn't know it.
    async fn find_rule(&mut self, rule_id: &str) -> Result<Option<Rule>> {
        match self.get_rules(rule_id).await {
            Ok(response) => Ok(Some(response.decode::<Rule>()?.data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes one rule. Returns `false` if it was already gone.
    async fn destroy_rule(&mut self, rule_id: &str) -> Result<bool> {
        match self.delete_rules(rule_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
