//! Request routing for the mock backend.

use super::store::MockIdentityRecord;
use crate::{Error, Result};
use chrono::Utc;
use http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};

/// Outcome of a routed mock request.
pub(crate) type Routed = Result<(StatusCode, Option<Value>)>;

/// Error in the shape the service uses for error bodies.
fn failure(status: StatusCode, message: impl Into<String>) -> Error {
    let body = json!({ "error": { "message": message.into() } });
    Error::from_status(status, body.to_string(), HeaderMap::new())
}

fn not_found(what: &str, id: &str) -> Error {
    failure(StatusCode::NOT_FOUND, format!("{} {} not found", what, id))
}

fn method_not_allowed(method: &Method, path: &str) -> Error {
    failure(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {} not allowed on {}", method, path),
    )
}

fn rule_id(rule: &Value) -> Option<&str> {
    rule.get("uuid").and_then(Value::as_str)
}

/// Applies `method path` to `record` the way the service would.
pub(crate) fn route(
    record: &mut MockIdentityRecord,
    method: &Method,
    path: &str,
    body: Option<Value>,
) -> Routed {
    let segments: Vec<&str> = path
        .split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        ["introspection", node_id] => match *method {
            Method::POST => {
                let now = Utc::now().to_rfc3339();
                record.introspection.insert(
                    node_id.to_string(),
                    json!({
                        "uuid": node_id,
                        "finished": false,
                        "state": "starting",
                        "error": null,
                        "started_at": now,
                        "finished_at": null,
                    }),
                );
                Ok((StatusCode::ACCEPTED, None))
            }
            Method::GET => record
                .introspection
                .get(*node_id)
                .map(|job| (StatusCode::OK, Some(job.clone())))
                .ok_or_else(|| not_found("Introspection for node", node_id)),
            _ => Err(method_not_allowed(method, path)),
        },
        ["introspection", node_id, "abort"] => match *method {
            Method::POST => {
                let job = record
                    .introspection
                    .get_mut(*node_id)
                    .ok_or_else(|| not_found("Introspection for node", node_id))?
                    .as_object_mut()
                    .ok_or_else(|| {
                        failure(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("Introspection record for node {} is malformed", node_id),
                        )
                    })?;
                job.insert("finished".into(), json!(true));
                job.insert("state".into(), json!("error"));
                job.insert("error".into(), json!("Canceled by operator"));
                job.insert("finished_at".into(), json!(Utc::now().to_rfc3339()));
                Ok((StatusCode::ACCEPTED, None))
            }
            _ => Err(method_not_allowed(method, path)),
        },
        ["introspection", node_id, "data"] => match *method {
            Method::GET => record
                .introspection_data
                .get(*node_id)
                .map(|data| (StatusCode::OK, Some(data.clone())))
                .ok_or_else(|| not_found("Introspection data for node", node_id)),
            _ => Err(method_not_allowed(method, path)),
        },
        ["rules"] => match *method {
            Method::GET => Ok((StatusCode::OK, Some(json!({ "rules": record.rules })))),
            Method::POST => {
                let mut rule = match body {
                    Some(Value::Object(rule)) => Value::Object(rule),
                    _ => {
                        return Err(failure(
                            StatusCode::BAD_REQUEST,
                            "Rule body must be a JSON object",
                        ))
                    }
                };
                let uuid = match rule_id(&rule) {
                    Some(uuid) => uuid.to_string(),
                    None => uuid::Uuid::new_v4().to_string(),
                };
                rule["uuid"] = json!(uuid);
                rule["links"] = json!([{ "href": format!("/v1/rules/{}", uuid), "rel": "self" }]);
                record.rules.retain(|existing| rule_id(existing) != Some(uuid.as_str()));
                record.rules.push(rule.clone());
                Ok((StatusCode::OK, Some(rule)))
            }
            Method::DELETE => {
                record.rules.clear();
                Ok((StatusCode::NO_CONTENT, None))
            }
            _ => Err(method_not_allowed(method, path)),
        },
        ["rules", uuid] => match *method {
            Method::GET => record
                .rules
                .iter()
                .find(|rule| rule_id(rule) == Some(*uuid))
                .map(|rule| (StatusCode::OK, Some(rule.clone())))
                .ok_or_else(|| not_found("Rule", uuid)),
            Method::DELETE => {
                let before = record.rules.len();
                record.rules.retain(|rule| rule_id(rule) != Some(*uuid));
                if record.rules.len() == before {
                    Err(not_found("Rule", uuid))
                } else {
                    Ok((StatusCode::NO_CONTENT, None))
                }
            }
            _ => Err(method_not_allowed(method, path)),
        },
        _ => Err(failure(
            StatusCode::NOT_FOUND,
            format!("The resource could not be found: {}", path),
        )),
    }
}
