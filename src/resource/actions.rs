//! Resource actions
//!
//! Mutating calls: `POST .../<collection>/<id>/actions/<verb>` answers with a
//! task reference, `PATCH .../<collection>/<id>` updates fields in place.

use crate::error::{Result, XoError};
use crate::task::TaskHandle;
use crate::xo::decode;
use crate::xo::href::API_PREFIX;
use crate::xo::session::Session;
use serde_json::Value;

/// Invoke an action on a resource and return a handle on the resulting task
pub async fn invoke_action(
    session: &Session,
    collection: &str,
    id: &str,
    verb: &str,
    body: Option<&Value>,
) -> Result<TaskHandle> {
    let connection = session.connection()?;

    tracing::info!(
        "invoke_action: collection={}, verb={}, resource={}",
        collection,
        verb,
        id
    );

    let url = connection.api_url(&format!(
        "{}/{}/actions/{}",
        collection,
        urlencoding::encode(id),
        urlencoding::encode(verb)
    ));
    let response = connection
        .http()
        .post(&url, connection.credential(), body)
        .await?;

    let href = parse_task_reference(&response)?;
    tracing::debug!("{} {} started task {}", verb, id, href);
    TaskHandle::from_href(&href)
}

/// Update fields of a resource
pub async fn update(session: &Session, collection: &str, id: &str, body: &Value) -> Result<()> {
    let connection = session.connection()?;

    tracing::info!("update: collection={}, resource={}", collection, id);

    let url = connection.api_url(&format!("{}/{}", collection, urlencoding::encode(id)));
    connection
        .http()
        .patch(&url, connection.credential(), body)
        .await?;
    Ok(())
}

/// Extract the task href from an action response.
///
/// Servers answer with a JSON string, a bare href in plain text, or an object
/// carrying `href` or `taskId`.
pub fn parse_task_reference(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(XoError::Decode("empty action response, expected a task reference".to_string()));
    }

    let Ok(value) = decode::decode(trimmed) else {
        return Ok(trimmed.to_string());
    };

    match value {
        Value::String(href) => Ok(href),
        Value::Object(map) => {
            if let Some(href) = map.get("href").and_then(|v| v.as_str()) {
                Ok(href.to_string())
            } else if let Some(id) = map.get("taskId").and_then(|v| v.as_str()) {
                Ok(format!("{}/tasks/{}", API_PREFIX, id))
            } else {
                Err(XoError::Decode(format!(
                    "no task reference in action response: {}",
                    Value::Object(map)
                )))
            }
        }
        other => Err(XoError::Decode(format!(
            "unexpected action response: {}",
            other
        ))),
    }
}
