//! Text helpers shared by the template handlers.

use serde_json::Value;

use crate::constants::markers;
use crate::errors::{ToolError, ToolErrorKind};
use crate::mcp::content::ToolResult;
use crate::utils::text::cap_with_note;

/// Second tier of error handling: an upstream HTTP failure becomes ordinary text
/// with its status and body, everything else goes back to the dispatcher.
pub fn settle(outcome: Result<String, ToolError>) -> Result<ToolResult, ToolError> {
    match outcome {
        Ok(text) => Ok(ToolResult::text(text)),
        Err(err) if err.kind == ToolErrorKind::UpstreamHttp => match err.upstream {
            Some(failure) => Ok(ToolResult::text(api_error_text(failure.status, &failure.body))),
            None => Err(err),
        },
        Err(err) => Err(err),
    }
}

pub fn api_error_text(status: u16, body: &str) -> String {
    format!("{}{} - {}", markers::API_ERROR, status, body)
}

/// Scalars render bare, `null` and absent values render as `fallback`.
pub fn display(value: Option<&Value>, fallback: &str) -> String {
    match value {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn field(value: &Value, key: &str, fallback: &str) -> String {
    display(value.get(key), fallback)
}

/// A field the rendering cannot do without.
pub fn required_field(value: &Value, key: &str) -> Result<String, ToolError> {
    match value.get(key) {
        None | Some(Value::Null) => Err(ToolError::internal(format!(
            "Upstream response is missing '{}'",
            key
        ))),
        other => Ok(display(other, "")),
    }
}

/// Top-level JSON arrays; `null` counts as empty.
pub fn items(value: &Value, what: &str) -> Result<Vec<Value>, ToolError> {
    match value {
        Value::Array(list) => Ok(list.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(ToolError::internal(format!(
            "Expected a JSON array of {} from upstream",
            what
        ))),
    }
}

/// Post-render cap: counts characters and may cut through markup.
pub fn soft_cap(text: String, max_chars: usize) -> String {
    cap_with_note(text, max_chars, markers::TRUNCATED)
}
