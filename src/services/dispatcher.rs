use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::constants::markers;
use crate::errors::{ToolError, ToolErrorKind};
use crate::mcp::catalog::{ToolDescriptor, ToolRegistry};
use crate::mcp::content::ToolResult;
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

/// One tool's behavior. Handlers return `Err` for anything the dispatcher should render.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError>;
}

/// Routes invocations to handlers and is the single catch boundary for their failures.
#[derive(Clone)]
pub struct Dispatcher {
    logger: Logger,
    registry: Arc<ToolRegistry>,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl Dispatcher {
    pub fn new(logger: Logger, handlers: Vec<Arc<dyn ToolHandler>>) -> Result<Self, ToolError> {
        let descriptors: Vec<ToolDescriptor> = handlers.iter().map(|h| h.descriptor()).collect();
        let registry = ToolRegistry::new(descriptors)?;
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.descriptor().name, handler))
            .collect();
        Ok(Self {
            logger: logger.child("dispatch"),
            registry: Arc::new(registry),
            handlers: Arc::new(handlers),
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Never fails: every error becomes an error-flagged text result.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let outcome = self.try_dispatch(name, args).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                self.logger.debug(
                    "tool call finished",
                    Some(&json!({
                        "tool": name,
                        "invocation_id": invocation_id,
                        "duration_ms": duration_ms,
                        "is_error": result.is_error,
                    })),
                );
                result
            }
            Err(err) => {
                self.logger.warn(
                    "tool call failed",
                    Some(&json!({
                        "tool": name,
                        "invocation_id": invocation_id,
                        "duration_ms": duration_ms,
                        "kind": err.kind,
                        "message": err.message,
                    })),
                );
                render_failure(&err)
            }
        }
    }

    async fn try_dispatch(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        let Some(handler) = self.handlers.get(name) else {
            let names = self.registry.names();
            let hints = suggest(name, &names, 3);
            let err = ToolError::unknown_tool(name);
            return Err(if hints.is_empty() {
                err
            } else {
                err.with_hint(format!("Did you mean: {}?", hints.join(", ")))
            });
        };
        let args = match args {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => args,
            _ => {
                return Err(ToolError::invalid_params(format!(
                    "Arguments for {} must be an object",
                    name
                )))
            }
        };
        self.registry.validate_args(name, &args)?;
        handler.handle(args).await
    }
}

fn render_failure(err: &ToolError) -> ToolResult {
    let mut text = format!("{}{}", markers::ERROR, err.message);
    if let Some(hint) = err.hint.as_deref() {
        text.push_str(&format!("\nHint: {}", hint));
    }
    if err.kind == ToolErrorKind::UpstreamHttp {
        if let Some(upstream) = err.upstream.as_ref() {
            text.push_str(&format!("\n{}", upstream.body));
        }
    }
    ToolResult::error(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
    use crate::services::logger::LogLevel;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(
                "echo",
                "Echo the message back",
                ParameterSchema::new()
                    .field(FieldSpec::new("message", FieldKind::String, "Text").required()),
            )
        }

        async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
            match args["message"].as_str() {
                Some("boom") => Err(ToolError::internal("exploded")),
                Some(text) => Ok(ToolResult::text(text)),
                None => Err(ToolError::invalid_params("message is required")),
            }
        }
    }

    fn dispatcher() -> Dispatcher {
        let logger = Logger::with_level("test", LogLevel::Error);
        Dispatcher::new(logger, vec![Arc::new(Echo)]).expect("dispatcher")
    }

    #[tokio::test]
    async fn unknown_tool_is_rendered_with_suggestion() {
        let result = dispatcher().dispatch("ecoh", json!({})).await;
        assert!(result.is_error);
        let text = result.joined_text();
        assert!(text.starts_with("❌ Error: Unknown tool: ecoh"));
        assert!(text.contains("Did you mean: echo?"));
    }

    #[tokio::test]
    async fn handler_errors_are_caught() {
        let result = dispatcher().dispatch("echo", json!({"message": "boom"})).await;
        assert_eq!(result, ToolResult::error("❌ Error: exploded"));
    }

    #[tokio::test]
    async fn structural_validation_runs_before_handler() {
        let result = dispatcher().dispatch("echo", Value::Null).await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("missing required field 'message'"));

        let result = dispatcher().dispatch("echo", json!(["x"])).await;
        assert!(result.joined_text().contains("must be an object"));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let result = dispatcher().dispatch("echo", json!({"message": "hi"})).await;
        assert_eq!(result, ToolResult::text("hi"));
    }
}
