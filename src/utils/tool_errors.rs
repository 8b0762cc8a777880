use crate::errors::ToolError;
use crate::utils::suggest::suggest;

/// Validation error for an unrecognised sub-operation of a multiplexed tool.
pub fn unknown_operation_error(tool: &str, operation: &str, known: &[&str]) -> ToolError {
    let suggestions = suggest(operation, known, 3);
    let mut hint = String::new();
    if !suggestions.is_empty() {
        hint.push_str(&format!("Did you mean: {}? ", suggestions.join(", ")));
    }
    hint.push_str(&format!("Use one of: {}.", known.join(", ")));
    ToolError::invalid_params(format!("Unknown {} operation: {}", tool, operation)).with_hint(hint)
}
