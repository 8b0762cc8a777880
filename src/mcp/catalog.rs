use crate::constants::limits::SCHEMA_ERRORS_SHOWN;
use crate::errors::ToolError;
use crate::mcp::schema::ParameterSchema;
use crate::utils::suggest::suggest;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::JSONSchema;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// Name, description and parameter schema of one invocable tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, schema: ParameterSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
        }
    }
}

impl Serialize for ToolDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("ToolDescriptor", 3)?;
        out.serialize_field("name", &self.name)?;
        out.serialize_field("description", &self.description)?;
        out.serialize_field("inputSchema", &self.schema.to_json_schema())?;
        out.end()
    }
}

/// Immutable, ordered set of descriptors plus their compiled validators.
pub struct ToolRegistry {
    descriptors: Vec<ToolDescriptor>,
    validators: HashMap<String, JSONSchema>,
}

impl ToolRegistry {
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Result<Self, ToolError> {
        let mut validators = HashMap::new();
        for tool in &descriptors {
            if validators.contains_key(&tool.name) {
                return Err(ToolError::internal(format!(
                    "Tool '{}' is registered twice",
                    tool.name
                )));
            }
            let rendered = tool.schema.to_json_schema();
            let compiled = JSONSchema::compile(&rendered).map_err(|err| {
                ToolError::internal(format!("Schema for '{}' does not compile: {}", tool.name, err))
            })?;
            validators.insert(tool.name.clone(), compiled);
        }
        Ok(Self {
            descriptors,
            validators,
        })
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|tool| tool.name.as_str()).collect()
    }

    /// Structural check only: types, enums, required fields and alternative groups.
    pub fn validate_args(&self, tool_name: &str, args: &Value) -> Result<(), ToolError> {
        let (Some(tool), Some(validator)) = (self.get(tool_name), self.validators.get(tool_name))
        else {
            return Err(ToolError::unknown_tool(tool_name));
        };
        if let Err(errors) = validator.validate(args) {
            let problems: Vec<String> = errors
                .take(SCHEMA_ERRORS_SHOWN)
                .map(|err| {
                    let path = err.instance_path.to_string();
                    let location = if path.is_empty() { "(root)".to_string() } else { path };
                    describe_violation(&location, &err.kind, args, &tool.schema, &err.to_string())
                })
                .collect();
            let mut lines = vec![format!("Invalid arguments for {}:", tool_name)];
            lines.extend(problems.into_iter().map(|line| format!("- {}", line)));
            return Err(ToolError::invalid_params(lines.join("\n")));
        }
        Ok(())
    }
}

fn describe_violation(
    location: &str,
    kind: &ValidationErrorKind,
    args: &Value,
    schema: &ParameterSchema,
    fallback: &str,
) -> String {
    match kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            format!("{}: missing required field '{}'", location, name)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            let known = schema.field_names();
            unexpected
                .iter()
                .map(|field| {
                    let hints = suggest(field, &known, 3);
                    if hints.is_empty() {
                        format!("{}: unknown field '{}'", location, field)
                    } else {
                        format!(
                            "{}: unknown field '{}' (did you mean {}?)",
                            location,
                            field,
                            hints.join(", ")
                        )
                    }
                })
                .collect::<Vec<_>>()
                .join("; ")
        }
        ValidationErrorKind::Enum { options } => {
            let allowed: Vec<&str> = options
                .as_array()
                .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let received = args
                .pointer(location)
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let hints = suggest(received, &allowed, 1);
            let mut line = format!("{}: expected one of {}", location, allowed.join(", "));
            if let Some(hint) = hints.first() {
                line.push_str(&format!(" (did you mean {}?)", hint));
            }
            line
        }
        ValidationErrorKind::Type { kind } => {
            format!("{}: expected {}", location, format_type_kind(kind))
        }
        ValidationErrorKind::AnyOf if location == "(root)" && !schema.alternatives.is_empty() => {
            let groups: Vec<String> = schema
                .alternatives
                .iter()
                .map(|group| group.join(" + "))
                .collect();
            format!("{}: provide {}", location, groups.join(" or "))
        }
        _ => format!("{}: {}", location, fallback),
    }
}

fn format_type_kind(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Single(primitive) => primitive.to_string(),
        TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}
