//! Declarative parameter schemas for tool descriptors.
//!
//! Schemas are plain data. They render to JSON Schema for `tools/list` and for
//! the structural check the dispatcher runs before a handler sees its arguments.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Enum(Vec<&'static str>),
    Array(Box<FieldKind>),
    /// `None` accepts any object.
    Object(Option<ParameterSchema>),
}

impl FieldKind {
    fn to_json_schema(&self) -> Value {
        match self {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Enum(values) => json!({"type": "string", "enum": values}),
            FieldKind::Array(items) => json!({"type": "array", "items": items.to_json_schema()}),
            FieldKind::Object(None) => json!({"type": "object", "additionalProperties": true}),
            FieldKind::Object(Some(schema)) => schema.to_json_schema(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSchema {
    pub fields: Vec<FieldSpec>,
    /// Satisfied when every field of at least one group is present.
    pub alternatives: Vec<Vec<&'static str>>,
    pub allow_unknown: bool,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn one_of_groups(mut self, groups: Vec<Vec<&'static str>>) -> Self {
        self.alternatives = groups;
        self
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut node = field.kind.to_json_schema();
            if let Value::Object(obj) = &mut node {
                obj.insert(
                    "description".to_string(),
                    Value::String(field.description.to_string()),
                );
                if let Some(default) = &field.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(field.name.to_string(), node);
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        let required = self.required_fields();
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        if !self.alternatives.is_empty() {
            let groups: Vec<Value> = self
                .alternatives
                .iter()
                .map(|group| json!({"required": group}))
                .collect();
            schema.insert("anyOf".to_string(), Value::Array(groups));
        }
        schema.insert(
            "additionalProperties".to_string(),
            Value::Bool(self.allow_unknown),
        );
        Value::Object(schema)
    }
}
