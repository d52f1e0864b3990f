pub mod builtin;
pub mod registry;

pub use registry::{Tool, ToolRegistry};

use crate::datasets::ReferenceData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tool definition sent to the model API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON-schema-shaped description of a tool's input object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: &str) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.to_string(),
            items: None,
            enum_values: None,
        }
    }

    pub fn number(description: &str) -> Self {
        PropertySchema {
            schema_type: "number".to_string(),
            description: description.to_string(),
            items: None,
            enum_values: None,
        }
    }

    pub fn string_enum(description: &str, values: &[&str]) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.to_string(),
            items: None,
            enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    pub fn string_array(description: &str, item_description: &str) -> Self {
        PropertySchema {
            schema_type: "array".to_string(),
            description: description.to_string(),
            items: Some(Box::new(PropertySchema::string(item_description))),
            enum_values: None,
        }
    }
}

/// Tool-level error taxonomy. Both variants are recoverable: the
/// orchestration loop reports them back to the agent as tool-result errors
/// instead of aborting the session.
#[derive(Debug, Clone)]
pub enum ToolError {
    /// Malformed or missing input, naming every offending field
    Validation { fields: Vec<String>, message: String },
    /// The tool's underlying operation failed
    Execution(String),
}

impl ToolError {
    pub fn validation(fields: Vec<String>, message: impl Into<String>) -> Self {
        ToolError::Validation {
            fields,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        ToolError::Execution(message.into())
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Validation { fields, message } => {
                if fields.is_empty() {
                    write!(f, "validation error: {}", message)
                } else {
                    write!(f, "validation error ({}): {}", fields.join(", "), message)
                }
            }
            ToolError::Execution(message) => write!(f, "execution error: {}", message),
        }
    }
}

impl std::error::Error for ToolError {}

/// Context handed to every tool execution. Tools in this system are pure
/// functions of their validated input plus the read-only reference data
/// loaded at process start; they never mutate shared state, so repeated
/// invocation with identical input yields identical output. A tool that did
/// mutate external state would have to serialize access per resource.
#[derive(Clone)]
pub struct ToolContext {
    pub data: Arc<ReferenceData>,
}

impl ToolContext {
    pub fn new(data: Arc<ReferenceData>) -> Self {
        ToolContext { data }
    }
}

fn value_matches(schema: &PropertySchema, value: &Value) -> bool {
    match schema.schema_type.as_str() {
        "string" => match value.as_str() {
            Some(s) => schema
                .enum_values
                .as_ref()
                .map(|allowed| allowed.iter().any(|v| v == s))
                .unwrap_or(true),
            None => false,
        },
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => match value.as_array() {
            Some(items) => schema
                .items
                .as_ref()
                .map(|item_schema| items.iter().all(|i| value_matches(item_schema, i)))
                .unwrap_or(true),
            None => false,
        },
        "object" => value.is_object(),
        _ => true,
    }
}

/// Validate a tool's arguments against its declared input schema.
///
/// Fails with `ToolError::Validation` naming every offending field: required
/// fields that are absent and supplied fields whose type (or enum value)
/// does not match. Unknown extra fields are ignored; models routinely
/// over-supply.
pub fn validate_args(schema: &ToolInputSchema, args: &Value) -> Result<(), ToolError> {
    let object = match args.as_object() {
        Some(o) => o,
        None => {
            return Err(ToolError::validation(
                vec![],
                "arguments must be a JSON object",
            ));
        }
    };

    let mut offending: Vec<String> = vec![];
    let mut reasons: Vec<String> = vec![];

    for required in &schema.required {
        if !object.contains_key(required) || object[required].is_null() {
            offending.push(required.clone());
            reasons.push(format!("missing required field '{}'", required));
        }
    }

    for (name, property) in &schema.properties {
        if let Some(value) = object.get(name) {
            if value.is_null() {
                continue;
            }
            if !value_matches(property, value) {
                offending.push(name.clone());
                reasons.push(format!(
                    "field '{}' does not match type '{}'",
                    name, property.schema_type
                ));
            }
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        offending.sort();
        offending.dedup();
        Err(ToolError::validation(offending, reasons.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> ToolInputSchema {
        let mut properties = HashMap::new();
        properties.insert("location".to_string(), PropertySchema::string("城市名称"));
        properties.insert("room_size".to_string(), PropertySchema::number("房间大小"));
        properties.insert(
            "scope".to_string(),
            PropertySchema::string_enum("装修范围", &["full", "partial", "specific"]),
        );
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec!["location".to_string(), "room_size".to_string()],
        }
    }

    #[test]
    fn accepts_valid_arguments() {
        let schema = sample_schema();
        let args = json!({"location": "北京", "room_size": 90, "scope": "full"});
        assert!(validate_args(&schema, &args).is_ok());
    }

    #[test]
    fn missing_required_field_is_named() {
        let schema = sample_schema();
        let args = json!({"location": "北京"});
        match validate_args(&schema, &args) {
            Err(ToolError::Validation { fields, .. }) => {
                assert_eq!(fields, vec!["room_size".to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn wrong_type_and_bad_enum_are_both_named() {
        let schema = sample_schema();
        let args = json!({"location": 42, "room_size": "ninety", "scope": "everything"});
        match validate_args(&schema, &args) {
            Err(ToolError::Validation { fields, .. }) => {
                assert_eq!(
                    fields,
                    vec![
                        "location".to_string(),
                        "room_size".to_string(),
                        "scope".to_string()
                    ]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let schema = sample_schema();
        assert!(validate_args(&schema, &json!([1, 2, 3])).is_err());
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let schema = sample_schema();
        let args = json!({"location": "上海", "room_size": 75.5, "note": "whatever"});
        assert!(validate_args(&schema, &args).is_ok());
    }

    #[test]
    fn array_items_are_type_checked() {
        let mut properties = HashMap::new();
        properties.insert(
            "features".to_string(),
            PropertySchema::string_array("附加功能", "功能名称"),
        );
        let schema = ToolInputSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec![],
        };

        assert!(validate_args(&schema, &json!({"features": ["地暖", "新风系统"]})).is_ok());
        assert!(validate_args(&schema, &json!({"features": ["地暖", 7]})).is_err());
    }
}
