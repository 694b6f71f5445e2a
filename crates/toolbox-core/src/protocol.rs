//! Wire types for the toolbox manifest API

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ToolboxError};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Boolean,
    Array(Box<ParameterType>),
}

impl ParameterType {
    fn parse(kind: &str, items: Option<&RawItemSchema>) -> std::result::Result<Self, String> {
        match kind {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            "array" => {
                let items =
                    items.ok_or_else(|| "type is 'array' but items is missing".to_string())?;
                let inner = Self::parse(&items.kind, items.items.as_deref())?;
                Ok(Self::Array(Box::new(inner)))
            }
            other => Err(format!("unsupported schema type: {other}")),
        }
    }

    /// Whether a JSON value is an instance of this type.
    ///
    /// Integers are accepted where a float is declared.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.accepts(item))),
        }
    }

    fn wire_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(inner) => write!(f, "array<{inner}>"),
            other => f.write_str(other.wire_name()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawItemSchema {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawItemSchema>>,
}

impl From<&ParameterType> for RawItemSchema {
    fn from(kind: &ParameterType) -> Self {
        Self {
            kind: kind.wire_name().to_string(),
            items: match kind {
                ParameterType::Array(inner) => Some(Box::new(Self::from(inner.as_ref()))),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawParameterSchema {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "default_required")]
    required: bool,
    description: String,
    #[serde(rename = "authSources", default, skip_serializing_if = "Option::is_none")]
    auth_sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawItemSchema>>,
}

fn default_required() -> bool {
    true
}

/// A single declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSchema", into = "RawParameterSchema")]
pub struct ParameterSchema {
    pub name: String,
    pub kind: ParameterType,
    pub required: bool,
    pub description: String,
    pub auth_sources: Option<Vec<String>>,
}

impl TryFrom<RawParameterSchema> for ParameterSchema {
    type Error = String;

    fn try_from(raw: RawParameterSchema) -> std::result::Result<Self, Self::Error> {
        let kind = ParameterType::parse(&raw.kind, raw.items.as_deref())
            .map_err(|e| format!("parameter '{}': {e}", raw.name))?;

        Ok(Self {
            name: raw.name,
            kind,
            required: raw.required,
            description: raw.description,
            auth_sources: raw.auth_sources,
        })
    }
}

impl From<ParameterSchema> for RawParameterSchema {
    fn from(param: ParameterSchema) -> Self {
        let items = match &param.kind {
            ParameterType::Array(inner) => Some(Box::new(RawItemSchema::from(inner.as_ref()))),
            _ => None,
        };

        Self {
            name: param.name,
            kind: param.kind.wire_name().to_string(),
            required: param.required,
            description: param.description,
            auth_sources: param.auth_sources,
            items,
        }
    }
}

impl ParameterSchema {
    pub fn new(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
            auth_sources: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_auth_sources(mut self, sources: Vec<String>) -> Self {
        self.auth_sources = Some(sources);
        self
    }

    /// Auth sources that can supply this parameter, if any were declared.
    pub fn auth_sources(&self) -> Option<&[String]> {
        self.auth_sources
            .as_deref()
            .filter(|sources| !sources.is_empty())
    }

    /// Type annotation as shown in generated docs.
    pub fn annotation(&self) -> String {
        if self.required {
            self.kind.to_string()
        } else {
            format!("{}, optional", self.kind)
        }
    }

    /// Checks a supplied argument against the declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return !self.required;
        }
        self.kind.accepts(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub description: String,
    pub parameters: Vec<ParameterSchema>,
    #[serde(rename = "authRequired", default)]
    pub auth_required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSchema {
    #[serde(rename = "serverVersion")]
    pub server_version: String,
    pub tools: BTreeMap<String, ToolSchema>,
}

impl ManifestSchema {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ToolboxError::Schema(e.to_string()))
    }

    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| ToolboxError::Schema(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_manifest_with_defaults() {
        let manifest = ManifestSchema::from_value(json!({
            "serverVersion": "0.7.0",
            "tools": {
                "search_player": {
                    "description": "Search players",
                    "parameters": [
                        {"name": "name", "type": "string", "description": "Player name"},
                        {"name": "active", "type": "boolean", "required": false, "description": "Active only"}
                    ]
                }
            }
        }))
        .unwrap();

        let tool = &manifest.tools["search_player"];
        assert!(tool.auth_required.is_empty());
        assert!(tool.parameters[0].required);
        assert!(!tool.parameters[1].required);
        assert_eq!(tool.parameters[1].kind, ParameterType::Boolean);
    }

    #[test]
    fn test_parses_nested_arrays() {
        let param: ParameterSchema = serde_json::from_value(json!({
            "name": "grid",
            "type": "array",
            "description": "Rows",
            "items": {"name": "row", "type": "array", "description": "", "items": {"type": "integer"}}
        }))
        .unwrap();

        assert_eq!(
            param.kind,
            ParameterType::Array(Box::new(ParameterType::Array(Box::new(
                ParameterType::Integer
            ))))
        );
        assert_eq!(param.annotation(), "array<array<integer>>");
    }

    #[test]
    fn test_rejects_unknown_type() {
        let err = ManifestSchema::from_value(json!({
            "serverVersion": "0.7.0",
            "tools": {
                "t": {
                    "description": "",
                    "parameters": [{"name": "when", "type": "datetime", "description": ""}]
                }
            }
        }))
        .unwrap_err();

        assert!(matches!(err, ToolboxError::Schema(_)));
        assert!(err.to_string().contains("unsupported schema type: datetime"));
    }

    #[test]
    fn test_rejects_array_without_items() {
        let result: std::result::Result<ParameterSchema, _> = serde_json::from_value(json!({
            "name": "ids", "type": "array", "description": ""
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_missing_description() {
        let result: std::result::Result<ParameterSchema, _> =
            serde_json::from_value(json!({"name": "id", "type": "integer"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_type_checks_follow_declaration() {
        let ints = ParameterType::Array(Box::new(ParameterType::Integer));
        assert!(ints.accepts(&json!([1, 2, 3])));
        assert!(!ints.accepts(&json!([1, "2"])));
        assert!(ParameterType::Float.accepts(&json!(3)));
        assert!(!ParameterType::Integer.accepts(&json!(3.5)));
        assert!(!ParameterType::String.accepts(&json!(10)));

        let optional = ParameterSchema::new("limit", ParameterType::Integer, "").optional();
        assert!(optional.accepts(&Value::Null));
        let required = ParameterSchema::new("city", ParameterType::String, "");
        assert!(!required.accepts(&Value::Null));
    }

    #[test]
    fn test_empty_auth_sources_are_not_auth_params() {
        let param =
            ParameterSchema::new("user", ParameterType::String, "").with_auth_sources(Vec::new());
        assert!(param.auth_sources().is_none());
    }

    #[test]
    fn test_serializes_back_to_wire_shape() {
        let param = ParameterSchema::new(
            "ids",
            ParameterType::Array(Box::new(ParameterType::Integer)),
            "Ids",
        )
        .optional();
        let value = serde_json::to_value(&param).unwrap();
        assert_eq!(value["type"], "array");
        assert_eq!(value["items"]["type"], "integer");
        assert_eq!(value["required"], false);
    }
}
