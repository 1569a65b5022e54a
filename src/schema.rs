//! Per-tool argument schemas.
//!
//! The ingress pipeline depends only on the [`ToolSchema`] contract. Hosts may
//! plug in their own schema types; [`JsonSchemaTool`] covers the common case
//! of a JSON Schema document per tool.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::error::SchemaError;

/// Parses and validates the arguments of one tool.
pub trait ToolSchema: Send + Sync {
    /// Returns the validated arguments, possibly normalized.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when `args` do not conform.
    fn parse(&self, args: &Value) -> Result<Value, SchemaError>;

    /// Top-level fields that must be present.
    ///
    /// Used by the quick shape check; full validation goes through `parse`.
    fn required_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A tool schema backed by a JSON Schema (draft 2020-12) document.
///
/// # Examples
///
/// ```
/// use ingress_guard::{JsonSchemaTool, ToolSchema};
/// use serde_json::json;
///
/// let schema = JsonSchemaTool::compile(&json!({
///     "type": "object",
///     "required": ["title"],
///     "properties": {"title": {"type": "string"}}
/// }))
/// .unwrap();
///
/// assert!(schema.parse(&json!({"title": "x"})).is_ok());
/// assert!(schema.parse(&json!({})).is_err());
/// assert_eq!(schema.required_fields(), vec!["title"]);
/// ```
pub struct JsonSchemaTool {
    validator: Validator,
    required: Vec<String>,
}

impl JsonSchemaTool {
    /// Compiles a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Compile`] if the document is not a valid schema.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| SchemaError::Compile(err.to_string()))?;
        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            validator,
            required,
        })
    }
}

impl ToolSchema for JsonSchemaTool {
    fn parse(&self, args: &Value) -> Result<Value, SchemaError> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(args)
            .map(|err| err.to_string())
            .collect();
        if messages.is_empty() {
            Ok(args.clone())
        } else {
            Err(SchemaError::Invalid(messages))
        }
    }

    fn required_fields(&self) -> Vec<String> {
        self.required.clone()
    }
}

impl fmt::Debug for JsonSchemaTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaTool")
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Mapping from tool name to its schema.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<dyn ToolSchema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the schema for `tool`.
    pub fn register(&mut self, tool: impl Into<String>, schema: impl ToolSchema + 'static) {
        self.schemas.insert(tool.into(), Arc::new(schema));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: impl Into<String>, schema: impl ToolSchema + 'static) -> Self {
        self.register(tool, schema);
        self
    }

    /// Returns the schema for `tool`.
    pub fn get(&self, tool: &str) -> Option<&dyn ToolSchema> {
        self.schemas.get(tool).map(|s| s.as_ref())
    }

    /// Returns true if `tool` has a schema.
    pub fn contains(&self, tool: &str) -> bool {
        self.schemas.contains_key(tool)
    }

    /// Parses `args` with the schema for `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTool`] when nothing is registered, or the
    /// schema's own error.
    pub fn parse(&self, tool: &str, args: &Value) -> Result<Value, SchemaError> {
        match self.get(tool) {
            Some(schema) => schema.parse(args),
            None => Err(SchemaError::UnknownTool(tool.to_string())),
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tools: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        tools.sort_unstable();
        f.debug_struct("SchemaRegistry").field("tools", &tools).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_schema() -> JsonSchemaTool {
        JsonSchemaTool::compile(&json!({
            "type": "object",
            "required": ["title"],
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "priority": {"type": "integer", "minimum": 1, "maximum": 5}
            }
        }))
        .unwrap()
    }

    #[test]
    fn valid_args_pass_through() {
        let schema = task_schema();
        let args = json!({"title": "write docs", "priority": 2});
        assert_eq!(schema.parse(&args).unwrap(), args);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = task_schema().parse(&json!({"priority": 2})).unwrap_err();
        match err {
            SchemaError::Invalid(messages) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].contains("title"), "{messages:?}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn every_violation_is_reported() {
        let err = task_schema()
            .parse(&json!({"title": 5, "priority": 9}))
            .unwrap_err();
        let SchemaError::Invalid(messages) = err else {
            panic!("expected invalid");
        };
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn invalid_schema_does_not_compile() {
        let result = JsonSchemaTool::compile(&json!({"type": 12}));
        assert!(matches!(result, Err(SchemaError::Compile(_))));
    }

    #[test]
    fn registry_reports_unknown_tool() {
        let registry = SchemaRegistry::new().with("task_create", task_schema());

        assert!(registry.contains("task_create"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.parse("nope", &json!({})),
            Err(SchemaError::UnknownTool("nope".into()))
        );
        assert!(registry.parse("task_create", &json!({"title": "x"})).is_ok());
    }

    #[test]
    fn custom_schema_types_plug_in() {
        struct AnyObject;
        impl ToolSchema for AnyObject {
            fn parse(&self, args: &Value) -> Result<Value, SchemaError> {
                if args.is_object() {
                    Ok(args.clone())
                } else {
                    Err(SchemaError::Invalid(vec!["expected object".into()]))
                }
            }
        }

        let registry = SchemaRegistry::new().with("free", AnyObject);
        assert!(registry.parse("free", &json!({})).is_ok());
        assert!(registry.parse("free", &json!([])).is_err());
        assert!(registry.get("free").unwrap().required_fields().is_empty());
    }
}
