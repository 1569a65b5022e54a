//! Tool-specific semantic checks that schemas cannot express.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CANONICAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("canonical name pattern is valid"));

static UUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid pattern is valid")
});

/// A pure semantic rule. Pushes one message per violation.
pub type RuntimeRule = Arc<dyn Fn(&Value, &mut Vec<String>) + Send + Sync>;

/// Outcome of runtime validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeReport {
    /// True when no rule reported an error.
    pub success: bool,
    /// Accumulated messages.
    pub errors: Vec<String>,
}

/// Registry of per-tool semantic rules plus rules applied to every tool.
///
/// Lookup is by exact tool name. Tools with no registered rules still get the
/// universal rules. Adding a tool never touches the dispatcher: call
/// [`register`](Self::register).
///
/// # Examples
///
/// ```
/// use ingress_guard::RuntimeTypeValidator;
/// use serde_json::json;
///
/// let validator = RuntimeTypeValidator::with_defaults();
///
/// let report = validator.validate("naming_register", &json!({"canonicalName": "123abc"}));
/// assert!(!report.success);
/// assert!(report.errors[0].contains("start with letter"));
/// ```
#[derive(Clone, Default)]
pub struct RuntimeTypeValidator {
    by_tool: HashMap<String, Vec<RuntimeRule>>,
    universal: Vec<RuntimeRule>,
}

impl RuntimeTypeValidator {
    /// Creates a validator with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator with the built-in tool rules.
    pub fn with_defaults() -> Self {
        Self::new()
            .register("context_store", context_content_not_blank)
            .register("naming_register", canonical_name_is_identifier)
            .register("project_create", project_name_has_no_slash)
            .register("task_create", task_title_is_not_placeholder)
            .register_universal(ids_are_uuid_shaped)
    }

    /// Adds a rule for one tool.
    pub fn register<F>(mut self, tool: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Value, &mut Vec<String>) + Send + Sync + 'static,
    {
        self.by_tool.entry(tool.into()).or_default().push(Arc::new(rule));
        self
    }

    /// Adds a rule applied to every tool.
    pub fn register_universal<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Value, &mut Vec<String>) + Send + Sync + 'static,
    {
        self.universal.push(Arc::new(rule));
        self
    }

    /// Returns true if tool-specific rules exist for `tool`.
    pub fn has_rules_for(&self, tool: &str) -> bool {
        self.by_tool.contains_key(tool)
    }

    /// Runs tool rules then universal rules against `args`.
    pub fn validate(&self, tool: &str, args: &Value) -> RuntimeReport {
        let mut errors = Vec::new();
        if let Some(rules) = self.by_tool.get(tool) {
            for rule in rules {
                rule(args, &mut errors);
            }
        }
        for rule in &self.universal {
            rule(args, &mut errors);
        }
        RuntimeReport {
            success: errors.is_empty(),
            errors,
        }
    }
}

impl std::fmt::Debug for RuntimeTypeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tools: Vec<&str> = self.by_tool.keys().map(String::as_str).collect();
        tools.sort_unstable();
        f.debug_struct("RuntimeTypeValidator")
            .field("tools", &tools)
            .field("universal_rules", &self.universal.len())
            .finish()
    }
}

fn str_field<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// `context_store`: string content must have non-whitespace characters.
pub fn context_content_not_blank(args: &Value, errors: &mut Vec<String>) {
    if let Some(content) = str_field(args, "content") {
        if content.trim().is_empty() {
            errors.push("Content cannot be empty string".to_string());
        }
    }
}

/// `naming_register`: canonical names are identifiers.
pub fn canonical_name_is_identifier(args: &Value, errors: &mut Vec<String>) {
    if let Some(name) = str_field(args, "canonicalName") {
        if !CANONICAL_NAME.is_match(name) {
            errors.push(
                "Canonical name must start with letter and contain only letters, numbers, and underscores"
                    .to_string(),
            );
        }
    }
}

/// `project_create`: names become path segments downstream.
pub fn project_name_has_no_slash(args: &Value, errors: &mut Vec<String>) {
    if let Some(name) = str_field(args, "name") {
        if name.contains('/') {
            errors.push("Project name cannot contain forward slashes".to_string());
        }
    }
}

/// `task_create`: reject the placeholder title `test`.
pub fn task_title_is_not_placeholder(args: &Value, errors: &mut Vec<String>) {
    if let Some(title) = str_field(args, "title") {
        if title.trim().eq_ignore_ascii_case("test") {
            errors.push("Task title cannot be just \"test\"".to_string());
        }
    }
}

/// Every tool: `projectId` and `sessionId`, when present, are UUID-shaped.
pub fn ids_are_uuid_shaped(args: &Value, errors: &mut Vec<String>) {
    for key in ["projectId", "sessionId"] {
        match args.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) if UUID_SHAPE.is_match(id) => {}
            Some(_) => errors.push(format!("Invalid {key} format: must be a valid UUID")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROJECT: &str = "6f1c0a52-3b7e-4d8e-9a41-2c5d7e8f9a0b";

    fn check(tool: &str, args: Value) -> RuntimeReport {
        RuntimeTypeValidator::with_defaults().validate(tool, &args)
    }

    #[test]
    fn whitespace_content_is_rejected() {
        let report = check("context_store", json!({"content": "   "}));
        assert!(!report.success);
        assert_eq!(report.errors, vec!["Content cannot be empty string"]);
    }

    #[test]
    fn non_string_content_is_left_to_schema() {
        assert!(check("context_store", json!({"content": 5})).success);
        assert!(check("context_store", json!({"content": "notes"})).success);
    }

    #[test]
    fn canonical_name_must_be_identifier() {
        let report = check("naming_register", json!({"canonicalName": "123abc"}));
        assert!(!report.success);
        assert!(report.errors[0].contains("start with letter"));

        assert!(check("naming_register", json!({"canonicalName": "user_id2"})).success);
        assert!(!check("naming_register", json!({"canonicalName": "user-id"})).success);
        assert!(!check("naming_register", json!({"canonicalName": ""})).success);
    }

    #[test]
    fn project_name_rejects_slash() {
        let report = check("project_create", json!({"name": "a/b"}));
        assert_eq!(report.errors, vec!["Project name cannot contain forward slashes"]);
        assert!(check("project_create", json!({"name": "ab"})).success);
    }

    #[test]
    fn placeholder_task_title_is_rejected() {
        for title in ["test", "TEST", " Test "] {
            let report = check("task_create", json!({ "title": title }));
            assert_eq!(report.errors, vec!["Task title cannot be just \"test\""]);
        }
        assert!(check("task_create", json!({"title": "test the parser"})).success);
    }

    #[test]
    fn universal_id_rule_applies_to_any_tool() {
        let report = check("anything", json!({"projectId": "nope", "sessionId": 7}));
        assert_eq!(
            report.errors,
            vec![
                "Invalid projectId format: must be a valid UUID",
                "Invalid sessionId format: must be a valid UUID",
            ]
        );
        assert!(check("anything", json!({"projectId": PROJECT})).success);
        assert!(check("anything", json!({"projectId": PROJECT.to_uppercase()})).success);
        assert!(check("anything", json!({"sessionId": null})).success);
    }

    #[test]
    fn errors_accumulate_across_rules() {
        let report = check("task_create", json!({"title": "test", "projectId": "bad"}));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn registry_is_open_for_extension() {
        let validator = RuntimeTypeValidator::new().register("decision_log", |args, errors| {
            if args.get("rationale").is_none() {
                errors.push("Decision needs a rationale".to_string());
            }
        });

        assert!(validator.has_rules_for("decision_log"));
        assert!(!validator.has_rules_for("task_create"));
        assert!(!validator.validate("decision_log", &json!({})).success);
        assert!(validator.validate("task_create", &json!({"title": "test"})).success);
    }
}
