//! Redaction of tool arguments before they reach telemetry.

use serde_json::{Map, Value};

/// Replacement for values under sensitive keys.
pub const REDACTED: &str = "[REDACTED]";

/// Suffix appended to truncated strings.
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Strings longer than this many characters are truncated.
pub const MAX_LOGGED_STRING_CHARS: usize = 500;

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "token",
    "secret",
    "key",
    "auth",
    "credential",
    "apikey",
    "accesstoken",
    "refreshtoken",
    "sessiontoken",
];

/// Returns a copy of `args` that is safe to log.
///
/// Values under keys whose lowercased name contains a sensitive fragment are
/// replaced wholesale with [`REDACTED`], whatever their type. Remaining
/// strings longer than [`MAX_LOGGED_STRING_CHARS`] are cut and suffixed with
/// [`TRUNCATION_MARKER`]. The input is not modified.
///
/// # Example
///
/// ```
/// use ingress_guard::sanitize_args;
/// use serde_json::json;
///
/// let args = json!({"user": "ada", "password": "hunter2", "nested": {"apiToken": 7}});
/// let safe = sanitize_args(&args);
///
/// assert_eq!(safe["password"], "[REDACTED]");
/// assert_eq!(safe["nested"]["apiToken"], "[REDACTED]");
/// assert_eq!(safe["user"], "ada");
/// assert_eq!(args["password"], "hunter2");
/// ```
pub fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let redacted = if is_sensitive_key(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    sanitize_args(value)
                };
                out.insert(key.clone(), redacted);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_args).collect()),
        Value::String(s) => Value::String(truncate(s)),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(MAX_LOGGED_STRING_CHARS) {
        Some((cut, _)) => format!("{}{}", &s[..cut], TRUNCATION_MARKER),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_top_level_and_nested_keys() {
        let args = json!({
            "password": "p",
            "config": {"token": "t", "name": "ok"},
            "list": [{"ClientSecret": "s"}]
        });
        let safe = sanitize_args(&args);

        assert_eq!(safe["password"], REDACTED);
        assert_eq!(safe["config"]["token"], REDACTED);
        assert_eq!(safe["config"]["name"], "ok");
        assert_eq!(safe["list"][0]["ClientSecret"], REDACTED);
    }

    #[test]
    fn redacts_non_string_values_whole() {
        let safe = sanitize_args(&json!({"auth": {"user": "a", "pass": "b"}, "apiKey": 42}));
        assert_eq!(safe["auth"], REDACTED);
        assert_eq!(safe["apiKey"], REDACTED);
    }

    #[test]
    fn key_fragment_match_is_broad() {
        // "keyword" contains "key"
        let safe = sanitize_args(&json!({"keyword": "rust", "title": "x"}));
        assert_eq!(safe["keyword"], REDACTED);
        assert_eq!(safe["title"], "x");
    }

    #[test]
    fn long_strings_are_truncated() {
        let long = "a".repeat(MAX_LOGGED_STRING_CHARS + 20);
        let safe = sanitize_args(&json!({"body": long}));
        let body = safe["body"].as_str().unwrap();

        assert!(body.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            body.chars().count(),
            MAX_LOGGED_STRING_CHARS + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn exact_limit_is_kept() {
        let s = "é".repeat(MAX_LOGGED_STRING_CHARS);
        assert_eq!(sanitize_args(&json!(s.clone())), json!(s));
    }

    #[test]
    fn input_is_not_mutated() {
        let args = json!({"password": "hunter2", "nested": {"token": "abc"}});
        let before = args.clone();
        let _ = sanitize_args(&args);
        assert_eq!(args, before);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(sanitize_args(&json!(null)), json!(null));
        assert_eq!(sanitize_args(&json!(true)), json!(true));
        assert_eq!(sanitize_args(&json!(3.5)), json!(3.5));
    }
}
