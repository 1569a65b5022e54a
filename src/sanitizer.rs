use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::path;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Output of a sanitization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    /// The cleaned copy of the input.
    pub data: Value,
    /// Paths of every string the pass changed, in visit order.
    pub sanitized_fields: Vec<String>,
}

/// Recursive syntactic cleanup of string values.
///
/// For every string leaf the sanitizer:
/// - Strips HTML tags (`<b>`, `</script>`, `<img src=x>`)
/// - Entity-encodes `& < > " '`
/// - Collapses whitespace runs into a single space and trims the ends
///
/// It knows nothing about schemas or meaning. Object keys, numbers, booleans
/// and nulls pass through untouched. When a string changes, its structural
/// path is recorded so the caller can report what was altered.
///
/// # Examples
///
/// ```
/// use ingress_guard::Sanitizer;
/// use serde_json::json;
///
/// let out = Sanitizer::new().sanitize(&json!({
///     "title": "  <b>Ship</b>   it  ",
///     "tags": ["ok", "a & b"],
/// }));
///
/// assert_eq!(out.data["title"], "Ship it");
/// assert_eq!(out.data["tags"][1], "a &amp; b");
/// assert_eq!(out.sanitized_fields, vec!["tags[1]", "title"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Sanitizer {
    _private: (),
}

impl Sanitizer {
    /// Creates a sanitizer.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Returns a cleaned copy of `input` and the paths that changed.
    pub fn sanitize(&self, input: &Value) -> Sanitized {
        let mut sanitized_fields = Vec::new();
        let data = self.visit(input, "", &mut sanitized_fields);
        Sanitized {
            data,
            sanitized_fields,
        }
    }

    fn visit(&self, value: &Value, at: &str, changed: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => {
                let cleaned = clean_string(s);
                if cleaned != *s {
                    changed.push(path::display(at).to_string());
                }
                Value::String(cleaned)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.visit(item, &path::child_index(at, i), changed))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, item) in map {
                    let cleaned = self.visit(item, &path::child_key(at, key), changed);
                    out.insert(key.clone(), cleaned);
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }
}

/// Applies tag stripping, entity encoding and whitespace normalization.
fn clean_string(raw: &str) -> String {
    let stripped = TAG.replace_all(raw, "");
    let encoded = encode_entities(&stripped);
    WHITESPACE.replace_all(&encoded, " ").trim().to_string()
}

fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
