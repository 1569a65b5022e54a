//! Structural paths into JSON values (`field`, `field[2]`, `field.sub`).
//!
//! Keys that would read as path syntax, or are empty, are written as
//! `["key"]`, so every path names exactly one location.

/// Label used when the offending value is the whole payload.
pub(crate) const ROOT: &str = "root";

/// Appends an object key to a parent path.
pub(crate) fn child_key(parent: &str, key: &str) -> String {
    if needs_quoting(key) {
        let mut out = String::with_capacity(parent.len() + key.len() + 4);
        out.push_str(parent);
        out.push_str("[\"");
        for ch in key.chars() {
            if matches!(ch, '"' | '\\') {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push_str("\"]");
        out
    } else if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Appends an array index to a parent path.
pub(crate) fn child_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Renders a path for messages, naming the top level explicitly.
pub(crate) fn display(path: &str) -> &str {
    if path.is_empty() {
        ROOT
    } else {
        path
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '"', '\\'])
}
