use std::fmt;

use serde_json::Value;

/// Untrusted tool arguments as they arrived at the ingress boundary.
///
/// `Tainted<T>` marks data from a transport (HTTP body, stdio frame, websocket
/// message) that has not been through
/// [`IngressValidator::validate_ingress_request`](crate::IngressValidator::validate_ingress_request).
/// The inner value is only reachable from inside this crate, so the only way
/// to get usable arguments out is a successful validation, which yields a
/// [`Verified<T>`](crate::Verified).
///
/// # Examples
///
/// ```
/// use ingress_guard::Tainted;
/// use serde_json::json;
///
/// let args = Tainted::new(json!({"title": "'; DROP TABLE tasks; --"}));
///
/// // Debug output still shows the payload for diagnostics
/// assert!(format!("{:?}", args).contains("Tainted"));
/// ```
// Clone stays: the pipeline may need a copy for partial results.
#[derive(Clone)]
pub struct Tainted<T> {
    // Must stay private. A public field bypasses ingress validation entirely.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Borrows the raw value for scanning.
    ///
    /// `pub(crate)`: only the pipeline stages may look inside.
    pub(crate) fn peek(&self) -> &T {
        &self.inner
    }
}

impl Tainted<Value> {
    /// Returns true when the payload is a JSON object.
    ///
    /// Shape information is not sensitive, so this is available to transports
    /// that want to reject obviously malformed frames early.
    pub fn is_object(&self) -> bool {
        self.inner.is_object()
    }
}

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}

impl From<Value> for Tainted<Value> {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tainted_wraps_value() {
        let user_input = Tainted::new("malicious input".to_string());
        let debug_output = format!("{:?}", user_input);

        assert!(debug_output.contains("Tainted"));
        assert!(debug_output.contains("malicious input"));
    }

    #[test]
    fn peek_borrows_without_consuming() {
        let tainted = Tainted::new(json!({"a": 1}));
        assert_eq!(tainted.peek()["a"], 1);
        assert!(tainted.is_object());
    }

    #[test]
    fn converts_from_json_value() {
        let tainted: Tainted<Value> = json!([1, 2]).into();
        assert!(!tainted.is_object());
        assert_eq!(tainted.peek(), &json!([1, 2]));
    }
}
