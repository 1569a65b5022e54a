/// Tool arguments that passed the full ingress pipeline.
///
/// `Verified<T>` is proof that a value went through size checking, threat
/// scanning, sanitization, schema validation and runtime validation.
/// [`RequestLogger::wrap_operation`](crate::RequestLogger::wrap_operation)
/// only accepts `Verified` arguments, so business logic cannot run on
/// rejected input.
///
/// # Construction Invariants
///
/// There is no public constructor and no `From<T>` impl. The only source is
/// [`ValidationResult::into_verified`](crate::ValidationResult::into_verified),
/// which returns an error unless validation succeeded.
///
/// ```compile_fail
/// use ingress_guard::Verified;
///
/// let verified = Verified::new_unchecked(serde_json::json!({}));
/// ```
///
/// # Access
///
/// - [`AsRef::as_ref`]: borrow the validated value
/// - [`into_inner`](Self::into_inner): consume and extract it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Wraps a value without validation.
    ///
    /// `pub(crate)`: callers must have run the ingress pipeline first.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the wrapper and returns the validated value.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verified_as_ref_does_not_consume() {
        let verified = Verified::new_unchecked(json!({"title": "write docs"}));

        let ref1 = verified.as_ref();
        let ref2 = verified.as_ref();
        assert_eq!(ref1, ref2);

        let value = verified.into_inner();
        assert_eq!(value["title"], "write docs");
    }

    #[test]
    fn verified_derives_work() {
        let v1 = Verified::new_unchecked("data".to_string());
        let v2 = v1.clone();

        assert_eq!(v1, v2);
        let debug_output = format!("{:?}", v1);
        assert!(debug_output.contains("Verified"));
    }
}
