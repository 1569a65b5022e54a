//! Correlation identifiers for stitching together the records of one request.
//!
//! There is no process-wide "current id". A [`CorrelationIdManager`] is owned
//! by whoever handles one logical request, and the id travels explicitly in
//! [`RequestContext`](crate::RequestContext). Interleaved async requests
//! therefore never observe each other's ids.
//!
//! Client-supplied ids are untrusted input and only enter through
//! [`CorrelationId::parse_client`].

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Maximum accepted length of a client-supplied correlation id.
pub const MAX_CLIENT_CORRELATION_ID_LENGTH: usize = 128;

/// Why a client-supplied correlation id was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationIdRejection {
    /// Empty after trimming.
    EmptyAfterTrim,
    /// Longer than [`MAX_CLIENT_CORRELATION_ID_LENGTH`].
    TooLong,
    /// Contains whitespace.
    ContainsWhitespace,
    /// Contains control characters.
    ContainsControlChar,
    /// Contains non-ASCII characters.
    NonAscii,
    /// Contains ASCII outside `[A-Za-z0-9._:-]`.
    ContainsDisallowedChar,
}

impl CorrelationIdRejection {
    /// Stable label for audit records.
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmptyAfterTrim => "empty_after_trim",
            Self::TooLong => "too_long",
            Self::ContainsWhitespace => "contains_whitespace",
            Self::ContainsControlChar => "contains_control_char",
            Self::NonAscii => "non_ascii",
            Self::ContainsDisallowedChar => "contains_disallowed_char",
        }
    }
}

impl fmt::Display for CorrelationIdRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::error::Error for CorrelationIdRejection {}

/// Opaque identifier shared by every record of one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh random (UUID v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts a client-supplied id after strict token checks.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns the first [`CorrelationIdRejection`] that applies.
    pub fn parse_client(raw: &str) -> Result<Self, CorrelationIdRejection> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CorrelationIdRejection::EmptyAfterTrim);
        }
        if trimmed.len() > MAX_CLIENT_CORRELATION_ID_LENGTH {
            return Err(CorrelationIdRejection::TooLong);
        }
        for ch in trimmed.chars() {
            if !ch.is_ascii() {
                return Err(CorrelationIdRejection::NonAscii);
            }
            if ch.is_ascii_whitespace() {
                return Err(CorrelationIdRejection::ContainsWhitespace);
            }
            if ch.is_ascii_control() {
                return Err(CorrelationIdRejection::ContainsControlChar);
            }
            if !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | ':' | '-')) {
                return Err(CorrelationIdRejection::ContainsDisallowedChar);
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns at most the first eight characters, for compact operation ids.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Holder of the correlation id for one logical request.
///
/// # Examples
///
/// ```
/// use ingress_guard::CorrelationIdManager;
///
/// let mut ids = CorrelationIdManager::new();
/// assert!(ids.get().is_none());
///
/// let id = ids.generate();
/// assert_eq!(ids.get(), Some(&id));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CorrelationIdManager {
    current: Option<CorrelationId>,
}

impl CorrelationIdManager {
    /// Creates a manager with no current id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a new id and makes it current.
    pub fn generate(&mut self) -> CorrelationId {
        let id = CorrelationId::generate();
        self.current = Some(id.clone());
        id
    }

    /// Returns the current id, if any.
    pub fn get(&self) -> Option<&CorrelationId> {
        self.current.as_ref()
    }

    /// Replaces the current id.
    pub fn set(&mut self, id: CorrelationId) {
        self.current = Some(id);
    }
}
