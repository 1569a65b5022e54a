use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::correlation::CorrelationId;

/// Transport that delivered a tool call. Recorded for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    /// HTTP request body.
    Http,
    /// Standard input framing.
    Stdio,
    /// Websocket message.
    Websocket,
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestSource::Http => write!(f, "http"),
            RequestSource::Stdio => write!(f, "stdio"),
            RequestSource::Websocket => write!(f, "websocket"),
        }
    }
}

/// Per-call metadata supplied by the transport to the validator.
///
/// Immutable once built.
///
/// # Examples
///
/// ```
/// use ingress_guard::{RequestSource, ValidationContext};
///
/// let ctx = ValidationContext::new("task_create", "req-42", RequestSource::Stdio)
///     .with_client_id("cli-7");
///
/// assert_eq!(ctx.tool_name(), "task_create");
/// assert_eq!(ctx.client_id(), Some("cli-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationContext {
    tool_name: String,
    request_id: String,
    client_id: Option<String>,
    timestamp: u64,
    source: RequestSource,
}

impl ValidationContext {
    /// Creates a context stamped with the current time.
    pub fn new(
        tool_name: impl Into<String>,
        request_id: impl Into<String>,
        source: RequestSource,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            request_id: request_id.into(),
            client_id: None,
            timestamp: epoch_millis(),
            source,
        }
    }

    /// Sets the client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Overrides the timestamp (milliseconds since the Unix epoch).
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the tool name.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the client id, if known.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Returns the creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the delivering transport.
    pub fn source(&self) -> RequestSource {
        self.source
    }
}

/// Optional identifiers a caller knows before wrapping an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRequestContext {
    /// Session the call belongs to.
    pub session_id: Option<String>,
    /// Project the call targets.
    pub project_id: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
    /// Upstream correlation id. A fresh one is generated when absent.
    pub correlation_id: Option<CorrelationId>,
}

impl PartialRequestContext {
    /// Creates an empty partial context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session id.
    pub fn session(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the project id.
    pub fn project(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    /// Sets the user id.
    pub fn user(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Carries a correlation id from upstream, typically one accepted by
    /// [`CorrelationId::parse_client`].
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

/// Identity and timing of one wrapped operation.
///
/// Created by [`RequestLogger::wrap_operation`](crate::RequestLogger::wrap_operation)
/// and handed to the operation, so anything it logs can carry the same
/// correlation id. Lives only as long as that call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Correlation id shared by every record of this request.
    pub correlation_id: CorrelationId,
    /// Wrap start, milliseconds since the Unix epoch.
    pub start_time: u64,
    /// Tool being invoked.
    pub tool: String,
    /// Validated arguments.
    pub args: Value,
    /// Session id, if supplied.
    pub session_id: Option<String>,
    /// Project id, if supplied.
    pub project_id: Option<String>,
    /// User id, if supplied.
    pub user_id: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        tool: &str,
        args: Value,
        partial: PartialRequestContext,
    ) -> Self {
        Self {
            correlation_id,
            start_time: epoch_millis(),
            tool: tool.to_string(),
            args,
            session_id: partial.session_id,
            project_id: partial.project_id,
            user_id: partial.user_id,
        }
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
