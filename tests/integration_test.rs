use std::sync::Arc;
use std::time::Duration;

use ingress_guard::telemetry::{LogLevel, TelemetryTrail};
use ingress_guard::{
    sanitize_args, CorrelationId, IngressValidator, JsonSchemaTool, LoggerConfig, PartialRequestContext,
    PerformanceMonitor, ProtocolError, RejectionKind, RequestLogger, RequestSource, SchemaRegistry,
    Tainted, ValidationContext, ValidationResult,
};
use serde_json::{json, Value};

fn schema(required: &[&str]) -> JsonSchemaTool {
    JsonSchemaTool::compile(&json!({"type": "object", "required": required})).unwrap()
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with("task_create", schema(&["title"]))
        .with("context_store", schema(&["content"]))
        .with("naming_register", schema(&["canonicalName"]))
        .with("project_create", schema(&["name"]))
        .with("search", schema(&[]))
}

fn pipeline() -> (IngressValidator, Arc<TelemetryTrail>) {
    let trail = Arc::new(TelemetryTrail::new());
    let validator = IngressValidator::builder()
        .schemas(registry())
        .sink(trail.clone())
        .build();
    (validator, trail)
}

fn validate(validator: &IngressValidator, tool: &str, args: Value) -> ValidationResult {
    let ctx = ValidationContext::new(tool, "req-42", RequestSource::Http).with_client_id("agent-1");
    validator.validate_ingress_request(tool, Tainted::new(args), &ctx, None)
}

#[test]
fn clean_input_passes_with_sanitized_data() {
    let (validator, _) = pipeline();
    let result = validate(
        &validator,
        "task_create",
        json!({"title": "Fix   login <em>page</em>", "projectId": "123e4567-e89b-12d3-a456-426614174000"}),
    );

    assert!(result.success);
    assert!(!result.blocked);
    assert!(result.errors.is_empty());
    let data = result.data.unwrap();
    assert_eq!(data["title"], "Fix login page");
    assert_eq!(data["projectId"], "123e4567-e89b-12d3-a456-426614174000");
}

#[test]
fn sql_tautology_blocks_at_any_depth() {
    let (validator, trail) = pipeline();
    let result = validate(
        &validator,
        "search",
        json!({"filters": [{"field": "name", "value": "' OR '1'='1"}]}),
    );

    assert!(!result.success);
    assert!(result.blocked);
    assert_eq!(result.kind, Some(RejectionKind::SecurityThreatDetected));
    assert!(
        result.errors.iter().any(|e| e.contains("filters[0].value")),
        "{:?}",
        result.errors
    );
    assert_eq!(trail.count_at(LogLevel::Warn), 1);
}

#[test]
fn script_tag_is_blocked_not_sanitized() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "task_create", json!({"title": "<script>alert(1)</script>"}));
    assert!(result.blocked);
    assert!(result.data.is_none());
}

#[test]
fn naming_register_requires_leading_letter() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "naming_register", json!({"canonicalName": "123abc"}));

    assert!(!result.success);
    assert!(!result.blocked);
    assert_eq!(result.kind, Some(RejectionKind::RuntimeValidationError));
    assert!(result.errors[0].contains("start with letter"));
}

#[test]
fn task_title_test_is_rejected_not_blocked() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "task_create", json!({"title": " TEST "}));

    assert!(!result.success);
    assert!(!result.blocked);
    assert_eq!(result.errors, vec!["Task title cannot be just \"test\""]);
}

#[test]
fn whitespace_content_is_rejected() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "context_store", json!({"content": "   \t  "}));

    assert!(!result.success);
    assert_eq!(result.errors, vec!["Content cannot be empty string"]);
}

#[test]
fn project_name_with_slash_is_rejected() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "project_create", json!({"name": "a/b"}));
    assert_eq!(result.errors, vec!["Project name cannot contain forward slashes"]);
}

#[test]
fn malformed_session_id_is_rejected_for_any_tool() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "search", json!({"sessionId": "not-a-uuid"}));
    assert_eq!(
        result.errors,
        vec!["Invalid sessionId format: must be a valid UUID"]
    );
}

#[test]
fn monitor_start_end_end_yields_one_sample() {
    let monitor = PerformanceMonitor::new();
    let guard = monitor.start("op_1");

    assert!(monitor.end("op_1").is_some());
    assert!(monitor.end("op_1").is_none());
    assert!(guard.finish().is_none());
    assert_eq!(monitor.in_flight(), 0);
}

#[test]
fn sanitize_args_redacts_without_mutating() {
    let args = json!({"user": "ada", "password": "hunter2", "session": {"token": "abc"}});
    let before = args.clone();

    let safe = sanitize_args(&args);

    assert_eq!(safe["password"], "[REDACTED]");
    assert_eq!(safe["session"]["token"], "[REDACTED]");
    assert_eq!(safe["user"], "ada");
    assert_eq!(args, before);
}

#[tokio::test]
async fn slow_operation_emits_exactly_one_warning() {
    let (validator, _) = pipeline();
    let trail = Arc::new(TelemetryTrail::new());
    let logger = RequestLogger::with_sink(LoggerConfig::default(), trail.clone());

    let args = validate(&validator, "task_create", json!({"title": "Nightly report"}))
        .into_verified()
        .unwrap();

    let out: Result<&str, ProtocolError> = logger
        .wrap_operation(
            "task_create",
            &args,
            |_| async {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                Ok("done")
            },
            PartialRequestContext::new().project("p-1"),
        )
        .await;

    assert_eq!(out, Ok("done"));
    let warnings = trail.at_level(LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].message(), "Slow operation detected");
    assert_eq!(warnings[0].project_id(), Some("p-1"));

    let over = warnings[0].metadata()["overThresholdByMs"].as_u64().unwrap();
    assert!((500..1500).contains(&over), "over threshold by {over}");
}

#[tokio::test]
async fn end_to_end_verified_flow_shares_correlation_id() {
    let (validator, _) = pipeline();
    let trail = Arc::new(TelemetryTrail::new());
    let logger = RequestLogger::with_sink(LoggerConfig::default(), trail.clone());

    let args = validate(&validator, "task_create", json!({"title": "Ship"}))
        .into_verified()
        .unwrap();

    let seen: Result<String, ProtocolError> = logger
        .wrap_operation(
            "task_create",
            &args,
            |ctx| async move {
                assert_eq!(ctx.args["title"], "Ship");
                Ok(ctx.correlation_id.to_string())
            },
            PartialRequestContext::new(),
        )
        .await;

    let id = seen.unwrap();
    let records = trail.records();
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.correlation_id() == Some(id.as_str())));
    assert_eq!(logger.monitor().in_flight(), 0);
}

#[tokio::test]
async fn client_correlation_id_flows_through_wrapped_operation() {
    let (validator, _) = pipeline();
    let trail = Arc::new(TelemetryTrail::new());
    let logger = RequestLogger::with_sink(LoggerConfig::default(), trail.clone());
    let args = validate(&validator, "search", json!({"q": "rust"}))
        .into_verified()
        .unwrap();

    let header = "gateway:7f3a.1";
    let partial = match CorrelationId::parse_client(header) {
        Ok(id) => PartialRequestContext::new().correlation_id(id),
        Err(_) => PartialRequestContext::new(),
    };
    let seen: Result<String, ProtocolError> = logger
        .wrap_operation(
            "search",
            &args,
            |ctx| async move { Ok(ctx.correlation_id.to_string()) },
            partial,
        )
        .await;

    assert_eq!(seen.unwrap(), header);
    assert!(trail.records().iter().all(|r| r.correlation_id() == Some(header)));
}

#[tokio::test]
async fn rejected_client_correlation_id_falls_back_to_generated() {
    let trail = Arc::new(TelemetryTrail::new());
    let logger = RequestLogger::with_sink(LoggerConfig::default(), trail.clone());
    let (validator, _) = pipeline();
    let args = validate(&validator, "search", json!({}))
        .into_verified()
        .unwrap();

    let partial = match CorrelationId::parse_client("bad id with spaces") {
        Ok(id) => PartialRequestContext::new().correlation_id(id),
        Err(_) => PartialRequestContext::new(),
    };
    let seen: Result<String, ProtocolError> = logger
        .wrap_operation("search", &args, |ctx| async move { Ok(ctx.correlation_id.to_string()) }, partial)
        .await;

    let id = seen.unwrap();
    assert_ne!(id, "bad id with spaces");
    assert_eq!(id.len(), 36);
    assert!(trail.records().iter().all(|r| r.correlation_id() == Some(id.as_str())));
}

#[tokio::test]
async fn concurrent_requests_keep_separate_correlation_ids() {
    let (validator, _) = pipeline();
    let logger = Arc::new(RequestLogger::with_sink(
        LoggerConfig::default(),
        Arc::new(TelemetryTrail::new()),
    ));
    let args = validate(&validator, "search", json!({"q": "rust"}))
        .into_verified()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let logger = Arc::clone(&logger);
        let args = args.clone();
        handles.push(tokio::spawn(async move {
            let out: Result<String, ProtocolError> = logger
                .wrap_operation(
                    "search",
                    &args,
                    |ctx| async move {
                        let before = ctx.correlation_id.clone();
                        tokio::task::yield_now().await;
                        assert_eq!(before, ctx.correlation_id);
                        Ok(ctx.correlation_id.to_string())
                    },
                    PartialRequestContext::new(),
                )
                .await;
            out.unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(logger.monitor().in_flight(), 0);
}

#[test]
fn blocked_results_cannot_become_verified() {
    let (validator, _) = pipeline();
    let result = validate(&validator, "search", json!({"q": "1 UNION SELECT password FROM users"}));
    assert!(result.blocked);
    assert!(result.into_verified().is_err());
}
