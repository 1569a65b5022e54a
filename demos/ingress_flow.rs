//! Ingress validation and request logging demonstration.
//!
//! This demo walks one tool call through the whole stack:
//! 1. Untrusted arguments arrive as `Tainted<Value>`
//! 2. `IngressValidator` scans, sanitizes and validates them
//! 3. Only a successful result becomes `Verified<Value>`
//! 4. `RequestLogger` runs the business operation with telemetry
//!
//! Run with: `cargo run --example ingress_flow`

use std::time::Duration;

use ingress_guard::{
    CorrelationId, IngressValidator, JsonSchemaTool, PartialRequestContext, PipelineConfig, ProtocolError,
    RequestLogger, RequestSource, Tainted, ValidationContext,
};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .init();

    println!("=== Ingress Flow Demo ===\n");

    let config = PipelineConfig::from_env()?;
    let task_schema = JsonSchemaTool::compile(&json!({
        "type": "object",
        "required": ["title"],
        "properties": {
            "title": {"type": "string", "minLength": 1},
            "projectId": {"type": "string"}
        }
    }))?;

    let validator = IngressValidator::builder()
        .schema("task_create", task_schema)
        .options(config.ingress.clone())
        .build();
    let logger = RequestLogger::new(config.logging.clone());

    println!("--- Scenario 1: Clean Request ---");
    let ctx = ValidationContext::new("task_create", "req-1", RequestSource::Http);
    let raw = json!({
        "title": "  Review <b>release</b>   notes ",
        "projectId": "123e4567-e89b-12d3-a456-426614174000"
    });
    let result = validator.validate_ingress_request("task_create", Tainted::new(raw), &ctx, None);
    println!("success={} sanitized_fields={:?}", result.success, result.sanitized_fields);

    let verified = match result.into_verified() {
        Ok(verified) => verified,
        Err(rejected) => {
            eprintln!("Unexpected rejection: {:?}", rejected.errors);
            return Ok(());
        }
    };

    let created: Result<Value, ProtocolError> = logger
        .wrap_operation(
            "task_create",
            &verified,
            |ctx| async move {
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok(json!({"id": 1, "title": ctx.args["title"], "correlationId": ctx.correlation_id}))
            },
            PartialRequestContext::new()
                .project("123e4567-e89b-12d3-a456-426614174000")
                .correlation_id(CorrelationId::parse_client("gateway-trace-0001")?),
        )
        .await;
    println!("Operation result: {:?}", created);

    println!("\n--- Scenario 2: Malicious Request ---");
    let ctx = ValidationContext::new("task_create", "req-2", RequestSource::Websocket)
        .with_client_id("agent-7");
    let raw = json!({"title": "x", "filters": [{"name": "' OR '1'='1"}]});
    let result = validator.validate_ingress_request("task_create", Tainted::new(raw), &ctx, None);
    println!(
        "blocked={} reason={:?} errors={:?}",
        result.blocked, result.reason, result.errors
    );

    println!("\n--- Scenario 3: Rejected Title ---");
    let ctx = ValidationContext::new("task_create", "req-3", RequestSource::Stdio);
    let result =
        validator.validate_ingress_request("task_create", Tainted::new(json!({"title": "test"})), &ctx, None);
    println!("kind={:?} errors={:?}", result.kind, result.errors);

    println!("\n--- Scenario 4: Quick Shape Check ---");
    println!(
        "quick_validate(title present) = {}",
        validator.quick_validate("task_create", &json!({"title": "x"}))
    );
    println!(
        "quick_validate(title missing) = {}",
        validator.quick_validate("task_create", &json!({}))
    );

    println!("\n=== Demo Complete ===");
    Ok(())
}
