//! Invocation scenarios: round trips, faults, timeouts, and the log trail.

use std::collections::HashMap;

use crate::{create_function, create_function_with, node_available, parse_payload, test_stack};

#[tokio::test]
async fn test_should_invoke_and_observe_code_updates() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function(
        &stack,
        "f",
        "export async function handler() { return { version: 1 }; }",
    )
    .unwrap();

    let result = stack.runtime.invoke("f", b"").await.unwrap();
    assert!(result.function_error.is_none());
    assert_eq!(parse_payload(&result.payload), serde_json::json!({"version": 1}));

    // A code update must be observed by the very next invocation.
    let bundle = microstack_lambda::bundle_from_source(
        "index",
        "export async function handler() { return { version: 2 }; }",
    )
    .unwrap();
    stack.registry.update_code("f", bundle).unwrap();

    let result = stack.runtime.invoke("f", b"").await.unwrap();
    assert!(result.function_error.is_none());
    assert_eq!(parse_payload(&result.payload), serde_json::json!({"version": 2}));
}

#[tokio::test]
async fn test_should_pass_event_and_context_to_handler() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function(
        &stack,
        "echo",
        "export async function handler(event, context) {\
           return { echoed: event, requestId: context.awsRequestId };\
         }",
    )
    .unwrap();

    let result = stack
        .runtime
        .invoke("echo", br#"{"name":"microstack"}"#)
        .await
        .unwrap();
    let payload = parse_payload(&result.payload);
    assert_eq!(payload["echoed"]["name"], "microstack");
    assert!(payload["requestId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_should_capture_handler_fault() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function(
        &stack,
        "boom",
        "export async function handler() { throw new Error(\"boom\"); }",
    )
    .unwrap();

    let result = stack.runtime.invoke("boom", b"").await.unwrap();
    assert_eq!(result.function_error.as_deref(), Some("Unhandled"));
    assert_eq!(
        parse_payload(&result.payload),
        serde_json::json!({"errorType": "Error", "errorMessage": "boom"})
    );
}

#[tokio::test]
async fn test_should_time_out_slow_handler() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function_with(
        &stack,
        "slow",
        "export async function handler() {\
           await new Promise((resolve) => setTimeout(resolve, 1500));\
           return 1;\
         }",
        1,
        HashMap::new(),
    )
    .unwrap();

    let result = stack.runtime.invoke("slow", b"").await.unwrap();
    assert_eq!(result.function_error.as_deref(), Some("Unhandled"));
    assert_eq!(
        parse_payload(&result.payload),
        serde_json::json!({
            "errorType": "TimeoutError",
            "errorMessage": "Task timed out after 1.00 seconds"
        })
    );
}

#[tokio::test]
async fn test_should_receive_environment_in_handler() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    let mut environment = HashMap::new();
    environment.insert("GREETING".to_owned(), "hello".to_owned());
    create_function_with(
        &stack,
        "env",
        "export async function handler() { return process.env.GREETING; }",
        3,
        environment,
    )
    .unwrap();

    let result = stack.runtime.invoke("env", b"").await.unwrap();
    assert_eq!(parse_payload(&result.payload), serde_json::json!("hello"));
}

#[tokio::test]
async fn test_should_write_three_event_log_trail() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function(
        &stack,
        "traced",
        "export async function handler() { return 42; }",
    )
    .unwrap();

    let result = stack.runtime.invoke("traced", b"").await.unwrap();
    assert!(result.function_error.is_none());

    let streams = stack.logs.describe_streams("/aws/lambda/traced", "").unwrap();
    assert_eq!(streams.len(), 1);

    let events = stack
        .logs
        .get_events("/aws/lambda/traced", &streams[0].name)
        .unwrap();
    assert_eq!(events.len(), 3);
    assert!(events[0].message.starts_with("START RequestId: "));
    assert!(events[1].message.starts_with("RESULT "));
    assert!(events[2].message.starts_with("END RequestId: "));

    // The same request id threads through the whole trail.
    let request_id = events[0].message.trim_start_matches("START RequestId: ").to_owned();
    assert!(events[2].message.ends_with(&request_id));
    assert!(events[0].timestamp < events[1].timestamp);
    assert!(events[1].timestamp < events[2].timestamp);
}

#[tokio::test]
async fn test_should_log_error_trail_for_faults() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    create_function(
        &stack,
        "failing",
        "export async function handler() { throw new TypeError(\"bad input\"); }",
    )
    .unwrap();

    let result = stack.runtime.invoke("failing", b"").await.unwrap();
    assert_eq!(result.function_error.as_deref(), Some("Unhandled"));
    assert_eq!(
        parse_payload(&result.payload)["errorType"],
        serde_json::json!("TypeError")
    );

    let streams = stack.logs.describe_streams("/aws/lambda/failing", "").unwrap();
    let events = stack
        .logs
        .get_events("/aws/lambda/failing", &streams[0].name)
        .unwrap();
    assert_eq!(events.len(), 3);
    assert!(events[1].message.starts_with("ERROR "));
    assert!(events[1].message.contains("bad input"));
}

#[tokio::test]
async fn test_should_fail_invocation_of_missing_function() {
    let stack = test_stack();
    let err = stack.runtime.invoke("ghost", b"").await.unwrap_err();
    let carrier: microstack_core::ServiceError = err.into();
    assert!(carrier.is_not_found());
}

#[tokio::test]
async fn test_should_reject_malformed_payload_before_execution() {
    let stack = test_stack();
    create_function(&stack, "f", "export async function handler() { return 1; }").unwrap();

    let err = stack.runtime.invoke("f", b"not json").await.unwrap_err();
    let carrier: microstack_core::ServiceError = err.into();
    assert_eq!(carrier.code, "InvalidRequestContentException");

    // Pre-invocation failures leave no log trail behind.
    assert!(stack.logs.describe_groups("/aws/lambda/f").is_empty());
}
