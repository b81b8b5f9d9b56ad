//! Stack orchestration scenarios across the real services.

use microstack_cfn::{ResourceStatus, StackStatus};

use crate::{node_available, parse_payload, test_stack};

const DEPENDENT_TEMPLATE: &str = r#"{
    "Resources": {
        "Logs": {
            "Type": "AWS::Logs::LogGroup",
            "Properties": {"LogGroupName": "/aws/lambda/g"}
        },
        "Fn": {
            "Type": "AWS::Lambda::Function",
            "DependsOn": "Logs",
            "Properties": {
                "FunctionName": "g",
                "Runtime": "nodejs18.x",
                "Role": "arn:aws:iam::000000000000:role/stack",
                "Handler": "index.handler",
                "Code": {"ZipFile": "export async function handler() { return { ok: true }; }"}
            }
        }
    }
}"#;

#[tokio::test]
async fn test_should_create_stack_and_provision_real_resources() {
    let stack = test_stack();
    stack
        .orchestrator
        .create_stack("demo", DEPENDENT_TEMPLATE)
        .await
        .unwrap();

    let described = stack.orchestrator.describe_stacks(Some("demo")).unwrap();
    assert_eq!(described[0].status, StackStatus::CreateComplete);

    let resources = stack.orchestrator.describe_stack_resources("demo").unwrap();
    assert_eq!(resources.len(), 2);
    assert!(
        resources
            .iter()
            .all(|r| r.status == ResourceStatus::CreateComplete)
    );

    // The adapters really provisioned into the other subsystems.
    assert_eq!(stack.logs.describe_groups("/aws/lambda/g").len(), 1);
    assert!(stack.registry.get("g").is_ok());
}

#[tokio::test]
async fn test_should_invoke_function_created_by_stack() {
    if !node_available() {
        eprintln!("skipping: node not found on PATH");
        return;
    }
    let stack = test_stack();
    stack
        .orchestrator
        .create_stack("demo", DEPENDENT_TEMPLATE)
        .await
        .unwrap();

    let result = stack.runtime.invoke("g", b"").await.unwrap();
    assert!(result.function_error.is_none());
    assert_eq!(parse_payload(&result.payload), serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn test_should_reach_delete_complete_when_function_was_deleted_directly() {
    let stack = test_stack();
    stack
        .orchestrator
        .create_stack("demo", DEPENDENT_TEMPLATE)
        .await
        .unwrap();

    // The caller deletes the function behind the stack's back.
    stack.registry.delete("g").unwrap();

    stack.orchestrator.delete_stack("demo").await.unwrap();
    let described = stack.orchestrator.describe_stacks(Some("demo")).unwrap();
    assert_eq!(described[0].status, StackStatus::DeleteComplete);
    assert!(
        described[0]
            .resources
            .iter()
            .all(|r| r.status == ResourceStatus::DeleteComplete)
    );

    // The log group really is gone too.
    assert!(stack.logs.describe_groups("/aws/lambda/g").is_empty());
}

#[tokio::test]
async fn test_should_fail_stack_delete_when_bucket_not_empty() {
    let stack = test_stack();
    let body = r#"{
        "Resources": {
            "Data": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "held-bucket"}}
        }
    }"#;
    stack.orchestrator.create_stack("demo", body).await.unwrap();

    stack
        .objects
        .put_object("held-bucket", "k", bytes::Bytes::from_static(b"x"), None)
        .unwrap();

    stack.orchestrator.delete_stack("demo").await.unwrap();
    let described = stack.orchestrator.describe_stacks(Some("demo")).unwrap();
    assert_eq!(described[0].status, StackStatus::DeleteFailed);
}

#[tokio::test]
async fn test_should_update_stack_against_real_services() {
    let stack = test_stack();
    let body = r#"{
        "Resources": {
            "Data": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "first-bucket"}}
        }
    }"#;
    stack.orchestrator.create_stack("demo", body).await.unwrap();

    let new_body = r#"{
        "Resources": {
            "Data": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "second-bucket"}}
        }
    }"#;
    stack.orchestrator.update_stack("demo", new_body).await.unwrap();

    let described = stack.orchestrator.describe_stacks(Some("demo")).unwrap();
    assert_eq!(described[0].status, StackStatus::UpdateComplete);

    let buckets: Vec<String> = stack
        .objects
        .list_buckets()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(buckets, vec!["second-bucket"]);
}

#[tokio::test]
async fn test_should_roll_back_update_when_new_template_fails() {
    let stack = test_stack();
    let body = r#"{
        "Resources": {
            "Data": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "stable-bucket"}}
        }
    }"#;
    stack.orchestrator.create_stack("demo", body).await.unwrap();

    // An invalid bucket name passes template validation (it is a non-empty
    // string) but the object store rejects it at creation time.
    let new_body = r#"{
        "Resources": {
            "Data": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "NOT-VALID"}}
        }
    }"#;
    stack.orchestrator.update_stack("demo", new_body).await.unwrap();

    let described = stack.orchestrator.describe_stacks(Some("demo")).unwrap();
    assert_eq!(described[0].status, StackStatus::UpdateRollbackComplete);

    // The original bucket is back.
    let buckets: Vec<String> = stack
        .objects
        .list_buckets()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(buckets, vec!["stable-bucket"]);
}

#[tokio::test]
async fn test_should_journal_every_transition() {
    let stack = test_stack();
    stack
        .orchestrator
        .create_stack("demo", DEPENDENT_TEMPLATE)
        .await
        .unwrap();
    stack.orchestrator.delete_stack("demo").await.unwrap();

    let events = stack.orchestrator.describe_stack_events("demo").unwrap();
    // Most recent first; the oldest entry is the stack-level
    // CREATE_IN_PROGRESS and the newest is DELETE_COMPLETE.
    assert_eq!(events.last().unwrap().status, "CREATE_IN_PROGRESS");
    assert_eq!(events.first().unwrap().status, "DELETE_COMPLETE");

    let mut ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), events.len(), "event ids are unique");
}
