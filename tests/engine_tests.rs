//! Integration tests for the standalone engine.
//!
//! These tests cover:
//! - Dependency ordering of provider calls
//! - When component outputs become available
//! - Error propagation and skipping of dependents
//! - Destroy ordering
//! - Concurrency and the parallelism bound

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;

use staticpage::engine::{
    Engine, Operation, ProviderError, ResourceStatus, SimulatedProvider,
};
use staticpage::error::Error;
use staticpage::output::OutputError;
use staticpage::policy::public_read_policy;
use staticpage::resource::{BucketArgs, BucketPolicyArgs, ResourceKind, ResourceOptions};
use staticpage::site::URL_EXPORT;
use staticpage::state::Stack;

fn position(kinds: &[ResourceKind], kind: &ResourceKind) -> usize {
    kinds
        .iter()
        .position(|k| k == kind)
        .unwrap_or_else(|| panic!("{} never ran", kind))
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_bucket_first_policy_after_access_block() {
    let provider = Arc::new(SimulatedProvider::default());
    let (stack, _) = hello_stack();

    Engine::new(provider.clone()).up(stack).await.unwrap();

    let created: Vec<ResourceKind> = provider
        .events()
        .into_iter()
        .filter(|e| e.operation == Operation::Create)
        .map(|e| e.kind)
        .collect();
    assert_eq!(created.len(), 5);
    assert_eq!(created[0], ResourceKind::Bucket);
    assert!(
        position(&created, &ResourceKind::BucketPublicAccessBlock)
            < position(&created, &ResourceKind::BucketPolicy)
    );
}

#[tokio::test]
async fn test_policy_not_started_while_access_block_pending() {
    let provider = Arc::new(
        GatedProvider::new(Arc::new(SimulatedProvider::default()))
            .gate(ResourceKind::BucketPublicAccessBlock),
    );
    let (stack, page) = hello_stack();
    let engine = Engine::new(provider.clone());

    let check = async {
        provider.wait_for_gated().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let starts = provider.starts();
        assert!(!starts.contains(&ResourceKind::BucketPolicy));
        assert!(starts.contains(&ResourceKind::BucketWebsiteConfiguration));
        assert!(starts.contains(&ResourceKind::BucketObject));
        provider.release();
    };
    let (deployment, ()) = tokio::join!(engine.execute(stack), check);

    assert!(deployment.is_success(), "{:?}", deployment.failure());
    assert_eq!(
        deployment.status_of(&page.policy().urn),
        Some(ResourceStatus::Created)
    );
}

#[tokio::test]
async fn test_public_policy_without_ordering_edge_is_denied() {
    let provider = Arc::new(SimulatedProvider::default());
    let mut stack = Stack::new("site", "test");
    let bucket = stack
        .register_resource("bare", BucketArgs::default(), &ResourceOptions::new())
        .unwrap();
    let name = bucket.string_output("bucket");
    stack
        .register_resource(
            "bare-policy",
            BucketPolicyArgs {
                bucket: name.clone().into(),
                policy: name.apply(|b| public_read_policy(&b)).into(),
            },
            &ResourceOptions::new().parent(&bucket.urn),
        )
        .unwrap();

    let err = Engine::new(provider).up(stack).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::AccessDenied(_))
    ));
}

// ============================================================================
// Outputs
// ============================================================================

#[tokio::test]
async fn test_endpoint_not_ready_until_website_realized() {
    let provider = Arc::new(
        GatedProvider::new(Arc::new(SimulatedProvider::default()))
            .gate(ResourceKind::BucketWebsiteConfiguration),
    );
    let (stack, page) = hello_stack();
    let engine = Engine::new(provider.clone());

    let check = async {
        provider.wait_for_gated().await;
        assert_eq!(provider.inner().bucket_names().len(), 1);
        assert!(page.bucket_name().is_ready());
        assert!(!page.endpoint().is_ready());
        provider.release();
    };
    let (deployment, ()) = tokio::join!(engine.execute(stack), check);

    assert!(deployment.is_success());
    let endpoint = page.endpoint().try_get().unwrap().unwrap();
    assert!(endpoint.starts_with("http://demo-"));
}

#[tokio::test]
async fn test_deployment_carries_component_and_stack_outputs() {
    let provider = Arc::new(SimulatedProvider::default());
    let (mut stack, page) = hello_stack();
    stack.export(URL_EXPORT, page.endpoint().apply(serde_json::Value::String));

    let deployment = Engine::new(provider).up(stack).await.unwrap();

    let endpoint = page.endpoint().resolve().await.unwrap();
    assert_eq!(deployment.outputs[URL_EXPORT], serde_json::json!(endpoint));
    assert_eq!(
        deployment.outputs_of(page.urn()).unwrap()["endpoint"],
        serde_json::json!(endpoint)
    );
    assert_eq!(deployment.summary().created, 6);
    assert_eq!(deployment.completion_order().len(), 5);
    assert_eq!(deployment.completion_order()[0], &page.bucket().urn);
    assert!(deployment.duration() >= chrono::Duration::zero());
}

#[tokio::test]
async fn test_plain_value_inputs_need_no_dependencies() {
    let provider = Arc::new(SimulatedProvider::default());
    let mut stack = Stack::new("site", "test");
    let bucket = stack
        .register_resource(
            "named",
            BucketArgs {
                bucket: Some("my-fixed-bucket".to_string()),
                force_destroy: true,
            },
            &ResourceOptions::new(),
        )
        .unwrap();

    Engine::new(provider.clone()).up(stack).await.unwrap();
    assert_eq!(
        bucket.string_output("bucket").resolve().await.unwrap(),
        "my-fixed-bucket"
    );
    assert_eq!(provider.bucket_names(), vec!["my-fixed-bucket".to_string()]);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_provider_error_returned_unmodified() {
    let provider = Arc::new(SimulatedProvider::default());
    provider.fail_on(
        ResourceKind::BucketPolicy,
        ProviderError::AccessDenied("explicit deny".to_string()),
    );
    let (stack, _) = hello_stack();

    let err = Engine::new(provider).up(stack).await.unwrap_err();
    match err {
        Error::Provider(ProviderError::AccessDenied(message)) => {
            assert_eq!(message, "explicit deny");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_bucket_failure_skips_every_dependent() {
    let provider = Arc::new(SimulatedProvider::default());
    provider.fail_on(
        ResourceKind::Bucket,
        ProviderError::BucketAlreadyExists("demo".to_string()),
    );
    let (stack, page) = hello_stack();

    let deployment = Engine::new(provider.clone()).execute(stack).await;

    assert!(!deployment.is_success());
    let summary = deployment.summary();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 5);
    assert!(provider.events().is_empty());

    assert!(matches!(
        page.bucket_name().resolve().await,
        Err(OutputError::Failed { .. })
    ));
    assert!(page.endpoint().resolve().await.is_err());
}

#[tokio::test]
async fn test_running_siblings_finish_after_failure() {
    let inner = Arc::new(SimulatedProvider::default());
    inner.fail_on(
        ResourceKind::BucketPublicAccessBlock,
        ProviderError::api("PutPublicAccessBlock", "boom"),
    );
    let provider = Arc::new(
        GatedProvider::new(inner).gate(ResourceKind::BucketWebsiteConfiguration),
    );
    let (stack, page) = hello_stack();
    let engine = Engine::new(provider.clone());

    let release_later = async {
        provider.wait_for_gated().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        provider.release();
    };
    let (deployment, ()) = tokio::join!(engine.execute(stack), release_later);

    assert!(matches!(
        deployment.failure(),
        Some(Error::Provider(ProviderError::Api { .. }))
    ));
    assert_eq!(
        deployment.status_of(&page.access_block().urn),
        Some(ResourceStatus::Failed)
    );
    assert_eq!(
        deployment.status_of(&page.website().urn),
        Some(ResourceStatus::Created)
    );
    assert_eq!(
        deployment.status_of(&page.objects()[0].urn),
        Some(ResourceStatus::Created)
    );
    assert_eq!(
        deployment.status_of(&page.policy().urn),
        Some(ResourceStatus::Skipped)
    );
    assert!(!provider.starts().contains(&ResourceKind::BucketPolicy));
}

// ============================================================================
// Destroy
// ============================================================================

#[tokio::test]
async fn test_destroy_removes_children_before_bucket() {
    let provider = Arc::new(SimulatedProvider::default());
    let (stack, page) = stack_with_pages(
        "docs",
        &[("index.html", HELLO), ("about.html", "<p>About</p>")],
    );
    let engine = Engine::new(provider.clone());

    let deployment = engine.up(stack).await.unwrap();
    let deleted = engine.destroy(&deployment).await.unwrap();

    assert_eq!(deleted.len(), 6);
    assert_eq!(deleted.last(), Some(&page.bucket().urn));
    let policy_at = deleted.iter().position(|u| u == &page.policy().urn).unwrap();
    let block_at = deleted
        .iter()
        .position(|u| u == &page.access_block().urn)
        .unwrap();
    assert!(policy_at < block_at);
    assert!(provider.bucket_names().is_empty());

    let deletes = provider
        .events()
        .into_iter()
        .filter(|e| e.operation == Operation::Delete)
        .count();
    assert_eq!(deletes, 6);
}

#[tokio::test]
async fn test_destroy_after_partial_failure_removes_what_exists() {
    let provider = Arc::new(SimulatedProvider::default());
    provider.fail_on(
        ResourceKind::BucketPolicy,
        ProviderError::AccessDenied("deny".to_string()),
    );
    let (stack, _) = hello_stack();
    let engine = Engine::new(provider.clone());

    let deployment = engine.execute(stack).await;
    assert!(!deployment.is_success());

    let deleted = engine.destroy(&deployment).await.unwrap();
    assert_eq!(deleted.len(), 4);
    assert!(provider.bucket_names().is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_branches_run_concurrently() {
    let provider = Arc::new(
        GatedProvider::new(Arc::new(SimulatedProvider::default()))
            .with_delay(Duration::from_millis(30)),
    );
    let (stack, _) = stack_with_pages(
        "docs",
        &[("index.html", HELLO), ("a.html", "a"), ("b.html", "b")],
    );

    Engine::new(provider.clone()).up(stack).await.unwrap();
    assert!(provider.max_in_flight() >= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallelism_bounds_concurrent_creates() {
    let provider = Arc::new(
        GatedProvider::new(Arc::new(SimulatedProvider::default()))
            .with_delay(Duration::from_millis(20)),
    );
    let (stack, _) = stack_with_pages(
        "docs",
        &[
            ("index.html", HELLO),
            ("a.html", "a"),
            ("b.html", "b"),
            ("c.html", "c"),
        ],
    );

    Engine::new(provider.clone())
        .with_parallelism(2)
        .up(stack)
        .await
        .unwrap();
    assert!(provider.max_in_flight() <= 2);
    assert_eq!(provider.inner().bucket_names().len(), 1);
}

#[tokio::test]
async fn test_each_resource_created_once() {
    let provider = Arc::new(CountingProvider::default());
    let (stack, _) = stack_with_pages("docs", &[("index.html", HELLO), ("a.html", "a")]);

    Engine::new(provider.clone()).up(stack).await.unwrap();

    assert_eq!(provider.creates_of(&ResourceKind::Bucket), 1);
    assert_eq!(provider.creates_of(&ResourceKind::BucketObject), 2);
    assert_eq!(provider.creates_of(&ResourceKind::BucketPolicy), 1);
}
