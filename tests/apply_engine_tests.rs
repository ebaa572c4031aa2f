//! # Apply Engine Tests
//!
//! Convergence behaviour of the apply engine against an in-memory cluster:
//! - re-applying an identical set is a no-op
//! - conflicts are retried up to the attempt budget
//! - disabling a component sweeps exactly the objects it owns
//! - the first failing resource aborts the batch

mod common;

use common::{owner, FakeCluster};
use datasciencecluster_controller::constants::{COMPONENT_LABEL, GENERATED_RESOURCE_LABEL};
use datasciencecluster_controller::controller::apply::{ApplyEngine, ConflictRetry, ManagedScope};
use datasciencecluster_controller::controller::manifests::{ResourceDocument, ResourceKey};
use datasciencecluster_controller::error::{ClientError, Error};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn engine(fake: &Arc<FakeCluster>, max_attempts: u32) -> ApplyEngine {
    ApplyEngine::new(
        fake.clone(),
        "datasciencecluster-controller",
        ConflictRetry::new(max_attempts, Duration::ZERO),
    )
}

fn scope(component: &str) -> ManagedScope {
    ManagedScope::new(owner("default-dsc"), component)
}

fn doc(value: serde_json::Value) -> ResourceDocument {
    ResourceDocument::from_value(value).expect("valid document")
}

fn config_map(name: &str, value: &str) -> ResourceDocument {
    doc(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": "opendatahub"},
        "data": {"key": value}
    }))
}

fn deployment(name: &str) -> ResourceDocument {
    doc(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": "opendatahub"},
        "spec": {"replicas": 1}
    }))
}

fn service(name: &str) -> ResourceDocument {
    doc(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": "opendatahub"},
        "spec": {"ports": [{"name": "http", "port": 8080}]}
    }))
}

fn namespace(name: &str) -> ResourceDocument {
    doc(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {"name": name}
    }))
}

fn cm_key(name: &str) -> ResourceKey {
    ResourceKey::new("v1", "ConfigMap", Some("opendatahub"), name)
}

#[tokio::test]
async fn test_second_apply_of_identical_set_issues_no_mutations() {
    let fake = FakeCluster::new();
    let engine = engine(&fake, 3);
    let resources = vec![config_map("dashboard-config", "a"), deployment("dashboard")];

    let first = engine
        .apply(&scope("dashboard"), resources.clone(), true)
        .await
        .expect("first apply");
    assert_eq!(first.created, 2);
    let after_first = fake.mutations();

    let second = engine
        .apply(&scope("dashboard"), resources, true)
        .await
        .expect("second apply");
    assert_eq!(second.mutations(), 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(fake.mutations(), after_first);
}

#[tokio::test]
async fn test_extra_live_owner_reference_is_not_drift() {
    let fake = FakeCluster::new();
    let engine = engine(&fake, 3);
    let resources = vec![config_map("dashboard-config", "a")];
    engine
        .apply(&scope("dashboard"), resources.clone(), true)
        .await
        .expect("create");

    fake.edit(&cm_key("dashboard-config"), |live| {
        let references = live["metadata"]["ownerReferences"]
            .as_array_mut()
            .expect("owner references stamped");
        references.insert(
            0,
            json!({
                "apiVersion": "argoproj.io/v1alpha1",
                "kind": "Application",
                "name": "odh",
                "uid": "uid-argo-application"
            }),
        );
    });
    let after_edit = fake.mutations();

    for _ in 0..3 {
        let summary = engine
            .apply(&scope("dashboard"), resources.clone(), true)
            .await
            .expect("re-apply");
        assert_eq!(summary.mutations(), 0);
        assert_eq!(summary.unchanged, 1);
    }
    assert_eq!(fake.mutations(), after_edit);
}

#[tokio::test]
async fn test_applied_resources_are_stamped_with_owner_and_labels() {
    let fake = FakeCluster::new();
    engine(&fake, 3)
        .apply(&scope("dashboard"), vec![config_map("dashboard-config", "a")], true)
        .await
        .expect("apply");

    let live = fake.object(&cm_key("dashboard-config")).expect("created");
    assert!(live.is_owned_by("uid-default-dsc"));
    let labels = live.labels();
    assert_eq!(labels.get(GENERATED_RESOURCE_LABEL).map(String::as_str), Some("true"));
    assert_eq!(labels.get(COMPONENT_LABEL).map(String::as_str), Some("dashboard"));
}

#[tokio::test]
async fn test_changed_resource_is_patched() {
    let fake = FakeCluster::new();
    let engine = engine(&fake, 3);
    engine
        .apply(&scope("dashboard"), vec![config_map("dashboard-config", "a")], true)
        .await
        .expect("create");

    let summary = engine
        .apply(&scope("dashboard"), vec![config_map("dashboard-config", "b")], true)
        .await
        .expect("update");
    assert_eq!(summary.updated, 1);

    let live = fake.object(&cm_key("dashboard-config")).expect("exists");
    assert_eq!(live.as_value()["data"]["key"], "b");
}

#[tokio::test]
async fn test_resources_are_created_in_kind_priority_order() {
    let fake = FakeCluster::new();
    engine(&fake, 3)
        .apply(
            &scope("serving"),
            vec![deployment("serving"), service("serving"), namespace("serving-ns"), config_map("serving-config", "a")],
            true,
        )
        .await
        .expect("apply");

    let kinds: Vec<String> = fake.created_order().into_iter().map(|k| k.kind).collect();
    assert_eq!(kinds, vec!["Namespace", "ConfigMap", "Service", "Deployment"]);
}

mod conflicts {
    use super::*;

    async fn patch_with_conflicts(conflicts: u32, max_attempts: u32) -> Result<(), Error> {
        let fake = FakeCluster::new();
        let engine = engine(&fake, max_attempts);
        engine
            .apply(&scope("dashboard"), vec![config_map("dashboard-config", "a")], true)
            .await
            .expect("create");

        fake.inject_patch_conflicts(conflicts);
        engine
            .apply(&scope("dashboard"), vec![config_map("dashboard-config", "b")], true)
            .await
            .map(|_| ())
    }

    #[tokio::test]
    async fn test_fewer_conflicts_than_attempts_succeeds() {
        for conflicts in 0..3 {
            assert!(
                patch_with_conflicts(conflicts, 3).await.is_ok(),
                "{conflicts} conflicts with 3 attempts should succeed"
            );
        }
    }

    #[tokio::test]
    async fn test_conflicts_reaching_attempt_budget_exhaust() {
        for conflicts in [3, 4, 10] {
            let err = patch_with_conflicts(conflicts, 3)
                .await
                .expect_err("retry budget exhausted");
            assert_eq!(err.reason(), "ConflictRetryExhausted");
            match err {
                Error::ConflictRetryExhausted { attempts, resource } => {
                    assert_eq!(attempts, 3);
                    assert!(resource.contains("dashboard-config"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}

mod removal {
    use super::*;

    #[tokio::test]
    async fn test_disabling_component_deletes_owned_resources() {
        let fake = FakeCluster::new();
        let engine = engine(&fake, 3);
        let resources = vec![config_map("training-config", "a"), deployment("training")];
        engine
            .apply(&scope("training"), resources.clone(), true)
            .await
            .expect("apply");
        assert_eq!(fake.keys().len(), 2);

        let summary = engine
            .apply(&scope("training"), resources, false)
            .await
            .expect("remove");
        assert_eq!(summary.deleted, 2);
        assert!(fake.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kinds_count_as_absent_during_removal() {
        let fake = FakeCluster::new();
        let engine = engine(&fake, 3);
        let resources = vec![namespace("training-ns"), deployment("training")];
        engine
            .apply(&scope("training"), resources.clone(), true)
            .await
            .expect("apply");

        fake.mark_unknown_kind("Namespace");
        let summary = engine
            .apply(&scope("training"), resources, false)
            .await
            .expect("remove");
        assert_eq!(summary.deleted, 1);
        assert!(fake
            .object(&ResourceKey::new("apps/v1", "Deployment", Some("opendatahub"), "training"))
            .is_none());
    }

    #[tokio::test]
    async fn test_labelled_leftovers_are_swept() {
        let fake = FakeCluster::new();
        let engine = engine(&fake, 3);
        engine
            .apply(
                &scope("training"),
                vec![config_map("training-config", "a"), config_map("training-old", "a")],
                true,
            )
            .await
            .expect("apply");

        // the newer bundle no longer renders training-old
        let summary = engine
            .apply(&scope("training"), vec![config_map("training-config", "a")], false)
            .await
            .expect("remove");
        assert_eq!(summary.deleted, 2);
        assert!(fake.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unowned_objects_are_left_untouched() {
        let fake = FakeCluster::new();
        let foreign = fake.seed(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "training-config",
                "namespace": "opendatahub",
                "labels": {COMPONENT_LABEL: "training"}
            },
            "data": {"key": "theirs"}
        }));

        let summary = engine(&fake, 3)
            .apply(&scope("training"), vec![config_map("training-config", "a")], false)
            .await
            .expect("remove");
        assert_eq!(summary.deleted, 0);
        assert_eq!(fake.mutations().deletes, 0);
        assert!(fake.object(&foreign).is_some());
    }

    #[tokio::test]
    async fn test_removing_absent_resources_is_a_noop() {
        let fake = FakeCluster::new();
        let summary = engine(&fake, 3)
            .apply(&scope("training"), vec![config_map("training-config", "a")], false)
            .await
            .expect("remove");
        assert_eq!(summary.mutations(), 0);
    }
}

#[tokio::test]
async fn test_first_failure_aborts_the_batch() {
    let fake = FakeCluster::new();
    fake.fail_creates_of(
        "Service",
        ClientError::Api {
            code: 422,
            message: "invalid port".to_string(),
        },
    );

    let err = engine(&fake, 3)
        .apply(
            &scope("serving"),
            vec![config_map("serving-config", "a"), service("serving"), deployment("serving")],
            true,
        )
        .await
        .expect_err("service create fails");

    assert_eq!(err.reason(), "ApplyError");
    assert!(fake.object(&cm_key("serving-config")).is_some());
    assert!(fake
        .object(&ResourceKey::new("apps/v1", "Deployment", Some("opendatahub"), "serving"))
        .is_none());
}
