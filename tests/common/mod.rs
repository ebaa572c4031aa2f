//! Common test utilities
//!
//! [`FakeCluster`] is an in-memory API server implementing both
//! [`ResourceClient`] and [`ClusterStore`]. It tracks resourceVersions,
//! counts mutations, records events and can inject conflicts and failures.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use datasciencecluster_controller::config::ControllerConfig;
use datasciencecluster_controller::controller::apply::ResourceClient;
use datasciencecluster_controller::controller::manifests::{
    merge_patch, ResourceDocument, ResourceKey,
};
use datasciencecluster_controller::controller::reconciler::{
    ClusterStore, EventSeverity, Reconciler,
};
use datasciencecluster_controller::crd::{
    DataScienceCluster, DataScienceClusterSpec, DataScienceClusterStatus,
};
use datasciencecluster_controller::error::ClientError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub severity: EventSeverity,
    pub reason: String,
    pub note: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mutations {
    pub creates: usize,
    pub patches: usize,
    pub deletes: usize,
}

impl Mutations {
    pub fn total(&self) -> usize {
        self.creates + self.patches + self.deletes
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ResourceKey, Value>,
    clusters: BTreeMap<String, DataScienceCluster>,
    next_version: u64,
    mutations: Mutations,
    created_order: Vec<ResourceKey>,
    patch_conflicts: u32,
    finalizer_conflicts: u32,
    failing_kinds: HashMap<String, ClientError>,
    cluster_read_failure: Option<ClientError>,
    unknown_kinds: BTreeSet<String>,
    status_writes: usize,
    finalizer_writes: usize,
    events: Vec<RecordedEvent>,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state)
    }

    // --- DataScienceCluster objects ---

    pub fn insert_cluster(&self, name: &str, spec: DataScienceClusterSpec) -> DataScienceCluster {
        self.with(|state| {
            let mut cluster = DataScienceCluster::new(name, spec);
            cluster.metadata.uid = Some(format!("uid-{name}"));
            cluster.metadata.generation = Some(1);
            cluster.metadata.resource_version = Some(state.bump());
            state.clusters.insert(name.to_string(), cluster.clone());
            cluster
        })
    }

    pub fn cluster(&self, name: &str) -> Option<DataScienceCluster> {
        self.with(|state| state.clusters.get(name).cloned())
    }

    pub fn status(&self, name: &str) -> DataScienceClusterStatus {
        self.cluster(name)
            .and_then(|c| c.status)
            .unwrap_or_default()
    }

    pub fn update_spec(&self, name: &str, update: impl FnOnce(&mut DataScienceClusterSpec)) {
        self.with(|state| {
            let version = state.bump();
            let cluster = state.clusters.get_mut(name).expect("cluster exists");
            update(&mut cluster.spec);
            cluster.metadata.generation = cluster.metadata.generation.map(|g| g + 1);
            cluster.metadata.resource_version = Some(version);
        });
    }

    pub fn mark_deleting(&self, name: &str) {
        self.with(|state| {
            let version = state.bump();
            let cluster = state.clusters.get_mut(name).expect("cluster exists");
            cluster.metadata.deletion_timestamp = Some(
                serde_json::from_value::<Time>(serde_json::json!("2024-01-01T00:00:00Z"))
                    .expect("valid timestamp"),
            );
            cluster.metadata.resource_version = Some(version);
        });
    }

    pub fn status_writes(&self) -> usize {
        self.with(|state| state.status_writes)
    }

    pub fn finalizer_writes(&self) -> usize {
        self.with(|state| state.finalizer_writes)
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.with(|state| state.events.clone())
    }

    // --- managed resources ---

    pub fn seed(&self, value: Value) -> ResourceKey {
        let doc = ResourceDocument::from_value(value).expect("valid seed document");
        let key = doc.key();
        self.with(|state| {
            let version = state.bump();
            let mut value = doc.into_value();
            value["metadata"]["resourceVersion"] = Value::String(version);
            state.objects.insert(key.clone(), value);
        });
        key
    }

    /// Change a live object in place, as another actor would
    pub fn edit(&self, key: &ResourceKey, change: impl FnOnce(&mut Value)) {
        self.with(|state| {
            let version = state.bump();
            let live = state.objects.get_mut(key).expect("object exists");
            change(live);
            live["metadata"]["resourceVersion"] = Value::String(version);
        });
    }

    pub fn object(&self, key: &ResourceKey) -> Option<ResourceDocument> {
        self.with(|state| state.objects.get(key).cloned())
            .map(|v| ResourceDocument::from_value(v).expect("stored documents are valid"))
    }

    pub fn objects_of_kind(&self, kind: &str) -> Vec<ResourceDocument> {
        self.with(|state| {
            state
                .objects
                .iter()
                .filter(|(key, _)| key.kind == kind)
                .map(|(_, v)| v.clone())
                .collect::<Vec<_>>()
        })
        .into_iter()
        .map(|v| ResourceDocument::from_value(v).expect("stored documents are valid"))
        .collect()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.with(|state| state.objects.keys().cloned().collect())
    }

    pub fn mutations(&self) -> Mutations {
        self.with(|state| state.mutations)
    }

    pub fn created_order(&self) -> Vec<ResourceKey> {
        self.with(|state| state.created_order.clone())
    }

    // --- fault injection ---

    /// The next `n` patches fail with a conflict
    pub fn inject_patch_conflicts(&self, n: u32) {
        self.with(|state| state.patch_conflicts = n);
    }

    /// The next `n` finalizer writes fail with a conflict
    pub fn inject_finalizer_conflicts(&self, n: u32) {
        self.with(|state| state.finalizer_conflicts = n);
    }

    /// Every create of `kind` fails with `error`
    pub fn fail_creates_of(&self, kind: &str, error: ClientError) {
        self.with(|state| {
            state.failing_kinds.insert(kind.to_string(), error);
        });
    }

    /// Every read of a DataScienceCluster fails with `error`
    pub fn fail_cluster_reads(&self, error: ClientError) {
        self.with(|state| state.cluster_read_failure = Some(error));
    }

    pub fn clear_failures(&self) {
        self.with(|state| {
            state.failing_kinds.clear();
            state.cluster_read_failure = None;
        });
    }

    /// Treat `kind` as not served by the API
    pub fn mark_unknown_kind(&self, kind: &str) {
        self.with(|state| {
            state.unknown_kinds.insert(kind.to_string());
        });
    }
}

fn unknown_kind(api_version: &str, kind: &str) -> ClientError {
    ClientError::UnknownKind {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
    }
}

#[async_trait]
impl ResourceClient for FakeCluster {
    async fn get(&self, key: &ResourceKey) -> Result<Option<ResourceDocument>, ClientError> {
        self.with(|state| {
            if state.unknown_kinds.contains(&key.kind) {
                return Err(unknown_kind(&key.api_version, &key.kind));
            }
            Ok(state.objects.get(key).cloned())
        })
        .map(|found| found.map(|v| ResourceDocument::from_value(v).expect("valid")))
    }

    async fn create(&self, resource: &ResourceDocument) -> Result<ResourceDocument, ClientError> {
        let key = resource.key();
        let stored = self.with(|state| {
            if state.unknown_kinds.contains(&key.kind) {
                return Err(unknown_kind(&key.api_version, &key.kind));
            }
            if let Some(error) = state.failing_kinds.get(&key.kind) {
                return Err(error.clone());
            }
            if state.objects.contains_key(&key) {
                return Err(ClientError::Conflict(format!("{key} already exists")));
            }
            let version = state.bump();
            let mut value = resource.as_value().clone();
            value["metadata"]["resourceVersion"] = Value::String(version);
            value["metadata"]["uid"] = Value::String(format!("uid-{}", key.name));
            state.objects.insert(key.clone(), value.clone());
            state.created_order.push(key.clone());
            state.mutations.creates += 1;
            Ok(value)
        })?;
        Ok(ResourceDocument::from_value(stored).expect("valid"))
    }

    async fn patch(
        &self,
        resource: &ResourceDocument,
        _field_manager: &str,
    ) -> Result<ResourceDocument, ClientError> {
        let key = resource.key();
        let stored = self.with(|state| {
            if state.patch_conflicts > 0 {
                state.patch_conflicts -= 1;
                return Err(ClientError::Conflict("injected conflict".to_string()));
            }
            let version = state.bump();
            let live = state.objects.get_mut(&key).ok_or(ClientError::NotFound)?;
            let live_version = live["metadata"]["resourceVersion"].as_str().map(str::to_string);
            if let Some(expected) = resource.resource_version() {
                if live_version.as_deref() != Some(expected) {
                    return Err(ClientError::Conflict(format!("{key} has been modified")));
                }
            }
            let mut patch = resource.as_value().clone();
            if let Some(metadata) = patch.get_mut("metadata").and_then(Value::as_object_mut) {
                metadata.remove("resourceVersion");
            }
            merge_patch(live, &patch);
            live["metadata"]["resourceVersion"] = Value::String(version);
            let value = live.clone();
            state.mutations.patches += 1;
            Ok(value)
        })?;
        Ok(ResourceDocument::from_value(stored).expect("valid"))
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), ClientError> {
        self.with(|state| {
            state.objects.remove(key).ok_or(ClientError::NotFound)?;
            state.mutations.deletes += 1;
            Ok(())
        })
    }

    async fn list_labeled(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ResourceDocument>, ClientError> {
        let values = self.with(|state| {
            if state.unknown_kinds.contains(kind) {
                return Err(unknown_kind(api_version, kind));
            }
            Ok(state
                .objects
                .iter()
                .filter(|(key, _)| key.api_version == api_version && key.kind == kind)
                .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
                .map(|(_, v)| v.clone())
                .collect::<Vec<_>>())
        })?;
        Ok(values
            .into_iter()
            .map(|v| ResourceDocument::from_value(v).expect("valid"))
            .filter(|doc| {
                let have = doc.labels();
                labels.iter().all(|(k, v)| have.get(k) == Some(v))
            })
            .collect())
    }
}

#[async_trait]
impl ClusterStore for FakeCluster {
    async fn get(&self, name: &str) -> Result<Option<DataScienceCluster>, ClientError> {
        self.with(|state| match &state.cluster_read_failure {
            Some(error) => Err(error.clone()),
            None => Ok(state.clusters.get(name).cloned()),
        })
    }

    async fn replace_finalizers(
        &self,
        name: &str,
        resource_version: Option<&str>,
        finalizers: &[String],
    ) -> Result<(), ClientError> {
        self.with(|state| {
            if state.finalizer_conflicts > 0 {
                state.finalizer_conflicts -= 1;
                return Err(ClientError::Conflict("injected conflict".to_string()));
            }
            let version = state.bump();
            let cluster = state.clusters.get_mut(name).ok_or(ClientError::NotFound)?;
            if resource_version.is_some()
                && cluster.metadata.resource_version.as_deref() != resource_version
            {
                return Err(ClientError::Conflict(format!("{name} has been modified")));
            }
            cluster.metadata.finalizers = Some(finalizers.to_vec());
            cluster.metadata.resource_version = Some(version);
            state.finalizer_writes += 1;

            // the API server drops a deleting object once its last finalizer is gone
            if cluster.metadata.deletion_timestamp.is_some() && finalizers.is_empty() {
                state.clusters.remove(name);
            }
            Ok(())
        })
    }

    async fn patch_status(
        &self,
        name: &str,
        status: &DataScienceClusterStatus,
    ) -> Result<(), ClientError> {
        self.with(|state| {
            let version = state.bump();
            let cluster = state.clusters.get_mut(name).ok_or(ClientError::NotFound)?;
            cluster.status = Some(status.clone());
            cluster.metadata.resource_version = Some(version);
            state.status_writes += 1;
            Ok(())
        })
    }

    async fn record_event(
        &self,
        _cluster: &DataScienceCluster,
        severity: EventSeverity,
        reason: &str,
        note: String,
    ) {
        self.with(|state| {
            state.events.push(RecordedEvent {
                severity,
                reason: reason.to_string(),
                note,
            });
        });
    }
}

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
///
/// Must run before any HTTP client is built.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

// --- reconciler wiring ---

pub fn test_config(root: &Path) -> ControllerConfig {
    ControllerConfig {
        manifests_root: root.to_path_buf(),
        conflict_retry_delay_ms: 0,
        max_conflict_retries: 3,
        ..ControllerConfig::default()
    }
}

pub fn reconciler(fake: &Arc<FakeCluster>, config: ControllerConfig) -> Reconciler {
    init_rustls();
    Reconciler::new(fake.clone(), fake.clone(), config).expect("reconciler builds")
}

pub fn owner(name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "datasciencecluster.opendatahub.io/v1alpha1".to_string(),
        kind: "DataScienceCluster".to_string(),
        name: name.to_string(),
        uid: format!("uid-{name}"),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

pub fn spec(profile: &str) -> DataScienceClusterSpec {
    DataScienceClusterSpec {
        profile: profile.to_string(),
        ..DataScienceClusterSpec::default()
    }
}

// --- manifest trees ---

/// Write `<root>/<component>/default/` with one file per document and a
/// kustomization listing them
pub fn write_component(root: &Path, component: &str, documents: &[&str]) {
    let dir = root.join(component).join("default");
    std::fs::create_dir_all(&dir).expect("create component dir");
    let mut kustomization = String::from("resources:\n");
    for (i, document) in documents.iter().enumerate() {
        let file = format!("resource-{i}.yaml");
        std::fs::write(dir.join(&file), document).expect("write resource");
        kustomization.push_str(&format!("  - {file}\n"));
    }
    std::fs::write(dir.join("kustomization.yaml"), kustomization).expect("write kustomization");
}

pub fn config_map(name: &str) -> String {
    format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\ndata:\n  key: value\n"
    )
}

pub fn deployment(name: &str) -> String {
    format!(
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\n  namespace: somewhere-else\nspec:\n  replicas: 1\n"
    )
}

pub fn cluster_role(name: &str) -> String {
    format!(
        "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\nmetadata:\n  name: {name}\nrules: []\n"
    )
}

/// A bundle with a ConfigMap and a Deployment per built-in component; the
/// dashboard also carries a ClusterRole
pub fn standard_bundle(root: &Path) {
    for component in ["training", "serving", "workbenches"] {
        write_component(
            root,
            component,
            &[&config_map(&format!("{component}-config")), &deployment(component)],
        );
    }
    write_component(
        root,
        "dashboard",
        &[
            &config_map("dashboard-config"),
            &deployment("dashboard"),
            &cluster_role("dashboard-reader"),
        ],
    );
}

pub fn component_objects(fake: &FakeCluster, component: &str) -> Vec<ResourceKey> {
    fake.keys()
        .into_iter()
        .filter(|key| key.name.starts_with(component))
        .collect()
}
