//! # Cluster Store
//!
//! Reads and writes of the DataScienceCluster object itself: fetch,
//! conditional finalizer updates, status patches and Kubernetes Events.

use crate::constants::CONTROLLER_NAME;
use crate::crd::{DataScienceCluster, DataScienceClusterStatus};
use crate::error::ClientError;
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use serde_json::json;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<DataScienceCluster>, ClientError>;

    /// Replace the finalizer list, conditioned on `resource_version`
    ///
    /// A stale version yields [`ClientError::Conflict`].
    async fn replace_finalizers(
        &self,
        name: &str,
        resource_version: Option<&str>,
        finalizers: &[String],
    ) -> Result<(), ClientError>;

    async fn patch_status(
        &self,
        name: &str,
        status: &DataScienceClusterStatus,
    ) -> Result<(), ClientError>;

    /// Publish an Event on `cluster`; failures are logged, never returned
    async fn record_event(
        &self,
        cluster: &DataScienceCluster,
        severity: EventSeverity,
        reason: &str,
        note: String,
    );
}

/// [`ClusterStore`] backed by the Kubernetes API
pub struct KubeClusterStore {
    api: Api<DataScienceCluster>,
    recorder: Recorder,
}

impl KubeClusterStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            api: Api::all(client.clone()),
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get(&self, name: &str) -> Result<Option<DataScienceCluster>, ClientError> {
        Ok(self.api.get_opt(name).await?)
    }

    async fn replace_finalizers(
        &self,
        name: &str,
        resource_version: Option<&str>,
        finalizers: &[String],
    ) -> Result<(), ClientError> {
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource_version,
            }
        });
        self.api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        name: &str,
        status: &DataScienceClusterStatus,
    ) -> Result<(), ClientError> {
        let patch = json!({ "status": status });
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn record_event(
        &self,
        cluster: &DataScienceCluster,
        severity: EventSeverity,
        reason: &str,
        note: String,
    ) {
        let event = Event {
            type_: match severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self
            .recorder
            .publish(&event, &cluster.object_ref(&()))
            .await
        {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}
