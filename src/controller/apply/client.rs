//! # Resource Client
//!
//! The remote surface the apply engine needs: get, create, patch, delete and
//! list by label. [`KubeResourceClient`] implements it with `DynamicObject`
//! and API discovery so any kind found in a manifest bundle can be managed.

use crate::controller::manifests::{ResourceDocument, ResourceKey};
use crate::error::ClientError;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch the live object, `None` if it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<ResourceDocument>, ClientError>;

    async fn create(&self, resource: &ResourceDocument) -> Result<ResourceDocument, ClientError>;

    /// Server-side apply `resource` as `field_manager`
    ///
    /// A `metadata.resourceVersion` on `resource` is a precondition; a stale
    /// one yields [`ClientError::Conflict`].
    async fn patch(
        &self,
        resource: &ResourceDocument,
        field_manager: &str,
    ) -> Result<ResourceDocument, ClientError>;

    async fn delete(&self, key: &ResourceKey) -> Result<(), ClientError>;

    /// Objects of one kind carrying every label in `labels`
    ///
    /// With no namespace, a namespaced kind is listed across all namespaces.
    async fn list_labeled(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ResourceDocument>, ClientError>;
}

/// [`ResourceClient`] backed by the Kubernetes API
pub struct KubeResourceClient {
    client: Client,
    discovery: RwLock<Option<Arc<Discovery>>>,
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovery: RwLock::new(None),
        }
    }

    async fn refresh_discovery(&self) -> Result<Arc<Discovery>, ClientError> {
        let discovery = Arc::new(
            Discovery::new(self.client.clone())
                .run()
                .await
                .map_err(|e| ClientError::Transport(format!("API discovery failed: {e}")))?,
        );
        *self.discovery.write().await = Some(Arc::clone(&discovery));
        debug!("API discovery refreshed");
        Ok(discovery)
    }

    /// Resolve a kind, refreshing discovery once if it is not known yet
    ///
    /// CRDs applied earlier in the same batch only become resolvable after a
    /// refresh.
    async fn resolve(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<(ApiResource, ApiCapabilities), ClientError> {
        let gvk = gvk(api_version, kind);

        let cached = self.discovery.read().await.clone();
        if let Some(discovery) = cached {
            if let Some(found) = discovery.resolve_gvk(&gvk) {
                return Ok(found);
            }
        }

        info!("Refreshing API discovery for {}/{}", api_version, kind);
        self.refresh_discovery()
            .await?
            .resolve_gvk(&gvk)
            .ok_or_else(|| ClientError::UnknownKind {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
    }

    async fn api(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>, ClientError> {
        let (resource, capabilities) = self.resolve(api_version, kind).await?;
        Ok(match (&capabilities.scope, namespace) {
            (Scope::Namespaced, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        })
    }

    async fn api_for_key(&self, key: &ResourceKey) -> Result<Api<DynamicObject>, ClientError> {
        self.api(&key.api_version, &key.kind, key.namespace.as_deref())
            .await
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(&self, key: &ResourceKey) -> Result<Option<ResourceDocument>, ClientError> {
        let api = self.api_for_key(key).await?;
        match api.get_opt(&key.name).await? {
            Some(object) => Ok(Some(to_document(object, &key.api_version, &key.kind)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, resource: &ResourceDocument) -> Result<ResourceDocument, ClientError> {
        let key = resource.key();
        let api = self.api_for_key(&key).await?;
        let object = to_dynamic(resource)?;
        let created = api.create(&PostParams::default(), &object).await?;
        to_document(created, &key.api_version, &key.kind)
    }

    async fn patch(
        &self,
        resource: &ResourceDocument,
        field_manager: &str,
    ) -> Result<ResourceDocument, ClientError> {
        let key = resource.key();
        let api = self.api_for_key(&key).await?;
        let params = PatchParams::apply(field_manager).force();
        let patched = api
            .patch(&key.name, &params, &Patch::Apply(resource.as_value()))
            .await?;
        to_document(patched, &key.api_version, &key.kind)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), ClientError> {
        let api = self.api_for_key(key).await?;
        api.delete(&key.name, &DeleteParams::background()).await?;
        Ok(())
    }

    async fn list_labeled(
        &self,
        api_version: &str,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ResourceDocument>, ClientError> {
        let api = self.api(api_version, kind, namespace).await?;
        let selector = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        let list = api.list(&ListParams::default().labels(&selector)).await?;
        list.items
            .into_iter()
            .map(|object| to_document(object, api_version, kind))
            .collect()
    }
}

/// Split `group/version` (or a bare core `version`) into a GVK
fn gvk(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

fn to_dynamic(resource: &ResourceDocument) -> Result<DynamicObject, ClientError> {
    serde_json::from_value(resource.as_value().clone())
        .map_err(|e| ClientError::Invalid(format!("{}: {e}", resource.key())))
}

/// List items come back without apiVersion and kind; fill them in
fn to_document(
    object: DynamicObject,
    api_version: &str,
    kind: &str,
) -> Result<ResourceDocument, ClientError> {
    let mut value =
        serde_json::to_value(object).map_err(|e| ClientError::Invalid(e.to_string()))?;
    if let Some(fields) = value.as_object_mut() {
        fields
            .entry("apiVersion")
            .or_insert_with(|| serde_json::Value::String(api_version.to_string()));
        fields
            .entry("kind")
            .or_insert_with(|| serde_json::Value::String(kind.to_string()));
    }
    ResourceDocument::from_value(value).map_err(ClientError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_splits_group_and_version() {
        let apps = gvk("apps/v1", "Deployment");
        assert_eq!(apps.group, "apps");
        assert_eq!(apps.version, "v1");
        assert_eq!(apps.kind, "Deployment");

        let core = gvk("v1", "ConfigMap");
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
    }

    #[test]
    fn test_list_items_get_type_meta() {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "odh-dashboard", "namespace": "opendatahub"},
            "data": {"k": "v"}
        }))
        .expect("object");
        let document = to_document(object, "v1", "ConfigMap").expect("document");
        assert_eq!(document.kind(), "ConfigMap");
        assert_eq!(document.api_version(), "v1");
        assert_eq!(document.as_value()["data"]["k"], "v");
    }
}
