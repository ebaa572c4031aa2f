//! # Resource Documents
//!
//! A rendered manifest as an untyped JSON object with typed accessors for the
//! identity and metadata fields the controller reads and writes.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a resource: (apiVersion, kind, namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    #[must_use]
    pub fn new(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A Kubernetes object with at least apiVersion, kind and metadata.name
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    value: Value,
}

impl ResourceDocument {
    /// Wrap a JSON object, validating the identity fields
    ///
    /// # Errors
    ///
    /// Returns a description of the first missing or malformed field.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(object) = &value else {
            return Err("document is not a mapping".to_string());
        };
        for field in ["apiVersion", "kind"] {
            match object.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => return Err(format!("missing {field}")),
            }
        }
        match object.get("metadata").and_then(|m| m.get("name")) {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => return Err("missing metadata.name".to_string()),
        }
        Ok(Self { value })
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        self.str_field(&["apiVersion"]).unwrap_or_default()
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        self.str_field(&["kind"]).unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.str_field(&["metadata", "name"]).unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.str_field(&["metadata", "namespace"])
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.str_field(&["metadata", "resourceVersion"])
    }

    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.api_version(), self.kind(), self.namespace(), self.name())
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut()
            .insert("namespace".to_string(), Value::String(namespace.to_string()));
    }

    pub fn set_resource_version(&mut self, resource_version: Option<&str>) {
        let metadata = self.metadata_mut();
        match resource_version {
            Some(rv) => {
                metadata.insert("resourceVersion".to_string(), Value::String(rv.to_string()));
            }
            None => {
                metadata.remove("resourceVersion");
            }
        }
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    pub fn set_label(&mut self, key: &str, value: &str) {
        self.set_string_map_entry("labels", key, value);
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.set_string_map_entry("annotations", key, value);
    }

    /// Owner references; malformed entries are skipped
    #[must_use]
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        self.value
            .get("metadata")
            .and_then(|m| m.get("ownerReferences"))
            .and_then(Value::as_array)
            .map(|refs| {
                refs.iter()
                    .filter_map(|r| serde_json::from_value(r.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add `owner`, replacing any reference with the same uid
    pub fn set_owner_reference(&mut self, owner: &OwnerReference) {
        let mut references: Vec<Value> = self
            .owner_references()
            .into_iter()
            .filter(|r| r.uid != owner.uid)
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        if let Ok(owner) = serde_json::to_value(owner) {
            references.push(owner);
        }
        self.metadata_mut()
            .insert("ownerReferences".to_string(), Value::Array(references));
    }

    #[must_use]
    pub fn is_owned_by(&self, owner_uid: &str) -> bool {
        self.owner_references().iter().any(|r| r.uid == owner_uid)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    fn str_field(&self, path: &[&str]) -> Option<&str> {
        path.iter()
            .try_fold(&self.value, |value, field| value.get(field))
            .and_then(Value::as_str)
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        let object = ensure_object(&mut self.value);
        ensure_object(object.entry("metadata").or_insert_with(|| Value::Object(Map::new())))
    }

    fn string_map(&self, field: &str) -> BTreeMap<String, String> {
        self.value
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_string_map_entry(&mut self, field: &str, key: &str, value: &str) {
        let map = ensure_object(
            self.metadata_mut()
                .entry(field)
                .or_insert_with(|| Value::Object(Map::new())),
        );
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

/// Coerce `value` into an object, replacing non-object values
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Parse a multi-document YAML stream into JSON values
///
/// Empty documents are skipped and `kind: List` documents are flattened into
/// their items.
///
/// # Errors
///
/// Returns the YAML error for the first malformed document.
pub fn parse_yaml_stream(yaml: &str) -> Result<Vec<Value>, serde_yaml::Error> {
    use serde::Deserialize;

    let mut values = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)?;
        match value {
            Value::Null => {}
            Value::Object(ref object)
                if object.get("kind").and_then(Value::as_str) == Some("List") =>
            {
                if let Some(items) = object.get("items").and_then(Value::as_array) {
                    values.extend(items.iter().cloned());
                }
            }
            other => values.push(other),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_map() -> ResourceDocument {
        ResourceDocument::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "odh-dashboard-config"},
            "data": {"key": "value"}
        }))
        .expect("valid document")
    }

    #[test]
    fn test_identity_accessors() {
        let mut doc = config_map();
        assert_eq!(doc.key().to_string(), "ConfigMap/odh-dashboard-config");
        doc.set_namespace("opendatahub");
        assert_eq!(doc.namespace(), Some("opendatahub"));
        assert_eq!(
            doc.key().to_string(),
            "ConfigMap/opendatahub/odh-dashboard-config"
        );
    }

    #[test]
    fn test_from_value_rejects_missing_identity() {
        assert!(ResourceDocument::from_value(json!({"kind": "ConfigMap"})).is_err());
        assert!(ResourceDocument::from_value(json!({
            "apiVersion": "v1", "kind": "ConfigMap", "metadata": {}
        }))
        .is_err());
        assert!(ResourceDocument::from_value(json!("text")).is_err());
    }

    #[test]
    fn test_owner_reference_replaced_by_uid() {
        let owner = OwnerReference {
            api_version: "datasciencecluster.opendatahub.io/v1alpha1".into(),
            kind: "DataScienceCluster".into(),
            name: "default".into(),
            uid: "uid-1".into(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };
        let mut doc = config_map();
        doc.set_owner_reference(&owner);
        doc.set_owner_reference(&owner);
        assert_eq!(doc.owner_references().len(), 1);
        assert!(doc.is_owned_by("uid-1"));
        assert!(!doc.is_owned_by("uid-2"));
    }

    #[test]
    fn test_labels_and_resource_version() {
        let mut doc = config_map();
        doc.set_label("app", "dashboard");
        doc.set_resource_version(Some("42"));
        assert_eq!(doc.labels().get("app").map(String::as_str), Some("dashboard"));
        assert_eq!(doc.resource_version(), Some("42"));
        doc.set_resource_version(None);
        assert_eq!(doc.resource_version(), None);
    }

    #[test]
    fn test_parse_yaml_stream_skips_empty_and_flattens_lists() {
        let yaml = r"
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: a
---
---
apiVersion: v1
kind: List
items:
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: b
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: c
";
        let values = parse_yaml_stream(yaml).expect("stream parses");
        let names: Vec<_> = values
            .iter()
            .map(|v| v["metadata"]["name"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
