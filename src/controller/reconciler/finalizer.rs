//! # Finalizer
//!
//! Adds and removes the DataScienceCluster finalizer. Removal goes through
//! the conflict loop: every attempt re-reads the object, filters the list and
//! writes it back conditioned on the fresh resourceVersion.

use super::types::Reconciler;
use crate::constants::FINALIZER;
use crate::controller::apply::{retry_on_conflict, RetryError};
use crate::crd::DataScienceCluster;
use crate::error::{ClientError, Error, Result};
use kube::ResourceExt;
use tracing::{debug, info};

#[must_use]
pub fn has_finalizer(cluster: &DataScienceCluster) -> bool {
    cluster.finalizers().iter().any(|f| f == FINALIZER)
}

impl Reconciler {
    /// Add the finalizer with a single conditional write
    ///
    /// # Errors
    ///
    /// [`Error::StatusUpdate`], including on a version conflict; the next
    /// event retries.
    pub async fn add_finalizer(&self, cluster: &DataScienceCluster) -> Result<()> {
        let name = cluster.name_any();
        let mut finalizers = cluster.finalizers().to_vec();
        finalizers.push(FINALIZER.to_string());

        self.store
            .replace_finalizers(&name, cluster.resource_version().as_deref(), &finalizers)
            .await
            .map_err(|source| Error::StatusUpdate {
                name: name.clone(),
                source,
            })?;
        info!("🔒 Added finalizer to DataScienceCluster {}", name);
        Ok(())
    }

    /// Remove the finalizer, retrying on version conflicts
    ///
    /// # Errors
    ///
    /// [`Error::ConflictRetryExhausted`] when every attempt conflicted,
    /// [`Error::StatusUpdate`] for any other failure.
    pub async fn remove_finalizer(&self, name: &str) -> Result<()> {
        let store = &*self.store;
        let resource = format!("DataScienceCluster/{name}");

        let outcome = retry_on_conflict(&self.config.conflict_retry(), &resource, |attempt| async move {
            let Some(cluster) = store.get(name).await? else {
                return Ok::<_, ClientError>(());
            };
            let remaining: Vec<String> = cluster
                .finalizers()
                .iter()
                .filter(|f| *f != FINALIZER)
                .cloned()
                .collect();
            if remaining.len() == cluster.finalizers().len() {
                return Ok(());
            }
            debug!(attempt, "Removing finalizer");
            store
                .replace_finalizers(name, cluster.resource_version().as_deref(), &remaining)
                .await
        })
        .await;

        match outcome {
            Ok(()) => {
                info!("🔓 Removed finalizer from DataScienceCluster {}", name);
                Ok(())
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                Err(Error::ConflictRetryExhausted { resource, attempts })
            }
            Err(RetryError::Failed(ClientError::NotFound)) => Ok(()),
            Err(RetryError::Failed(source)) => Err(Error::StatusUpdate {
                name: name.to_string(),
                source,
            }),
        }
    }
}
