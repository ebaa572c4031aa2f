//! # Status
//!
//! Phase and condition transitions for a DataScienceCluster.
//!
//! All helpers mutate a status value in memory; the reconcile loop decides
//! when to persist. A condition's `lastTransitionTime` only moves when its
//! status flips, so re-reconciling a healthy cluster produces an identical
//! status and no write.

use crate::constants::{
    CONDITION_PROGRESSING, CONDITION_RECONCILE_COMPLETED, REASON_RECONCILE_COMPLETED,
    REASON_RECONCILE_INIT, RECONCILE_COMPLETED_MESSAGE,
};
use crate::controller::profiles::ReconciliationPlan;
use crate::crd::{ClusterPhase, Condition, DataScienceClusterStatus};
use crate::error::Error;

const TRUE: &str = "True";
const FALSE: &str = "False";

/// Insert or update a condition, keeping `lastTransitionTime` unless the status changes
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    now: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(now.to_string());
        }
        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        return;
    }

    conditions.push(Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        last_transition_time: Some(now.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    });
}

/// Whether Progressing should be published before the pass does any work
///
/// A fresh object always enters Progressing. An object in Error enters it
/// again only once its spec moved past the generation the failed attempt
/// observed; retries of the same generation go straight to their outcome so
/// that a repeating failure leaves the status untouched.
#[must_use]
pub fn needs_progressing(status: &DataScienceClusterStatus, generation: Option<i64>) -> bool {
    match status.current_phase() {
        ClusterPhase::Uninitialized => true,
        ClusterPhase::Error => status.observed_generation != generation,
        ClusterPhase::Progressing | ClusterPhase::Ready => false,
    }
}

pub fn mark_progressing(status: &mut DataScienceClusterStatus, now: &str) {
    set_condition(
        &mut status.conditions,
        CONDITION_PROGRESSING,
        TRUE,
        REASON_RECONCILE_INIT,
        "Initializing DataScienceCluster resource",
        now,
    );
    status.phase = Some(ClusterPhase::Progressing);
}

pub fn mark_ready(
    status: &mut DataScienceClusterStatus,
    plan: &ReconciliationPlan,
    generation: Option<i64>,
    now: &str,
) {
    set_condition(
        &mut status.conditions,
        CONDITION_RECONCILE_COMPLETED,
        TRUE,
        REASON_RECONCILE_COMPLETED,
        RECONCILE_COMPLETED_MESSAGE,
        now,
    );
    set_condition(
        &mut status.conditions,
        CONDITION_PROGRESSING,
        FALSE,
        REASON_RECONCILE_COMPLETED,
        RECONCILE_COMPLETED_MESSAGE,
        now,
    );
    status.phase = Some(ClusterPhase::Ready);
    status.observed_generation = generation;
    status.installed_components = plan.as_map().clone();
}

pub fn mark_error(
    status: &mut DataScienceClusterStatus,
    error: &Error,
    generation: Option<i64>,
    now: &str,
) {
    let message = error.to_string();
    set_condition(
        &mut status.conditions,
        CONDITION_RECONCILE_COMPLETED,
        FALSE,
        error.reason(),
        &message,
        now,
    );
    set_condition(
        &mut status.conditions,
        CONDITION_PROGRESSING,
        FALSE,
        error.reason(),
        &message,
        now,
    );
    status.phase = Some(ClusterPhase::Error);
    status.observed_generation = generation;
}

/// Compare two statuses, ignoring `lastReconcileTime`
#[must_use]
pub fn status_changed(before: &DataScienceClusterStatus, after: &DataScienceClusterStatus) -> bool {
    let strip = |status: &DataScienceClusterStatus| DataScienceClusterStatus {
        last_reconcile_time: None,
        ..status.clone()
    };
    strip(before) != strip(after)
}
