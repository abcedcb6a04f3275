//! Finalizer handling for Monitors and annotated sources
//!
//! The finalizer marks an object whose remote state may still need cleanup:
//! - a Monitor gets it once its Pulsetic monitor exists
//! - an Ingress/HTTPRoute gets it once it owns at least one Monitor
//!
//! Finalizers are written with the object's resourceVersion, so a concurrent change makes
//! the write fail instead of clobbering the other writer's finalizer list.

use kube::{Resource, ResourceExt};
use tracing::info;

use super::store::{Finalizable, ObjectStore};
use crate::error::Result;

/// Finalizer shared by Monitors and the sources that generate them
pub const FINALIZER: &str = "pulsetic.clevyr.com/finalizer";

/// Lifecycle position of an object with respect to [`FINALIZER`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerState {
    /// Live object, nothing to clean up yet
    Absent,
    /// Live object owning remote state
    Present,
    /// Deletion requested, cleanup still pending
    Deleting,
    /// Deletion requested and cleanup done; waiting for the API server to remove it
    Cleaned,
}

pub fn finalizer_state<K: Resource>(obj: &K) -> FinalizerState {
    match (is_being_deleted(obj), has_finalizer(obj)) {
        (false, false) => FinalizerState::Absent,
        (false, true) => FinalizerState::Present,
        (true, true) => FinalizerState::Deleting,
        (true, false) => FinalizerState::Cleaned,
    }
}

/// A deletion timestamp means deletion was requested and finalizers are holding it
pub fn is_being_deleted<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

pub fn has_finalizer<K: Resource>(obj: &K) -> bool {
    obj.finalizers().iter().any(|f| f == FINALIZER)
}

/// Add [`FINALIZER`] if missing, returning the stored object
pub async fn ensure_finalizer<S, K>(store: &S, obj: &K) -> Result<K>
where
    S: ObjectStore + ?Sized,
    K: Finalizable,
{
    if has_finalizer(obj) {
        return Ok(obj.clone());
    }

    let mut finalizers = obj.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    let updated = store.set_finalizers(obj, finalizers).await?;

    info!("Added finalizer to {} {}", K::kind(&()), obj.name_any());
    Ok(updated)
}

/// Drop [`FINALIZER`] once cleanup is complete
pub async fn remove_finalizer<S, K>(store: &S, obj: &K) -> Result<K>
where
    S: ObjectStore + ?Sized,
    K: Finalizable,
{
    if !has_finalizer(obj) {
        return Ok(obj.clone());
    }

    let finalizers: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    let updated = store.set_finalizers(obj, finalizers).await?;

    info!("Removed finalizer from {} {}", K::kind(&()), obj.name_any());
    Ok(updated)
}
