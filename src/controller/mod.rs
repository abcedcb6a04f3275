//! Controller module for Pulsetic monitor reconciliation
//! This module contains the controller loops, the reconcilers for Accounts, Monitors and
//! annotated route objects, and the control-plane seam they share.

mod account;
pub mod annotations;
pub mod events;
mod finalizers;
mod httproute;
mod ingress;
#[cfg(feature = "metrics")]
pub mod metrics;
mod monitor;
mod reconciler;
mod source;
#[cfg(test)]
mod source_test;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use account::{reconcile_account, resolve_account, resolve_api_key};
pub use events::{EventRecorder, EventType, KubeRecorder};
pub use finalizers::{finalizer_state, FinalizerState, FINALIZER};
pub use monitor::reconcile_monitor;
pub use reconciler::{run_controller, Context, ControllerOptions, Next};
pub use source::{desired_url, reconcile_source, MonitorSource};
pub use store::{Finalizable, KubeStore, ObjectStore};
