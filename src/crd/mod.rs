//! Custom Resource Definitions for the Pulsetic operator
//!
//! `Account` and `Monitor` are owned by this operator. `HTTPRoute` is a read-mostly
//! binding to the Gateway API resource of the same name.

mod account;
mod duration;
pub mod gateway;
mod monitor;
pub mod types;


pub use account::{Account, AccountSpec, AccountStatus};
pub use duration::{Duration, ParseDurationError};
pub use gateway::{HTTPRoute, HTTPRouteSpec};
pub use monitor::{Monitor, MonitorSpec, MonitorStatus, MonitorValues, DEFAULT_RECONCILE_INTERVAL};
pub use types::*;
