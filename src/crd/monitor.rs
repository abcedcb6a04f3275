//! Monitor Custom Resource Definition
//!
//! A Monitor declares one Pulsetic uptime monitor. Monitors are either written by hand or
//! generated from annotated Ingress/HTTPRoute objects, in which case `status.sourceRef`
//! names the object that owns them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AccountRef, MonitorDefaults, RequestType, SourceRef};
use super::Duration;
use crate::pulsetic::{MonitorEditParams, RequestParams};

/// Reconcile interval used when `spec.interval` is unset
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "pulsetic.clevyr.com",
    version = "v1",
    kind = "Monitor",
    namespaced,
    status = "MonitorStatus",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Running","type":"boolean","jsonPath":".status.running"}"#,
    printcolumn = r#"{"name":"Friendly Name","type":"string","jsonPath":".spec.monitor.name"}"#,
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".spec.monitor.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    /// How often the operator re-applies this Monitor to Pulsetic (default 24h)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,

    /// Delete the Pulsetic monitor when this object is deleted
    #[serde(default = "default_prune")]
    pub prune: bool,

    /// Pause reconciliation of this resource
    #[serde(default)]
    pub suspend: bool,

    /// Account to use. If not specified, the default Account is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRef>,

    /// Pulsetic monitor settings
    #[serde(default)]
    pub monitor: MonitorValues,
}

fn default_prune() -> bool {
    true
}

impl Default for MonitorSpec {
    fn default() -> Self {
        Self {
            interval: None,
            prune: default_prune(),
            suspend: false,
            account: None,
            monitor: MonitorValues::default(),
        }
    }
}

impl MonitorSpec {
    pub fn reconcile_interval(&self) -> std::time::Duration {
        self.interval.unwrap_or(DEFAULT_RECONCILE_INTERVAL).into()
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account
            .as_ref()
            .map(|a| a.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorValues {
    /// Name shown in Pulsetic
    #[serde(default)]
    pub name: String,

    /// URL or IP to monitor, including the scheme
    #[serde(default)]
    pub url: String,

    /// Monitor type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<RequestType>,

    #[serde(flatten)]
    pub defaults: MonitorDefaults,
}

impl MonitorValues {
    /// Build the editable Pulsetic projection.
    ///
    /// Fields set on the Monitor win over the Account's defaults, which win over the
    /// built-in defaults for the monitor type. Unset fields stay unset so they are not
    /// sent.
    pub fn to_edit_params(&self, account_defaults: Option<&MonitorDefaults>) -> MonitorEditParams {
        let mut resolved = self.defaults.clone();
        if let Some(account_defaults) = account_defaults {
            resolved = resolved.or(account_defaults);
        }
        let resolved = resolved.or(&MonitorDefaults::for_type(self.type_));

        MonitorEditParams {
            url: self.url.clone(),
            name: self.name.clone(),
            uptime_check_frequency: resolved
                .interval
                .map(|d| d.rounded_secs())
                .filter(|secs| *secs > 0),
            offline_notification_delay: resolved
                .offline_notification_delay
                .map(|d| d.rounded_minutes())
                .filter(|minutes| *minutes > 0),
            ssl_check: resolved.ssl_check,
            request: RequestParams {
                type_: self.type_.map(|t| t.as_str().to_ascii_lowercase()),
                method: resolved.method.map(|m| m.as_str().to_ascii_lowercase()),
                timeout: resolved
                    .timeout
                    .map(|d| d.as_secs_f64())
                    .filter(|secs| *secs > 0.0),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    #[serde(default)]
    pub ready: bool,

    /// Pulsetic monitor id
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,

    #[serde(default)]
    pub running: bool,

    /// Object that generated this Monitor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceRef>,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

impl Monitor {
    /// Pulsetic id recorded by the last successful reconcile, or 0
    pub fn remote_id(&self) -> i64 {
        self.status.as_ref().map(|s| s.id).unwrap_or(0)
    }

    pub fn source_ref(&self) -> Option<&SourceRef> {
        self.status.as_ref().and_then(|s| s.source_ref.as_ref())
    }
}
