//! Account Custom Resource Definition
//!
//! An Account holds one set of Pulsetic API credentials. Monitors reference an Account
//! by name, or fall back to the single Account flagged `isDefault`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{MonitorDefaults, SecretKeyRef};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "pulsetic.clevyr.com",
    version = "v1",
    kind = "Account",
    status = "AccountStatus",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Default","type":"boolean","jsonPath":".spec.isDefault"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    /// Use this Account for Monitors that do not name one. At most one Account may set this.
    #[serde(default)]
    pub is_default: bool,

    /// Secret key holding the Pulsetic API key
    pub api_key_secret_ref: SecretKeyRef,

    /// Probe settings applied to every Monitor using this Account unless the Monitor sets them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_defaults: Option<MonitorDefaults>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    /// Whether the credentials currently authenticate against Pulsetic
    #[serde(default)]
    pub ready: bool,
}

impl Account {
    pub fn is_default(&self) -> bool {
        self.spec.is_default
    }
}
