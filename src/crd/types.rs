//! Shared types for the Account and Monitor resources
//!
//! - [`RequestType`] / [`RequestMethod`] - how Pulsetic probes the target
//! - [`MonitorDefaults`] - probe settings an Account can supply for all of its Monitors
//! - [`SecretKeyRef`], [`AccountRef`], [`SourceRef`] - references between objects

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Duration;

/// Monitor probe type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Http,
    Tcp,
    Icmp,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Http => "HTTP",
            RequestType::Tcp => "TCP",
            RequestType::Icmp => "ICMP",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HTTP" => Ok(RequestType::Http),
            "TCP" => Ok(RequestType::Tcp),
            "ICMP" => Ok(RequestType::Icmp),
            _ => Err(format!("expected one of HTTP, TCP, ICMP, got {s:?}")),
        }
    }
}

/// HTTP verb used by HTTP monitors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Head => "HEAD",
            RequestMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RequestMethod::Get),
            "POST" => Ok(RequestMethod::Post),
            "PUT" => Ok(RequestMethod::Put),
            "PATCH" => Ok(RequestMethod::Patch),
            "DELETE" => Ok(RequestMethod::Delete),
            "HEAD" => Ok(RequestMethod::Head),
            "OPTIONS" => Ok(RequestMethod::Options),
            _ => Err(format!(
                "expected one of GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS, got {s:?}"
            )),
        }
    }
}

/// Probe settings that may be set per Monitor or defaulted per Account
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorDefaults {
    /// How often Pulsetic checks the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,

    /// HTTP verb to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<RequestMethod>,

    /// Maximum time a request can take before the check is considered down (0.5s to 30s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Wait until the site has been down this long before notifying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_notification_delay: Option<Duration>,

    /// Check the TLS certificate of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_check: Option<bool>,
}

impl MonitorDefaults {
    /// Built-in defaults for a probe type, the last fallback after Monitor and Account
    pub fn for_type(request_type: Option<RequestType>) -> Self {
        match request_type {
            Some(RequestType::Http) | None => Self {
                method: Some(RequestMethod::Get),
                ..Default::default()
            },
            Some(RequestType::Tcp) | Some(RequestType::Icmp) => Self::default(),
        }
    }

    /// Fill every unset field from `fallback`
    pub fn or(&self, fallback: &MonitorDefaults) -> MonitorDefaults {
        MonitorDefaults {
            interval: self.interval.or(fallback.interval),
            method: self.method.or(fallback.method),
            timeout: self.timeout.or(fallback.timeout),
            offline_notification_delay: self
                .offline_notification_delay
                .or(fallback.offline_notification_delay),
            ssl_check: self.ssl_check.or(fallback.ssl_check),
        }
    }
}

/// Reference to a key inside a Secret
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Namespace of the Secret; defaults to the operator's cluster resource namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub key: String,
}

/// Reference to a cluster-scoped Account by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountRef {
    pub name: String,
}

/// Kind and name of the object a Monitor was generated from
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SourceRef {
    pub kind: String,
    pub name: String,
}

impl SourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
