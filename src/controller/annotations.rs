//! Decoding of monitor annotations on Ingress and HTTPRoute objects
//!
//! Annotations under the configured prefix are stripped of it and treated as dotted paths
//! into [`MonitorSpec`], e.g. `pulsetic.clevyr.com/monitor.interval: 5m`. Keys are matched
//! case-insensitively. Unknown keys are rejected so typos surface as errors instead of
//! being ignored.
//!
//! `enabled` and the URL overrides (`monitor.url`, `monitor.scheme`, `monitor.host`,
//! `monitor.path`) are consumed before spec decoding.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::crd::{AccountRef, Duration, MonitorSpec, RequestMethod, RequestType};
use crate::error::{Error, Result};
use crate::pulsetic::parse_bool;

pub const ENABLED: &str = "enabled";
pub const MONITOR_URL: &str = "monitor.url";
pub const MONITOR_SCHEME: &str = "monitor.scheme";
pub const MONITOR_HOST: &str = "monitor.host";
pub const MONITOR_PATH: &str = "monitor.path";

/// Annotations carrying `prefix`, with the prefix removed
pub fn matching_annotations(
    annotations: &BTreeMap<String, String>,
    prefix: &str,
) -> BTreeMap<String, String> {
    annotations
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(prefix)
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), v.clone()))
        })
        .collect()
}

fn lookup<'a>(values: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Value of the `enabled` annotation; absent means disabled
pub fn parse_enabled(values: &BTreeMap<String, String>) -> Result<bool> {
    match lookup(values, ENABLED) {
        None => Ok(false),
        Some(v) => parse_bool(v.trim()).ok_or_else(|| Error::AnnotationDecodeError {
            key: ENABLED.to_string(),
            message: format!("invalid boolean {v:?}"),
        }),
    }
}

/// Explicit URL components; empty values count as unset
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UrlOverrides {
    pub url: Option<String>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
}

impl UrlOverrides {
    pub fn from_annotations(values: &BTreeMap<String, String>) -> Self {
        let get = |key| {
            lookup(values, key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            url: get(MONITOR_URL),
            scheme: get(MONITOR_SCHEME),
            host: get(MONITOR_HOST),
            path: get(MONITOR_PATH),
        }
    }
}

/// Apply one lower-cased key to `spec`. `None` means the key is unknown.
fn set_field(spec: &mut MonitorSpec, key: &str, v: &str) -> Option<std::result::Result<(), String>> {
    let result = match key {
        "interval" => parse_duration(v).map(|d| spec.interval = Some(d)),
        "prune" => parse_flag(v).map(|b| spec.prune = b),
        "suspend" => parse_flag(v).map(|b| spec.suspend = b),
        "account.name" => {
            spec.account = Some(AccountRef {
                name: v.to_string(),
            });
            Ok(())
        }
        "monitor.name" => {
            spec.monitor.name = v.to_string();
            Ok(())
        }
        "monitor.type" => RequestType::from_str(v.trim()).map(|t| spec.monitor.type_ = Some(t)),
        "monitor.interval" => parse_duration(v).map(|d| spec.monitor.defaults.interval = Some(d)),
        "monitor.method" => {
            RequestMethod::from_str(v.trim()).map(|m| spec.monitor.defaults.method = Some(m))
        }
        "monitor.timeout" => parse_duration(v).map(|d| spec.monitor.defaults.timeout = Some(d)),
        "monitor.offlinenotificationdelay" => parse_duration(v)
            .map(|d| spec.monitor.defaults.offline_notification_delay = Some(d)),
        "monitor.sslcheck" => parse_flag(v).map(|b| spec.monitor.defaults.ssl_check = Some(b)),
        _ => return None,
    };
    Some(result)
}

const CONSUMED: &[&str] = &[ENABLED, MONITOR_URL, MONITOR_SCHEME, MONITOR_HOST, MONITOR_PATH];

fn parse_flag(v: &str) -> std::result::Result<bool, String> {
    parse_bool(v.trim()).ok_or_else(|| format!("invalid boolean {v:?}"))
}

fn parse_duration(v: &str) -> std::result::Result<Duration, String> {
    Duration::from_str(v.trim()).map_err(|e| e.to_string())
}

/// Apply annotation overrides to `spec`
///
/// Every key is validated before anything is written, so on error `spec` is unchanged.
pub fn apply_annotations(spec: &mut MonitorSpec, values: &BTreeMap<String, String>) -> Result<()> {
    let mut decoded = spec.clone();

    for (key, value) in values {
        let normalized = key.to_ascii_lowercase();
        if CONSUMED.contains(&normalized.as_str()) {
            continue;
        }

        let result = set_field(&mut decoded, &normalized, value).ok_or_else(|| {
            Error::AnnotationDecodeError {
                key: key.clone(),
                message: "unknown key".to_string(),
            }
        })?;
        result.map_err(|message| Error::AnnotationDecodeError {
            key: key.clone(),
            message,
        })?;
    }

    *spec = decoded;
    Ok(())
}
