//! Pulsetic API payloads
//!
//! [`RemoteMonitor`] is the full record as returned by the API, read-only telemetry
//! included. [`MonitorEditParams`] is the editable projection sent on update; it never
//! carries telemetry fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Deserialize `null` as the type's default value
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept `true`/`false`, `0`/`1`, their string forms and `null`
fn int_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(D::Error::custom(format!("invalid boolean number {n}"))),
        },
        Some(Value::String(s)) => parse_bool(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid boolean string {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("invalid boolean {other}"))),
    }
}

/// Boolean spellings accepted by annotations and the Pulsetic API
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Accept unix seconds, RFC 3339 strings and `null`
fn unix_or_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Value::Number(n)) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| D::Error::custom(format!("invalid unix timestamp {n}")))?;
            DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("unix timestamp out of range: {secs}")))
        }
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("invalid timestamp {other}"))),
    }
}

/// Monitor record as returned by the Pulsetic API
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteMonitor {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub url: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub ssl_certificate_state: String,
    #[serde(deserialize_with = "int_bool")]
    pub ssl_check: bool,
    #[serde(deserialize_with = "null_default")]
    pub ip: String,
    #[serde(deserialize_with = "int_bool")]
    pub is_running: bool,
    #[serde(deserialize_with = "null_default")]
    pub uptime_check_frequency: i64,
    #[serde(deserialize_with = "null_default")]
    pub offline_notification_delay: i64,
    #[serde(deserialize_with = "null_default")]
    pub request_type: String,
    #[serde(deserialize_with = "null_default")]
    pub request_method: String,
    #[serde(deserialize_with = "null_default")]
    pub request_timeout: f64,
    #[serde(deserialize_with = "null_default")]
    pub uptime: f64,
    #[serde(deserialize_with = "null_default")]
    pub response_time: f64,
    #[serde(deserialize_with = "unix_or_time")]
    pub checked_at: Option<DateTime<Utc>>,
    pub ssl_certificate: Option<SslCertificate>,
    #[serde(deserialize_with = "null_default")]
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SslCertificate {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub domain: String,
    #[serde(deserialize_with = "null_default")]
    pub issued_by: String,
    #[serde(deserialize_with = "int_bool")]
    pub is_valid: bool,
    #[serde(deserialize_with = "unix_or_time")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Probe location and its latest result
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub location: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(deserialize_with = "int_bool")]
    pub active: bool,
}

/// One page of `GET monitors`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MonitorPage {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(deserialize_with = "null_default")]
    pub data: Vec<RemoteMonitor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateMonitorRequest<'a> {
    pub urls: [&'a str; 1],
}

/// Editable projection of a monitor, the body of `PUT monitors/{id}`
///
/// Unset fields are omitted so they keep their remote value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MonitorEditParams {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Check frequency in seconds
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "option_as_string"
    )]
    pub uptime_check_frequency: Option<i64>,

    /// Notification delay in minutes
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "option_as_string"
    )]
    pub offline_notification_delay: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_check: Option<bool>,

    #[serde(skip_serializing_if = "RequestParams::is_empty")]
    pub request: RequestParams,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequestParams {
    /// `http`, `tcp` or `icmp`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Lower-case HTTP verb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl RequestParams {
    pub fn is_empty(&self) -> bool {
        self.type_.is_none() && self.method.is_none() && self.timeout.is_none()
    }
}

// The API expects these integers as JSON strings
fn option_as_string<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}
