//! Kubernetes-style duration strings (`24h`, `1m30s`, `500ms`)

use std::fmt;
use std::str::FromStr;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unit suffixes and their length in nanoseconds
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("µs", 1e3),
    ("μs", 1e3),
    ("ms", 1e6),
    ("s", 1e9),
    ("m", 60e9),
    ("h", 3600e9),
];

/// A duration written the way Kubernetes API objects write them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub std::time::Duration);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct ParseDurationError {
    pub input: String,
    pub reason: &'static str,
}

impl Duration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(std::time::Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(std::time::Duration::from_millis(millis))
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Whole seconds, rounded to the nearest second
    pub fn rounded_secs(&self) -> i64 {
        (self.0.as_secs_f64() + 0.5) as i64
    }

    /// Whole minutes, rounded to the nearest minute
    pub fn rounded_minutes(&self) -> i64 {
        (self.0.as_secs_f64() / 60.0 + 0.5) as i64
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self(d)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(d: Duration) -> Self {
        d.0
    }
}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseDurationError {
            input: input.to_string(),
            reason,
        };

        let s = input.trim();
        if s.is_empty() {
            return Err(err("empty duration"));
        }
        if s.starts_with('-') {
            return Err(err("negative durations are not allowed"));
        }
        let s = s.strip_prefix('+').unwrap_or(s);
        if s == "0" {
            return Ok(Self::default());
        }

        let mut total_nanos = 0.0_f64;
        let mut rest = s;
        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            if number_len == 0 {
                return Err(err("expected a number"));
            }
            let value: f64 = rest[..number_len]
                .parse()
                .map_err(|_| err("malformed number"))?;
            rest = &rest[number_len..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            if unit_len == 0 {
                return Err(err("missing unit"));
            }
            let unit = &rest[..unit_len];
            let scale = UNITS
                .iter()
                .find(|(name, _)| *name == unit)
                .map(|(_, scale)| *scale)
                .ok_or_else(|| err("unknown unit"))?;
            total_nanos += (value * scale).round();
            rest = &rest[unit_len..];
        }

        if total_nanos > u64::MAX as f64 {
            return Err(err("out of range"));
        }
        Ok(Self(std::time::Duration::from_nanos(total_nanos as u64)))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        if d.is_zero() {
            return write!(f, "0s");
        }
        if d < std::time::Duration::from_secs(1) {
            let nanos = d.subsec_nanos();
            return if nanos % 1_000_000 == 0 {
                write!(f, "{}ms", nanos / 1_000_000)
            } else if nanos % 1_000 == 0 {
                write!(f, "{}µs", nanos / 1_000)
            } else {
                write!(f, "{}ns", nanos)
            };
        }

        let total = d.as_secs();
        let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
        let mut seconds = secs.to_string();
        let nanos = d.subsec_nanos();
        if nanos != 0 {
            let fraction = format!("{nanos:09}");
            seconds.push('.');
            seconds.push_str(fraction.trim_end_matches('0'));
        }

        if hours > 0 {
            write!(f, "{hours}h{minutes}m{seconds}s")
        } else if minutes > 0 {
            write!(f, "{minutes}m{seconds}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Duration {
    fn schema_name() -> String {
        "Duration".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            format: Some("duration".to_string()),
            ..Default::default()
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> std::time::Duration {
        s.parse::<Duration>().unwrap().0
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse("24h"), std::time::Duration::from_secs(86_400));
        assert_eq!(parse("1m30s"), std::time::Duration::from_secs(90));
        assert_eq!(parse("1h0m0s"), std::time::Duration::from_secs(3600));
        assert_eq!(parse("500ms"), std::time::Duration::from_millis(500));
        assert_eq!(parse("1.5s"), std::time::Duration::from_millis(1500));
        assert_eq!(parse("0"), std::time::Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Duration>().is_err());
        assert!("10".parse::<Duration>().is_err());
        assert!("5 minutes".parse::<Duration>().is_err());
        assert!("-1s".parse::<Duration>().is_err());
        assert!("1d".parse::<Duration>().is_err());
    }

    #[test]
    fn test_display_matches_kubernetes_format() {
        assert_eq!(Duration::from_secs(86_400).to_string(), "24h0m0s");
        assert_eq!(Duration::from_secs(90).to_string(), "1m30s");
        assert_eq!(Duration::from_secs(5).to_string(), "5s");
        assert_eq!(Duration::from_millis(500).to_string(), "500ms");
        assert_eq!(Duration::from_millis(1500).to_string(), "1.5s");
        assert_eq!(Duration::default().to_string(), "0s");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for d in [
            Duration::from_secs(86_400),
            Duration::from_secs(61),
            Duration::from_millis(250),
        ] {
            assert_eq!(d.to_string().parse::<Duration>().unwrap(), d);
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(Duration::from_millis(1499).rounded_secs(), 1);
        assert_eq!(Duration::from_millis(1500).rounded_secs(), 2);
        assert_eq!(Duration::from_secs(89).rounded_minutes(), 1);
        assert_eq!(Duration::from_secs(90).rounded_minutes(), 2);
    }

    #[test]
    fn test_serde_as_string() {
        let d: Duration = serde_json::from_str(r#""2m""#).unwrap();
        assert_eq!(d, Duration::from_secs(120));
        assert_eq!(serde_json::to_string(&d).unwrap(), r#""2m0s""#);
    }
}
