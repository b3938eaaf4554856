//! Serde helpers for human-readable durations in configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '5s', '1m30s')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::duration")]
        timeout: Duration,
    }

    #[test]
    fn test_parses_human_readable_and_numeric() {
        let h: Holder = toml::from_str(r#"timeout = "1m30s""#).unwrap();
        assert_eq!(h.timeout, Duration::from_secs(90));

        let h: Holder = toml::from_str("timeout = 7").unwrap();
        assert_eq!(h.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<Holder, _> = toml::from_str(r#"timeout = "soon""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let out = toml::to_string(&Holder {
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert!(out.contains(r#"timeout = "5s""#));
    }
}
