//! Serialization helpers for configuration values
//!
//! Configuration files express every duration as an integer number of
//! milliseconds (`timeout_ms = 5000`, `sleep_window_ms = 5000`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter storing a `Duration` as whole milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use tollgate_common::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Settings {
///     #[serde(rename = "timeout_ms", with = "duration_millis")]
///     timeout: Duration,
/// }
///
/// let settings: Settings = serde_json::from_str(r#"{"timeout_ms": 250}"#).unwrap();
/// assert_eq!(settings.timeout, Duration::from_millis(250));
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize as milliseconds, saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
