//! Time Utilities
//!
//! The background marker is stored as epoch milliseconds in decimal form.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Get current UTC timestamp
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Encode a timestamp as the marker value (epoch milliseconds)
pub fn to_marker(dt: &DateTime<Utc>) -> String {
    dt.timestamp_millis().to_string()
}

/// Decode a marker value back into a timestamp
pub fn from_marker(value: &str) -> Result<DateTime<Utc>> {
    let millis: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidMarker(value.to_string()))?;

    DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::InvalidMarker(value.to_string()))
}

/// Format datetime as RFC 3339 string
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
