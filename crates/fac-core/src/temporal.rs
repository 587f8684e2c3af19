//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp with seconds precision. Every
//! lifecycle history entry is stamped with one.
//!
//! ## Display Zone
//!
//! Public dissemination dates are calendar dates in American Samoa time
//! (UTC−11, no daylight saving). Conversion is an explicit step via
//! [`Timestamp::display_date()`]; the stored instant is always UTC.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FacError;

/// Offset of the public display zone from UTC, in seconds (UTC−11).
pub const DISPLAY_ZONE_OFFSET_SECS: i32 = -11 * 3600;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an RFC 3339 string, any offset, converted to UTC.
///
/// Serialized as its RFC 3339 string; deserialization goes through
/// [`Timestamp::parse()`], so stored offsets and sub-seconds are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string, accepting any offset and converting to UTC.
    ///
    /// # Errors
    ///
    /// Returns `FacError::InvalidTimestamp` if the string is not RFC 3339.
    pub fn parse(s: &str) -> Result<Self, FacError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| FacError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// The calendar date of this instant in the given fixed offset.
    pub fn date_in(&self, offset: FixedOffset) -> String {
        self.0.with_timezone(&offset).format("%Y-%m-%d").to_string()
    }

    /// The calendar date of this instant in the public display zone.
    pub fn display_date(&self) -> String {
        match FixedOffset::east_opt(DISPLAY_ZONE_OFFSET_SECS) {
            Some(offset) => self.date_in(offset),
            None => self.0.format("%Y-%m-%d").to_string(),
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = FacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_iso8601()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
