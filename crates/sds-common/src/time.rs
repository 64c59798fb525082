//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the simulator runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Render a timestamp the way the backend expects it (`2024-01-01T00:00:00.000Z`).
pub fn iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a calendar day as `YYYY-MM-DD`.
pub fn calendar_day(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Convert a duration into milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
