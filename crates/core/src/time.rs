// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp helpers.
//!
//! Unset timestamps are `None` throughout the model, so the helpers here
//! operate on `Option<Timestamp>` and skip the unset ones.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub type Timestamp = DateTime<Utc>;

/// RFC3339 with a fixed nine-digit fraction, as used by Kubernetes log prefixes.
pub const PRECISE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

pub fn format_precise(ts: Timestamp) -> String {
    ts.format(PRECISE_FORMAT).to_string()
}

/// Latest of the set timestamps.
pub fn latest<I>(ts: I) -> Option<Timestamp>
where
    I: IntoIterator<Item = Option<Timestamp>>,
{
    ts.into_iter().flatten().max()
}

/// Earliest of the set timestamps.
pub fn earliest<I>(ts: I) -> Option<Timestamp>
where
    I: IntoIterator<Item = Option<Timestamp>>,
{
    ts.into_iter().flatten().min()
}

/// First set timestamp in order.
pub fn first_set<I>(ts: I) -> Option<Timestamp>
where
    I: IntoIterator<Item = Option<Timestamp>>,
{
    ts.into_iter().flatten().next()
}

/// Parse an RFC3339 timestamp (any offset, optional fraction) into UTC.
pub fn parse_rfc3339(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Milliseconds between two timestamps, clamped at zero.
pub fn millis_between(from: Timestamp, to: Timestamp) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// Human readable duration rounded to milliseconds: `0s`, `250ms`, `1m2.5s`, `1h0m3s`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis() as u64;
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if millis > 0 {
        let fraction = format!("{millis:03}");
        out.push_str(&format!("{seconds}.{}s", fraction.trim_end_matches('0')));
    } else {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
