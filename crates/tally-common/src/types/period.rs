//! Hour windows and minute-of-hour bucketing

use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{HOUR_MS, MINUTE_MS, SEGMENTS_PER_HOUR};

/// Minute-of-hour index for a Unix-millis timestamp
///
/// Euclidean arithmetic keeps pre-epoch timestamps inside `0..60`.
pub fn minute_of_hour(timestamp_ms: i64) -> u8 {
    timestamp_ms
        .div_euclid(MINUTE_MS)
        .rem_euclid(SEGMENTS_PER_HOUR as i64) as u8
}

/// Fixed one-hour window: `[start, start + 59:59.999]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HourWindow {
    /// Window beginning at `start` (not re-aligned)
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: start + Duration::milliseconds(HOUR_MS - 1),
        }
    }

    /// Window of the hour containing `instant`
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let start = instant
            .duration_trunc(Duration::hours(1))
            .unwrap_or(instant);
        Self::starting_at(start)
    }

    /// Window of the hour containing a Unix-millis timestamp
    pub fn containing_millis(timestamp_ms: i64) -> Self {
        let start_ms = timestamp_ms.div_euclid(HOUR_MS) * HOUR_MS;
        let start = Utc
            .timestamp_millis_opt(start_ms)
            .single()
            .unwrap_or_default();
        Self::starting_at(start)
    }

    /// The following hour
    pub fn next(&self) -> Self {
        Self::starting_at(self.start + Duration::hours(1))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}
