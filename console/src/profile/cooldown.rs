//! Advisory client-side gate for the rate-limited manual refresh.
//!
//! The data store enforces the actual limit; this only avoids requests that
//! would predictably be rejected.

use chrono::{DateTime, Duration, Utc};

/// Cooldown window derived from a profile's `next_manual_refresh_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCooldown {
    next_eligible_at: Option<DateTime<Utc>>,
}

impl RefreshCooldown {
    /// An absent or unparseable timestamp means no cooldown.
    pub fn new(next_manual_refresh_at: Option<&str>) -> Self {
        Self {
            next_eligible_at: next_manual_refresh_at.and_then(parse_timestamp),
        }
    }

    pub fn next_eligible_at(&self) -> Option<DateTime<Utc>> {
        self.next_eligible_at
    }

    /// Time left before a manual refresh is permitted, if any.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_eligible_at
            .map(|at| at - now)
            .filter(|left| *left > Duration::zero())
    }

    pub fn can_refresh_now(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_none()
    }

    /// Countdown such as `"1m 30s"`, or bare seconds (`"30"`) under a minute.
    ///
    /// Empty when a refresh is permitted.
    pub fn label(&self, now: DateTime<Utc>) -> String {
        let Some(left) = self.remaining(now) else {
            return String::new();
        };

        let millis = left.num_milliseconds();
        let total_seconds = (millis + 999) / 1000;
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;

        if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            seconds.to_string()
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}
