// src/feed/temporal.rs
use serde::Serialize;

use crate::feed::types::{ActivePeriod, TimestampMs};

/// Temporal state of an alert relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Expired,
    Upcoming,
    Active,
    Ongoing,
    /// Malformed window (start after end), or started with no declared end.
    Unknown,
}

impl AlertStatus {
    pub const ALL: [AlertStatus; 5] = [
        AlertStatus::Expired,
        AlertStatus::Upcoming,
        AlertStatus::Active,
        AlertStatus::Ongoing,
        AlertStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Expired => "EXPIRED",
            AlertStatus::Upcoming => "UPCOMING",
            AlertStatus::Active => "ACTIVE",
            AlertStatus::Ongoing => "ONGOING",
            AlertStatus::Unknown => "UNKNOWN",
        }
    }

    /// What a UI should render: an unclassifiable window is shown as ongoing.
    pub fn display(self) -> AlertStatus {
        match self {
            AlertStatus::Unknown => AlertStatus::Ongoing,
            other => other,
        }
    }

    /// Case-insensitive parse of a status name.
    pub fn parse(s: &str) -> Option<AlertStatus> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
    }
}

/// Classify by the first active period only. Pure; recompute on every read.
pub fn classify(periods: &[ActivePeriod], now: TimestampMs) -> AlertStatus {
    let Some(p) = periods.first() else {
        return AlertStatus::Ongoing;
    };

    match (p.start, p.end) {
        (None, None) => AlertStatus::Ongoing,
        (Some(s), Some(e)) if s > e => AlertStatus::Unknown,
        (Some(s), _) if s > now => AlertStatus::Upcoming,
        (_, Some(e)) if now <= e => AlertStatus::Active,
        (_, Some(_)) => AlertStatus::Expired,
        (Some(_), None) => AlertStatus::Unknown,
    }
}
