// src/feed/types.rs
use serde::Serialize;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// One time window during which an alert applies. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivePeriod {
    pub start: Option<TimestampMs>,
    pub end: Option<TimestampMs>,
}

/// Scope descriptor: what route/stop/trip an alert affects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InformedEntity {
    pub route_id: Option<String>,
    pub stop_id: Option<String>,
    pub trip_id: Option<String>,
    pub route_type: Option<i32>,
}

/// An alert as it comes off the wire, before any defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAlertEntity {
    pub id: Option<String>,
    pub header: Option<String>,
    pub description: Option<String>,
    pub cause: Option<String>,
    pub effect: Option<String>,
    pub active_periods: Vec<ActivePeriod>,
    pub informed_entities: Vec<InformedEntity>,
}

/// Canonical alert record published in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Feed-assigned id, or a synthesized token when the feed has none.
    pub id: String,
    pub header: String,
    pub description: String,
    pub cause: Option<String>,
    pub effect: Option<String>,
    pub active_periods: Vec<ActivePeriod>,
    pub informed_entities: Vec<InformedEntity>,
}

impl Alert {
    /// Key used for within-snapshot deduplication.
    ///
    /// The upstream reuses headers across refreshes but hands out unstable
    /// synthetic ids, so the header wins; the id only stands in if a header
    /// were ever empty (normalization drops those before we get here).
    pub fn identity_key(&self) -> &str {
        if self.header.is_empty() {
            &self.id
        } else {
            &self.header
        }
    }
}

/// Decoder output for one feed payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFeed {
    pub feed_timestamp: Option<TimestampMs>,
    pub entities: Vec<RawAlertEntity>,
}

/// Immutable result of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub alerts: Vec<Alert>,
    /// Publisher-declared feed time.
    pub feed_timestamp: Option<TimestampMs>,
    /// Local wall-clock time of the successful fetch.
    pub fetched_at: TimestampMs,
}

pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Feed seconds → milliseconds, saturating instead of wrapping on absurd input.
pub(crate) fn secs_to_ms(secs: u64) -> TimestampMs {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}
