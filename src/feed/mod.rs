// src/feed/mod.rs
pub mod cache;
pub mod config;
pub mod decode;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod scheduler;
pub mod source;
pub mod temporal;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::feed::decode::FeedFormat;
use crate::feed::error::DecodeError;
use crate::feed::types::{Snapshot, TimestampMs};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_refresh_total", "Refresh cycles by outcome.");
        describe_counter!(
            "feed_refresh_errors_total",
            "Failed refreshes by error kind (fetch/timeout/decode)."
        );
        describe_counter!(
            "feed_alerts_dropped_total",
            "Entities skipped during normalization (no usable header)."
        );
        describe_counter!(
            "feed_alerts_dedup_total",
            "Alerts removed by header deduplication."
        );
        describe_counter!(
            "feed_singleflight_joined_total",
            "Refresh requests that attached to an in-flight refresh."
        );
        describe_histogram!("feed_decode_ms", "Decode + normalize time in milliseconds.");
        describe_gauge!("feed_snapshot_alerts", "Alerts in the published snapshot.");
        describe_gauge!(
            "feed_last_success_ts",
            "Unix ts (seconds) of the last successful refresh."
        );
    });
}

/// Per-refresh counts, logged by the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub decoded: usize,
    pub dropped: usize,
    pub deduped: usize,
}

/// decode → normalize → dedup, producing a complete snapshot or nothing.
pub fn build_snapshot(
    raw: &[u8],
    format: FeedFormat,
    fetched_at: TimestampMs,
) -> Result<(Snapshot, PipelineStats), DecodeError> {
    let t0 = std::time::Instant::now();

    let decoded = decode::decode(raw, format)?;
    let decoded_count = decoded.entities.len();
    let (alerts, dropped) = normalize::normalize_all(decoded.entities);
    let (alerts, deduped) = dedup::dedup(alerts);

    histogram!("feed_decode_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("feed_alerts_dropped_total").increment(dropped as u64);
    counter!("feed_alerts_dedup_total").increment(deduped as u64);

    let snapshot = Snapshot {
        alerts,
        feed_timestamp: decoded.feed_timestamp,
        fetched_at,
    };
    let stats = PipelineStats {
        decoded: decoded_count,
        dropped,
        deduped,
    };
    Ok((snapshot, stats))
}
