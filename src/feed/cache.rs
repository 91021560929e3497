//! Snapshot cache: owns the currently published [`Snapshot`] and refreshes it.
//!
//! Readers call [`SnapshotCache::state`] / [`SnapshotCache::snapshot`], which
//! are a single atomic load and never wait on a refresh. Writers go through
//! [`SnapshotCache::refresh`], which is single-flight: while one refresh is
//! running, every other caller awaits that same outcome instead of hitting
//! the upstream again. The refresh itself runs on its own task, so a caller
//! that goes away (client disconnect) does not cancel it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::feed::decode::FeedFormat;
use crate::feed::error::{FetchError, RefreshError};
use crate::feed::source::FeedSource;
use crate::feed::types::{now_ms, Snapshot, TimestampMs};
use crate::feed::{build_snapshot, ensure_metrics_described};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePhase {
    /// Nothing published yet (never loaded, or the first load failed).
    Empty,
    /// First load in flight.
    Loading,
    Ready,
    /// Serving the previous snapshot while a new one is fetched.
    Refreshing,
}

/// Everything a reader can observe, published as one unit.
#[derive(Debug, Clone)]
pub struct CacheState {
    pub phase: CachePhase,
    pub snapshot: Option<Arc<Snapshot>>,
    /// Most recent refresh failure; cleared by the next success.
    pub last_error: Option<RefreshError>,
    pub last_attempt_at: Option<TimestampMs>,
}

impl Default for CacheState {
    fn default() -> Self {
        Self {
            phase: CachePhase::Empty,
            snapshot: None,
            last_error: None,
            last_attempt_at: None,
        }
    }
}

pub type RefreshOutcome = Result<Arc<Snapshot>, RefreshError>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

struct Inner {
    source: Arc<dyn FeedSource>,
    format: FeedFormat,
    fetch_timeout: Duration,
    state: ArcSwap<CacheState>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<Inner>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn FeedSource>, format: FeedFormat, fetch_timeout: Duration) -> Self {
        ensure_metrics_described();
        Self {
            inner: Arc::new(Inner {
                source,
                format,
                fetch_timeout,
                state: ArcSwap::from_pointee(CacheState::default()),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn format(&self) -> FeedFormat {
        self.inner.format
    }

    /// Current state. Lock-free.
    pub fn state(&self) -> Arc<CacheState> {
        self.inner.state.load_full()
    }

    /// Last good snapshot, if any. Lock-free.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.state.load().snapshot.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Refresh now, or join the refresh that is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let fut = {
            let mut slot = self.inner.in_flight.lock();
            match slot.clone() {
                Some(running) => {
                    counter!("feed_singleflight_joined_total").increment(1);
                    running
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let handle = tokio::spawn(inner.run_refresh());
                    let fut = async move {
                        match handle.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(RefreshError::Aborted(e.to_string())),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }
}

/// Clears the in-flight slot when the refresh task ends, however it ends.
struct InFlightGuard(Arc<Inner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.0.in_flight.lock() = None;
    }
}

impl Inner {
    async fn run_refresh(self: Arc<Self>) -> RefreshOutcome {
        let _guard = InFlightGuard(Arc::clone(&self));
        let t0 = Instant::now();

        let prev = self.state.load_full();
        self.state.store(Arc::new(CacheState {
            phase: if prev.snapshot.is_some() {
                CachePhase::Refreshing
            } else {
                CachePhase::Loading
            },
            last_attempt_at: Some(now_ms()),
            ..CacheState::clone(&prev)
        }));

        let result = self.fetch_and_build().await;

        // Only this task writes while it holds the in-flight slot.
        let prev = self.state.load_full();
        match result {
            Ok(snapshot) => {
                let n = snapshot.alerts.len();
                self.state.store(Arc::new(CacheState {
                    phase: CachePhase::Ready,
                    snapshot: Some(Arc::clone(&snapshot)),
                    last_error: None,
                    last_attempt_at: prev.last_attempt_at,
                }));

                counter!("feed_refresh_total", "outcome" => "ok").increment(1);
                gauge!("feed_snapshot_alerts").set(n as f64);
                gauge!("feed_last_success_ts").set((snapshot.fetched_at / 1000) as f64);
                info!(
                    target: "feed",
                    source = self.source.name(),
                    alerts = n,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "feed refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                let phase = if prev.snapshot.is_some() {
                    CachePhase::Ready
                } else {
                    CachePhase::Empty
                };
                self.state.store(Arc::new(CacheState {
                    phase,
                    snapshot: prev.snapshot.clone(),
                    last_error: Some(e.clone()),
                    last_attempt_at: prev.last_attempt_at,
                }));

                counter!("feed_refresh_total", "outcome" => "error").increment(1);
                counter!("feed_refresh_errors_total", "kind" => e.kind()).increment(1);
                warn!(
                    target: "feed",
                    source = self.source.name(),
                    error = %e,
                    kind = e.kind(),
                    stale = prev.snapshot.is_some(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "feed refresh failed"
                );
                Err(e)
            }
        }
    }

    async fn fetch_and_build(&self) -> RefreshOutcome {
        let bytes = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let (snapshot, stats) = build_snapshot(&bytes, self.format, now_ms())?;
        info!(
            target: "feed",
            bytes = bytes.len(),
            decoded = stats.decoded,
            dropped = stats.dropped,
            deduped = stats.deduped,
            format = %self.format,
            "feed decoded"
        );
        Ok(Arc::new(snapshot))
    }
}
