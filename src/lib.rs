// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod feed;
pub mod metrics;

pub use crate::api::{router, AppState};
pub use crate::feed::cache::SnapshotCache;

use std::sync::Arc;

use axum::Router;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::feed::config::FeedConfig;
use crate::feed::scheduler::spawn_poller;
use crate::feed::source::{FeedSource, HttpFeedSource};
use crate::metrics::Metrics;

/// Install the tracing subscriber. `RUST_LOG` wins; `LOG_FORMAT=json`
/// switches to JSON lines. Uses `try_init` so a subscriber installed by the
/// deployment runtime is left alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ttc_rt_proxy=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire the service around `source`. The Prometheus recorder goes in first
/// so series descriptions and the poller's first refresh are recorded.
pub fn app_with_source(cfg: &FeedConfig, source: Arc<dyn FeedSource>) -> Router {
    let metrics = match Metrics::init(cfg) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let cache = SnapshotCache::new(source, cfg.format, cfg.fetch_timeout());
    spawn_poller(cache.clone(), cfg.refresh_interval());

    let app = router(AppState::new(cache));
    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

/// Production app: HTTP upstream from configuration.
pub fn app(cfg: &FeedConfig) -> anyhow::Result<Router> {
    let source = HttpFeedSource::new(cfg)?;
    Ok(app_with_source(cfg, Arc::new(source)))
}
