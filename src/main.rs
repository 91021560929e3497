//! TTC real-time alert proxy: binary entrypoint.
//! Loads configuration, starts the feed poller and serves the Axum router.

use shuttle_axum::ShuttleAxum;
use tracing::info;

use ttc_rt_proxy::feed::config::FeedConfig;
use ttc_rt_proxy::{app, init_tracing};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = FeedConfig::from_env()?;
    info!(
        url = %cfg.url,
        format = %cfg.format,
        interval_secs = cfg.refresh_interval_secs,
        timeout_ms = cfg.fetch_timeout_ms,
        "feed config loaded"
    );

    let router = app(&cfg)?;

    Ok(router.into())
}
