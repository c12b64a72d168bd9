//! Related Posts Service: binary entrypoint
//! Boots the Axum HTTP server: `/related`, `/health`, `/metrics`.

use std::sync::Arc;

use related_posts::api::{self, AppState};
use related_posts::config::ConfigSource;
use related_posts::feed::blogger::{BloggerFeed, FeedFormat};
use related_posts::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RELATED_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("RELATED_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("related_posts=info,related=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables RELATED_SITE_CONFIG_PATH from .env.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    // Site defaults; a broken file must not take the service down.
    let site = ConfigSource::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "site config not loaded; using empty defaults");
        ConfigSource::default()
    });

    let state = AppState::new(Arc::new(BloggerFeed::http(FeedFormat::Json)), site);
    let mut router = api::router(state);

    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
