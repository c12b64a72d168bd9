use std::sync::Arc;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::{ConfigSource, EffectiveConfig};
use crate::feed::types::FeedSource;
use crate::pipeline;

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<dyn FeedSource>,
    /// Site-level defaults used when a request carries no `site` block.
    pub site: Arc<ConfigSource>,
}

impl AppState {
    pub fn new(feed: Arc<dyn FeedSource>, site: ConfigSource) -> Self {
        Self {
            feed,
            site: Arc::new(site),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/related", post(related))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, serde::Deserialize)]
struct RelatedReq {
    #[serde(default)]
    site: Option<serde_json::Value>,
    #[serde(default)]
    page: serde_json::Value,
    /// Host document to splice the block into (optional).
    #[serde(default)]
    document: Option<String>,
}

#[derive(Debug, Default, serde::Serialize)]
struct RelatedResp {
    html: Option<String>,
    document: Option<String>,
    inserted: bool,
}

/// Never fails: any problem degrades to an empty response.
async fn related(State(state): State<AppState>, Json(req): Json<RelatedReq>) -> Json<RelatedResp> {
    let site = match req.site {
        Some(v) => ConfigSource::from_value(v),
        None => (*state.site).clone(),
    };
    let page = ConfigSource::from_value(req.page);

    let cfg = match EffectiveConfig::resolve(site, page) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(target: "related", error = %e, "unusable related-posts config");
            return Json(RelatedResp::default());
        }
    };

    let agg = pipeline::run(cfg, Arc::clone(&state.feed)).await;
    let html = agg.markup().map(str::to_string);
    let document = req
        .document
        .as_deref()
        .and_then(|doc| pipeline::splice(&agg, doc));

    Json(RelatedResp {
        inserted: document.is_some(),
        html,
        document,
    })
}
