// tests/metrics.rs
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use related_posts::config::{ConfigSource, EffectiveConfig};
use related_posts::metrics::Metrics;
use related_posts::pipeline;
use related_posts::{FeedQuery, FeedSource, RawEntry};

struct OneEntry;

#[async_trait::async_trait]
impl FeedSource for OneEntry {
    async fn fetch(&self, _query: &FeedQuery) -> anyhow::Result<Vec<RawEntry>> {
        Ok(vec![RawEntry {
            url: "https://pets.test/a.html".into(),
            title: "Cats".into(),
            summary: None,
            thumbnail: None,
            updated: None,
        }])
    }

    fn name(&self) -> &'static str {
        "OneEntry"
    }
}

// One recorder per process, so everything lives in a single test.
#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::init().expect("install recorder");

    let cfg = EffectiveConfig::resolve(
        ConfigSource::parse(
            r#"{"url":"https://pets.test/x.html","title":"Cats","labels":["a"],"format":"${title}"}"#,
            "json",
        ),
        ConfigSource::default(),
    )
    .unwrap();
    let agg = pipeline::run(cfg, Arc::new(OneEntry)).await;
    assert_eq!(agg.markup(), Some("Cats"));

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    for series in [
        "related_batches_total",
        "related_entries_ingested_total",
        "related_renders_total",
        "related_fetch_ms",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }

    // a second install in the same process must fail cleanly
    assert!(Metrics::init().is_err());
}
