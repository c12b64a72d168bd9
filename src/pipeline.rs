// src/pipeline.rs
//! Async driver for one aggregation run.
//!
//! Fetches run concurrently as tokio tasks; each task sends exactly one
//! [`BatchArrival`] into a channel, and a single consumer applies them to the
//! [`Aggregation`] one at a time. A fetch error or timeout becomes
//! `BatchArrival::Failed`, so the counter always reaches its target.

use metrics::histogram;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::aggregate::{Aggregation, BatchArrival, Progress, Start};
use crate::config::EffectiveConfig;
use crate::feed::types::{FeedQuery, FeedSource};
use crate::insert::insert_after;

/// Run one aggregation to completion and return the finished context.
pub async fn run(config: EffectiveConfig, source: Arc<dyn FeedSource>) -> Aggregation {
    let timeout = config.fetch_timeout;
    let mut agg = Aggregation::new(config);
    let queries = match agg.begin() {
        Start::Finished(_) => return agg,
        Start::Fetch(q) => q,
    };

    let (tx, mut rx) = mpsc::channel::<BatchArrival>(queries.len());
    for query in queries {
        let tx = tx.clone();
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            let arrival = fetch_one(source.as_ref(), &query, timeout).await;
            // Receiver gone means the run already finished; nothing to report.
            let _ = tx.send(arrival).await;
        });
    }
    drop(tx);

    while let Some(arrival) = rx.recv().await {
        match agg.on_batch(arrival) {
            Progress::Complete(_) => break,
            Progress::Pending { received, expected } => {
                debug!(target: "related", received, expected, "batch counted");
            }
            Progress::Rejected => {}
        }
    }
    if agg.markup().is_none() && agg.progress().0 < agg.progress().1 {
        warn!(target: "related", progress = ?agg.progress(), "fetch tasks ended before all batches arrived");
    }
    agg
}

/// Splice a finished run's markup into `document` after its `insert_query`.
///
/// `None` when there is nothing to insert or the anchor is missing; the
/// insertion is skipped silently apart from a log line.
pub fn splice(agg: &Aggregation, document: &str) -> Option<String> {
    let markup = agg.markup()?;
    let query = &agg.config().insert_query;
    let out = insert_after(document, query, markup);
    if out.is_none() {
        warn!(target: "related", %query, "render target not found; skipped");
    }
    out
}

async fn fetch_one(source: &dyn FeedSource, query: &FeedQuery, timeout: Duration) -> BatchArrival {
    let t0 = Instant::now();
    let res = tokio::time::timeout(timeout, source.fetch(query)).await;
    histogram!("related_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    match res {
        Ok(Ok(entries)) => BatchArrival::Entries(entries),
        Ok(Err(e)) => {
            warn!(target: "related", error = ?e, provider = source.name(), label = ?query.label, "feed fetch failed");
            BatchArrival::Failed(format!("{e:#}"))
        }
        Err(_) => {
            warn!(target: "related", provider = source.name(), label = ?query.label, "feed fetch timed out");
            BatchArrival::Failed(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}
