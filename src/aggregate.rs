// src/aggregate.rs
//! Aggregation context for one related-posts run.
//!
//! Owns the reference document, the candidate pool and the batch counter.
//! Lifecycle: `Uninitialized → Collecting → Complete`, strictly forward.
//!
//! - [`Aggregation::begin`] seeds the pool and either finishes right away
//!   (pool already full, nothing to fetch, or disabled) or returns the feed
//!   queries to issue.
//! - [`Aggregation::on_batch`] is called once per arrived batch, in any order.
//!   Empty, failed and malformed batches all count; rendering happens exactly
//!   once, when `received == expected`.
//! - Late batches (after completion) are logged and ignored.

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::EffectiveConfig;
use crate::feed::plan_queries;
use crate::feed::types::{FeedQuery, RawEntry};
use crate::rank::select;
use crate::render::{render, Template};
use crate::store::{CandidateStore, ReferenceDocument};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("related_batches_total", "Feed batches counted toward completion.");
        describe_counter!(
            "related_batches_malformed_total",
            "Batches that failed to fetch or parse (still counted)."
        );
        describe_counter!(
            "related_batches_rejected_total",
            "Batches that arrived outside the collecting state."
        );
        describe_counter!(
            "related_entries_ingested_total",
            "Fetched entries added to the candidate pool."
        );
        describe_counter!("related_renders_total", "Completed ranking passes.");
        describe_histogram!("related_fetch_ms", "Feed fetch time in milliseconds.");
        describe_histogram!("related_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!("related_feed_entries_total", "Entries parsed from feeds.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    Uninitialized,
    Collecting,
    Complete,
}

/// What arrived for one requested group.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchArrival {
    Entries(Vec<RawEntry>),
    /// Fetch error, timeout or unparsable body. Counts like an empty batch.
    Failed(String),
}

/// Result of [`Aggregation::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum Start {
    /// Issue these queries and feed each result to `on_batch`.
    Fetch(Vec<FeedQuery>),
    /// Already complete; `Some(markup)` to insert, `None` for nothing.
    Finished(Option<String>),
}

/// Result of [`Aggregation::on_batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Pending { received: usize, expected: usize },
    Complete(Option<String>),
    /// Not collecting (late or premature arrival); ignored.
    Rejected,
}

#[derive(Debug)]
pub struct Aggregation {
    config: EffectiveConfig,
    reference: ReferenceDocument,
    store: Option<CandidateStore>,
    state: AggregationState,
    received: usize,
    expected: usize,
    markup: Option<String>,
}

impl Aggregation {
    pub fn new(config: EffectiveConfig) -> Self {
        ensure_metrics_described();
        let reference = ReferenceDocument::new(
            &config.url,
            &config.title,
            config.reference_excerpt(),
            config.tokenizer,
        );
        Self {
            config,
            reference,
            store: Some(CandidateStore::new()),
            state: AggregationState::Uninitialized,
            received: 0,
            expected: 0,
            markup: None,
        }
    }

    pub fn state(&self) -> AggregationState {
        self.state
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceDocument {
        &self.reference
    }

    /// The pool; `None` once rendered unless `debug` retained it.
    pub fn store(&self) -> Option<&CandidateStore> {
        self.store.as_ref()
    }

    /// `(received, expected)` batch counts.
    pub fn progress(&self) -> (usize, usize) {
        (self.received, self.expected)
    }

    /// Rendered block, once complete.
    pub fn markup(&self) -> Option<&str> {
        self.markup.as_deref()
    }

    /// Seed the pool and decide whether fetching is needed.
    ///
    /// Seeding order: the reference page (excluded), manual pages, then page
    /// exclusions (which overwrite). The "already full" check counts only
    /// rankable records.
    pub fn begin(&mut self) -> Start {
        if self.state != AggregationState::Uninitialized {
            warn!(target: "related", state = ?self.state, "begin called twice; ignored");
            return Start::Finished(None);
        }
        if !self.config.enable {
            info!(target: "related", "related posts disabled by config");
            self.state = AggregationState::Complete;
            self.store = None;
            return Start::Finished(None);
        }

        let Some(store) = self.store.as_mut() else {
            return Start::Finished(None);
        };
        store.mark_excluded(&self.reference.id);
        let seeded = store.preseed(&self.config.pages);
        for url in &self.config.excluded_urls {
            store.mark_excluded(url);
        }
        let available = store.ranked_len();
        debug!(target: "related", seeded, available, max = self.config.max, "pool seeded");

        if available >= self.config.max {
            return Start::Finished(self.finish());
        }

        let queries = plan_queries(&self.config);
        if queries.is_empty() {
            return Start::Finished(self.finish());
        }
        self.expected = queries.len();
        self.state = AggregationState::Collecting;
        info!(target: "related", expected = self.expected, "collecting feed batches");
        Start::Fetch(queries)
    }

    /// Count one arrived batch, ingesting its entries.
    pub fn on_batch(&mut self, arrival: BatchArrival) -> Progress {
        if self.state != AggregationState::Collecting {
            warn!(target: "related", state = ?self.state, "batch outside collecting state; ignored");
            counter!("related_batches_rejected_total").increment(1);
            return Progress::Rejected;
        }

        match arrival {
            BatchArrival::Entries(entries) => {
                let use_summary = self.config.use_summary;
                if let Some(store) = self.store.as_mut() {
                    let mut kept = 0u64;
                    for entry in entries {
                        if store.ingest(entry, &self.reference, use_summary) {
                            kept += 1;
                        }
                    }
                    counter!("related_entries_ingested_total").increment(kept);
                }
            }
            BatchArrival::Failed(reason) => {
                warn!(target: "related", %reason, "batch failed; counted as empty");
                counter!("related_batches_malformed_total").increment(1);
            }
        }

        self.received += 1;
        counter!("related_batches_total").increment(1);
        if self.received >= self.expected {
            Progress::Complete(self.finish())
        } else {
            Progress::Pending {
                received: self.received,
                expected: self.expected,
            }
        }
    }

    /// Rank, render, tear down. Runs at most once.
    fn finish(&mut self) -> Option<String> {
        self.state = AggregationState::Complete;
        let markup = self.store.as_ref().and_then(|store| {
            let slots = select(store.ranked(), self.config.min, self.config.max)?;
            let template = Template {
                format: &self.config.format,
                prefix: &self.config.prefix,
                suffix: &self.config.suffix,
                filler: &self.config.dummy,
            };
            Some(render(&slots, &template))
        });
        counter!("related_renders_total").increment(1);
        info!(
            target: "related",
            rendered = markup.is_some(),
            pool = self.store.as_ref().map(|s| s.len()).unwrap_or(0),
            "aggregation complete"
        );
        if !self.config.debug {
            self.store = None;
        }
        self.markup = markup.clone();
        markup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;

    fn cfg(json: &str) -> EffectiveConfig {
        EffectiveConfig::resolve(ConfigSource::parse(json, "json"), ConfigSource::default())
            .unwrap()
    }

    fn entry(url: &str, title: &str) -> RawEntry {
        RawEntry {
            url: url.into(),
            title: title.into(),
            summary: None,
            thumbnail: None,
            updated: None,
        }
    }

    #[test]
    fn full_preseed_skips_collection() {
        let mut agg = Aggregation::new(cfg(
            r#"{"url":"https://b.test/x","title":"T","labels":["a"],"max":1,
                "format":"${title}","pages":[{"url":"https://b.test/m","title":"Manual"}]}"#,
        ));
        assert_eq!(agg.begin(), Start::Finished(Some("Manual".into())));
        assert_eq!(agg.state(), AggregationState::Complete);
        assert_eq!(agg.progress(), (0, 0));
    }

    #[test]
    fn no_groups_renders_from_preseed_only() {
        let mut agg = Aggregation::new(cfg(
            r#"{"url":"https://b.test/x","title":"T","max":5,"min":2,"format":"${title}",
                "pages":[{"url":"https://b.test/m","title":"Manual"}]}"#,
        ));
        // one available < min 2
        assert_eq!(agg.begin(), Start::Finished(None));
        assert_eq!(agg.state(), AggregationState::Complete);
    }

    #[test]
    fn completes_once_on_last_batch() {
        let mut agg = Aggregation::new(cfg(
            r#"{"url":"https://b.test/x","title":"Cats","labels":["a","b"],"format":"${title};"}"#,
        ));
        let Start::Fetch(q) = agg.begin() else {
            panic!("expected fetch")
        };
        assert_eq!(q.len(), 2);
        assert_eq!(
            agg.on_batch(BatchArrival::Failed("boom".into())),
            Progress::Pending {
                received: 1,
                expected: 2
            }
        );
        assert_eq!(
            agg.on_batch(BatchArrival::Entries(vec![entry("https://b.test/c", "Cats")])),
            Progress::Complete(Some("Cats;".into()))
        );
        assert_eq!(agg.on_batch(BatchArrival::Entries(vec![])), Progress::Rejected);
        assert_eq!(agg.markup(), Some("Cats;"));
        assert!(agg.store().is_none());
    }

    #[test]
    fn batch_before_begin_is_rejected() {
        let mut agg = Aggregation::new(cfg(r#"{"url":"https://b.test/x","title":"T","labels":["a"]}"#));
        assert_eq!(agg.on_batch(BatchArrival::Entries(vec![])), Progress::Rejected);
        assert_eq!(agg.state(), AggregationState::Uninitialized);
    }

    #[test]
    fn debug_keeps_store_with_reference_sentinel() {
        let mut agg = Aggregation::new(cfg(
            r#"{"url":"https://b.test/x?m=1","title":"T","labels":["a"],"debug":true}"#,
        ));
        let _ = agg.begin();
        let _ = agg.on_batch(BatchArrival::Entries(vec![entry("https://b.test/x", "T")]));
        let store = agg.store().expect("retained");
        assert!(store.get("https://b.test/x").unwrap().score.is_excluded());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn disabled_run_produces_nothing() {
        let mut agg = Aggregation::new(cfg(
            r#"{"url":"https://b.test/x","title":"T","labels":["a"],"enable":false}"#,
        ));
        assert_eq!(agg.begin(), Start::Finished(None));
        assert_eq!(agg.begin(), Start::Finished(None));
    }
}
