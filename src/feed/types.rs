// src/feed/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One fetched entry, already lifted out of the feed's transport shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub thumbnail: Option<String>,
    pub updated: Option<String>, // RFC 3339
}

/// One requested group: a label feed, or the "latest posts" feed when `label` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedQuery {
    pub homepage: Option<String>,
    pub label: Option<String>,
    /// Extra query string appended verbatim (`orderby=updated&...`).
    pub params: Option<String>,
    pub max_results: Option<u32>,
}

/// Delivers one batch per query. Errors are counted as an arrived (empty) batch
/// by the caller, never retried.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>>;
    fn name(&self) -> &'static str;
}
