use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str as xml_from_str;
use serde::Deserialize;
use std::collections::HashMap;

use crate::feed::types::{FeedQuery, FeedSource, RawEntry};

const FEED_PATH: &str = "feeds/posts/summary";
const ALTERNATE: &str = "alternate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedFormat {
    #[default]
    Json,
    Atom,
}

impl FeedFormat {
    fn alt(self) -> &'static str {
        match self {
            FeedFormat::Json => "json",
            FeedFormat::Atom => "atom",
        }
    }

    pub fn parse(self, body: &str) -> Result<Vec<RawEntry>> {
        match self {
            FeedFormat::Json => parse_json_feed(body),
            FeedFormat::Atom => parse_atom_feed(body),
        }
    }
}

/* ----------------------------
JSON feed (`alt=json`)
---------------------------- */

#[derive(Debug, Deserialize)]
struct JsonRoot {
    feed: JsonFeed,
}

#[derive(Debug, Deserialize)]
struct JsonFeed {
    // A label with no posts has no `entry` key at all.
    #[serde(default)]
    entry: Vec<JsonEntry>,
}

#[derive(Debug, Deserialize)]
struct JsonEntry {
    #[serde(default)]
    link: Vec<JsonLink>,
    title: Option<JsonText>,
    summary: Option<JsonText>,
    updated: Option<JsonText>,
    #[serde(rename = "media$thumbnail")]
    thumbnail: Option<JsonThumb>,
}

#[derive(Debug, Deserialize)]
struct JsonLink {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    href: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonText {
    #[serde(rename = "$t", default)]
    t: String,
}

#[derive(Debug, Deserialize)]
struct JsonThumb {
    url: String,
}

pub fn parse_json_feed(s: &str) -> Result<Vec<RawEntry>> {
    let root: JsonRoot = serde_json::from_str(s).context("parsing blogger json feed")?;
    Ok(root
        .feed
        .entry
        .into_iter()
        .filter_map(|e| {
            let link = e.link.into_iter().find(|l| l.rel == ALTERNATE)?;
            let title = link
                .title
                .or_else(|| e.title.map(|t| t.t))
                .unwrap_or_default();
            Some(RawEntry {
                url: link.href,
                title,
                summary: e.summary.map(|s| s.t),
                thumbnail: e.thumbnail.map(|t| t.url),
                updated: e.updated.map(|u| u.t),
            })
        })
        .collect())
}

/* ----------------------------
Atom feed (`alt=atom`)
---------------------------- */

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    updated: Option<String>,
    title: Option<AtomText>,
    summary: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    #[serde(rename = "thumbnail", alias = "media:thumbnail")]
    thumbnail: Option<AtomThumb>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@rel", default)]
    rel: String,
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomThumb {
    #[serde(rename = "@url")]
    url: String,
}

pub fn parse_atom_feed(s: &str) -> Result<Vec<RawEntry>> {
    let feed: AtomFeed = xml_from_str(s).context("parsing blogger atom feed")?;
    Ok(feed
        .entry
        .into_iter()
        .filter_map(|e| {
            let link = e.link.into_iter().find(|l| l.rel == ALTERNATE)?;
            let title = link
                .title
                .or_else(|| e.title.map(|t| t.value))
                .unwrap_or_default();
            Some(RawEntry {
                url: link.href,
                title,
                summary: e.summary.map(|s| s.value),
                thumbnail: e.thumbnail.map(|t| t.url),
                updated: e.updated,
            })
        })
        .collect())
}

/// `{homepage}feeds/posts/summary[/-/{label}]?alt=…[&params][&max-results=N]`
pub fn feed_url(query: &FeedQuery, format: FeedFormat) -> Result<reqwest::Url> {
    let homepage = query
        .homepage
        .as_deref()
        .ok_or_else(|| anyhow!("no homepage url to fetch feeds from"))?;
    let base = reqwest::Url::parse(homepage)
        .with_context(|| format!("invalid homepage url {homepage}"))?;
    let mut url = base.join(FEED_PATH).context("joining feed path")?;
    if let Some(label) = &query.label {
        url.path_segments_mut()
            .map_err(|_| anyhow!("homepage url cannot be a base"))?
            .push("-")
            .push(label);
    }

    let mut qs = format!("alt={}", format.alt());
    if let Some(p) = query.params.as_deref().filter(|p| !p.is_empty()) {
        qs.push('&');
        qs.push_str(p.trim_start_matches('&'));
    }
    if let Some(n) = query.max_results {
        qs.push_str(&format!("&max-results={n}"));
    }
    url.set_query(Some(&qs));
    Ok(url)
}

/// Blogger-style feed source.
pub struct BloggerFeed {
    mode: Mode,
    format: FeedFormat,
}

enum Mode {
    Http(reqwest::Client),
    /// Bodies keyed by label; `None` is the latest-posts feed.
    Fixture(HashMap<Option<String>, String>),
}

impl BloggerFeed {
    pub fn http(format: FeedFormat) -> Self {
        Self {
            mode: Mode::Http(reqwest::Client::new()),
            format,
        }
    }

    pub fn from_fixtures(bodies: HashMap<Option<String>, String>, format: FeedFormat) -> Self {
        Self {
            mode: Mode::Fixture(bodies),
            format,
        }
    }

    fn parse_body(&self, body: &str) -> Result<Vec<RawEntry>> {
        let t0 = std::time::Instant::now();
        let out = self.format.parse(body)?;
        histogram!("related_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("related_feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for BloggerFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>> {
        match &self.mode {
            Mode::Fixture(bodies) => match bodies.get(&query.label) {
                Some(body) => self.parse_body(body),
                None => Err(anyhow!("no fixture for label {:?}", query.label)),
            },
            Mode::Http(client) => {
                let url = feed_url(query, self.format)?;
                tracing::debug!(target: "related", %url, "fetching feed");
                let body = client
                    .get(url.clone())
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?
                    .error_for_status()
                    .with_context(|| format!("HTTP error for {url}"))?
                    .text()
                    .await
                    .context("feed http .text()")?;
                self.parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Blogger"
    }
}
