// src/store.rs
//! Candidate pool for one ranking run.
//!
//! - Keyed by normalized URL (query string stripped), insertion-ordered.
//! - First write wins: a later insert for a known id is a no-op.
//! - Exclusions (`Score::Excluded`) stay in the pool so that overlapping fetch
//!   batches cannot reintroduce the same URL.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::config::ManualPage;
use crate::feed::types::RawEntry;
use crate::similarity::jaccard;
use crate::tokenize::{decode_snippet, TokenSet, Tokenizer};

/// Strip the query string; `https://a.b/p.html?m=1` and `https://a.b/p.html` are one page.
pub fn normalize_id(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.split_once('?') {
        Some((head, _)) => head.to_string(),
        None => trimmed.to_string(),
    }
}

/// Relatedness of a candidate. Fetched candidates live in `[0, 1]`; manual ones
/// score above `1` so they always outrank fetched ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Score {
    Excluded,
    Ranked(f64),
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Excluded => None,
            Score::Ranked(v) => Some(v),
        }
    }

    pub fn is_excluded(self) -> bool {
        matches!(self, Score::Excluded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    /// Listed in the page/site config (`pages`), or an exclusion supplied by the page.
    Manual,
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    /// URL as delivered (may still carry a query string).
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
    /// Raw last-modified timestamp, RFC 3339 when it parses.
    pub updated: Option<String>,
    pub score: Score,
    pub provenance: Provenance,
    /// Additional template fields carried by manual entries.
    pub extra: BTreeMap<String, String>,
}

impl CandidateRecord {
    fn excluded(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            thumbnail: None,
            updated: None,
            score: Score::Excluded,
            provenance: Provenance::Manual,
            extra: BTreeMap::new(),
        }
    }

    /// Parsed recency used for tie-breaks. Missing or unparsable → `None` (oldest).
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Template field lookup; `name` is matched case-insensitively.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        let key = name.to_ascii_lowercase();
        match key.as_str() {
            "url" => Some(Cow::Borrowed(self.url.as_str())),
            "title" => Some(Cow::Borrowed(self.title.as_str())),
            "thumbnail" => self.thumbnail.as_deref().map(Cow::Borrowed),
            "updated" => self.updated.as_deref().map(Cow::Borrowed),
            "score" => self.score.value().map(|v| Cow::Owned(v.to_string())),
            _ => self
                .extra
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&key))
                .map(|(_, v)| Cow::Borrowed(v.as_str())),
        }
    }
}

/// The page the related list is built for. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ReferenceDocument {
    pub id: String,
    pub title: String,
    pub excerpt: Option<String>,
    tokenizer: Tokenizer,
    tokens: TokenSet,
}

impl ReferenceDocument {
    /// Tokenize title (+ decoded excerpt, when given) into one set.
    pub fn new(url: &str, title: &str, excerpt: Option<&str>, tokenizer: Tokenizer) -> Self {
        let mut tokens = tokenizer.tokenize(title);
        let excerpt = excerpt.map(decode_snippet);
        if let Some(ex) = excerpt.as_deref() {
            tokenizer.extend(ex, &mut tokens);
        }
        Self {
            id: normalize_id(url),
            title: title.to_string(),
            excerpt,
            tokenizer,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn tokenizer(&self) -> Tokenizer {
        self.tokenizer
    }

    /// Jaccard relatedness of `other` to this document.
    pub fn relatedness(&self, other: &TokenSet) -> f64 {
        jaccard(&self.tokens, other)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    records: Vec<(String, CandidateRecord)>,
    index: HashMap<String, usize>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless `id` is already present. Returns `true` when inserted.
    pub fn insert(&mut self, id: String, record: CandidateRecord) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.records.len());
        self.records.push((id, record));
        true
    }

    /// Insert or overwrite `url` with the exclusion sentinel.
    pub fn mark_excluded(&mut self, url: &str) {
        let id = normalize_id(url);
        match self.index.get(&id) {
            Some(&i) => self.records[i].1.score = Score::Excluded,
            None => {
                self.insert(id, CandidateRecord::excluded(url));
            }
        }
    }

    /// Seed manually specified pages in order, skipping `visible: false`.
    ///
    /// With `n` visible pages, the one at visible position `p` (0-based) scores
    /// `n + 1 - p`: always `> 1`, and earlier entries outrank later ones.
    /// Returns how many were inserted.
    pub fn preseed(&mut self, pages: &[ManualPage]) -> usize {
        let visible: Vec<&ManualPage> = pages.iter().filter(|p| p.is_visible()).collect();
        let base = visible.len() + 1;
        let mut inserted = 0;
        for (pos, page) in visible.into_iter().enumerate() {
            let record = CandidateRecord {
                url: page.url.clone(),
                title: page.title.clone(),
                thumbnail: page.thumbnail.clone(),
                updated: page.updated.clone(),
                score: Score::Ranked((base - pos) as f64),
                provenance: Provenance::Manual,
                extra: page.extra_fields(),
            };
            if self.insert(normalize_id(&page.url), record) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Score one fetched entry against `reference` and store it.
    ///
    /// Skipped (returns `false`) when the id is already known or is the
    /// reference page itself.
    pub fn ingest(
        &mut self,
        entry: RawEntry,
        reference: &ReferenceDocument,
        use_summary: bool,
    ) -> bool {
        let id = normalize_id(&entry.url);
        if id == reference.id || self.index.contains_key(&id) {
            return false;
        }
        let tokenizer = reference.tokenizer();
        let mut tokens = tokenizer.tokenize(&entry.title);
        if use_summary {
            if let Some(summary) = entry.summary.as_deref().filter(|s| !s.is_empty()) {
                tokenizer.extend(&decode_snippet(summary), &mut tokens);
            }
        }
        let score = reference.relatedness(&tokens);
        self.insert(
            id,
            CandidateRecord {
                url: entry.url,
                title: entry.title,
                thumbnail: entry.thumbnail.filter(|t| !t.is_empty()),
                updated: entry.updated.filter(|u| !u.is_empty()),
                score: Score::Ranked(score),
                provenance: Provenance::Fetched,
                extra: BTreeMap::new(),
            },
        )
    }

    pub fn get(&self, url: &str) -> Option<&CandidateRecord> {
        self.index
            .get(&normalize_id(url))
            .map(|&i| &self.records[i].1)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(&normalize_id(url))
    }

    /// All records, exclusions included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records that can appear in the output.
    pub fn ranked_len(&self) -> usize {
        self.ranked().count()
    }

    /// Insertion-ordered iterator over every record.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.records.iter().map(|(_, r)| r)
    }

    /// Insertion-ordered iterator over non-excluded records.
    pub fn ranked(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.iter().filter(|r| !r.score.is_excluded())
    }
}
