// src/rank.rs
//! Selection policy: order the pool and apply the min/max bounds.
//!
//! - Descending score; ties go to the more recently updated record, records
//!   without a timestamp sort as the oldest. Equal keys keep pool order.
//! - Take `min(max, available)`.
//! - Below `min` → nothing is rendered, unless `min` is the pad sentinel, in
//!   which case exactly `max` slots are produced and the shortfall is filler.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::store::CandidateRecord;

/// Raw `min` value that requests padding.
pub const PAD_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinBound {
    AtLeast(usize),
    Pad,
}

impl MinBound {
    /// `-1` is the pad sentinel; any other negative means "no minimum".
    pub fn from_raw(raw: i64) -> Self {
        if raw == PAD_SENTINEL {
            MinBound::Pad
        } else {
            MinBound::AtLeast(raw.max(0) as usize)
        }
    }
}

/// One output position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    Item(&'a CandidateRecord),
    Filler,
}

/// Order `records` (exclusions are skipped) by score, then recency.
pub fn rank<'a, I>(records: I) -> Vec<&'a CandidateRecord>
where
    I: IntoIterator<Item = &'a CandidateRecord>,
{
    let mut keyed: Vec<(f64, Option<DateTime<Utc>>, &CandidateRecord)> = records
        .into_iter()
        .filter_map(|r| r.score.value().map(|s| (s, r.updated_at(), r)))
        .collect();
    // stable: equal keys keep insertion order
    keyed.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.cmp(&a.1))
    });
    keyed.into_iter().map(|(_, _, r)| r).collect()
}

/// Apply the bounds. `None` means "render nothing".
pub fn select<'a, I>(records: I, min: MinBound, max: usize) -> Option<Vec<Slot<'a>>>
where
    I: IntoIterator<Item = &'a CandidateRecord>,
{
    let ranked = rank(records);
    let take = max.min(ranked.len());

    let mut slots: Vec<Slot<'a>> = ranked.into_iter().take(take).map(Slot::Item).collect();
    match min {
        MinBound::AtLeast(m) if take < m => None,
        MinBound::AtLeast(_) => Some(slots),
        MinBound::Pad => {
            slots.resize(max, Slot::Filler);
            Some(slots)
        }
    }
}
