// src/render.rs
//! Markup rendering for the selected list.
//!
//! Each item instantiates the `format` template: `${name}` is replaced by the
//! record field `name` (case-insensitive), missing fields become `""`, and
//! `${$}` yields a literal `$`. Filler slots emit the `dummy` string verbatim.
//! Items are joined and wrapped as `prefix + items + suffix`.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

use crate::rank::Slot;
use crate::store::CandidateRecord;

/// Reserved placeholder name that produces a literal `$`.
const DOLLAR: &str = "$";

#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    pub format: &'a str,
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub filler: &'a str,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\$\{(.*?)\}").expect("placeholder regex"))
}

/// Instantiate `format` for one record.
pub fn render_item(format: &str, record: &CandidateRecord) -> String {
    placeholder_regex()
        .replace_all(format, |caps: &Captures<'_>| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if name == DOLLAR {
                return DOLLAR.to_string();
            }
            record
                .field(name)
                .map(|v| v.into_owned())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Render the whole block.
pub fn render(slots: &[Slot<'_>], template: &Template<'_>) -> String {
    let mut out = String::from(template.prefix);
    for slot in slots {
        match slot {
            Slot::Item(record) => out.push_str(&render_item(template.format, record)),
            Slot::Filler => out.push_str(template.filler),
        }
    }
    out.push_str(template.suffix);
    out
}
