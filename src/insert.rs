// src/insert.rs
//! Splice rendered markup into a host document right after an anchor.
//!
//! `#id` queries target the element carrying that id: the markup goes after
//! its closing tag (or after the tag itself when it is self-closing). Any
//! other query is a literal text marker. Missing anchor → `None`.

use regex::Regex;

pub fn insert_after(document: &str, query: &str, markup: &str) -> Option<String> {
    let at = match query.strip_prefix('#') {
        Some(id) if !id.is_empty() => element_end(document, id)?,
        _ if query.is_empty() => return None,
        _ => document.find(query)? + query.len(),
    };
    let mut out = String::with_capacity(document.len() + markup.len());
    out.push_str(&document[..at]);
    out.push_str(markup);
    out.push_str(&document[at..]);
    Some(out)
}

/// Byte offset just past the element with `id`.
fn element_end(document: &str, id: &str) -> Option<usize> {
    let open = Regex::new(&format!(
        r#"(?is)<([a-z][a-z0-9-]*)\b[^>]*\bid\s*=\s*["']{}["'][^>]*>"#,
        regex::escape(id)
    ))
    .ok()?;
    let caps = open.captures(document)?;
    let whole = caps.get(0)?;
    if whole.as_str().ends_with("/>") {
        return Some(whole.end());
    }
    let tag = caps.get(1)?.as_str();
    let close = Regex::new(&format!(r"(?i)</{}\s*>", regex::escape(tag))).ok()?;
    let m = close.find(&document[whole.end()..])?;
    Some(whole.end() + m.end())
}
