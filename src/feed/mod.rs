// src/feed/mod.rs
pub mod blogger;
pub mod types;

use crate::config::EffectiveConfig;
use crate::feed::types::FeedQuery;

/// Page size when only one label is fetched.
pub const SINGLE_LABEL_MAX_RESULTS: u32 = 100;
/// Page size per label when two labels are fetched.
pub const TWO_LABEL_MAX_RESULTS: u32 = 50;

/// Does `params` already pin the page size?
fn has_max_results(params: Option<&str>) -> bool {
    params
        .map(|p| p.split('&').any(|kv| kv.starts_with("max-results=")))
        .unwrap_or(false)
}

/// Queries for one run: one per label, plus the latest-posts feed when enabled.
///
/// Unless `params` carries `max-results=`, a single label asks for 100 entries
/// and two labels ask for 50 each; three or more use the feed's default.
pub fn plan_queries(cfg: &EffectiveConfig) -> Vec<FeedQuery> {
    let per_label = if has_max_results(cfg.params.as_deref()) {
        None
    } else {
        match cfg.labels.len() {
            1 => Some(SINGLE_LABEL_MAX_RESULTS),
            2 => Some(TWO_LABEL_MAX_RESULTS),
            _ => None,
        }
    };

    let mut out: Vec<FeedQuery> = cfg
        .labels
        .iter()
        .map(|label| FeedQuery {
            homepage: cfg.homepage_url.clone(),
            label: Some(label.clone()),
            params: cfg.params.clone(),
            max_results: per_label,
        })
        .collect();
    if cfg.use_last_posts {
        out.push(FeedQuery {
            homepage: cfg.homepage_url.clone(),
            label: None,
            params: cfg.params.clone(),
            max_results: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, EffectiveConfig};

    fn cfg(json: &str) -> EffectiveConfig {
        EffectiveConfig::resolve(ConfigSource::parse(json, "json"), ConfigSource::default())
            .unwrap()
    }

    #[test]
    fn page_size_depends_on_label_count() {
        let one = plan_queries(&cfg(r#"{"url":"https://b.test/x","title":"T","labels":["a"]}"#));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].max_results, Some(100));
        assert_eq!(one[0].homepage.as_deref(), Some("https://b.test/"));

        let two = plan_queries(&cfg(r#"{"url":"https://b.test/x","title":"T","labels":["a","b"]}"#));
        assert!(two.iter().all(|q| q.max_results == Some(50)));

        let three =
            plan_queries(&cfg(r#"{"url":"https://b.test/x","title":"T","labels":["a","b","c"]}"#));
        assert!(three.iter().all(|q| q.max_results.is_none()));
    }

    #[test]
    fn explicit_max_results_wins() {
        let q = plan_queries(&cfg(
            r#"{"url":"https://b.test/x","title":"T","labels":["a"],"params":"orderby=updated&max-results=7"}"#,
        ));
        assert_eq!(q[0].max_results, None);
    }

    #[test]
    fn latest_posts_adds_unlabelled_group() {
        let q = plan_queries(&cfg(
            r#"{"url":"https://b.test/x","title":"T","labels":["a"],"useLastPosts":true}"#,
        ));
        assert_eq!(q.len(), 2);
        assert_eq!(q[1].label, None);
        assert_eq!(q[1].max_results, None);
    }

    #[test]
    fn no_groups_no_queries() {
        assert!(plan_queries(&cfg(r#"{"url":"https://b.test/x","title":"T"}"#)).is_empty());
    }
}
