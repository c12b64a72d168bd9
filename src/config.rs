// src/config.rs
//! Related-posts configuration: raw per-source options and the resolved,
//! typed configuration a run works from.
//!
//! Two sources feed one run: the site-level block (lower precedence) and the
//! page-level block (higher precedence). Scalars from the page overwrite the
//! site; `pages` and `excludedUrls` are concatenated (site first, or page
//! first when `pushPages` is set).

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rank::MinBound;
use crate::tokenize::Tokenizer;

pub const ENV_SITE_CONFIG_PATH: &str = "RELATED_SITE_CONFIG_PATH";
pub const DEFAULT_SITE_CONFIG_TOML: &str = "config/related_site.toml";
pub const DEFAULT_SITE_CONFIG_JSON: &str = "config/related_site.json";

pub const DEFAULT_MIN: i64 = 1;
pub const DEFAULT_MAX: i64 = 5;
/// Ceiling for `max`: one label feed page never holds more entries.
pub const MAX_CAP: i64 = crate::feed::SINGLE_LABEL_MAX_RESULTS as i64;
pub const DEFAULT_INSERT_QUERY: &str = "#related-posts-site-json";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// A manually specified related page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualPage {
    /// `false` keeps the entry in config without showing it.
    #[serde(default)]
    pub visible: Option<bool>,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    /// Any other key is exposed to the item template as `${key}`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ManualPage {
    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }

    /// Extra keys flattened to strings for template substitution. `score` is
    /// system-managed and never taken from config.
    pub fn extra_fields(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("score"))
            .map(|(k, v)| {
                let s = match v {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), s)
            })
            .collect()
    }
}

/// One configuration block as written by the site or page author.
/// Every option is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSource {
    pub debug: Option<bool>,
    pub enable: Option<bool>,
    pub push_pages: Option<bool>,
    pub homepage_url: Option<String>,
    pub params: Option<String>,
    pub labels: Option<Vec<String>>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub use_snippet: Option<bool>,
    pub use_summary: Option<bool>,
    /// Tokenizer selector. `useSetType` and `tokenizer` are older spellings;
    /// `gramify` wins when several are present.
    pub gramify: Option<String>,
    pub use_set_type: Option<String>,
    pub tokenizer: Option<String>,
    pub use_last_posts: Option<bool>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub insert_query: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Misspelled `suffix`, still found in older blocks.
    pub sufix: Option<String>,
    pub dummy: Option<String>,
    pub format: Option<String>,
    pub pages: Option<Vec<ManualPage>>,
    pub excluded_urls: Option<Vec<String>>,
    pub fetch_timeout_ms: Option<u64>,
}

impl ConfigSource {
    /// Parse a block, JSON or TOML. Malformed input degrades to an empty
    /// source (a broken config block must not break the page).
    pub fn parse(s: &str, hint_ext: &str) -> Self {
        match parse_source(s, hint_ext) {
            Ok(src) => src,
            Err(e) => {
                tracing::warn!(error = %e, "unparsable related-posts config; treating as empty");
                Self::default()
            }
        }
    }

    /// Same degradation rule for an already-decoded JSON value.
    pub fn from_value(v: serde_json::Value) -> Self {
        if v.is_null() {
            return Self::default();
        }
        serde_json::from_value(v).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid related-posts config object; treating as empty");
            Self::default()
        })
    }

    /// Load a block from an explicit path (format by extension).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading related-posts config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_source(&content, ext.as_str())
    }

    /// Site defaults using env var + fallbacks:
    /// 1) $RELATED_SITE_CONFIG_PATH
    /// 2) config/related_site.toml
    /// 3) config/related_site.json
    /// 4) empty
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SITE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!(
                "RELATED_SITE_CONFIG_PATH points to non-existent path"
            ));
        }
        for p in [DEFAULT_SITE_CONFIG_TOML, DEFAULT_SITE_CONFIG_JSON] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }
}

fn parse_source(s: &str, hint_ext: &str) -> Result<ConfigSource> {
    if s.trim().is_empty() {
        return Ok(ConfigSource::default());
    }
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing related-posts TOML config");
    }
    // JSON first, then TOML as a fallback for unhinted input.
    match serde_json::from_str(s) {
        Ok(v) => Ok(v),
        Err(json_err) => toml::from_str(s).map_err(|toml_err| {
            anyhow!("neither JSON ({json_err}) nor TOML ({toml_err})")
        }),
    }
}

/// Fully resolved options for one run. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub debug: bool,
    pub enable: bool,
    /// Always ends with `/`. `None` only when neither given nor derivable.
    pub homepage_url: Option<String>,
    pub params: Option<String>,
    pub labels: Vec<String>,
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
    pub use_snippet: bool,
    pub use_summary: bool,
    pub tokenizer: Tokenizer,
    pub use_last_posts: bool,
    pub min: MinBound,
    pub max: usize,
    pub insert_query: String,
    pub prefix: String,
    pub suffix: String,
    pub dummy: String,
    pub format: String,
    pub pages: Vec<ManualPage>,
    pub excluded_urls: Vec<String>,
    pub fetch_timeout: Duration,
}

impl EffectiveConfig {
    /// Merge `site` (lower precedence) with `page` (higher precedence).
    ///
    /// Fails only when the reference page is unknown (`url`/`title` missing).
    pub fn resolve(site: ConfigSource, page: ConfigSource) -> Result<Self> {
        let push_pages = page.push_pages.or(site.push_pages).unwrap_or(false);
        let pages = concat(site.pages, page.pages, push_pages);
        let excluded_urls = concat(site.excluded_urls, page.excluded_urls, push_pages);

        let url = match page.url.or(site.url) {
            Some(u) if !u.trim().is_empty() => u,
            _ => bail!("related-posts config has no reference url"),
        };
        let title = match page.title.or(site.title) {
            Some(t) => t,
            None => bail!("related-posts config has no reference title"),
        };
        let url = crate::store::normalize_id(&url);

        let homepage_url = page
            .homepage_url
            .or(site.homepage_url)
            .filter(|h| !h.trim().is_empty())
            .map(|h| with_trailing_slash(&crate::store::normalize_id(&h)))
            .or_else(|| derive_homepage(&url));

        Ok(Self {
            debug: page.debug.or(site.debug).unwrap_or(false),
            enable: page.enable.or(site.enable).unwrap_or(true),
            homepage_url,
            params: page
                .params
                .or(site.params)
                .filter(|p| !p.trim().is_empty()),
            labels: page.labels.or(site.labels).unwrap_or_default(),
            url,
            title,
            snippet: page.snippet.or(site.snippet).filter(|s| !s.is_empty()),
            use_snippet: page.use_snippet.or(site.use_snippet).unwrap_or(false),
            use_summary: page.use_summary.or(site.use_summary).unwrap_or(false),
            tokenizer: page
                .gramify
                .or(page.use_set_type)
                .or(page.tokenizer)
                .or(site.gramify)
                .or(site.use_set_type)
                .or(site.tokenizer)
                .map(|g| Tokenizer::from_name(&g))
                .unwrap_or_default(),
            use_last_posts: page.use_last_posts.or(site.use_last_posts).unwrap_or(false),
            min: MinBound::from_raw(page.min.or(site.min).unwrap_or(DEFAULT_MIN)),
            max: page.max.or(site.max).unwrap_or(DEFAULT_MAX).clamp(0, MAX_CAP) as usize,
            insert_query: page
                .insert_query
                .or(site.insert_query)
                .unwrap_or_else(|| DEFAULT_INSERT_QUERY.to_string()),
            prefix: page.prefix.or(site.prefix).unwrap_or_default(),
            suffix: page
                .suffix
                .or(page.sufix)
                .or(site.suffix)
                .or(site.sufix)
                .unwrap_or_default(),
            dummy: page.dummy.or(site.dummy).unwrap_or_default(),
            format: page.format.or(site.format).unwrap_or_default(),
            pages,
            excluded_urls,
            fetch_timeout: Duration::from_millis(
                page.fetch_timeout_ms
                    .or(site.fetch_timeout_ms)
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS),
            ),
        })
    }

    /// The reference excerpt, only when snippets are enabled.
    pub fn reference_excerpt(&self) -> Option<&str> {
        if self.use_snippet {
            self.snippet.as_deref()
        } else {
            None
        }
    }
}

fn concat<T>(site: Option<Vec<T>>, page: Option<Vec<T>>, page_first: bool) -> Vec<T> {
    let (mut first, second) = if page_first {
        (page.unwrap_or_default(), site.unwrap_or_default())
    } else {
        (site.unwrap_or_default(), page.unwrap_or_default())
    };
    first.extend(second);
    first
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

/// `scheme://host[:port]/` of the reference page.
fn derive_homepage(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(with_trailing_slash(&origin.ascii_serialization()))
}
