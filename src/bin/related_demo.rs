//! Demo that renders a related-posts block from a config file and local feed files.
//!
//! Usage: `related_demo <config.{json,toml}> <feed-dir>`
//! `<feed-dir>` holds `<label>.json` per label and `latest.json` for the latest-posts feed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use related_posts::config::{ConfigSource, EffectiveConfig};
use related_posts::feed::blogger::{BloggerFeed, FeedFormat};
use related_posts::pipeline;

const LATEST_FILE: &str = "latest";

fn load_fixtures(dir: &Path) -> Result<HashMap<Option<String>, String>> {
    let mut out = HashMap::new();
    for e in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = e?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let key = (stem != LATEST_FILE).then(|| stem.to_string());
        out.insert(key, std::fs::read_to_string(&path)?);
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let cfg_path = PathBuf::from(args.next().context("missing config path")?);
    let feed_dir = PathBuf::from(args.next().context("missing feed directory")?);

    let site = ConfigSource::load_from(&cfg_path)?;
    let cfg = EffectiveConfig::resolve(site, ConfigSource::default())?;
    let source = BloggerFeed::from_fixtures(load_fixtures(&feed_dir)?, FeedFormat::Json);

    let agg = pipeline::run(cfg, Arc::new(source)).await;
    match agg.markup() {
        Some(html) => println!("{html}"),
        None => println!("(no related posts)"),
    }
    Ok(())
}
