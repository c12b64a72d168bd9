// tests/config_load.rs
use related_posts::config::{ConfigSource, EffectiveConfig, ENV_SITE_CONFIG_PATH};
use related_posts::rank::MinBound;
use related_posts::Tokenizer;
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("related_site.toml");
    fs::write(
        &p_toml,
        r#"
homepageUrl = "https://pets.test"
labels = ["cats", "dogs"]
gramify = "engramify"
min = -1
max = 4
sufix = "</ul>"

[[pages]]
url = "https://pets.test/pinned.html"
title = "Pinned"
badge = "new"
"#,
    )
    .unwrap();
    let site = ConfigSource::load_from(&p_toml).unwrap();
    assert_eq!(site.labels.as_deref(), Some(&["cats".to_string(), "dogs".to_string()][..]));
    assert_eq!(site.sufix.as_deref(), Some("</ul>"));
    assert_eq!(site.pages.as_ref().map(Vec::len), Some(1));

    let p_json = dir.path().join("related_site.json");
    fs::write(&p_json, r#"{"useSummary":true,"insertQuery":"<!--related-->"}"#).unwrap();
    let sj = ConfigSource::load_from(&p_json).unwrap();
    assert_eq!(sj.use_summary, Some(true));
    assert_eq!(sj.insert_query.as_deref(), Some("<!--related-->"));

    let eff = EffectiveConfig::resolve(
        site,
        ConfigSource::parse(r#"{"url":"https://pets.test/a.html?m=1","title":"A"}"#, "json"),
    )
    .unwrap();
    assert_eq!(eff.url, "https://pets.test/a.html");
    assert_eq!(eff.homepage_url.as_deref(), Some("https://pets.test/"));
    assert_eq!(eff.tokenizer, Tokenizer::Words);
    assert_eq!(eff.min, MinBound::Pad);
    assert_eq!(eff.max, 4);
    assert_eq!(eff.suffix, "</ul>");
    assert_eq!(eff.pages[0].extra_fields().get("badge").map(String::as_str), Some("new"));
}

#[test]
fn broken_file_is_an_error_but_broken_block_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("related_site.toml");
    fs::write(&p, "labels = [unterminated").unwrap();
    assert!(ConfigSource::load_from(&p).is_err());

    assert_eq!(ConfigSource::parse("{not json", "json"), ConfigSource::default());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var(ENV_SITE_CONFIG_PATH);

    // 1) nothing on disk → empty
    let v = ConfigSource::load_default().unwrap();
    assert_eq!(v, ConfigSource::default());

    // 2) JSON fallback in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("related_site.json"), r#"{"max":2}"#).unwrap();
    assert_eq!(ConfigSource::load_default().unwrap().max, Some(2));

    // 3) TOML beats JSON
    fs::write(cfg_dir.join("related_site.toml"), "max = 3").unwrap();
    assert_eq!(ConfigSource::load_default().unwrap().max, Some(3));

    // 4) env var wins
    let p_env = tmp.path().join("site.json");
    fs::write(&p_env, r#"{"max":7}"#).unwrap();
    env::set_var(ENV_SITE_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(ConfigSource::load_default().unwrap().max, Some(7));

    // 5) env var pointing nowhere is an error
    env::set_var(ENV_SITE_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(ConfigSource::load_default().is_err());
    env::remove_var(ENV_SITE_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
