use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::item::{GalleryColumns, NewsColumns};
use crate::preview::QualityThresholds;

const DEFAULT_ENV_PREFIX: &str = "SHEETFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub lazy: LazyConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedsConfig {
    #[serde(default)]
    pub gallery_csv_url: String,
    #[serde(default)]
    pub news_csv_url: String,
    #[serde(default)]
    pub gallery_columns: GalleryColumns,
    #[serde(default)]
    pub news_columns: NewsColumns,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            gallery_csv_url: String::new(),
            news_csv_url: String::new(),
            gallery_columns: GalleryColumns::default(),
            news_columns: NewsColumns::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichConfig {
    #[serde(default = "default_enrich_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_enrich_workers")]
    pub workers: usize,
    #[serde(default = "default_enrich_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub prefer_enriched_description: bool,
    #[serde(default)]
    pub prefer_enriched_title: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            endpoint: default_enrich_endpoint(),
            workers: default_enrich_workers(),
            timeout: default_enrich_timeout(),
            thresholds: QualityThresholds::default(),
            prefer_enriched_description: false,
            prefer_enriched_title: false,
        }
    }
}

fn default_enrich_endpoint() -> String {
    "https://api.microlink.io".into()
}

fn default_enrich_workers() -> usize {
    4
}

fn default_enrich_timeout() -> Duration {
    Duration::from_secs(8)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_media_workers")]
    pub workers: usize,
    #[serde(default = "default_media_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            workers: default_media_workers(),
            timeout: default_media_timeout(),
        }
    }
}

fn default_media_workers() -> usize {
    2
}

fn default_media_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LazyConfig {
    #[serde(default = "default_margin_rows")]
    pub margin_rows: u16,
    #[serde(default)]
    pub bypass: bool,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            margin_rows: default_margin_rows(),
            bypass: false,
        }
    }
}

fn default_margin_rows() -> u16 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.feeds.gallery_csv_url.is_empty() {
        base.feeds.gallery_csv_url = other.feeds.gallery_csv_url;
    }
    if !other.feeds.news_csv_url.is_empty() {
        base.feeds.news_csv_url = other.feeds.news_csv_url;
    }
    base.feeds.gallery_columns = other.feeds.gallery_columns;
    base.feeds.news_columns = other.feeds.news_columns;

    if !other.enrich.endpoint.is_empty() {
        base.enrich.endpoint = other.enrich.endpoint;
    }
    if other.enrich.workers != 0 {
        base.enrich.workers = other.enrich.workers;
    }
    base.enrich.timeout = other.enrich.timeout;
    base.enrich.thresholds = other.enrich.thresholds;
    base.enrich.prefer_enriched_description = other.enrich.prefer_enriched_description;
    base.enrich.prefer_enriched_title = other.enrich.prefer_enriched_title;

    if other.media.workers != 0 {
        base.media.workers = other.media.workers;
    }
    base.media.timeout = other.media.timeout;

    base.lazy = other.lazy;

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feeds.gallery_csv_url" => cfg.feeds.gallery_csv_url = value,
        "feeds.news_csv_url" => cfg.feeds.news_csv_url = value,
        "enrich.endpoint" => cfg.enrich.endpoint = value,
        "enrich.workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.enrich.workers = parsed;
            }
        }
        "enrich.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.enrich.timeout = duration;
            }
        }
        "enrich.prefer_enriched_description" => {
            cfg.enrich.prefer_enriched_description = parse_bool(&value);
        }
        "enrich.prefer_enriched_title" => {
            cfg.enrich.prefer_enriched_title = parse_bool(&value);
        }
        "media.workers" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.media.workers = parsed;
            }
        }
        "media.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.media.timeout = duration;
            }
        }
        "lazy.margin_rows" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.lazy.margin_rows = parsed;
            }
        }
        "lazy.bypass" => cfg.lazy.bypass = parse_bool(&value),
        "ui.theme" => cfg.ui.theme = value,
        _ => {}
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sheetfeed").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("SHEETFEED_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.enrich.workers, 4);
        assert_eq!(cfg.enrich.timeout, Duration::from_secs(8));
        assert_eq!(cfg.lazy.margin_rows, 8);
        assert!(!cfg.lazy.bypass);
        assert_eq!(cfg.ui.theme, "default");
    }

    #[test]
    fn reads_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "feeds:\n  gallery_csv_url: https://sheets.test/gallery.csv\nenrich:\n  workers: 6\n  timeout: 3s\nlazy:\n  bypass: true"
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("SHEETFEED_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.feeds.gallery_csv_url, "https://sheets.test/gallery.csv");
        assert_eq!(cfg.enrich.workers, 6);
        assert_eq!(cfg.enrich.timeout, Duration::from_secs(3));
        assert!(cfg.lazy.bypass);
    }

    #[test]
    fn env_overrides() {
        env::set_var("SHEETFEED_ENRICH__WORKERS", "2");
        env::set_var("SHEETFEED_FEEDS__NEWS_CSV_URL", "https://sheets.test/news.csv");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: None,
        })
        .unwrap();
        assert_eq!(cfg.enrich.workers, 2);
        assert_eq!(cfg.feeds.news_csv_url, "https://sheets.test/news.csv");
        env::remove_var("SHEETFEED_ENRICH__WORKERS");
        env::remove_var("SHEETFEED_FEEDS__NEWS_CSV_URL");
    }
}
