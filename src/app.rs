use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use crate::config;
use crate::feed::{FeedSource, HttpFeedSource};
use crate::media;
use crate::preview;
use crate::ui;

const FEED_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    cfg.feeds
        .gallery_columns
        .validate()
        .context("gallery column map")?;
    cfg.feeds.news_columns.validate().context("news column map")?;

    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let gallery_source = feed_source(&cfg.feeds.gallery_csv_url)?;
    let news_source = feed_source(&cfg.feeds.news_csv_url)?;

    let (media_tx, media_rx) = unbounded();
    let media_manager = media::Manager::new(
        media::Config {
            workers: cfg.media.workers,
            timeout: cfg.media.timeout,
            http_client: None,
        },
        media_tx,
    )
    .ok();

    let (preview_tx, preview_rx) = unbounded();
    let preview_manager = preview::Manager::new(
        preview::Config {
            endpoint: cfg.enrich.endpoint.clone(),
            workers: cfg.enrich.workers,
            timeout: cfg.enrich.timeout,
            thresholds: cfg.enrich.thresholds,
            http_client: None,
        },
        preview_tx,
    )
    .ok();

    let options = ui::Options {
        config: cfg,
        gallery_source,
        news_source,
        media_manager,
        media_rx,
        preview_manager,
        preview_rx,
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn feed_source(url: &str) -> Result<Option<Arc<dyn FeedSource>>> {
    if url.trim().is_empty() {
        return Ok(None);
    }
    let source = HttpFeedSource::new(url.trim().to_string(), FEED_TIMEOUT)
        .context("build feed client")?;
    Ok(Some(Arc::new(source)))
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/sheetfeed/config.yaml".to_string()
    }
}
