use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewMetadata {
    pub title: String,
    pub description: String,
    pub image: String,
    pub image_kind: String,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}

impl PreviewMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.image.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
// Empirical tuning values from the source deployment.
pub struct QualityThresholds {
    #[serde(default = "default_min_edge")]
    pub min_edge: u32,
    #[serde(default = "default_reference_width")]
    pub reference_width: u32,
    #[serde(default = "default_reference_height")]
    pub reference_height: u32,
    #[serde(default = "default_min_area_ratio")]
    pub min_area_ratio: f64,
    #[serde(default = "default_square_aspect_low")]
    pub square_aspect_low: f64,
    #[serde(default = "default_square_aspect_high")]
    pub square_aspect_high: f64,
    #[serde(default = "default_square_max_edge")]
    pub square_max_edge: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_edge: default_min_edge(),
            reference_width: default_reference_width(),
            reference_height: default_reference_height(),
            min_area_ratio: default_min_area_ratio(),
            square_aspect_low: default_square_aspect_low(),
            square_aspect_high: default_square_aspect_high(),
            square_max_edge: default_square_max_edge(),
        }
    }
}

fn default_min_edge() -> u32 {
    200
}
fn default_reference_width() -> u32 {
    600
}
fn default_reference_height() -> u32 {
    315
}
fn default_min_area_ratio() -> f64 {
    0.5
}
fn default_square_aspect_low() -> f64 {
    0.9
}
fn default_square_aspect_high() -> f64 {
    1.1
}
fn default_square_max_edge() -> u32 {
    320
}

pub fn usable_image(meta: &PreviewMetadata, t: &QualityThresholds) -> bool {
    if meta.image.trim().is_empty() {
        return false;
    }
    let kind = meta.image_kind.to_lowercase();
    if kind.contains("svg") || meta.image.to_lowercase().ends_with(".svg") {
        return false;
    }
    let (Some(width), Some(height)) = (meta.image_width, meta.image_height) else {
        // Dimensions unknown: nothing further to judge by.
        return true;
    };
    if width == 0 || height == 0 {
        return false;
    }
    if width.min(height) < t.min_edge {
        return false;
    }
    let area = f64::from(width) * f64::from(height);
    let reference = f64::from(t.reference_width) * f64::from(t.reference_height);
    if area < reference * t.min_area_ratio {
        return false;
    }
    let aspect = f64::from(width) / f64::from(height);
    if (t.square_aspect_low..=t.square_aspect_high).contains(&aspect)
        && width.max(height) < t.square_max_edge
    {
        return false;
    }
    true
}

pub trait MetadataProvider: Send + Sync {
    fn fetch(&self, link: &str, screenshot: bool) -> Result<PreviewMetadata>;
}

pub struct HttpProvider {
    client: Client,
    endpoint: String,
}

impl HttpProvider {
    pub fn new(endpoint: String, timeout: Duration, client: Option<Client>) -> Result<Self> {
        let client = match client {
            Some(client) => client,
            None => Client::builder()
                .timeout(timeout)
                .build()
                .context("preview: build http client")?,
        };
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, link: &str, screenshot: bool) -> String {
        let encoded = utf8_percent_encode(link, NON_ALPHANUMERIC);
        format!(
            "{}?url={}&meta=true&audio=false&video=false&screenshot={}",
            self.endpoint, encoded, screenshot
        )
    }
}

impl MetadataProvider for HttpProvider {
    fn fetch(&self, link: &str, screenshot: bool) -> Result<PreviewMetadata> {
        let response = self
            .client
            .get(self.request_url(link, screenshot))
            .send()
            .context("preview: provider request")?;
        if !response.status().is_success() {
            return Err(anyhow!("preview: provider status {}", response.status()));
        }
        let body: ProviderResponse = response.json().context("preview: provider json")?;
        Ok(body.into_metadata(screenshot))
    }
}

// Expected wire shape; any deviation deserializes to defaults and comes
// out as empty metadata rather than an error surfaced to the feed.
#[derive(Debug, Default, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: ProviderData,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<ProviderImage>,
    #[serde(default)]
    screenshot: Option<ProviderScreenshot>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderImage {
    Url(String),
    Object {
        #[serde(default)]
        url: String,
        #[serde(default, rename = "type")]
        kind: String,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ProviderScreenshot {
    #[serde(default)]
    url: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl ProviderResponse {
    fn into_metadata(self, screenshot: bool) -> PreviewMetadata {
        if !self.status.eq_ignore_ascii_case("success") {
            return PreviewMetadata::default();
        }
        let mut meta = PreviewMetadata {
            title: self.data.title.unwrap_or_default(),
            description: self.data.description.unwrap_or_default(),
            ..PreviewMetadata::default()
        };
        if screenshot {
            if let Some(shot) = self.data.screenshot {
                meta.image = shot.url;
                meta.image_kind = "screenshot".into();
                meta.image_width = shot.width;
                meta.image_height = shot.height;
                return meta;
            }
        }
        match self.data.image {
            Some(ProviderImage::Url(url)) => meta.image = url,
            Some(ProviderImage::Object {
                url,
                kind,
                width,
                height,
            }) => {
                meta.image = url;
                meta.image_kind = kind;
                meta.image_width = width;
                meta.image_height = height;
            }
            None => {}
        }
        meta
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub workers: usize,
    pub timeout: Duration,
    pub thresholds: QualityThresholds,
    pub http_client: Option<Client>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            workers: 4,
            timeout: Duration::from_secs(8),
            thresholds: QualityThresholds::default(),
            http_client: None,
        }
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub card_id: u64,
    pub link: String,
    pub metadata: PreviewMetadata,
}

struct Job {
    card_id: u64,
    link: String,
}

struct Inner {
    provider: Arc<dyn MetadataProvider>,
    thresholds: QualityThresholds,
    cache: Mutex<HashMap<String, PreviewMetadata>>,
    jobs: Sender<Job>,
    results: Sender<Outcome>,
    stop: Sender<()>,
}

pub struct Manager {
    inner: Arc<Inner>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Manager {
    pub fn new(cfg: Config, results: Sender<Outcome>) -> Result<Self> {
        let provider: Arc<dyn MetadataProvider> = Arc::new(HttpProvider::new(
            cfg.endpoint.clone(),
            cfg.timeout,
            cfg.http_client.clone(),
        )?);
        Ok(Self::with_provider(provider, &cfg, results))
    }

    pub fn with_provider(
        provider: Arc<dyn MetadataProvider>,
        cfg: &Config,
        results: Sender<Outcome>,
    ) -> Self {
        let workers = cfg.workers.max(1);
        let (job_tx, job_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let inner = Arc::new(Inner {
            provider,
            thresholds: cfg.thresholds,
            cache: Mutex::new(HashMap::new()),
            jobs: job_tx,
            results,
            stop: stop_tx,
        });

        let mut handles = Vec::new();
        for _ in 0..workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let worker_inner = inner.clone();
            handles.push(thread::spawn(move || worker_inner.worker(rx_jobs, rx_stop)));
        }

        Self { inner, handles }
    }

    pub fn enqueue(&self, card_id: u64, link: &str) {
        let _ = self.inner.jobs.send(Job {
            card_id,
            link: normalize_link(link),
        });
    }

    pub fn cached(&self, link: &str) -> Option<PreviewMetadata> {
        self.inner.cache.lock().get(&normalize_link(link)).cloned()
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.inner.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn worker(&self, jobs: Receiver<Job>, stop: Receiver<()>) {
        loop {
            crossbeam_channel::select! {
                recv(stop) -> _ => break,
                recv(jobs) -> msg => {
                    match msg {
                        Ok(job) => self.process(job),
                        Err(_) => break,
                    }
                }
            }
        }
    }

    fn process(&self, job: Job) {
        if let Some(metadata) = self.cache.lock().get(&job.link).cloned() {
            let _ = self.results.send(Outcome {
                card_id: job.card_id,
                link: job.link,
                metadata,
            });
            return;
        }

        let metadata = self.enrich(&job.link);
        // Cached regardless of success so repeat requests are free.
        self.cache.lock().insert(job.link.clone(), metadata.clone());
        let _ = self.results.send(Outcome {
            card_id: job.card_id,
            link: job.link,
            metadata,
        });
    }

    fn enrich(&self, link: &str) -> PreviewMetadata {
        let mut meta = match self.provider.fetch(link, false) {
            Ok(meta) => meta,
            Err(err) => {
                debug::log(format!("preview: {link}: {err:#}"));
                PreviewMetadata::default()
            }
        };

        if !usable_image(&meta, &self.thresholds) {
            match self.provider.fetch(link, true) {
                Ok(shot) if !shot.image.trim().is_empty() => {
                    meta.image = shot.image;
                    meta.image_kind = shot.image_kind;
                    meta.image_width = shot.image_width;
                    meta.image_height = shot.image_height;
                }
                Ok(_) => {}
                Err(err) => {
                    debug::log(format!("preview screenshot: {link}: {err:#}"));
                }
            }
        }

        meta
    }
}

fn normalize_link(link: &str) -> String {
    link.trim().to_string()
}
