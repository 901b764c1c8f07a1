use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::GenericImageView;
use parking_lot::Mutex;
use reqwest::blocking::Client;

use crate::debug;

#[derive(Debug, Clone)]
pub struct Config {
    pub workers: usize,
    pub timeout: Duration,
    pub http_client: Option<Client>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 2,
            timeout: Duration::from_secs(30),
            http_client: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub url: String,
    pub content_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: usize,
}

#[derive(Debug)]
pub struct Fetched {
    pub card_id: u64,
    pub url: String,
    pub result: Result<MediaEntry>,
}

struct Job {
    card_id: u64,
    url: String,
}

struct Inner {
    client: Client,
    cache: Mutex<HashMap<String, MediaEntry>>,
    jobs: Sender<Job>,
    results: Sender<Fetched>,
    stop: Sender<()>,
}

pub struct Manager {
    inner: Arc<Inner>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Manager {
    pub fn new(cfg: Config, results: Sender<Fetched>) -> Result<Self> {
        let workers = cfg.workers.max(1);
        let client = match cfg.http_client {
            Some(client) => client,
            None => Client::builder()
                .timeout(cfg.timeout)
                .build()
                .context("media: build http client")?,
        };

        let (job_tx, job_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let inner = Arc::new(Inner {
            client,
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

        Ok(Self { inner, handles })
    }

    pub fn enqueue(&self, card_id: u64, url: &str) {
        let _ = self.inner.jobs.send(Job {
            card_id,
            url: url.to_string(),
        });
    }

    pub fn cached(&self, url: &str) -> Option<MediaEntry> {
        self.inner.cache.lock().get(url).cloned()
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
        if let Some(entry) = self.cache.lock().get(&job.url).cloned() {
            let _ = self.results.send(Fetched {
                card_id: job.card_id,
                url: job.url,
                result: Ok(entry),
            });
            return;
        }

        let result = self.fetch(&job.url);
        match &result {
            Ok(entry) => {
                self.cache.lock().insert(job.url.clone(), entry.clone());
            }
            Err(err) => {
                debug::log(format!("media: {}: {err:#}", job.url));
            }
        }
        let _ = self.results.send(Fetched {
            card_id: job.card_id,
            url: job.url,
            result,
        });
    }

    fn fetch(&self, url: &str) -> Result<MediaEntry> {
        if url.trim().is_empty() {
            return Err(anyhow!("media: url required"));
        }

        let response = self.client.get(url).send().context("media: download")?;
        if !response.status().is_success() {
            return Err(anyhow!("media: request failed: {}", response.status()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();
        let bytes = response.bytes().context("media: body")?;

        Ok(probe(url, &content_type, &bytes))
    }
}

fn probe(url: &str, content_type: &str, bytes: &[u8]) -> MediaEntry {
    let mut entry = MediaEntry {
        url: url.to_string(),
        content_type: content_type.to_string(),
        width: None,
        height: None,
        size_bytes: bytes.len(),
    };

    if let Ok(format) = image::guess_format(bytes) {
        if entry.content_type.is_empty() {
            entry.content_type = format.to_mime_type().to_string();
        }
        if let Ok(decoded) = image::load_from_memory(bytes) {
            let (width, height) = decoded.dimensions();
            entry.width = Some(width);
            entry.height = Some(height);
        }
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid 1x1 PNG.
    const PNG_1X1: [u8; 67] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn probe_detects_png_dimensions() {
        let entry = probe("https://x.test/a.png", "", &PNG_1X1);
        assert_eq!(entry.content_type, "image/png");
        assert_eq!(entry.width, Some(1));
        assert_eq!(entry.height, Some(1));
        assert_eq!(entry.size_bytes, PNG_1X1.len());
    }

    #[test]
    fn probe_keeps_header_content_type() {
        let entry = probe("https://x.test/a.png", "image/png; charset=binary", &PNG_1X1);
        assert_eq!(entry.content_type, "image/png; charset=binary");
    }

    #[test]
    fn probe_tolerates_non_image_bytes() {
        let entry = probe("https://x.test/clip.mp4", "video/mp4", b"not an image");
        assert_eq!(entry.width, None);
        assert_eq!(entry.content_type, "video/mp4");
    }
}
