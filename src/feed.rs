use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::card::{self, GalleryCard, LazyRegistrar, NewsCard};
use crate::csv;
use crate::item::{self, GalleryColumns, NewsColumns};
use crate::preview;

// News ids live in their own namespace so both feeds can share one lazy
// watcher and one media pool.
pub const NEWS_ID_BASE: u64 = 1 << 32;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed URL is not configured")]
    NotConfigured,
    #[error("feed request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub trait FeedSource: Send + Sync {
    fn fetch_csv(&self) -> Result<String, FeedError>;
}

pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch_csv(&self) -> Result<String, FeedError> {
        if self.url.trim().is_empty() {
            return Err(FeedError::NotConfigured);
        }
        let url = append_cache_buster(&self.url, Utc::now().timestamp_millis());
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }
        Ok(response.text()?)
    }
}

// Published sheets cache aggressively; a per-request nonce defeats that.
fn append_cache_buster(url: &str, nonce: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}cb={nonce}")
}

#[derive(Debug, Default)]
pub struct GalleryFeed {
    pub cards: Vec<GalleryCard>,
}

impl GalleryFeed {
    pub fn item_count(&self) -> usize {
        self.cards.len()
    }
}

#[derive(Debug, Default)]
pub struct NewsFeed {
    pub cards: Vec<NewsCard>,
}

pub fn build_gallery(
    text: &str,
    columns: &GalleryColumns,
    lazy: &mut dyn LazyRegistrar,
    id_base: u64,
) -> GalleryFeed {
    let rows = csv::decode(text);
    let items = item::classify_gallery(&rows, columns);

    let cards = items
        .iter()
        .enumerate()
        .map(|(index, item)| card::render_gallery_card(id_base + index as u64, item, lazy))
        .collect();
    GalleryFeed { cards }
}

pub fn build_news(
    text: &str,
    columns: &NewsColumns,
    lazy: &mut dyn LazyRegistrar,
    id_base: u64,
) -> NewsFeed {
    let rows = csv::decode(text);
    let items = item::classify_news(&rows, columns);

    let cards = items
        .iter()
        .enumerate()
        .map(|(index, item)| card::render_news_card(id_base + index as u64, item, lazy))
        .collect();
    NewsFeed { cards }
}

pub fn load_gallery(
    source: &dyn FeedSource,
    columns: &GalleryColumns,
    lazy: &mut dyn LazyRegistrar,
    id_base: u64,
) -> Result<GalleryFeed, FeedError> {
    Ok(build_gallery(&source.fetch_csv()?, columns, lazy, id_base))
}

pub fn load_news(
    source: &dyn FeedSource,
    columns: &NewsColumns,
    lazy: &mut dyn LazyRegistrar,
    id_base: u64,
) -> Result<NewsFeed, FeedError> {
    Ok(build_news(&source.fetch_csv()?, columns, lazy, id_base))
}

pub fn schedule_enrichment(feed: &NewsFeed, manager: &preview::Manager) {
    for card in &feed.cards {
        manager.enqueue(card.id, card.link());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::MediaSlot;

    struct StaticSource(&'static str);

    impl FeedSource for StaticSource {
        fn fetch_csv(&self) -> Result<String, FeedError> {
            Ok(self.0.to_string())
        }
    }

    struct DownSource;

    impl FeedSource for DownSource {
        fn fetch_csv(&self) -> Result<String, FeedError> {
            Err(FeedError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    #[derive(Default)]
    struct NullRegistrar(Vec<u64>);

    impl LazyRegistrar for NullRegistrar {
        fn defer(&mut self, card_id: u64, _url: String) {
            self.0.push(card_id);
        }
    }

    const GALLERY_CSV: &str = "Foto,Video,Alt\n\
        https://x.test/p1.jpg,,photo one\n\
        ,https://cdn.test/v1.mp4,video one\n\
        https://x.test/p2.jpg,,photo two\n";

    #[test]
    fn gallery_feed_orders_photos_before_videos() {
        let mut lazy = NullRegistrar::default();
        let feed = load_gallery(
            &StaticSource(GALLERY_CSV),
            &GalleryColumns::default(),
            &mut lazy,
            0,
        )
        .unwrap();

        assert_eq!(feed.item_count(), 3);
        let captions: Vec<&str> = feed.cards.iter().map(|c| c.caption.as_str()).collect();
        assert_eq!(captions, vec!["photo one", "photo two", "video one"]);
        assert!(matches!(feed.cards[2].slot, MediaSlot::Video { .. }));
        // Every card with fetchable media registered with the watcher.
        assert_eq!(lazy.0, vec![0, 1, 2]);
    }

    #[test]
    fn news_feed_sorted_and_id_namespaced() {
        let csv = "Link,Title,Description,Image,Date,Tag\n\
            https://a.test,old,,,2024-01-01,\n\
            https://b.test,new,,,2025-06-01,\n";
        let mut lazy = NullRegistrar::default();
        let feed = load_news(
            &StaticSource(csv),
            &NewsColumns::default(),
            &mut lazy,
            NEWS_ID_BASE,
        )
        .unwrap();

        assert_eq!(feed.cards.len(), 2);
        assert_eq!(feed.cards[0].item.title, "new");
        assert_eq!(feed.cards[0].id, NEWS_ID_BASE);
        assert_eq!(feed.cards[1].id, NEWS_ID_BASE + 1);
    }

    #[test]
    fn fetch_failure_is_a_hard_feed_error() {
        let mut lazy = NullRegistrar::default();
        let result = load_gallery(&DownSource, &GalleryColumns::default(), &mut lazy, 0);
        assert!(matches!(result, Err(FeedError::Status(_))));
    }

    #[test]
    fn cache_buster_respects_existing_query() {
        assert_eq!(
            append_cache_buster("https://sheets.test/pub", 7),
            "https://sheets.test/pub?cb=7"
        );
        assert_eq!(
            append_cache_buster("https://sheets.test/pub?output=csv", 7),
            "https://sheets.test/pub?output=csv&cb=7"
        );
    }
}
