use url::Url;

use crate::item::{is_blank, GalleryItem, NewsItem};
use crate::modal::{MediaKind, ModalRequest};
use crate::preview::PreviewMetadata;
use crate::resolve::{self, ResourceKind};

pub trait ModalOpener {
    fn open_modal(&mut self, request: ModalRequest);
}

impl ModalOpener for crate::modal::ModalViewer {
    fn open_modal(&mut self, request: ModalRequest) {
        self.open(request);
    }
}

pub trait LazyRegistrar {
    fn defer(&mut self, card_id: u64, url: String);
}

const DRIVE_VIDEO_THUMB_WIDTH: u32 = 1600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSlot {
    Image {
        current: String,
        fallback: Option<String>,
        original: String,
    },
    Video { src: String, original: String },
    FrameThumb {
        thumb: String,
        embed: String,
        original: String,
    },
    Warning { message: String, link: String },
}

#[derive(Debug, Clone)]
pub struct GalleryCard {
    pub id: u64,
    pub slot: MediaSlot,
    pub caption: String,
}

pub fn render_gallery_card(
    id: u64,
    item: &GalleryItem,
    lazy: &mut dyn LazyRegistrar,
) -> GalleryCard {
    let slot = if item.has_video() {
        video_slot(&item.video_link)
    } else {
        photo_slot(&item.photo_link)
    };

    match &slot {
        MediaSlot::Image { current, .. } => lazy.defer(id, current.clone()),
        MediaSlot::Video { src, .. } => lazy.defer(id, src.clone()),
        MediaSlot::FrameThumb { thumb, .. } => lazy.defer(id, thumb.clone()),
        MediaSlot::Warning { .. } => {}
    }

    GalleryCard {
        id,
        slot,
        caption: item.caption.trim().to_string(),
    }
}

fn video_slot(video_link: &str) -> MediaSlot {
    let descriptor = resolve::resolve(video_link);
    match descriptor.kind {
        ResourceKind::CloudFile => {
            // Prefer a wide thumb for video tiles over the resolver's
            // default photo size.
            let thumb = resolve::extract_drive_id(video_link)
                .map(|id| resolve::drive_thumb(&id, DRIVE_VIDEO_THUMB_WIDTH))
                .or(descriptor.thumbnail_url)
                .unwrap_or_default();
            MediaSlot::FrameThumb {
                thumb,
                embed: descriptor.embed_url.unwrap_or_default(),
                original: video_link.to_string(),
            }
        }
        ResourceKind::VideoPlatform => MediaSlot::FrameThumb {
            thumb: descriptor.thumbnail_url.unwrap_or_default(),
            embed: descriptor.embed_url.unwrap_or_default(),
            original: video_link.to_string(),
        },
        ResourceKind::Direct if resolve::is_direct_video(video_link) => MediaSlot::Video {
            src: descriptor.fetch_url,
            original: video_link.to_string(),
        },
        _ => MediaSlot::Warning {
            message: "Unsupported video link".into(),
            link: video_link.to_string(),
        },
    }
}

fn photo_slot(photo_link: &str) -> MediaSlot {
    let descriptor = resolve::resolve(photo_link);
    MediaSlot::Image {
        current: descriptor.fetch_url,
        fallback: descriptor.thumbnail_url,
        original: photo_link.to_string(),
    }
}

impl GalleryCard {
    pub fn media_error(&mut self) -> Option<String> {
        match &mut self.slot {
            MediaSlot::Image {
                current,
                fallback,
                original,
            } => match fallback.take() {
                Some(thumb) if thumb != *current => {
                    *current = thumb.clone();
                    Some(thumb)
                }
                _ => {
                    self.slot = MediaSlot::Warning {
                        message: "Could not load media (permissions or format)".into(),
                        link: original.clone(),
                    };
                    None
                }
            },
            MediaSlot::Video { original, .. } => {
                self.slot = MediaSlot::Warning {
                    message: "Could not load video".into(),
                    link: original.clone(),
                };
                None
            }
            MediaSlot::FrameThumb { original, .. } => {
                self.slot = MediaSlot::Warning {
                    message: "Could not load thumbnail; check sharing permissions".into(),
                    link: original.clone(),
                };
                None
            }
            MediaSlot::Warning { .. } => None,
        }
    }

    pub fn activate(&self, opener: &mut dyn ModalOpener) -> bool {
        let request = match &self.slot {
            MediaSlot::Image { current, .. } => ModalRequest {
                kind: MediaKind::Image,
                src: current.clone(),
                caption: self.caption.clone(),
            },
            MediaSlot::Video { src, .. } => ModalRequest {
                kind: MediaKind::Video,
                src: src.clone(),
                caption: self.caption.clone(),
            },
            MediaSlot::FrameThumb { embed, .. } => ModalRequest {
                kind: MediaKind::Frame,
                src: embed.clone(),
                caption: self.caption.clone(),
            },
            MediaSlot::Warning { .. } => return false,
        };
        opener.open_modal(request);
        true
    }

    pub fn original_link(&self) -> &str {
        match &self.slot {
            MediaSlot::Image { original, .. }
            | MediaSlot::Video { original, .. }
            | MediaSlot::FrameThumb { original, .. } => original,
            MediaSlot::Warning { link, .. } => link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsThumb {
    Image { src: String },
    Fallback { favicon: Option<String>, domain: String },
}

#[derive(Debug, Clone)]
pub struct NewsCard {
    pub id: u64,
    pub item: NewsItem,
    pub thumb: NewsThumb,
    row_had_title: bool,
    row_had_description: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub prefer_enriched_description: bool,
    pub prefer_enriched_title: bool,
}

pub fn render_news_card(id: u64, item: &NewsItem, lazy: &mut dyn LazyRegistrar) -> NewsCard {
    let thumb = if is_blank(&item.image) {
        fallback_thumb(&item.link)
    } else {
        let src = resolve::resolve(&item.image).fetch_url;
        lazy.defer(id, src.clone());
        NewsThumb::Image { src }
    };

    NewsCard {
        id,
        row_had_title: !item.title.trim().is_empty(),
        row_had_description: !item.description.trim().is_empty(),
        item: item.clone(),
        thumb,
    }
}

fn fallback_thumb(link: &str) -> NewsThumb {
    match Url::parse(link) {
        Ok(url) => {
            let favicon = (url.scheme().starts_with("http"))
                .then(|| format!("{}/favicon.ico", url.origin().ascii_serialization()));
            let domain = url
                .host_str()
                .map(|host| host.trim_start_matches("www.").to_string())
                .unwrap_or_default();
            NewsThumb::Fallback { favicon, domain }
        }
        Err(_) => NewsThumb::Fallback {
            favicon: None,
            domain: String::new(),
        },
    }
}

impl NewsCard {
    pub fn link(&self) -> &str {
        &self.item.link
    }

    pub fn apply_preview(&mut self, meta: &PreviewMetadata, opts: &ApplyOptions) -> Option<String> {
        if !meta.description.trim().is_empty()
            && (opts.prefer_enriched_description || !self.row_had_description)
        {
            self.item.description = meta.description.trim().to_string();
        }
        if !meta.title.trim().is_empty() && (opts.prefer_enriched_title || !self.row_had_title) {
            self.item.title = meta.title.trim().to_string();
        }

        // Image only while the card still shows its no-image fallback.
        if matches!(self.thumb, NewsThumb::Fallback { .. }) && !meta.image.trim().is_empty() {
            let src = meta.image.trim().to_string();
            self.thumb = NewsThumb::Image { src: src.clone() };
            return Some(src);
        }
        None
    }

    pub fn media_error(&mut self) {
        if matches!(self.thumb, NewsThumb::Image { .. }) {
            self.thumb = fallback_thumb(&self.item.link);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modal::ModalViewer;

    #[derive(Default)]
    struct RecordingRegistrar {
        deferred: Vec<(u64, String)>,
    }

    impl LazyRegistrar for RecordingRegistrar {
        fn defer(&mut self, card_id: u64, url: String) {
            self.deferred.push((card_id, url));
        }
    }

    const DRIVE_LINK: &str =
        "https://drive.google.com/file/d/1AbCdEfGhIjKlMnOpQrStUvWxYz012345/view";

    fn gallery_item(photo: &str, video: &str, caption: &str) -> GalleryItem {
        GalleryItem {
            photo_link: photo.into(),
            video_link: video.into(),
            caption: caption.into(),
        }
    }

    #[test]
    fn photo_card_defers_direct_url() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_gallery_card(1, &gallery_item("https://x.test/p.jpg", "", "cap"), &mut lazy);
        assert!(matches!(card.slot, MediaSlot::Image { .. }));
        assert_eq!(lazy.deferred, vec![(1, "https://x.test/p.jpg".to_string())]);
    }

    #[test]
    fn drive_photo_resolves_to_download_url_with_thumb_fallback() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_gallery_card(1, &gallery_item(DRIVE_LINK, "", ""), &mut lazy);
        let MediaSlot::Image {
            current, fallback, ..
        } = &card.slot
        else {
            panic!("expected image slot");
        };
        assert!(current.contains("drive.usercontent.google.com/download"));
        assert!(fallback.as_deref().unwrap().contains("thumbnail?id="));
    }

    #[test]
    fn video_takes_precedence_and_opens_frame() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_gallery_card(
            2,
            &gallery_item("https://x.test/p.jpg", "https://youtu.be/dQw4w9WgXcQ", "cap"),
            &mut lazy,
        );
        assert!(matches!(card.slot, MediaSlot::FrameThumb { .. }));

        let mut viewer = ModalViewer::new();
        assert!(card.activate(&mut viewer));
        assert!(viewer.frame_src().contains("/embed/dQw4w9WgXcQ"));
        assert_eq!(viewer.caption(), Some("cap"));
    }

    #[test]
    fn unsupported_video_link_renders_warning() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_gallery_card(
            3,
            &gallery_item("", "https://example.com/watch-me", ""),
            &mut lazy,
        );
        let MediaSlot::Warning { link, .. } = &card.slot else {
            panic!("expected warning slot");
        };
        assert_eq!(link, "https://example.com/watch-me");
        assert!(lazy.deferred.is_empty());

        let mut viewer = ModalViewer::new();
        assert!(!card.activate(&mut viewer));
        assert!(!viewer.is_open());
    }

    #[test]
    fn image_error_falls_back_one_tier_then_warns() {
        let mut lazy = RecordingRegistrar::default();
        let mut card = render_gallery_card(4, &gallery_item(DRIVE_LINK, "", ""), &mut lazy);

        let retry = card.media_error().expect("thumbnail tier");
        assert!(retry.contains("thumbnail?id="));
        assert!(matches!(&card.slot, MediaSlot::Image { current, .. } if *current == retry));

        assert_eq!(card.media_error(), None);
        assert!(matches!(card.slot, MediaSlot::Warning { .. }));
        assert_eq!(card.original_link(), DRIVE_LINK);
    }

    #[test]
    fn direct_video_card_opens_video_modal() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_gallery_card(
            5,
            &gallery_item("", "https://cdn.test/clip.mp4", "a clip"),
            &mut lazy,
        );
        let mut viewer = ModalViewer::new();
        assert!(card.activate(&mut viewer));
        assert_eq!(viewer.video_src(), "https://cdn.test/clip.mp4");
        assert!(viewer.video_playing());
    }

    fn news_item(link: &str, title: &str, description: &str, image: &str) -> NewsItem {
        NewsItem {
            link: link.into(),
            title: title.into(),
            description: description.into(),
            image: image.into(),
            published_at: None,
            tag: String::new(),
        }
    }

    #[test]
    fn news_card_without_image_uses_favicon_fallback() {
        let mut lazy = RecordingRegistrar::default();
        let card = render_news_card(1, &news_item("https://www.example.com/a", "t", "", ""), &mut lazy);
        let NewsThumb::Fallback { favicon, domain } = &card.thumb else {
            panic!("expected fallback thumb");
        };
        assert_eq!(favicon.as_deref(), Some("https://www.example.com/favicon.ico"));
        assert_eq!(domain, "example.com");
        assert!(lazy.deferred.is_empty());
    }

    #[test]
    fn apply_preview_respects_row_fields() {
        let mut lazy = RecordingRegistrar::default();
        let mut card = render_news_card(
            1,
            &news_item("https://e.test/a", "own title", "", ""),
            &mut lazy,
        );
        let meta = PreviewMetadata {
            title: "fetched title".into(),
            description: "fetched description".into(),
            image: "https://e.test/img.png".into(),
            ..PreviewMetadata::default()
        };

        let deferred = card.apply_preview(&meta, &ApplyOptions::default());
        // Row had its own title; enrichment must not replace it.
        assert_eq!(card.item.title, "own title");
        assert_eq!(card.item.description, "fetched description");
        assert_eq!(deferred.as_deref(), Some("https://e.test/img.png"));
        assert!(matches!(card.thumb, NewsThumb::Image { .. }));
    }

    #[test]
    fn apply_preview_prefer_flags_overwrite() {
        let mut lazy = RecordingRegistrar::default();
        let mut card = render_news_card(
            1,
            &news_item("https://e.test/a", "own title", "own desc", ""),
            &mut lazy,
        );
        let meta = PreviewMetadata {
            title: "fetched title".into(),
            description: "fetched description".into(),
            ..PreviewMetadata::default()
        };
        let opts = ApplyOptions {
            prefer_enriched_description: true,
            prefer_enriched_title: true,
        };
        card.apply_preview(&meta, &opts);
        assert_eq!(card.item.title, "fetched title");
        assert_eq!(card.item.description, "fetched description");
    }

    #[test]
    fn apply_preview_never_replaces_row_image() {
        let mut lazy = RecordingRegistrar::default();
        let mut card = render_news_card(
            1,
            &news_item("https://e.test/a", "", "", "https://e.test/row.png"),
            &mut lazy,
        );
        let meta = PreviewMetadata {
            image: "https://e.test/enriched.png".into(),
            ..PreviewMetadata::default()
        };
        assert_eq!(card.apply_preview(&meta, &ApplyOptions::default()), None);
        assert!(matches!(&card.thumb, NewsThumb::Image { src } if src == "https://e.test/row.png"));
    }

    #[test]
    fn news_image_error_reverts_to_fallback() {
        let mut lazy = RecordingRegistrar::default();
        let mut card = render_news_card(
            1,
            &news_item("https://e.test/a", "", "", "https://e.test/broken.png"),
            &mut lazy,
        );
        card.media_error();
        assert!(matches!(card.thumb, NewsThumb::Fallback { .. }));
    }
}
