use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Direct,
    CloudFile,
    VideoPlatform,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub fetch_url: String,
    pub thumbnail_url: Option<String>,
    pub embed_url: Option<String>,
}

static DRIVE_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)drive\.google\.com|docs\.google\.com").unwrap());
static YOUTUBE_HOST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)youtu\.be|youtube\.com").unwrap());

// Identifier extraction candidates, most specific first; the first
// non-empty match wins.
static DRIVE_ID_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"/d/([-\w]{25,})").unwrap(),
        Regex::new(r"[?&]id=([-\w]{25,})").unwrap(),
        Regex::new(r"([-\w]{25,})").unwrap(),
    ]
});
static YOUTUBE_ID_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"[?&]v=([A-Za-z0-9_-]{6,})").unwrap(),
        Regex::new(r"/embed/([A-Za-z0-9_-]{6,})").unwrap(),
    ]
});

static VIDEO_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|ogg)(\?|$)").unwrap());
static IMAGE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png|gif|webp|avif)(\?|$)").unwrap());

pub const DRIVE_THUMB_WIDTH: u32 = 2000;

fn first_match(patterns: &[Regex], link: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(link))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_drive_id(link: &str) -> Option<String> {
    if !DRIVE_HOST.is_match(link) {
        return None;
    }
    first_match(&*DRIVE_ID_PATTERNS, link)
}

pub fn extract_youtube_id(link: &str) -> Option<String> {
    if !YOUTUBE_HOST.is_match(link) {
        return None;
    }
    first_match(&*YOUTUBE_ID_PATTERNS, link)
}

pub fn drive_direct(id: &str) -> String {
    format!("https://drive.usercontent.google.com/download?id={id}&export=view")
}

pub fn drive_thumb(id: &str, width: u32) -> String {
    format!("https://drive.google.com/thumbnail?id={id}&sz=w{width}")
}

pub fn drive_preview(id: &str, autoplay: bool) -> String {
    let suffix = if autoplay { "?autoplay=1" } else { "" };
    format!("https://drive.google.com/file/d/{id}/preview{suffix}")
}

pub fn youtube_thumb(id: &str) -> String {
    format!("https://img.youtube.com/vi/{id}/hqdefault.jpg")
}

pub fn youtube_embed(id: &str, autoplay: bool) -> String {
    let suffix = if autoplay { "&autoplay=1" } else { "" };
    format!("https://www.youtube.com/embed/{id}?rel=0&modestbranding=1&playsinline=1{suffix}")
}

pub fn is_direct_video(link: &str) -> bool {
    VIDEO_EXT.is_match(link)
}

// Decision order: cloud-storage host, video-platform host, direct media
// extension, opaque.
pub fn resolve(raw_link: &str) -> ResourceDescriptor {
    let link = raw_link.trim();

    if DRIVE_HOST.is_match(link) {
        return match extract_drive_id(link) {
            Some(id) => ResourceDescriptor {
                kind: ResourceKind::CloudFile,
                fetch_url: drive_direct(&id),
                thumbnail_url: Some(drive_thumb(&id, DRIVE_THUMB_WIDTH)),
                embed_url: Some(drive_preview(&id, true)),
            },
            None => opaque(link),
        };
    }

    if YOUTUBE_HOST.is_match(link) {
        return match extract_youtube_id(link) {
            Some(id) => ResourceDescriptor {
                kind: ResourceKind::VideoPlatform,
                fetch_url: link.to_string(),
                thumbnail_url: Some(youtube_thumb(&id)),
                embed_url: Some(youtube_embed(&id, true)),
            },
            None => opaque(link),
        };
    }

    if VIDEO_EXT.is_match(link) || IMAGE_EXT.is_match(link) {
        return ResourceDescriptor {
            kind: ResourceKind::Direct,
            fetch_url: link.to_string(),
            thumbnail_url: None,
            embed_url: None,
        };
    }

    opaque(link)
}

fn opaque(link: &str) -> ResourceDescriptor {
    ResourceDescriptor {
        kind: ResourceKind::Opaque,
        fetch_url: link.to_string(),
        thumbnail_url: None,
        embed_url: None,
    }
}
