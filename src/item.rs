use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::csv::RawRow;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub photo_link: String,
    pub video_link: String,
    pub caption: String,
}

impl GalleryItem {
    pub fn has_video(&self) -> bool {
        !is_blank(&self.video_link)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub link: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub published_at: Option<NaiveDateTime>,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GalleryColumns {
    #[serde(default)]
    pub photo: usize,
    #[serde(default = "default_one")]
    pub video: usize,
    #[serde(default = "default_two")]
    pub caption: usize,
}

impl Default for GalleryColumns {
    fn default() -> Self {
        Self {
            photo: 0,
            video: 1,
            caption: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsColumns {
    #[serde(default)]
    pub link: usize,
    #[serde(default = "default_one")]
    pub title: usize,
    #[serde(default = "default_two")]
    pub description: usize,
    #[serde(default = "default_three")]
    pub image: usize,
    #[serde(default = "default_four")]
    pub date: usize,
    #[serde(default = "default_five")]
    pub tag: usize,
}

impl Default for NewsColumns {
    fn default() -> Self {
        Self {
            link: 0,
            title: 1,
            description: 2,
            image: 3,
            date: 4,
            tag: 5,
        }
    }
}

fn default_one() -> usize {
    1
}
fn default_two() -> usize {
    2
}
fn default_three() -> usize {
    3
}
fn default_four() -> usize {
    4
}
fn default_five() -> usize {
    5
}

impl GalleryColumns {
    pub fn validate(&self) -> Result<()> {
        let cols = [self.photo, self.video, self.caption];
        ensure_distinct(&cols)
    }
}

impl NewsColumns {
    pub fn validate(&self) -> Result<()> {
        let cols = [
            self.link,
            self.title,
            self.description,
            self.image,
            self.date,
            self.tag,
        ];
        ensure_distinct(&cols)
    }
}

fn ensure_distinct(cols: &[usize]) -> Result<()> {
    for (i, a) in cols.iter().enumerate() {
        if cols[i + 1..].contains(a) {
            bail!("column map assigns index {} to more than one field", a);
        }
    }
    Ok(())
}

// Published sheets emit the literal "null" for cleared cells.
pub fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
}

const GALLERY_HEADER_HINTS: [&str; 5] = ["foto", "photo", "video", "alt", "caption"];
const NEWS_HEADER_HINTS: [&str; 7] = ["link", "url", "title", "titulo", "fecha", "date", "tag"];

// Whole-cell equality only: substring matching would swallow data rows
// whose URLs contain a hint word ("photo1.jpg").
fn looks_like_header(row: &RawRow, hints: &[&str]) -> bool {
    row.iter().any(|cell| {
        let trimmed = cell.trim();
        hints.iter().any(|hint| trimmed.eq_ignore_ascii_case(hint))
    })
}

fn cell<'a>(row: &'a RawRow, index: usize) -> &'a str {
    row.get(index).map(String::as_str).unwrap_or("")
}

pub fn classify_gallery(rows: &[RawRow], columns: &GalleryColumns) -> Vec<GalleryItem> {
    let data = skip_header(rows, &GALLERY_HEADER_HINTS);

    let mut photos = Vec::new();
    let mut videos = Vec::new();
    for row in data {
        let photo_link = cell(row, columns.photo).to_string();
        let video_link = cell(row, columns.video).to_string();
        let caption = cell(row, columns.caption).to_string();

        let has_photo = !is_blank(&photo_link);
        let has_video = !is_blank(&video_link);
        if !has_photo && !has_video {
            continue;
        }

        if has_video {
            videos.push(GalleryItem {
                photo_link,
                video_link,
                caption,
            });
        } else {
            photos.push(GalleryItem {
                photo_link,
                video_link: String::new(),
                caption,
            });
        }
    }

    photos.extend(videos);
    photos
}

pub fn classify_news(rows: &[RawRow], columns: &NewsColumns) -> Vec<NewsItem> {
    let data = skip_header(rows, &NEWS_HEADER_HINTS);

    let mut items: Vec<NewsItem> = data
        .iter()
        .filter_map(|row| {
            let link = cell(row, columns.link).trim().to_string();
            if is_blank(&link) {
                return None;
            }
            Some(NewsItem {
                link,
                title: cell(row, columns.title).trim().to_string(),
                description: cell(row, columns.description).trim().to_string(),
                image: cell(row, columns.image).trim().to_string(),
                published_at: parse_date(cell(row, columns.date)),
                tag: cell(row, columns.tag).trim().to_string(),
            })
        })
        .collect();

    // Stable sort: equal keys (both undated) keep their input order.
    items.sort_by(|a, b| match (&a.published_at, &b.published_at) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    items
}

fn skip_header<'a>(rows: &'a [RawRow], hints: &[&str]) -> &'a [RawRow] {
    match rows.first() {
        Some(first) if looks_like_header(first, hints) => &rows[1..],
        _ => rows,
    }
}

// Sheets serial epoch, the Lotus 1-2-3 convention Excel kept.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    parse_serial_date(value)
}

fn parse_serial_date(value: &str) -> Option<NaiveDateTime> {
    let serial: f64 = value.parse().ok()?;
    // Sanity window: serial 1 is 1899-12-31, ~2958465 is year 9999.
    if !(1.0..3_000_000.0).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let secs = (serial.fract() * 86_400.0).round() as i64;
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("null"));
        assert!(is_blank(" NULL "));
        assert!(!is_blank("https://example.com"));
    }

    #[test]
    fn gallery_partition_photos_before_videos() {
        let rows = vec![
            row(&["photo1.jpg", "", "first"]),
            row(&["", "clip1.mp4", "second"]),
            row(&["photo2.jpg", "null", "third"]),
        ];
        let items = classify_gallery(&rows, &GalleryColumns::default());
        let captions: Vec<&str> = items.iter().map(|i| i.caption.as_str()).collect();
        assert_eq!(captions, vec!["first", "third", "second"]);
        assert!(!items[0].has_video());
        assert!(items[2].has_video());
    }

    #[test]
    fn gallery_video_precedence_keeps_row_in_video_bucket() {
        let rows = vec![row(&["photo.jpg", "clip.mp4", "both"])];
        let items = classify_gallery(&rows, &GalleryColumns::default());
        assert_eq!(items.len(), 1);
        assert!(items[0].has_video());
    }

    #[test]
    fn gallery_drops_rows_without_media() {
        let rows = vec![row(&["", "null", "no media"]), row(&["p.jpg", "", "ok"])];
        let items = classify_gallery(&rows, &GalleryColumns::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].caption, "ok");
    }

    #[test]
    fn gallery_skips_header_row() {
        let rows = vec![
            row(&["Foto", "Video", "Alt"]),
            row(&["p.jpg", "", "data"]),
        ];
        let items = classify_gallery(&rows, &GalleryColumns::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].photo_link, "p.jpg");
    }

    #[test]
    fn hint_words_inside_urls_are_not_headers() {
        let rows = vec![
            row(&["https://x.test/photo1.jpg", "", "first"]),
            row(&["https://x.test/caption-contest.png", "", "second"]),
        ];
        let items = classify_gallery(&rows, &GalleryColumns::default());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].caption, "first");
    }

    #[test]
    fn news_requires_link() {
        let rows = vec![
            row(&["", "no link", "", "", "", ""]),
            row(&["https://a.test", "ok", "", "", "", ""]),
        ];
        let items = classify_news(&rows, &NewsColumns::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "ok");
    }

    #[test]
    fn news_sorted_by_date_desc_undated_last() {
        let rows = vec![
            row(&["https://a.test", "old", "", "", "2024-01-01", ""]),
            row(&["https://b.test", "undated", "", "", "soon(tm)", ""]),
            row(&["https://c.test", "new", "", "", "2025-06-01", ""]),
        ];
        let items = classify_news(&rows, &NewsColumns::default());
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old", "undated"]);
        assert!(items[2].published_at.is_none());
    }

    #[test]
    fn news_undated_keep_input_order() {
        let rows = vec![
            row(&["https://a.test", "u1", "", "", "", ""]),
            row(&["https://b.test", "u2", "", "", "nope", ""]),
            row(&["https://c.test", "dated", "", "", "2024-05-05", ""]),
        ];
        let items = classify_news(&rows, &NewsColumns::default());
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["dated", "u1", "u2"]);
    }

    #[test]
    fn decode_then_classify_counts_rows() {
        let csv = "Foto,Video,Alt\np1.jpg,,one\n,v1.mp4,two\n,,empty\np2.jpg,,three\n";
        let rows = crate::csv::decode(csv);
        let items = classify_gallery(&rows, &GalleryColumns::default());
        // Four data rows, one fails the required-media check.
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn date_parser_chain() {
        assert_eq!(
            parse_date("2025-06-01"),
            NaiveDate::from_ymd_opt(2025, 6, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(
            parse_date("14/08/2025"),
            NaiveDate::from_ymd_opt(2025, 8, 14).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(
            parse_date("2023-08-01T10:00:00Z"),
            NaiveDate::from_ymd_opt(2023, 8, 1).and_then(|d| d.and_hms_opt(10, 0, 0))
        );
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn serial_date_uses_sheets_epoch() {
        // 45658 is 2025-01-01 in the Sheets serial calendar.
        assert_eq!(
            parse_date("45658"),
            NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        // Fractional part is time of day.
        assert_eq!(
            parse_date("45658.5"),
            NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(12, 0, 0))
        );
    }

    #[test]
    fn column_maps_reject_duplicates() {
        let columns = GalleryColumns {
            photo: 0,
            video: 0,
            caption: 2,
        };
        assert!(columns.validate().is_err());
        assert!(GalleryColumns::default().validate().is_ok());
        assert!(NewsColumns::default().validate().is_ok());
    }
}
