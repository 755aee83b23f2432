// Core data structures for the fbmedia scraper

use serde::{Deserialize, Serialize};

/// Fills `self`'s empty fields from a patch, never touching fields that are
/// already set.
pub trait Merge {
    fn merge_missing(&mut self, patch: Self);
}

macro_rules! impl_merge {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl Merge for $ty {
            fn merge_missing(&mut self, patch: Self) {
                $(
                    if self.$field.is_none() {
                        self.$field = patch.$field;
                    }
                )+
            }
        }
    };
}

/// Image reference with best-effort file metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMeta {
    pub url: Option<String>,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: Option<u64>,
    pub mime: Option<String>,
}

impl ImageMeta {
    pub fn new(url: impl Into<String>, alt: Option<String>) -> Self {
        Self {
            url: Some(url.into()),
            alt,
            ..Default::default()
        }
    }

    /// True when the image still lacks the fields a HEAD request can supply
    pub fn needs_file_info(&self) -> bool {
        self.url.is_some() && (self.size.is_none() || self.mime.is_none())
    }
}

/// Album contributor or owner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub fbid: Option<String>,
}

/// Photo page record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub url: String,
    pub fbid: Option<String>,
    pub album_id: Option<String>,
    pub group_id: Option<String>,
    pub image_preview: Option<ImageMeta>,
    pub image_full_size: Option<ImageMeta>,
    pub timestamp: Option<String>,
    pub description: Option<String>,
    pub author_name: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_profile_image_thumb: Option<ImageMeta>,
    pub likes_count: Option<u64>,
    pub comments_count: Option<u64>,
    pub shares_count: Option<u64>,
    pub views_count: Option<u64>,
}

impl_merge!(PhotoRecord {
    fbid,
    album_id,
    group_id,
    image_preview,
    image_full_size,
    timestamp,
    description,
    author_name,
    author_profile_url,
    author_profile_image_thumb,
    likes_count,
    comments_count,
    shares_count,
    views_count,
});

/// Video page record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub url: String,
    pub video_id: Option<String>,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub timestamp: Option<String>,
    pub image_preview: Option<ImageMeta>,
    pub video_sd_url: Option<String>,
    pub video_hd_url: Option<String>,
    pub duration_sec: Option<f64>,
    pub author_name: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_profile_image_thumb: Option<ImageMeta>,
    pub likes_count: Option<u64>,
    pub comments_count: Option<u64>,
    pub shares_count: Option<u64>,
    pub views_count: Option<u64>,
}

impl_merge!(VideoRecord {
    video_id,
    user_id,
    title,
    description,
    timestamp,
    image_preview,
    video_sd_url,
    video_hd_url,
    duration_sec,
    author_name,
    author_profile_url,
    author_profile_image_thumb,
    likes_count,
    comments_count,
    shares_count,
    views_count,
});

/// Album page record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRecord {
    pub url: String,
    pub album_id: Option<String>,
    pub owner_fbid: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner_name: Option<String>,
    pub owner_profile_url: Option<String>,
    pub contributors: Option<Vec<Person>>,
    pub timestamp: Option<String>,
    pub items_count: Option<u64>,
}

impl_merge!(AlbumRecord {
    album_id,
    owner_fbid,
    title,
    description,
    owner_name,
    owner_profile_url,
    contributors,
    timestamp,
    items_count,
});

/// One output row, tagged by entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityRecord {
    Photo(PhotoRecord),
    Video(VideoRecord),
    Album(AlbumRecord),
}

impl EntityRecord {
    pub fn url(&self) -> &str {
        match self {
            Self::Photo(r) => &r.url,
            Self::Video(r) => &r.url,
            Self::Album(r) => &r.url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Photo(_) => "photo",
            Self::Video(_) => "video",
            Self::Album(_) => "album",
        }
    }

    /// Image fields that may be enriched with file size and MIME type
    pub fn images_mut(&mut self) -> Vec<&mut ImageMeta> {
        match self {
            Self::Photo(r) => [
                r.image_preview.as_mut(),
                r.image_full_size.as_mut(),
                r.author_profile_image_thumb.as_mut(),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Self::Video(r) => [
                r.image_preview.as_mut(),
                r.author_profile_image_thumb.as_mut(),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Self::Album(_) => Vec::new(),
        }
    }
}

/// A URL handed to the request queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default)]
    pub retry_count: u32,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retry_count: 0,
        }
    }
}

/// Crawl statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_visited: u64,
    pub pages_skipped: u64,
    pub pages_failed: u64,
    pub records_written: u64,
    pub links_enqueued: u64,
}

impl CrawlStats {
    /// Success rate over visited pages
    pub fn success_rate(&self) -> f64 {
        if self.pages_visited == 0 {
            0.0
        } else {
            (self.pages_visited - self.pages_failed) as f64 / self.pages_visited as f64 * 100.0
        }
    }
}
