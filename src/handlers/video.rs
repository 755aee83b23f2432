//! Video pages

use async_trait::async_trait;
use serde_json::Value;

use super::{
    dom_author, dom_timestamp, find_entity, payload_author, payload_stats, payload_timestamp,
    Handled, HandlerContext,
};
use crate::dom::PageSession;
use crate::error::Result;
use crate::models::{EntityRecord, ImageMeta, VideoRecord};
use crate::parser::payload::f64_at;
use crate::parser::sanitize::sanitize_text;
use crate::parser::selectors;
use crate::parser::{extract_post_stats, first_match, first_text, str_at, u64_at};
use crate::pipeline::{FieldSource, Pipeline, Resolvable, Source};
use crate::utils::absolutize;

/// Field groups of a video record, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoGroup {
    Media,
    Preview,
    Title,
    Description,
    Timestamp,
    Author,
    Stats,
}

impl VideoGroup {
    pub const ALL: [VideoGroup; 7] = [
        Self::Media,
        Self::Preview,
        Self::Title,
        Self::Description,
        Self::Timestamp,
        Self::Author,
        Self::Stats,
    ];
}

impl Resolvable for VideoRecord {
    type Group = VideoGroup;

    fn is_resolved(&self, group: VideoGroup) -> bool {
        match group {
            VideoGroup::Media => self.video_sd_url.is_some() && self.duration_sec.is_some(),
            VideoGroup::Preview => self.image_preview.is_some(),
            VideoGroup::Title => self.title.is_some(),
            VideoGroup::Description => self.description.is_some(),
            VideoGroup::Timestamp => self.timestamp.is_some(),
            VideoGroup::Author => {
                self.author_name.is_some()
                    && self.author_profile_url.is_some()
                    && self.author_profile_image_thumb.is_some()
            }
            VideoGroup::Stats => {
                self.likes_count.is_some()
                    && self.comments_count.is_some()
                    && self.views_count.is_some()
            }
        }
    }
}

/// Playable URLs are sometimes `blob:` object URLs that mean nothing off-page
fn playable(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.is_empty() && !u.starts_with("blob:"))
}

/// Video fields from embedded page data
pub struct VideoPayload<'p> {
    entity: Option<&'p Value>,
    payloads: &'p [Value],
    id: Option<&'p str>,
}

impl<'p> VideoPayload<'p> {
    pub fn new(payloads: &'p [Value], video_id: Option<&'p str>) -> Self {
        Self {
            entity: find_entity(payloads, "Video", video_id),
            payloads,
            id: video_id,
        }
    }
}

#[async_trait(?Send)]
impl FieldSource<VideoRecord> for VideoPayload<'_> {
    fn source(&self) -> Source {
        Source::Payload
    }

    async fn fill(&self, group: VideoGroup, _partial: &VideoRecord) -> Result<VideoRecord> {
        let mut patch = VideoRecord::default();
        let Some(video) = self.entity else {
            return Ok(patch);
        };

        match group {
            VideoGroup::Media => {
                patch.video_sd_url = playable(
                    str_at(video, "browser_native_sd_url").or_else(|| str_at(video, "playable_url")),
                );
                patch.video_hd_url = playable(
                    str_at(video, "browser_native_hd_url")
                        .or_else(|| str_at(video, "playable_url_quality_hd")),
                );
                patch.duration_sec = f64_at(video, "length_in_second").or_else(|| {
                    f64_at(video, "playable_duration_in_ms").map(|ms| ms / 1000.0)
                });
            }
            VideoGroup::Preview => {
                patch.image_preview = str_at(video, "preferred_thumbnail.image.uri")
                    .or_else(|| str_at(video, "thumbnailImage.uri"))
                    .map(|uri| ImageMeta {
                        url: Some(uri),
                        width: u64_at(video, "width").and_then(|w| u32::try_from(w).ok()),
                        height: u64_at(video, "height").and_then(|h| u32::try_from(h).ok()),
                        ..Default::default()
                    });
            }
            VideoGroup::Title => {
                patch.title = str_at(video, "title.text")
                    .or_else(|| str_at(video, "name"))
                    .as_deref()
                    .and_then(sanitize_text);
            }
            VideoGroup::Description => {
                patch.description = ["savable_description.text", "message.text", "description.text"]
                    .iter()
                    .find_map(|path| str_at(video, path))
                    .as_deref()
                    .and_then(sanitize_text);
            }
            VideoGroup::Timestamp => patch.timestamp = payload_timestamp(video),
            VideoGroup::Author => {
                let author = payload_author(video);
                patch.author_name = author.name;
                patch.author_profile_url = author.profile_url;
                patch.author_profile_image_thumb = author.thumb;
            }
            VideoGroup::Stats => {
                let stats = payload_stats(self.payloads, Some(video), self.id);
                patch.likes_count = stats.likes;
                patch.comments_count = stats.comments;
                patch.shares_count = stats.shares;
                patch.views_count = stats.views;
            }
        }
        Ok(patch)
    }
}

/// Source and duration reported by the loaded `<video>` element
pub struct VideoPlayer<'p> {
    page: &'p dyn PageSession,
}

impl<'p> VideoPlayer<'p> {
    pub fn new(page: &'p dyn PageSession) -> Self {
        Self { page }
    }
}

#[async_trait(?Send)]
impl FieldSource<VideoRecord> for VideoPlayer<'_> {
    fn source(&self) -> Source {
        Source::Interactive
    }

    fn provides(&self, group: VideoGroup) -> bool {
        group == VideoGroup::Media && self.page.is_interactive()
    }

    async fn fill(&self, _group: VideoGroup, _partial: &VideoRecord) -> Result<VideoRecord> {
        let mut patch = VideoRecord::default();
        let Some(root) = self.page.root().await else {
            return Ok(patch);
        };
        let Some(player) = root.find_one(selectors::video::ELEMENT).await else {
            return Ok(patch);
        };
        let props = player.props(&["currentSrc", "duration"]).await;
        patch.video_sd_url = playable(
            props
                .get("currentSrc")
                .and_then(Value::as_str)
                .map(String::from),
        );
        patch.duration_sec = props
            .get("duration")
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite() && *d > 0.0);
        Ok(patch)
    }
}

/// Video fields from the rendered page
pub struct VideoMarkup<'p> {
    page: &'p dyn PageSession,
}

impl<'p> VideoMarkup<'p> {
    pub fn new(page: &'p dyn PageSession) -> Self {
        Self { page }
    }
}

#[async_trait(?Send)]
impl FieldSource<VideoRecord> for VideoMarkup<'_> {
    fn source(&self) -> Source {
        Source::Static
    }

    async fn fill(&self, group: VideoGroup, _partial: &VideoRecord) -> Result<VideoRecord> {
        let mut patch = VideoRecord::default();
        let Some(root) = self.page.root().await else {
            return Ok(patch);
        };
        let root = root.as_ref();
        let url = self.page.url();

        match group {
            VideoGroup::Media => {
                if let Some(player) = root.find_one(selectors::video::ELEMENT).await {
                    patch.video_sd_url = playable(player.attr("src").await)
                        .and_then(|src| absolutize(url, &src));
                }
            }
            VideoGroup::Preview => {
                if let Some(node) = first_match(root, selectors::video::POSTER).await {
                    let src = match node.attr("poster").await {
                        Some(poster) => Some(poster),
                        None => node.attr("src").await,
                    };
                    patch.image_preview = src
                        .and_then(|s| absolutize(url, &s))
                        .map(|s| ImageMeta::new(s, None));
                }
            }
            VideoGroup::Title => {
                patch.title = first_text(root, selectors::video::TITLE)
                    .await
                    .as_deref()
                    .and_then(sanitize_text);
            }
            VideoGroup::Description => {
                patch.description = first_text(root, selectors::DESCRIPTION)
                    .await
                    .as_deref()
                    .and_then(sanitize_text);
            }
            VideoGroup::Timestamp => patch.timestamp = dom_timestamp(root).await,
            VideoGroup::Author => {
                let author = dom_author(url, root).await;
                patch.author_name = author.name;
                patch.author_profile_url = author.profile_url;
                patch.author_profile_image_thumb = author.thumb;
            }
            VideoGroup::Stats => {
                let stats = extract_post_stats(root).await;
                patch.likes_count = Some(stats.likes);
                patch.comments_count = Some(stats.comments);
                patch.views_count = stats.views;
            }
        }
        Ok(patch)
    }
}

/// Build, mask and emit the record of one video page
pub async fn handle(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let route = ctx.route;
    let initial = VideoRecord {
        url: route.url.clone(),
        video_id: route.param("videoId").map(String::from),
        user_id: route.param("userId").map(String::from),
        ..Default::default()
    };

    let payloads = ctx.payloads().await?;
    let record = Pipeline::<VideoRecord>::new(VideoGroup::ALL)
        .with_source(VideoPayload::new(&payloads, route.param("videoId")))
        .with_source(VideoPlayer::new(ctx.page))
        .with_source(VideoMarkup::new(ctx.page))
        .resolve(initial)
        .await;

    ctx.emit(EntityRecord::Video(record)).await?;
    Ok(Handled {
        records: 1,
        ..Default::default()
    })
}
