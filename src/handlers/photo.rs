//! Photo pages
//!
//! Every field group is tried against the embedded payload first. The
//! full-size image only exists behind the viewer's options menu, so it needs a
//! live page; everything else falls back to the rendered markup.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{
    dom_author, dom_timestamp, find_entity, payload_author, payload_stats, payload_timestamp,
    Handled, HandlerContext,
};
use crate::config::ScrollConfig;
use crate::dom::{props_as, PageSession};
use crate::error::Result;
use crate::models::{EntityRecord, ImageMeta, PhotoRecord};
use crate::parser::sanitize::sanitize_text;
use crate::parser::selectors;
use crate::parser::{extract_post_stats, first_match, first_text, str_at, u64_at};
use crate::pipeline::{FieldSource, Pipeline, Resolvable, Source};
use crate::utils::absolutize;

/// Field groups of a photo record, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoGroup {
    Image,
    FullSize,
    Timestamp,
    Description,
    Author,
    Stats,
}

impl PhotoGroup {
    pub const ALL: [PhotoGroup; 6] = [
        Self::Image,
        Self::FullSize,
        Self::Timestamp,
        Self::Description,
        Self::Author,
        Self::Stats,
    ];
}

impl Resolvable for PhotoRecord {
    type Group = PhotoGroup;

    fn is_resolved(&self, group: PhotoGroup) -> bool {
        match group {
            PhotoGroup::Image => self.image_preview.is_some(),
            PhotoGroup::FullSize => self.image_full_size.is_some(),
            PhotoGroup::Timestamp => self.timestamp.is_some(),
            PhotoGroup::Description => self.description.is_some(),
            PhotoGroup::Author => {
                self.author_name.is_some()
                    && self.author_profile_url.is_some()
                    && self.author_profile_image_thumb.is_some()
            }
            // Shares only ever come from the payload and never block
            PhotoGroup::Stats => {
                self.likes_count.is_some()
                    && self.comments_count.is_some()
                    && self.views_count.is_some()
            }
        }
    }
}

/// Photo fields from embedded page data
pub struct PhotoPayload<'p> {
    entity: Option<&'p Value>,
    payloads: &'p [Value],
    id: Option<&'p str>,
}

impl<'p> PhotoPayload<'p> {
    pub fn new(payloads: &'p [Value], fbid: Option<&'p str>) -> Self {
        Self {
            entity: find_entity(payloads, "Photo", fbid),
            payloads,
            id: fbid,
        }
    }
}

#[async_trait(?Send)]
impl FieldSource<PhotoRecord> for PhotoPayload<'_> {
    fn source(&self) -> Source {
        Source::Payload
    }

    fn provides(&self, group: PhotoGroup) -> bool {
        group != PhotoGroup::FullSize
    }

    async fn fill(&self, group: PhotoGroup, _partial: &PhotoRecord) -> Result<PhotoRecord> {
        let mut patch = PhotoRecord::default();
        let Some(photo) = self.entity else {
            if group == PhotoGroup::Stats {
                let stats = payload_stats(self.payloads, None, self.id);
                patch.likes_count = stats.likes;
                patch.comments_count = stats.comments;
                patch.shares_count = stats.shares;
            }
            return Ok(patch);
        };

        match group {
            PhotoGroup::Image => {
                patch.image_preview = str_at(photo, "image.uri").map(|uri| ImageMeta {
                    url: Some(uri),
                    alt: str_at(photo, "accessibility_caption"),
                    width: u64_at(photo, "image.width").and_then(|w| u32::try_from(w).ok()),
                    height: u64_at(photo, "image.height").and_then(|h| u32::try_from(h).ok()),
                    ..Default::default()
                });
            }
            PhotoGroup::FullSize => {}
            PhotoGroup::Timestamp => patch.timestamp = payload_timestamp(photo),
            PhotoGroup::Description => {
                patch.description = str_at(photo, "message.text")
                    .as_deref()
                    .and_then(sanitize_text);
            }
            PhotoGroup::Author => {
                let author = payload_author(photo);
                patch.author_name = author.name;
                patch.author_profile_url = author.profile_url;
                patch.author_profile_image_thumb = author.thumb;
            }
            PhotoGroup::Stats => {
                let stats = payload_stats(self.payloads, Some(photo), self.id);
                patch.likes_count = stats.likes;
                patch.comments_count = stats.comments;
                patch.shares_count = stats.shares;
                patch.views_count = stats.views;
            }
        }
        Ok(patch)
    }
}

/// Full-size image link revealed by the viewer's options menu
pub struct PhotoDownloadMenu<'p> {
    page: &'p dyn PageSession,
    scroll: &'p ScrollConfig,
}

impl<'p> PhotoDownloadMenu<'p> {
    pub fn new(page: &'p dyn PageSession, scroll: &'p ScrollConfig) -> Self {
        Self { page, scroll }
    }
}

#[async_trait(?Send)]
impl FieldSource<PhotoRecord> for PhotoDownloadMenu<'_> {
    fn source(&self) -> Source {
        Source::Interactive
    }

    fn provides(&self, group: PhotoGroup) -> bool {
        group == PhotoGroup::FullSize && self.page.is_interactive()
    }

    async fn fill(&self, _group: PhotoGroup, partial: &PhotoRecord) -> Result<PhotoRecord> {
        let mut patch = PhotoRecord::default();
        let Some(root) = self.page.root().await else {
            return Ok(patch);
        };
        let Some(menu) = root.find_one(selectors::photo::OPTIONS_MENU).await else {
            debug!(url = self.page.url(), "No options menu on photo");
            return Ok(patch);
        };
        if !menu.click().await? {
            return Ok(patch);
        }
        self.page
            .settle(self.scroll.settle_idle(), self.scroll.settle_timeout())
            .await;

        let href = match root.find_one(selectors::photo::DOWNLOAD_LINK).await {
            Some(link) => link.attr("href").await,
            None => None,
        };
        patch.image_full_size = href
            .and_then(|h| absolutize(self.page.url(), &h))
            .map(|url| {
                let alt = partial.image_preview.as_ref().and_then(|p| p.alt.clone());
                ImageMeta::new(url, alt)
            });
        Ok(patch)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageProps {
    src: Option<String>,
    alt: Option<String>,
    natural_width: Option<u32>,
    natural_height: Option<u32>,
}

/// Photo fields from the rendered viewer
pub struct PhotoMarkup<'p> {
    page: &'p dyn PageSession,
}

impl<'p> PhotoMarkup<'p> {
    pub fn new(page: &'p dyn PageSession) -> Self {
        Self { page }
    }
}

#[async_trait(?Send)]
impl FieldSource<PhotoRecord> for PhotoMarkup<'_> {
    fn source(&self) -> Source {
        Source::Static
    }

    fn provides(&self, group: PhotoGroup) -> bool {
        group != PhotoGroup::FullSize
    }

    async fn fill(&self, group: PhotoGroup, _partial: &PhotoRecord) -> Result<PhotoRecord> {
        let mut patch = PhotoRecord::default();
        let Some(root) = self.page.root().await else {
            return Ok(patch);
        };
        let root = root.as_ref();

        match group {
            PhotoGroup::Image => {
                if let Some(img) = first_match(root, selectors::photo::IMAGE).await {
                    let props: Option<ImageProps> =
                        props_as(img.as_ref(), &["src", "alt", "naturalWidth", "naturalHeight"])
                            .await;
                    patch.image_preview = props.and_then(|p| {
                        Some(ImageMeta {
                            url: Some(p.src.filter(|s| !s.is_empty())?),
                            alt: p.alt.filter(|a| !a.is_empty()),
                            width: p.natural_width,
                            height: p.natural_height,
                            ..Default::default()
                        })
                    });
                }
            }
            PhotoGroup::FullSize => {}
            PhotoGroup::Timestamp => patch.timestamp = dom_timestamp(root).await,
            PhotoGroup::Description => {
                patch.description = first_text(root, selectors::DESCRIPTION)
                    .await
                    .as_deref()
                    .and_then(sanitize_text);
            }
            PhotoGroup::Author => {
                let author = dom_author(self.page.url(), root).await;
                patch.author_name = author.name;
                patch.author_profile_url = author.profile_url;
                patch.author_profile_image_thumb = author.thumb;
            }
            PhotoGroup::Stats => {
                let stats = extract_post_stats(root).await;
                patch.likes_count = Some(stats.likes);
                patch.comments_count = Some(stats.comments);
                patch.views_count = stats.views;
            }
        }
        Ok(patch)
    }
}

/// Build, mask and emit the record of one photo page
pub async fn handle(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let route = ctx.route;
    let initial = PhotoRecord {
        url: route.url.clone(),
        fbid: route.param("fbid").map(String::from),
        album_id: route.param("albumId").map(String::from),
        group_id: route.param("groupId").map(String::from),
        ..Default::default()
    };

    let payloads = ctx.payloads().await?;
    let record = Pipeline::<PhotoRecord>::new(PhotoGroup::ALL)
        .with_source(PhotoPayload::new(&payloads, route.param("fbid")))
        .with_source(PhotoDownloadMenu::new(ctx.page, ctx.scroll))
        .with_source(PhotoMarkup::new(ctx.page))
        .resolve(initial)
        .await;

    ctx.emit(EntityRecord::Photo(record)).await?;
    Ok(Handled {
        records: 1,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_oversized_dimensions_are_dropped() {
        let payloads = vec![json!({
            "__typename": "Photo",
            "id": "1",
            "image": {"uri": "https://scontent/1.jpg", "width": 5_000_000_000u64, "height": 720}
        })];
        let patch = PhotoPayload::new(&payloads, Some("1"))
            .fill(PhotoGroup::Image, &PhotoRecord::default())
            .await
            .unwrap();

        let image = patch.image_preview.unwrap();
        assert_eq!(image.width, None);
        assert_eq!(image.height, Some(720));
    }
}
