//! Route handlers
//!
//! One handler per [`Route`]. Group-level handlers only discover and enqueue
//! links; media handlers build exactly one record per visit, enrich its
//! images, mask it and push it to the dataset.

pub mod album;
pub mod group;
pub mod photo;
pub mod video;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::ScrollConfig;
use crate::crawler::dataset::DatasetSink;
use crate::crawler::fetcher::ImageMetaFetcher;
use crate::crawler::queue::RequestQueue;
use crate::dom::{DomNode, NodeBox, PageSession};
use crate::error::Result;
use crate::models::{CrawlRequest, EntityRecord, ImageMeta};
use crate::parser::payload::{self, find_first, str_at, u64_at};
use crate::parser::{first_match, parse_timestamp, selectors, unix_to_iso};
use crate::privacy::PrivacyMask;
use crate::router::{Route, RouteMatch};
use crate::utils::error::{DomError, ParseError};

// ============================================================================
// Context
// ============================================================================

/// Everything a handler needs for one page visit
pub struct HandlerContext<'a> {
    pub page: &'a dyn PageSession,
    pub route: &'a RouteMatch,
    pub queue: &'a dyn RequestQueue,
    pub dataset: &'a dyn DatasetSink,
    pub mask: &'a PrivacyMask,
    /// Image size/type lookups; `None` disables enrichment
    pub images: Option<&'a ImageMetaFetcher>,
    pub scroll: &'a ScrollConfig,
    /// `outputMaxEntries` for list pagination
    pub max_items: Option<usize>,
}

/// What one handler invocation produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Handled {
    pub records: usize,
    pub enqueued: usize,
}

impl<'a> HandlerContext<'a> {
    /// Route parameter that the matched pattern guarantees
    pub fn param(&self, name: &'static str) -> Result<&'a str> {
        self.route
            .param(name)
            .ok_or_else(|| ParseError::MissingParam(name).into())
    }

    pub async fn root(&self) -> Result<NodeBox<'a>> {
        self.page.root().await.ok_or_else(|| {
            DomError::Browser(format!("{} has no document element", self.page.url())).into()
        })
    }

    /// Embedded payloads of the page, parsed once per visit
    pub async fn payloads(&self) -> Result<Vec<Value>> {
        let root = self.root().await?;
        Ok(payload::collect_payloads(root.as_ref(), &payload::has_marker).await)
    }

    /// Enqueue absolute URLs, returning how many were offered
    pub async fn enqueue(&self, urls: Vec<String>) -> Result<usize> {
        let count = urls.len();
        if count > 0 {
            let requests = urls.into_iter().map(CrawlRequest::new).collect();
            self.queue.add_requests(requests).await?;
        }
        Ok(count)
    }

    /// Enrich, mask and push a finished record
    pub async fn emit(&self, mut record: EntityRecord) -> Result<()> {
        if let Some(images) = self.images {
            for image in record.images_mut() {
                images.enrich(image).await;
            }
        }
        let kind = record.kind();
        let value = self.mask.mask_record(&record)?;
        self.dataset.push(value).await?;
        info!(kind, url = record.url(), "Record emitted");
        Ok(())
    }
}

/// Run the handler for `ctx.route`
///
/// # Errors
///
/// Fails when the page cannot be read, a list page has no item container, or
/// the queue or dataset rejects output. Missing fields are never errors.
pub async fn dispatch(ctx: &HandlerContext<'_>) -> Result<Handled> {
    debug!(route = %ctx.route.route, url = %ctx.route.url, "Dispatching");
    match ctx.route.route {
        Route::FbGroup => group::handle_group(ctx).await,
        Route::FbGroupMedia => group::handle_group_media(ctx).await,
        Route::FbGroupMediaTab => group::handle_group_media_tab(ctx).await,
        Route::FbMediaPhoto => photo::handle(ctx).await,
        Route::FbMediaVideo => video::handle(ctx).await,
        Route::FbMediaAlbum => album::handle(ctx).await,
    }
}

// ============================================================================
// Shared extraction helpers
// ============================================================================

static PROFILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:user|people/[^/]+)/(\d+)").unwrap());

/// Profile link without tracking parameters
///
/// Numeric-id profiles (`profile.php?id=`) keep their `id` parameter.
pub fn clean_profile_url(base: &str, href: &str) -> Option<String> {
    let absolute = crate::utils::absolutize(base, href)?;
    let mut url = Url::parse(&absolute).ok()?;
    let id = url
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned());
    url.set_fragment(None);
    url.set_query(None);
    if let Some(id) = id {
        url.query_pairs_mut().append_pair("id", &id);
    }
    Some(url.to_string())
}

/// Numeric account id carried by a profile link
pub fn profile_fbid(url: &str) -> Option<String> {
    if let Some(caps) = PROFILE_ID.captures(url) {
        return Some(caps[1].to_string());
    }
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, v)| k == "id" && v.chars().all(|c| c.is_ascii_digit()))
        .map(|(_, v)| v.into_owned())
}

/// Identity of whoever posted a photo or video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub thumb: Option<ImageMeta>,
}

/// Author header of a post in rendered markup
pub async fn dom_author<'d>(page_url: &str, root: &dyn DomNode<'d>) -> Author {
    let mut author = Author::default();
    if let Some(link) = first_match(root, selectors::author::LINKS).await {
        author.name = link.text().await.filter(|t| !t.is_empty());
        author.profile_url = match link.attr("href").await {
            Some(href) => clean_profile_url(page_url, &href),
            None => None,
        };
    }
    if let Some(avatar) = first_match(root, selectors::author::AVATAR).await {
        for name in ["xlink:href", "href", "src"] {
            if let Some(src) = avatar.attr(name).await.filter(|s| !s.is_empty()) {
                author.thumb = Some(ImageMeta::new(src, None));
                break;
            }
        }
    }
    author
}

/// Post time from the rendered timestamp link
///
/// The tooltip date may sit in the element text or its `aria-label`; older
/// markup carries a Unix time in `data-utime`.
pub async fn dom_timestamp<'d>(root: &dyn DomNode<'d>) -> Option<String> {
    for selector in selectors::TIMESTAMP {
        let Some(node) = root.find_one(selector).await else {
            continue;
        };
        if let Some(ts) = node.text().await.as_deref().and_then(parse_timestamp) {
            return Some(ts);
        }
        if let Some(ts) = node.attr("aria-label").await.as_deref().and_then(parse_timestamp) {
            return Some(ts);
        }
        if let Some(secs) = node.attr("data-utime").await.and_then(|v| v.parse().ok()) {
            return unix_to_iso(secs);
        }
    }
    None
}

/// First payload node of `typename`, preferring the one whose id is `id`
pub fn find_entity<'v>(payloads: &'v [Value], typename: &str, id: Option<&str>) -> Option<&'v Value> {
    let is_type = |v: &Value| v.get("__typename").and_then(Value::as_str) == Some(typename);
    if let Some(id) = id {
        let by_id = |v: &Value| is_type(v) && v.get("id").and_then(Value::as_str) == Some(id);
        if let Some(found) = payloads.iter().find_map(|p| find_first(p, &by_id)) {
            return Some(found);
        }
    }
    payloads.iter().find_map(|p| find_first(p, &is_type))
}

/// Author of a payload entity (`owner`)
pub fn payload_author(entity: &Value) -> Author {
    let name = str_at(entity, "owner.name");
    Author {
        profile_url: str_at(entity, "owner.url").or_else(|| str_at(entity, "owner.profile_url")),
        thumb: str_at(entity, "owner.profile_picture.uri").map(|uri| ImageMeta::new(uri, None)),
        name,
    }
}

/// Engagement counts from embedded data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadStats {
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub shares: Option<u64>,
    pub views: Option<u64>,
}

/// Read the feedback summary of the routed entity
///
/// Only the entity's own `feedback` object (or the entity itself) and
/// feedback nodes tagged with the routed `id` are trusted. Payloads also
/// carry comment and neighbour post feedback with the same shape.
pub fn payload_stats(payloads: &[Value], entity: Option<&Value>, id: Option<&str>) -> PayloadStats {
    let is_feedback = |v: &Value| {
        v.as_object()
            .is_some_and(|o| o.contains_key("reaction_count") || o.contains_key("comment_count"))
    };
    let tagged = |v: &Value| {
        is_feedback(v)
            && id.is_some_and(|id| {
                ["id", "subscription_target_id"]
                    .iter()
                    .any(|key| v.get(key).and_then(Value::as_str) == Some(id))
            })
    };
    let feedback = entity
        .and_then(|e| {
            e.get("feedback")
                .filter(|f| is_feedback(*f))
                .or_else(|| is_feedback(e).then_some(e))
        })
        .or_else(|| payloads.iter().find_map(|p| find_first(p, &tagged)));

    let mut stats = PayloadStats::default();
    if let Some(fb) = feedback {
        stats.likes = u64_at(fb, "reaction_count.count").or_else(|| u64_at(fb, "reactors.count"));
        stats.comments = u64_at(fb, "comment_count.total_count")
            .or_else(|| u64_at(fb, "comments.total_count"));
        stats.shares = u64_at(fb, "share_count.count");
        stats.views = u64_at(fb, "video_view_count");
    }
    if let Some(e) = entity {
        stats.views = stats
            .views
            .or_else(|| u64_at(e, "video_view_count"))
            .or_else(|| u64_at(e, "play_count"));
    }
    stats
}

/// Post time of a payload entity
pub fn payload_timestamp(entity: &Value) -> Option<String> {
    ["created_time", "publish_time", "creation_time"]
        .iter()
        .find_map(|key| u64_at(entity, key))
        .and_then(|secs| unix_to_iso(secs as i64))
}
