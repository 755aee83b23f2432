//! Group, media index and media tab pages

use std::collections::BTreeSet;

use tracing::{debug, error, info};

use super::{Handled, HandlerContext};
use crate::crawler::paginator::ScrollPaginator;
use crate::dom::link_of;
use crate::error::Result;
use crate::parser::selectors;
use crate::router::{match_url, Route};
use crate::utils::{absolutize, FACEBOOK_ORIGIN};

/// Media tabs of a group, in crawl order
pub const MEDIA_TABS: [&str; 3] = ["photos", "videos", "albums"];

pub fn media_index_url(group_id: &str) -> String {
    format!("{FACEBOOK_ORIGIN}/groups/{group_id}/media")
}

pub fn media_tab_url(group_id: &str, tab: &str) -> String {
    format!("{FACEBOOK_ORIGIN}/groups/{group_id}/media/{tab}")
}

/// Item link selector for a media tab
pub fn tab_item_selector(tab: &str) -> Option<&'static str> {
    match tab {
        "photos" => Some(selectors::group::PHOTO_ITEMS),
        "videos" => Some(selectors::group::VIDEO_ITEMS),
        "albums" => Some(selectors::group::ALBUM_ITEMS),
        _ => None,
    }
}

/// Redirect a group page to its media index
pub async fn handle_group(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let group_id = ctx.param("groupId")?;
    let enqueued = ctx.enqueue(vec![media_index_url(group_id)]).await?;
    Ok(Handled {
        enqueued,
        ..Default::default()
    })
}

/// Enqueue the photo, video and album tabs of a group
///
/// Tab links found on the page win; when the page shows none the canonical
/// tab URLs are used.
pub async fn handle_group_media(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let group_id = ctx.param("groupId")?;
    let root = ctx.root().await?;

    let mut tabs = BTreeSet::new();
    for link in root.find_many(selectors::group::TAB_LINKS).await {
        let Some(href) = link_of(link.as_ref()).await else {
            continue;
        };
        let Some(url) = absolutize(ctx.page.url(), &href) else {
            continue;
        };
        match match_url(&url) {
            Some(m) if m.route == Route::FbGroupMediaTab && m.param("groupId") == Some(group_id) => {
                tabs.insert(url);
            }
            _ => debug!(url, "Ignoring tab link of another page"),
        }
    }

    let urls: Vec<String> = if tabs.is_empty() {
        debug!(group_id, "No tab links rendered, using canonical tabs");
        MEDIA_TABS.iter().map(|tab| media_tab_url(group_id, tab)).collect()
    } else {
        tabs.into_iter().collect()
    };
    info!(group_id, tabs = urls.len(), "Media tabs discovered");

    let enqueued = ctx.enqueue(urls).await?;
    Ok(Handled {
        enqueued,
        ..Default::default()
    })
}

/// Scroll a media tab and enqueue every item link
pub async fn handle_group_media_tab(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let tab = ctx.param("tab")?;
    let selector = tab_item_selector(tab).unwrap_or(selectors::album::ITEM_LINKS);

    let outcome = ScrollPaginator::new(selector, ctx.scroll)
        .with_max_items(ctx.max_items)
        .run(ctx.page, ctx.queue)
        .await
        .inspect_err(|e| error!(url = ctx.page.url(), error = %e, "Media tab pagination failed"))?;

    Ok(Handled {
        enqueued: outcome.total,
        ..Default::default()
    })
}
