//! Album pages
//!
//! The album record is resolved before the item grid is scrolled; scrolling
//! only adds items and the final item count goes on the record.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use super::{clean_profile_url, dom_timestamp, find_entity, payload_timestamp, profile_fbid};
use super::{Handled, HandlerContext};
use crate::crawler::paginator::ScrollPaginator;
use crate::dom::PageSession;
use crate::error::Result;
use crate::models::{AlbumRecord, EntityRecord, Person};
use crate::parser::payload::get_path;
use crate::parser::sanitize::sanitize_text;
use crate::parser::selectors;
use crate::parser::{first_match, first_text, str_at};
use crate::pipeline::{FieldSource, Pipeline, Resolvable, Source};

/// Field groups of an album record, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumGroup {
    Title,
    Description,
    Owner,
    Contributors,
    Timestamp,
}

impl AlbumGroup {
    pub const ALL: [AlbumGroup; 5] = [
        Self::Title,
        Self::Description,
        Self::Owner,
        Self::Contributors,
        Self::Timestamp,
    ];
}

impl Resolvable for AlbumRecord {
    type Group = AlbumGroup;

    fn is_resolved(&self, group: AlbumGroup) -> bool {
        match group {
            AlbumGroup::Title => self.title.is_some(),
            AlbumGroup::Description => self.description.is_some(),
            AlbumGroup::Owner => {
                self.owner_name.is_some()
                    && self.owner_profile_url.is_some()
                    && self.owner_fbid.is_some()
            }
            AlbumGroup::Contributors => self.contributors.is_some(),
            AlbumGroup::Timestamp => self.timestamp.is_some(),
        }
    }
}

fn payload_person(node: &Value) -> Person {
    Person {
        name: str_at(node, "name"),
        profile_url: str_at(node, "url").or_else(|| str_at(node, "profile_url")),
        fbid: str_at(node, "id"),
    }
}

/// Contributor list in any of the shapes the payload uses
fn payload_contributors(album: &Value) -> Option<Vec<Person>> {
    let list = get_path(album, "contributors")?;
    let items = match list {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => match (get_path(other, "nodes"), get_path(other, "edges")) {
            (Some(Value::Array(nodes)), _) => nodes.iter().collect(),
            (_, Some(Value::Array(edges))) => {
                edges.iter().filter_map(|e| e.get("node")).collect()
            }
            _ => return None,
        },
    };
    Some(items.into_iter().map(payload_person).collect())
}

/// Album fields from embedded page data
pub struct AlbumPayload<'p> {
    entity: Option<&'p Value>,
}

impl<'p> AlbumPayload<'p> {
    pub fn new(payloads: &'p [Value], album_id: Option<&str>) -> Self {
        Self {
            entity: find_entity(payloads, "Album", album_id),
        }
    }
}

#[async_trait(?Send)]
impl FieldSource<AlbumRecord> for AlbumPayload<'_> {
    fn source(&self) -> Source {
        Source::Payload
    }

    async fn fill(&self, group: AlbumGroup, _partial: &AlbumRecord) -> Result<AlbumRecord> {
        let mut patch = AlbumRecord::default();
        let Some(album) = self.entity else {
            return Ok(patch);
        };

        match group {
            AlbumGroup::Title => {
                patch.title = str_at(album, "title.text")
                    .or_else(|| str_at(album, "name"))
                    .as_deref()
                    .and_then(sanitize_text);
            }
            AlbumGroup::Description => {
                patch.description = str_at(album, "description.text")
                    .or_else(|| str_at(album, "message.text"))
                    .as_deref()
                    .and_then(sanitize_text);
            }
            AlbumGroup::Owner => {
                if let Some(owner) = album.get("owner") {
                    let person = payload_person(owner);
                    patch.owner_name = person.name;
                    patch.owner_profile_url = person.profile_url;
                    patch.owner_fbid = person.fbid;
                }
            }
            AlbumGroup::Contributors => patch.contributors = payload_contributors(album),
            AlbumGroup::Timestamp => patch.timestamp = payload_timestamp(album),
        }
        Ok(patch)
    }
}

/// Album fields from the rendered page
pub struct AlbumMarkup<'p> {
    page: &'p dyn PageSession,
}

impl<'p> AlbumMarkup<'p> {
    pub fn new(page: &'p dyn PageSession) -> Self {
        Self { page }
    }
}

#[async_trait(?Send)]
impl FieldSource<AlbumRecord> for AlbumMarkup<'_> {
    fn source(&self) -> Source {
        Source::Static
    }

    async fn fill(&self, group: AlbumGroup, _partial: &AlbumRecord) -> Result<AlbumRecord> {
        let mut patch = AlbumRecord::default();
        let Some(root) = self.page.root().await else {
            return Ok(patch);
        };
        let root = root.as_ref();
        let url = self.page.url();

        match group {
            AlbumGroup::Title => {
                patch.title = first_text(root, selectors::album::TITLE)
                    .await
                    .as_deref()
                    .and_then(sanitize_text);
            }
            AlbumGroup::Description => {
                patch.description = first_text(root, selectors::album::DESCRIPTION)
                    .await
                    .as_deref()
                    .and_then(sanitize_text);
            }
            AlbumGroup::Owner => {
                if let Some(link) = first_match(root, selectors::album::OWNER).await {
                    patch.owner_name = link.text().await.filter(|t| !t.is_empty());
                    patch.owner_profile_url = match link.attr("href").await {
                        Some(href) => clean_profile_url(url, &href),
                        None => None,
                    };
                    patch.owner_fbid = patch.owner_profile_url.as_deref().and_then(profile_fbid);
                }
            }
            AlbumGroup::Contributors => {
                let links = root.find_many(selectors::album::CONTRIBUTORS).await;
                if !links.is_empty() {
                    let mut seen = HashSet::new();
                    let mut people = Vec::new();
                    for link in links {
                        let profile_url = match link.attr("href").await {
                            Some(href) => clean_profile_url(url, &href),
                            None => None,
                        };
                        if let Some(p) = &profile_url {
                            if !seen.insert(p.clone()) {
                                continue;
                            }
                        }
                        people.push(Person {
                            name: link.text().await.filter(|t| !t.is_empty()),
                            fbid: profile_url.as_deref().and_then(profile_fbid),
                            profile_url,
                        });
                    }
                    patch.contributors = Some(people);
                }
            }
            AlbumGroup::Timestamp => patch.timestamp = dom_timestamp(root).await,
        }
        Ok(patch)
    }
}

/// Build the album record, enqueue its items and emit it with the item count
pub async fn handle(ctx: &HandlerContext<'_>) -> Result<Handled> {
    let route = ctx.route;
    let initial = AlbumRecord {
        url: route.url.clone(),
        album_id: route.param("albumId").map(String::from),
        ..Default::default()
    };

    let payloads = ctx.payloads().await?;
    let mut record = Pipeline::<AlbumRecord>::new(AlbumGroup::ALL)
        .with_source(AlbumPayload::new(&payloads, initial.album_id.as_deref()))
        .with_source(AlbumMarkup::new(ctx.page))
        .resolve(initial)
        .await;

    let outcome = ScrollPaginator::new(selectors::album::ITEM_LINKS, ctx.scroll)
        .with_max_items(ctx.max_items)
        .run(ctx.page, ctx.queue)
        .await
        .inspect_err(|e| error!(url = ctx.page.url(), error = %e, "Album pagination failed"))?;
    record.items_count = Some(outcome.total as u64);

    ctx.emit(EntityRecord::Album(record)).await?;
    Ok(Handled {
        records: 1,
        enqueued: outcome.total,
    })
}
