//! Multi-source field resolution
//!
//! A record is assembled group by group. For every field group the sources
//! are consulted in priority order (embedded payload, then live-page action,
//! then rendered markup) until the group is resolved. Each source returns a
//! patch that only fills fields still empty, so the first source to produce a
//! value wins.
//!
//! A source failing for one group is logged and skipped; the remaining
//! sources and groups still run.

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::models::Merge;

/// Where a source reads its values from, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// Data embedded in page scripts
    Payload,
    /// Live page interaction (clicks, menus)
    Interactive,
    /// Rendered markup
    Static,
}

/// A partial record resolved group by group
pub trait Resolvable: Merge + Default {
    type Group: Copy + Debug;

    /// Whether nothing is left to fill for `group`
    fn is_resolved(&self, group: Self::Group) -> bool;
}

/// One way of filling field groups of `R`
#[async_trait(?Send)]
pub trait FieldSource<R: Resolvable> {
    fn source(&self) -> Source;

    /// Whether this source knows how to fill `group` at all
    fn provides(&self, _group: R::Group) -> bool {
        true
    }

    /// Produce a patch for `group`. Fields the source cannot find stay `None`.
    async fn fill(&self, group: R::Group, partial: &R) -> Result<R>;
}

/// Ordered field groups crossed with ordered sources
pub struct Pipeline<'s, R: Resolvable> {
    groups: Vec<R::Group>,
    sources: Vec<Box<dyn FieldSource<R> + 's>>,
}

impl<'s, R: Resolvable> Pipeline<'s, R> {
    pub fn new(groups: impl IntoIterator<Item = R::Group>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
            sources: Vec::new(),
        }
    }

    /// Append a source. Sources are kept sorted by [`Source`] priority; ties
    /// keep insertion order.
    pub fn with_source(mut self, source: impl FieldSource<R> + 's) -> Self {
        self.sources.push(Box::new(source));
        self.sources.sort_by_key(|s| s.source());
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|s| s.source())
    }

    /// Resolve every group starting from `partial`
    pub async fn resolve(&self, mut partial: R) -> R {
        for &group in &self.groups {
            for source in &self.sources {
                if partial.is_resolved(group) {
                    trace!(?group, "Group resolved");
                    break;
                }
                if !source.provides(group) {
                    continue;
                }
                match source.fill(group, &partial).await {
                    Ok(patch) => partial.merge_missing(patch),
                    Err(e) => {
                        warn!(?group, source = ?source.source(), error = %e, "Field source failed");
                    }
                }
            }
            if !partial.is_resolved(group) {
                debug!(?group, "Group left partially unresolved");
            }
        }
        partial
    }
}
