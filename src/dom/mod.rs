//! Backend-neutral DOM queries
//!
//! Extraction code is written once against [`DomNode`] and [`PageSession`] and
//! runs unchanged over:
//!
//! - [`static_dom`] - parsed markup (`scraper`)
//! - [`live`] - an interactive Chrome tab (`chromiumoxide`, feature `browser`)
//!
//! Every query is async because the live backend needs a protocol round trip
//! per call. Lookups that find nothing yield `None` or an empty `Vec`; only a
//! broken backend produces a [`DomError`].

pub mod static_dom;

#[cfg(feature = "browser")]
pub mod live;

pub use static_dom::{StaticNode, StaticPage};

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::utils::error::DomError;

/// Stable identity of an element for the lifetime of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

/// Owned handle to an element of either backend
pub type NodeBox<'d> = Box<dyn DomNode<'d> + 'd>;

/// Element capability shared by every DOM backend
///
/// `'d` is the lifetime of the underlying document: parsed markup for the
/// static backend, `'static` for live pages.
#[async_trait(?Send)]
pub trait DomNode<'d> {
    fn key(&self) -> NodeKey;

    fn clone_node(&self) -> NodeBox<'d>;

    /// First descendant matching `selector`
    async fn find_one(&self, selector: &str) -> Option<NodeBox<'d>>;

    /// All descendants matching `selector`, in document order
    async fn find_many(&self, selector: &str) -> Vec<NodeBox<'d>>;

    async fn children(&self) -> Vec<NodeBox<'d>>;

    async fn parent(&self) -> Option<NodeBox<'d>>;

    /// Nearest inclusive ancestor matching `selector`
    async fn closest(&self, selector: &str) -> Option<NodeBox<'d>>;

    async fn attr(&self, name: &str) -> Option<String>;

    /// DOM property (`textContent`, `href`, `naturalWidth`, ...)
    async fn prop(&self, name: &str) -> Option<Value>;

    async fn props(&self, names: &[&str]) -> Map<String, Value> {
        let mut out = Map::new();
        for name in names {
            let value = self.prop(name).await.unwrap_or(Value::Null);
            out.insert((*name).to_string(), value);
        }
        out
    }

    async fn text(&self) -> Option<String>;

    async fn text_lower(&self) -> Option<String> {
        self.text().await.map(|t| t.to_lowercase())
    }

    /// Clicks the element. Returns `false` on backends without interaction.
    async fn click(&self) -> Result<bool, DomError>;

    /// Deepest element containing both `self` and `other`
    async fn common_ancestor(&self, other: &dyn DomNode<'d>) -> Option<NodeBox<'d>> {
        let mut lineage = HashSet::new();
        let mut cursor = Some(self.clone_node());
        while let Some(node) = cursor {
            lineage.insert(node.key());
            cursor = node.parent().await;
        }

        let mut cursor = Some(other.clone_node());
        while let Some(node) = cursor {
            if lineage.contains(&node.key()) {
                return Some(node);
            }
            cursor = node.parent().await;
        }
        None
    }

    /// Common ancestor of every descendant matching `selector`
    ///
    /// A single match yields its parent, so the result is always a container
    /// rather than one of the items.
    async fn common_ancestor_from_selector(&self, selector: &str) -> Option<NodeBox<'d>> {
        let mut matches = self.find_many(selector).await.into_iter();
        let first = matches.next()?;
        let Some(second) = matches.next() else {
            return first.parent().await;
        };

        let mut ancestor = first.common_ancestor(second.as_ref()).await?;
        for node in matches {
            ancestor = ancestor.common_ancestor(node.as_ref()).await?;
        }
        Some(ancestor)
    }

    /// Descendants matching `selector` whose keys are not yet in `seen`
    ///
    /// Newly returned keys are added to `seen`.
    async fn new_descendants(
        &self,
        selector: &str,
        seen: &mut HashSet<NodeKey>,
    ) -> Vec<NodeBox<'d>> {
        self.find_many(selector)
            .await
            .into_iter()
            .filter(|node| seen.insert(node.key()))
            .collect()
    }
}

/// One visited page, live or parsed
#[async_trait(?Send)]
pub trait PageSession {
    fn url(&self) -> &str;

    /// Whether clicks and scrolls have any effect
    fn is_interactive(&self) -> bool;

    /// Current serialized markup
    async fn markup(&self) -> Result<String, DomError>;

    /// Document element
    async fn root(&self) -> Option<NodeBox<'_>>;

    /// Scrolls to reveal more lazily loaded content
    async fn scroll(&self) -> Result<(), DomError>;

    /// Waits until network activity stops for `idle` or `timeout` passes
    async fn settle(&self, idle: Duration, timeout: Duration);
}

/// Reads several properties at once into a typed struct
pub async fn props_as<'d, T: DeserializeOwned>(
    node: &(dyn DomNode<'d> + 'd),
    names: &[&str],
) -> Option<T> {
    let map = node.props(names).await;
    serde_json::from_value(Value::Object(map)).ok()
}

/// Link carried by an element: its own `href`, else its first `a[href]`
pub async fn link_of<'d>(node: &(dyn DomNode<'d> + 'd)) -> Option<String> {
    if let Some(href) = node.attr("href").await {
        return Some(href);
    }
    node.find_one("a[href]").await?.attr("href").await
}

/// Trimmed non-empty text of the first match
pub async fn text_of<'d>(node: &(dyn DomNode<'d> + 'd), selector: &str) -> Option<String> {
    let text = node.find_one(selector).await?.text().await?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Attribute of the first match
pub async fn attr_of<'d>(
    node: &(dyn DomNode<'d> + 'd),
    selector: &str,
    name: &str,
) -> Option<String> {
    node.find_one(selector).await?.attr(name).await
}
