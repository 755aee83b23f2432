//! Parsing and data extraction
//!
//! Page-independent pieces of extraction: tooltip dates, engagement counts,
//! embedded script data and text cleanup, plus the selectors they share.

pub mod payload;
pub mod sanitize;
pub mod selectors;
pub mod stats;
pub mod timestamp;

pub use payload::{find_first, get_path, search_payloads, str_at, u64_at};
pub use stats::{extract_post_stats, parse_count, parse_unit_count, PostStats};
pub use timestamp::{parse_timestamp, parse_timestamp_strict, unix_to_iso};

use crate::dom::{DomNode, NodeBox};

/// First match among fallback selectors, tried in order
pub async fn first_match<'d>(root: &dyn DomNode<'d>, selectors: &[&str]) -> Option<NodeBox<'d>> {
    for selector in selectors {
        if let Some(node) = root.find_one(selector).await {
            return Some(node);
        }
    }
    None
}

/// Trimmed text of the first fallback selector that yields any
///
/// `<meta>` elements contribute their `content` attribute.
pub async fn first_text<'d>(root: &dyn DomNode<'d>, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        let Some(node) = root.find_one(selector).await else {
            continue;
        };
        let text = match node.attr("content").await {
            Some(content) if selector.starts_with("meta") => Some(content),
            _ => node.text().await,
        };
        if let Some(text) = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            return Some(text);
        }
    }
    None
}
