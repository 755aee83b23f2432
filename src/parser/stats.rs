//! Engagement count parsing
//!
//! Counts show up either as plain numbers with thousand separators
//! (`"2,400"`) or abbreviated with a unit suffix (`"6.9K views"`).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::selectors;
use crate::dom::{DomNode, NodeBox};

lazy_static! {
    static ref COUNT_REGEX: Regex =
        Regex::new(r"\d{1,3}(?:[,.\u{00A0}\u{202F} ]\d{3})+|\d+").expect("Invalid count regex");
    static ref UNIT_COUNT_REGEX: Regex =
        Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*([kmbt])?\b").expect("Invalid unit count regex");
    static ref COMMENTS_REGEX: Regex =
        Regex::new(r"(?i)(\d[\d,.]*(?:\s?[kmbt])?)\s+comments?").expect("Invalid comments regex");
}

/// Counts read from a post's engagement bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStats {
    pub likes: u64,
    pub comments: u64,
    pub views: Option<u64>,
    /// Never exposed by the rendered page; only embedded data carries it
    pub shares: Option<u64>,
}

/// Parse the first integer in `text`, ignoring thousand separators
///
/// # Examples
///
/// ```
/// use fbmedia::parser::stats::parse_count;
///
/// assert_eq!(parse_count("Like: 2,400 people"), Some(2400));
/// assert_eq!(parse_count("no digits"), None);
/// ```
pub fn parse_count(text: &str) -> Option<u64> {
    let m = COUNT_REGEX.find(text)?;
    let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit.to_ascii_lowercase().as_str() {
        "k" => 1e3,
        "m" => 1e6,
        "b" => 1e9,
        "t" => 1e12,
        _ => 1.0,
    }
}

/// Parse an abbreviated count such as `"6.9K views"` or `"1,2M"`
///
/// Without a unit suffix the number is read like [`parse_count`].
pub fn parse_unit_count(text: &str) -> Option<u64> {
    let caps = UNIT_COUNT_REGEX.captures(text)?;
    let number = caps.get(1)?.as_str();
    let Some(unit) = caps.get(2) else {
        return parse_count(number);
    };
    let value: f64 = number.replace(',', ".").parse().ok()?;
    Some((value * unit_multiplier(unit.as_str())).round() as u64)
}

async fn find_comments<'d>(root: &dyn DomNode<'d>) -> Option<(NodeBox<'d>, u64)> {
    for candidate in root.find_many(selectors::stats::COUNT_CANDIDATES).await {
        let Some(text) = candidate.text().await else {
            continue;
        };
        if let Some(caps) = COMMENTS_REGEX.captures(&text) {
            if let Some(count) = caps.get(1).and_then(|m| parse_unit_count(m.as_str())) {
                return Some((candidate, count));
            }
        }
    }
    None
}

async fn find_views<'d>(anchor: &dyn DomNode<'d>) -> Option<u64> {
    // Views sit next to the like/comment pair, either inside their shared
    // ancestor or one level up.
    let mut scope = Some(anchor.clone_node());
    for _ in 0..2 {
        let node = scope?;
        for child in node.children().await {
            if let Some(text) = child.text_lower().await {
                if text.contains("views") {
                    return parse_unit_count(&text);
                }
            }
        }
        scope = node.parent().await;
    }
    None
}

/// Read likes, comments and views from the rendered engagement bar
///
/// Missing likes or comments count as zero. Views stay `None` when not shown.
pub async fn extract_post_stats<'d>(root: &dyn DomNode<'d>) -> PostStats {
    let likes_el = root.find_one(selectors::stats::LIKES).await;
    let likes = match &likes_el {
        Some(el) => el
            .attr("aria-label")
            .await
            .and_then(|label| parse_count(&label))
            .unwrap_or(0),
        None => 0,
    };

    let comments_el = find_comments(root).await;
    let comments = comments_el.as_ref().map(|(_, n)| *n).unwrap_or(0);

    let anchor = match (&likes_el, &comments_el) {
        (Some(l), Some((c, _))) => l.common_ancestor(c.as_ref()).await,
        (Some(only), None) | (None, Some((only, _))) => only.parent().await,
        (None, None) => None,
    };
    let views = match anchor {
        Some(anchor) => find_views(anchor.as_ref()).await,
        None => None,
    };

    debug!(likes, comments, ?views, "Extracted post stats");
    PostStats {
        likes,
        comments,
        views,
        shares: None,
    }
}
