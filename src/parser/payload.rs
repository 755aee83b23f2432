//! Search over data embedded in page scripts
//!
//! Facebook inlines the data behind a rendered page as JSON in `<script>`
//! tags. The shapes are undocumented and change often, so nothing here models
//! them: callers search the raw [`Value`] trees with a narrow predicate and
//! pull fields out one by one with [`get_path`], [`str_at`] and [`u64_at`].
//!
//! Traversal is breadth-first, but the order of scripts and of keys inside
//! them is whatever the page produced. When several nodes match, "first" is
//! best-effort and predicates should be specific enough not to care.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, trace};

use super::selectors;
use crate::dom::DomNode;

/// Marker present in every script that carries server-rendered entity data
pub const PAYLOAD_MARKER: &str = "__bbox";

/// Default pre-filter: only scripts containing [`PAYLOAD_MARKER`] are parsed
pub fn has_marker(text: &str) -> bool {
    text.contains(PAYLOAD_MARKER)
}

/// Predicate matching objects that carry `key`
pub fn has_key(key: &str) -> impl Fn(&Value) -> bool + '_ {
    move |v| v.as_object().is_some_and(|o| o.contains_key(key))
}

/// Predicate matching objects whose `key` equals the string `value`
pub fn key_equals<'a>(key: &'a str, value: &'a str) -> impl Fn(&Value) -> bool + 'a {
    move |v| v.get(key).and_then(Value::as_str) == Some(value)
}

/// Parse the script bodies on a page into JSON trees
///
/// Text failing `pre_filter` is skipped without parsing. Text that is not
/// JSON as a whole (script wrappers around object literals) is mined for
/// balanced `{...}`/`[...]` blocks instead.
pub async fn collect_payloads<'d>(
    root: &dyn DomNode<'d>,
    pre_filter: &dyn Fn(&str) -> bool,
) -> Vec<Value> {
    let mut payloads = Vec::new();
    for script in root.find_many(selectors::SCRIPT).await {
        let Some(text) = script
            .prop("textContent")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
        else {
            continue;
        };
        if !pre_filter(&text) {
            continue;
        }
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => payloads.push(value),
            Err(e) => {
                let blocks = extract_json_blocks(&text);
                trace!(error = %e, blocks = blocks.len(), "Script is not plain JSON");
                payloads.extend(blocks);
            }
        }
    }
    debug!(payloads = payloads.len(), "Collected embedded payloads");
    payloads
}

/// Collect every node under the page's payloads matching `predicate`
pub async fn search_payloads<'d>(
    root: &dyn DomNode<'d>,
    pre_filter: &dyn Fn(&str) -> bool,
    predicate: &dyn Fn(&Value) -> bool,
) -> Vec<Value> {
    collect_payloads(root, pre_filter)
        .await
        .iter()
        .flat_map(|payload| find_all(payload, predicate))
        .cloned()
        .collect()
}

/// Breadth-first search for every node matching `predicate`
///
/// Matching nodes are still descended into, so nested matches are returned
/// after their ancestors.
pub fn find_all<'v>(root: &'v Value, predicate: &dyn Fn(&Value) -> bool) -> Vec<&'v Value> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        if predicate(node) {
            found.push(node);
        }
        match node {
            Value::Object(map) => queue.extend(map.values()),
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }
    found
}

/// First node, breadth-first, matching `predicate`
pub fn find_first<'v>(root: &'v Value, predicate: &dyn Fn(&Value) -> bool) -> Option<&'v Value> {
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        if predicate(node) {
            return Some(node);
        }
        match node {
            Value::Object(map) => queue.extend(map.values()),
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }
    None
}

/// Walk a dotted path such as `"owner.profile_picture.uri"` or `"edges.0.node"`
pub fn get_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(value, |node, seg| match node {
            Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(seg),
            _ => None,
        })
}

/// Non-empty string at `path`
pub fn str_at(value: &Value, path: &str) -> Option<String> {
    let s = get_path(value, path)?.as_str()?;
    (!s.is_empty()).then(|| s.to_string())
}

/// Unsigned integer at `path`, accepting numeric strings
pub fn u64_at(value: &Value, path: &str) -> Option<u64> {
    match get_path(value, path)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Float at `path`, accepting numeric strings
pub fn f64_at(value: &Value, path: &str) -> Option<f64> {
    match get_path(value, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// End index of the balanced block opening at `start`, honoring strings
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every outermost balanced `{...}`/`[...]` block in `text` that parses as JSON
///
/// Blocks that fail to parse are searched for smaller blocks inside them.
/// Empty containers are dropped.
pub fn extract_json_blocks(text: &str) -> Vec<Value> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'{' | b'[') {
            if let Some(end) = balanced_end(bytes, i) {
                if let Ok(value) = serde_json::from_str::<Value>(&text[i..=end]) {
                    let empty = match &value {
                        Value::Object(m) => m.is_empty(),
                        Value::Array(a) => a.is_empty(),
                        _ => true,
                    };
                    if !empty {
                        blocks.push(value);
                    }
                    i = end + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::StaticNode;
    use scraper::Html;
    use serde_json::json;

    const PAGE: &str = r#"
        <html><head>
          <script>window.analytics = {"noise": true};</script>
          <script type="application/json">
            {"require":[["ScheduledServerJS","handle",null,[{"__bbox":{"result":{"data":{
              "currMedia":{"__typename":"Photo","id":"101","image":{"uri":"https://scontent/full.jpg","width":960},
              "owner":{"name":"Jane Doe","id":"7"}}}}}}]]]}
          </script>
          <script>requireLazy(["Bootloader"], function() { handle({"__bbox":{"feedback":{"reaction_count":{"count":"42"},"share_count":{"count":3}}}}); });</script>
        </head><body></body></html>
    "#;

    #[tokio::test]
    async fn test_search_plain_json_script() {
        let doc = Html::parse_document(PAGE);
        let root = StaticNode::root(&doc);

        let media = search_payloads(&root, &has_marker, &has_key("currMedia")).await;
        assert_eq!(media.len(), 1);
        assert_eq!(
            str_at(&media[0], "currMedia.image.uri").as_deref(),
            Some("https://scontent/full.jpg")
        );
        assert_eq!(u64_at(&media[0], "currMedia.image.width"), Some(960));
    }

    #[tokio::test]
    async fn test_search_falls_back_to_blocks() {
        let doc = Html::parse_document(PAGE);
        let root = StaticNode::root(&doc);

        let feedback = search_payloads(&root, &has_marker, &has_key("share_count")).await;
        assert_eq!(feedback.len(), 1);
        assert_eq!(u64_at(&feedback[0], "reaction_count.count"), Some(42));
        assert_eq!(u64_at(&feedback[0], "share_count.count"), Some(3));
    }

    #[tokio::test]
    async fn test_pre_filter_skips_unmarked_scripts() {
        let doc = Html::parse_document(PAGE);
        let root = StaticNode::root(&doc);

        let noise = search_payloads(&root, &has_marker, &has_key("noise")).await;
        assert!(noise.is_empty());

        let everything = search_payloads(&root, &|_: &str| true, &has_key("noise")).await;
        assert_eq!(everything.len(), 1);
    }

    #[test]
    fn test_find_all_is_breadth_first() {
        let value = json!({
            "a": {"deep": {"id": "inner"}},
            "id": "outer",
        });
        let ids: Vec<_> = find_all(&value, &has_key("id"))
            .into_iter()
            .filter_map(|v| v["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["outer", "inner"]);
    }

    #[test]
    fn test_find_first_with_key_equals() {
        let value = json!([{"__typename": "Video", "id": "1"}, {"__typename": "Photo", "id": "2"}]);
        let photo = find_first(&value, &key_equals("__typename", "Photo")).unwrap();
        assert_eq!(photo["id"], json!("2"));
    }

    #[test]
    fn test_get_path_through_arrays() {
        let value = json!({"edges": [{"node": {"id": "a"}}, {"node": {"id": "b"}}]});
        assert_eq!(str_at(&value, "edges.1.node.id").as_deref(), Some("b"));
        assert!(get_path(&value, "edges.9.node").is_none());
        assert!(get_path(&value, "edges.x").is_none());
        assert!(str_at(&json!({"s": ""}), "s").is_none());
    }

    #[test]
    fn test_extract_json_blocks_ignores_braces_in_strings() {
        let text = r#"f({"text": "a } b", "n": 1}); g([]); h({"ok": [1, 2]})"#;
        let blocks = extract_json_blocks(text);
        assert_eq!(blocks, vec![json!({"text": "a } b", "n": 1}), json!({"ok": [1, 2]})]);
    }

    #[test]
    fn test_extract_json_blocks_recovers_inner_json() {
        let text = r#"{ handler: function() { return {"x": 1}; } }"#;
        assert_eq!(extract_json_blocks(text), vec![json!({"x": 1})]);
    }
}
