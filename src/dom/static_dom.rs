//! Static DOM backend over parsed markup

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::{DomNode, NodeBox, NodeKey, PageSession};
use crate::utils::error::DomError;
use crate::utils::normalize_whitespace;

/// Element of a parsed document
#[derive(Clone, Copy)]
pub struct StaticNode<'d> {
    el: ElementRef<'d>,
}

impl<'d> StaticNode<'d> {
    pub fn new(el: ElementRef<'d>) -> Self {
        Self { el }
    }

    /// Document element of `doc`
    pub fn root(doc: &'d Html) -> Self {
        Self::new(doc.root_element())
    }

    pub fn element(&self) -> ElementRef<'d> {
        self.el
    }

    fn boxed(el: ElementRef<'d>) -> NodeBox<'d> {
        Box::new(Self::new(el))
    }

    fn ancestors_inclusive(&self) -> impl Iterator<Item = ElementRef<'d>> {
        std::iter::successors(Some(self.el), |el| el.parent().and_then(ElementRef::wrap))
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!(selector, error = ?e, "Invalid CSS selector");
            None
        }
    }
}

#[async_trait(?Send)]
impl<'d> DomNode<'d> for StaticNode<'d> {
    fn key(&self) -> NodeKey {
        // Tree nodes never move once parsed, so the address identifies the node
        NodeKey(self.el.value() as *const _ as usize as u64)
    }

    fn clone_node(&self) -> NodeBox<'d> {
        Box::new(*self)
    }

    async fn find_one(&self, selector: &str) -> Option<NodeBox<'d>> {
        let sel = parse_selector(selector)?;
        self.el.select(&sel).next().map(Self::boxed)
    }

    async fn find_many(&self, selector: &str) -> Vec<NodeBox<'d>> {
        let Some(sel) = parse_selector(selector) else {
            return Vec::new();
        };
        self.el.select(&sel).map(Self::boxed).collect()
    }

    async fn children(&self) -> Vec<NodeBox<'d>> {
        self.el
            .children()
            .filter_map(ElementRef::wrap)
            .map(Self::boxed)
            .collect()
    }

    async fn parent(&self) -> Option<NodeBox<'d>> {
        self.el.parent().and_then(ElementRef::wrap).map(Self::boxed)
    }

    async fn closest(&self, selector: &str) -> Option<NodeBox<'d>> {
        let sel = parse_selector(selector)?;
        self.ancestors_inclusive()
            .find(|el| sel.matches(el))
            .map(Self::boxed)
    }

    async fn attr(&self, name: &str) -> Option<String> {
        self.el.value().attr(name).map(str::to_string)
    }

    async fn prop(&self, name: &str) -> Option<Value> {
        match name {
            "textContent" => Some(Value::from(self.el.text().collect::<String>())),
            "innerText" => self.text().await.map(Value::from),
            "innerHTML" => Some(Value::from(self.el.inner_html())),
            "outerHTML" => Some(Value::from(self.el.html())),
            "tagName" => Some(Value::from(self.el.value().name().to_uppercase())),
            "width" | "height" | "naturalWidth" | "naturalHeight" => {
                let attr = match name {
                    "naturalWidth" => "width",
                    "naturalHeight" => "height",
                    other => other,
                };
                self.el
                    .value()
                    .attr(attr)
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Value::from)
            }
            other => self.el.value().attr(other).map(Value::from),
        }
    }

    async fn text(&self) -> Option<String> {
        let raw: String = self.el.text().collect();
        Some(normalize_whitespace(&raw))
    }

    async fn click(&self) -> Result<bool, DomError> {
        Ok(false)
    }
}

/// A page fetched over plain HTTP and parsed once
pub struct StaticPage {
    url: String,
    markup: String,
    html: Html,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, markup: impl Into<String>) -> Self {
        let markup = markup.into();
        let html = Html::parse_document(&markup);
        Self {
            url: url.into(),
            markup,
            html,
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}

#[async_trait(?Send)]
impl PageSession for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_interactive(&self) -> bool {
        false
    }

    async fn markup(&self) -> Result<String, DomError> {
        Ok(self.markup.clone())
    }

    async fn root(&self) -> Option<NodeBox<'_>> {
        Some(Box::new(StaticNode::root(&self.html)))
    }

    async fn scroll(&self) -> Result<(), DomError> {
        Ok(())
    }

    async fn settle(&self, _idle: Duration, _timeout: Duration) {}
}
