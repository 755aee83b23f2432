//! URL classification
//!
//! Every URL the crawler sees is matched against an ordered table of path
//! patterns. The first pattern that matches decides the route, so the more
//! specific shapes come first: a media tab URL also looks like a group media
//! URL and must never be treated as one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::utils::FACEBOOK_ORIGIN;

/// Page kinds the crawler knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Route {
    #[serde(rename = "FB_GROUP")]
    FbGroup,
    #[serde(rename = "FB_GROUP_MEDIA")]
    FbGroupMedia,
    #[serde(rename = "FB_GROUP_MEDIA_TAB")]
    FbGroupMediaTab,
    #[serde(rename = "FB_MEDIA_ALBUM")]
    FbMediaAlbum,
    #[serde(rename = "FB_MEDIA_PHOTO")]
    FbMediaPhoto,
    #[serde(rename = "FB_MEDIA_VIDEO")]
    FbMediaVideo,
}

impl Route {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FbGroup => "FB_GROUP",
            Self::FbGroupMedia => "FB_GROUP_MEDIA",
            Self::FbGroupMediaTab => "FB_GROUP_MEDIA_TAB",
            Self::FbMediaAlbum => "FB_MEDIA_ALBUM",
            Self::FbMediaPhoto => "FB_MEDIA_PHOTO",
            Self::FbMediaVideo => "FB_MEDIA_VIDEO",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of routing one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub route: Route,
    /// Absolute URL that was matched
    pub url: String,
    /// Named path captures plus the query parameters
    pub params: BTreeMap<String, String>,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

struct Matcher {
    route: Route,
    path: Regex,
    /// Query parameter that must be present
    requires: Option<&'static str>,
}

fn matcher(route: Route, pattern: &str, requires: Option<&'static str>) -> Matcher {
    Matcher {
        route,
        path: Regex::new(pattern).expect("Invalid route pattern"),
        requires,
    }
}

/// Route table in priority order
static ROUTES: LazyLock<Vec<Matcher>> = LazyLock::new(|| {
    vec![
        matcher(
            Route::FbGroupMediaTab,
            r"^/groups/(?P<groupId>[^/]+)/media/(?P<tab>photos|videos|albums)/?$",
            None,
        ),
        matcher(
            Route::FbGroupMedia,
            r"^/groups/(?P<groupId>[^/]+)/media(?:/.*)?$",
            None,
        ),
        matcher(Route::FbGroup, r"^/groups/(?P<groupId>[^/]+)/?$", None),
        matcher(Route::FbMediaAlbum, r"^/media/set/?$", Some("set")),
        matcher(Route::FbMediaPhoto, r"^/photo(?:\.php)?/?$", Some("fbid")),
        matcher(
            Route::FbMediaVideo,
            r"^/(?P<userId>[^/]+)/videos/(?:[^/]+/)?(?P<videoId>\d+)/?$",
            None,
        ),
    ]
});

/// Album id inside a `set` parameter (`oa.123`, `a.123`)
static ALBUM_SET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^o?a\.(\d+)").unwrap());

/// Group id inside a `set` parameter (`g.123`)
static GROUP_SET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^g\.(\d+)").unwrap());

/// Fill ids implied by the `set` parameter of album and photo URLs
fn expand_set_param(params: &mut BTreeMap<String, String>) {
    let Some(set) = params.get("set").cloned() else {
        return;
    };
    if let Some(caps) = ALBUM_SET.captures(&set) {
        params.entry("albumId".into()).or_insert_with(|| caps[1].to_string());
    }
    if let Some(caps) = GROUP_SET.captures(&set) {
        params.entry("groupId".into()).or_insert_with(|| caps[1].to_string());
    }
}

/// Classify `url`, resolving relative URLs against facebook.com
///
/// Returns `None` for URLs no handler covers.
pub fn match_url(url: &str) -> Option<RouteMatch> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(FACEBOOK_ORIGIN).and_then(|base| base.join(url)))
        .ok()?;
    let path = parsed.path();

    for m in ROUTES.iter() {
        let Some(caps) = m.path.captures(path) else {
            continue;
        };

        let mut params: BTreeMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if let Some(required) = m.requires {
            if params.get(required).map_or(true, |v| v.is_empty()) {
                continue;
            }
        }
        for name in m.path.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                params.insert(name.to_string(), value.as_str().to_string());
            }
        }
        if matches!(m.route, Route::FbMediaAlbum | Route::FbMediaPhoto) {
            expand_set_param(&mut params);
        }

        return Some(RouteMatch {
            route: m.route,
            url: parsed.to_string(),
            params,
        });
    }

    debug!(url, "No route matches");
    None
}
