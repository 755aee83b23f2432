//! CSS selectors for Facebook media pages
//!
//! Facebook ships obfuscated, frequently changing class names, so selectors
//! lean on ARIA attributes, roles and link shapes. Where the markup has moved
//! around between releases, a field has several selectors tried in order.

/// Embedded data blocks
pub const SCRIPT: &str = "script";

/// Engagement bar
pub mod stats {
    pub const LIKES: &str = r#"[aria-label*="Like:"]"#;
    pub const COUNT_CANDIDATES: &str = r#"[role="button"]"#;
}

/// Author header of a photo or video post
pub mod author {
    pub const LINKS: &[&str] = &[
        r#"h2 a[href*="/user/"]"#,
        r#"h2 a[role="link"]"#,
        r#"strong a[href]"#,
        r#"a[aria-label][href*="/user/"]"#,
    ];
    pub const AVATAR: &[&str] = &[
        r#"a[href*="/user/"] svg image"#,
        r#"a[href*="/user/"] img"#,
        r#"[role="img"] image"#,
    ];
}

/// Tooltip-bearing time link next to the author name
pub const TIMESTAMP: &[&str] = &[
    r#"a[href*="/photo"] span[id] span"#,
    r#"abbr[data-utime]"#,
    r#"a[aria-label*=" at "]"#,
    r#"span[aria-label*=" at "]"#,
];

/// Post caption
pub const DESCRIPTION: &[&str] = &[
    r#"[data-ad-preview="message"]"#,
    r#"[data-ad-comet-preview="message"]"#,
    r#"div[dir="auto"][style*="text-align"]"#,
];

/// Photo viewer
pub mod photo {
    pub const IMAGE: &[&str] = &[
        r#"img[data-visualcompletion="media-vc-image"]"#,
        r#"[data-pagelet="MediaViewerPhoto"] img"#,
        r#"div[role="main"] img[src*="scontent"]"#,
    ];
    pub const OPTIONS_MENU: &str = r#"[aria-label="Actions for this post"], [aria-haspopup="menu"][role="button"]"#;
    pub const DOWNLOAD_LINK: &str = r#"a[download], a[href*="dl=1"]"#;
}

/// Video player
pub mod video {
    pub const ELEMENT: &str = "video";
    pub const POSTER: &[&str] = &[r#"video[poster]"#, r#"img[data-visualcompletion="media-vc-image"]"#];
    pub const TITLE: &[&str] = &[r#"h2 span[dir="auto"]"#, "h1", r#"meta[property="og:title"]"#];
}

/// Album page
pub mod album {
    pub const TITLE: &[&str] = &[
        r#"div[role="main"] h1"#,
        r#"div[role="main"] h2 span[dir="auto"]"#,
        r#"meta[property="og:title"]"#,
    ];
    pub const DESCRIPTION: &[&str] = &[
        r#"div[role="main"] h1 ~ div span[dir="auto"]"#,
        r#"meta[property="og:description"]"#,
    ];
    pub const OWNER: &[&str] = &[r#"div[role="main"] a[href*="/user/"]"#, r#"div[role="main"] strong a[href]"#];
    pub const CONTRIBUTORS: &str = r#"[aria-label*="ontributor"] a[href], [data-testid="album_contributors"] a[href]"#;
    pub const ITEM_LINKS: &str = r#"a[href*="/photo/"], a[href*="/photo.php"], a[href*="/videos/"]"#;
}

/// Group media index and tabs
pub mod group {
    pub const TAB_LINKS: &str = r#"a[href*="/media/photos"], a[href*="/media/videos"], a[href*="/media/albums"]"#;
    pub const PHOTO_ITEMS: &str = r#"a[href*="/photo/"], a[href*="/photo.php"]"#;
    pub const VIDEO_ITEMS: &str = r#"a[href*="/videos/"]"#;
    pub const ALBUM_ITEMS: &str = r#"a[href*="/media/set/"]"#;
}
