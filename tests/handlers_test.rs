//! Handlers over parsed pages

use serde_json::{json, Value};

use fbmedia::config::ScrollConfig;
use fbmedia::crawler::dataset::MemoryDataset;
use fbmedia::crawler::queue::{MemoryQueue, RequestQueue};
use fbmedia::dom::StaticPage;
use fbmedia::error::{Error, PaginationError};
use fbmedia::handlers::{dispatch, Handled, HandlerContext};
use fbmedia::privacy::{PrivacyMask, REDACTED};
use fbmedia::router::match_url;

const PHOTO_URL: &str = "https://www.facebook.com/photo/?fbid=555&set=g.9";
const VIDEO_URL: &str = "https://www.facebook.com/jane.doe/videos/777/";
const ALBUM_URL: &str = "https://www.facebook.com/media/set/?set=oa.4455&type=3";

const PHOTO_PAGE: &str = r#"
<html><head>
<script type="application/json">{"require":[{"__bbox":{"result":{"data":{"currMedia":{
  "__typename":"Photo","id":"555",
  "image":{"uri":"https://scontent.example/p555.jpg","width":960,"height":720},
  "accessibility_caption":"May be an image of a lake",
  "created_time":1372094400,
  "message":{"text":"Sunset at the lake"},
  "owner":{"name":"Jane Doe","url":"https://www.facebook.com/jane.doe",
           "profile_picture":{"uri":"https://scontent.example/jane.jpg"}},
  "feedback":{"reaction_count":{"count":31},"comment_count":{"total_count":4},"share_count":{"count":2}}
}}}}}]}</script>
</head><body><div role="main">
  <img data-visualcompletion="media-vc-image" src="https://scontent.example/dom.jpg" alt="dom alt" width="100" height="80">
  <div class="bar">
    <span aria-label="Like: 2,400 people">2.4K</span>
    <div role="button"><span>6,000 comments</span></div>
    <span>6.9K views</span>
  </div>
</div></body></html>
"#;

const VIDEO_PAGE: &str = r#"
<html><head>
<script>handle({"__bbox":{"video":{
  "__typename":"Video","id":"777",
  "browser_native_sd_url":"https://video.example/sd.mp4",
  "browser_native_hd_url":"blob:https://www.facebook.com/abc",
  "length_in_second":12.5,
  "preferred_thumbnail":{"image":{"uri":"https://scontent.example/thumb.jpg"}},
  "title":{"text":"Lake trip"},
  "publish_time":1372094400,
  "video_view_count":1500,
  "feedback":{"reaction_count":{"count":8},"comment_count":{"total_count":1}}
}}});</script>
</head><body><video src="blob:https://www.facebook.com/abc"></video></body></html>
"#;

const ALBUM_PAGE: &str = r#"
<html><head><meta property="og:title" content="OG title"></head><body><div role="main">
  <h1>Summer 2023</h1>
  <div><span dir="auto">Pictures from the lake</span></div>
  <strong><a href="/user/1234/?__tn__=R">Group Admin</a></strong>
  <div id="grid">
    <a href="/photo/?fbid=1&set=oa.4455">1</a>
    <a href="/photo/?fbid=2&set=oa.4455">2</a>
    <a href="/photo/?fbid=3&set=oa.4455">3</a>
  </div>
</div></body></html>
"#;

struct Harness {
    queue: MemoryQueue,
    dataset: MemoryDataset,
    mask: PrivacyMask,
    scroll: ScrollConfig,
}

impl Harness {
    fn new(mask: PrivacyMask) -> Self {
        Self {
            queue: MemoryQueue::new(),
            dataset: MemoryDataset::new(),
            mask,
            scroll: ScrollConfig {
                settle_idle_ms: 0,
                settle_timeout_ms: 0,
                tick_delay_ms: 0,
                max_idle_ticks: 1,
            },
        }
    }

    async fn visit(&self, url: &str, markup: &str) -> fbmedia::error::Result<Handled> {
        let route = match_url(url).expect("routable url");
        let page = StaticPage::new(url, markup);
        let ctx = HandlerContext {
            page: &page,
            route: &route,
            queue: &self.queue,
            dataset: &self.dataset,
            mask: &self.mask,
            images: None,
            scroll: &self.scroll,
            max_items: None,
        };
        dispatch(&ctx).await
    }

    async fn only_record(&self) -> Value {
        let records = self.dataset.records().await;
        assert_eq!(records.len(), 1);
        records.into_iter().next().unwrap()
    }
}

#[tokio::test]
async fn test_group_redirects_to_media_index() {
    let h = Harness::new(PrivacyMask::default());
    let handled = h
        .visit("https://www.facebook.com/groups/9", "<html><body></body></html>")
        .await
        .unwrap();

    assert_eq!(handled.enqueued, 1);
    assert_eq!(
        h.queue.seen_urls().await,
        vec!["https://www.facebook.com/groups/9/media"]
    );
}

#[tokio::test]
async fn test_media_index_prefers_rendered_tabs() {
    let markup = r#"<html><body>
        <a href="/groups/9/media/photos">Photos</a>
        <a href="/groups/9/media/albums/">Albums</a>
        <a href="/groups/other/media/videos">Elsewhere</a>
    </body></html>"#;
    let h = Harness::new(PrivacyMask::default());
    let handled = h
        .visit("https://www.facebook.com/groups/9/media", markup)
        .await
        .unwrap();

    assert_eq!(handled.enqueued, 2);
    let seen = h.queue.seen_urls().await;
    assert!(seen.contains(&"https://www.facebook.com/groups/9/media/photos".to_string()));
    assert!(seen.contains(&"https://www.facebook.com/groups/9/media/albums/".to_string()));
}

#[tokio::test]
async fn test_media_index_falls_back_to_canonical_tabs() {
    let h = Harness::new(PrivacyMask::default());
    h.visit("https://www.facebook.com/groups/9/media", "<html><body></body></html>")
        .await
        .unwrap();

    assert_eq!(
        h.queue.seen_urls().await,
        vec![
            "https://www.facebook.com/groups/9/media/photos",
            "https://www.facebook.com/groups/9/media/videos",
            "https://www.facebook.com/groups/9/media/albums",
        ]
    );
}

#[tokio::test]
async fn test_media_tab_enqueues_items() {
    let markup = r#"<html><body><div id="grid">
        <a href="/photo/?fbid=1&set=g.9">1</a>
        <a href="/photo/?fbid=2&set=g.9">2</a>
    </div></body></html>"#;
    let h = Harness::new(PrivacyMask::default());
    let handled = h
        .visit("https://www.facebook.com/groups/9/media/photos", markup)
        .await
        .unwrap();

    assert_eq!(handled.enqueued, 2);
    assert_eq!(handled.records, 0);
    assert_eq!(h.queue.pending().await, 2);
    assert!(h.dataset.records().await.is_empty());
}

#[tokio::test]
async fn test_photo_prefers_payload_over_markup() {
    let h = Harness::new(PrivacyMask::default());
    let handled = h.visit(PHOTO_URL, PHOTO_PAGE).await.unwrap();
    assert_eq!(handled.records, 1);

    let record = h.only_record().await;
    assert_eq!(record["type"], json!("photo"));
    assert_eq!(record["fbid"], json!("555"));
    assert_eq!(record["groupId"], json!("9"));
    assert_eq!(record["imagePreview"]["url"], json!("https://scontent.example/p555.jpg"));
    assert_eq!(record["imagePreview"]["width"], json!(960));
    assert_eq!(record["imagePreview"]["alt"], json!("May be an image of a lake"));
    assert_eq!(record["imageFullSize"], json!(null));
    assert_eq!(record["timestamp"], json!("2013-06-24T17:20:00Z"));
    assert_eq!(record["description"], json!("Sunset at the lake"));
    // Payload counts win; markup only fills what the payload lacks
    assert_eq!(record["likesCount"], json!(31));
    assert_eq!(record["commentsCount"], json!(4));
    assert_eq!(record["sharesCount"], json!(2));
    assert_eq!(record["viewsCount"], json!(6900));
    assert_eq!(record["authorName"], json!(REDACTED));
    assert_eq!(record["authorProfileUrl"], json!(REDACTED));
    assert_eq!(record["authorProfileImageThumb"]["url"], json!(REDACTED));
    assert_eq!(record["authorProfileImageThumb"]["alt"], json!(null));
    assert!(!record.to_string().contains("Jane Doe"));
}

const PHOTO_WITHOUT_FEEDBACK: &str = r#"
<html><head>
<script type="application/json">{"require":[{"__bbox":{"result":{"data":{
  "currMedia":{"__typename":"Photo","id":"555",
    "image":{"uri":"https://scontent.example/p555.jpg"}},
  "comments":[{"id":"c1","feedback":{"reaction_count":{"count":999},"comment_count":{"total_count":12}}}],
  "neighbour":{"__typename":"Story","feedback":{"reaction_count":{"count":77}}}
}}}}]}</script>
</head><body><div role="main">
  <div class="bar">
    <span aria-label="Like: 2,400 people">2.4K</span>
    <div role="button"><span>6,000 comments</span></div>
  </div>
</div></body></html>
"#;

#[tokio::test]
async fn test_photo_stats_ignore_unrelated_feedback() {
    let h = Harness::new(PrivacyMask::default());
    h.visit(PHOTO_URL, PHOTO_WITHOUT_FEEDBACK).await.unwrap();

    let record = h.only_record().await;
    assert_eq!(record["likesCount"], json!(2400));
    assert_eq!(record["commentsCount"], json!(6000));
    assert_eq!(record["sharesCount"], json!(null));
}

#[tokio::test]
async fn test_photo_from_markup_only() {
    let markup = r#"<html><body><div role="main">
        <h2><a href="/groups/9/user/42/?__cft__=x">Sam Poster</a></h2>
        <img data-visualcompletion="media-vc-image" src="https://scontent.example/dom.jpg" alt="dom alt" width="100" height="80">
        <div data-ad-preview="message">  Hello&#8203; lake  </div>
    </div></body></html>"#;
    let h = Harness::new(PrivacyMask::new(fbmedia::config::PrivacyConfig::all(false)));
    h.visit(PHOTO_URL, markup).await.unwrap();

    let record = h.only_record().await;
    assert_eq!(record["imagePreview"]["url"], json!("https://scontent.example/dom.jpg"));
    assert_eq!(record["imagePreview"]["height"], json!(80));
    assert_eq!(record["authorName"], json!("Sam Poster"));
    assert_eq!(
        record["authorProfileUrl"],
        json!("https://www.facebook.com/groups/9/user/42/")
    );
    assert_eq!(record["description"], json!("Hello lake"));
    assert_eq!(record["likesCount"], json!(0));
    assert_eq!(record["commentsCount"], json!(0));
    assert_eq!(record["sharesCount"], json!(null));
}

#[tokio::test]
async fn test_video_record() {
    let h = Harness::new(PrivacyMask::default());
    h.visit(VIDEO_URL, VIDEO_PAGE).await.unwrap();

    let record = h.only_record().await;
    assert_eq!(record["type"], json!("video"));
    assert_eq!(record["videoId"], json!("777"));
    assert_eq!(record["userId"], json!("jane.doe"));
    assert_eq!(record["videoSdUrl"], json!("https://video.example/sd.mp4"));
    assert_eq!(record["videoHdUrl"], json!(null));
    assert_eq!(record["durationSec"], json!(12.5));
    assert_eq!(record["title"], json!("Lake trip"));
    assert_eq!(record["imagePreview"]["url"], json!("https://scontent.example/thumb.jpg"));
    assert_eq!(record["viewsCount"], json!(1500));
    assert_eq!(record["likesCount"], json!(8));
    assert_eq!(record["timestamp"], json!("2013-06-24T17:20:00Z"));
}

#[tokio::test]
async fn test_album_counts_items() {
    let h = Harness::new(PrivacyMask::default());
    let handled = h.visit(ALBUM_URL, ALBUM_PAGE).await.unwrap();
    assert_eq!(handled, Handled { records: 1, enqueued: 3 });

    let record = h.only_record().await;
    assert_eq!(record["type"], json!("album"));
    assert_eq!(record["albumId"], json!("4455"));
    assert_eq!(record["title"], json!("Summer 2023"));
    assert_eq!(record["description"], json!("Pictures from the lake"));
    assert_eq!(record["ownerName"], json!(REDACTED));
    assert_eq!(record["ownerProfileUrl"], json!(REDACTED));
    assert_eq!(record["ownerFbid"], json!("1234"));
    assert_eq!(record["itemsCount"], json!(3));
    assert_eq!(h.queue.pending().await, 3);
}

#[tokio::test]
async fn test_album_counts_tiles_not_anchors() {
    let markup = r#"<html><body><div role="main">
        <h1>Tiles</h1>
        <div id="grid">
          <div><a href="/photo/?fbid=1&set=oa.4455"><img src="1.jpg"></a><a href="/photo/?fbid=1&set=oa.4455">caption</a></div>
          <div><a href="/photo/?fbid=2&set=oa.4455"><img src="2.jpg"></a><a href="/photo/?fbid=2&set=oa.4455">caption</a></div>
          <div><a href="/photo/?fbid=3&set=oa.4455"><img src="3.jpg"></a><a href="/photo/?fbid=3&set=oa.4455">caption</a></div>
        </div>
    </div></body></html>"#;
    let h = Harness::new(PrivacyMask::default());
    let handled = h.visit(ALBUM_URL, markup).await.unwrap();

    assert_eq!(handled, Handled { records: 1, enqueued: 3 });
    assert_eq!(h.only_record().await["itemsCount"], json!(3));
    assert_eq!(h.queue.pending().await, 3);
}

#[tokio::test]
async fn test_album_without_items_fails_without_record() {
    let markup = r#"<html><body><div role="main"><h1>Empty</h1></div></body></html>"#;
    let h = Harness::new(PrivacyMask::default());
    let err = h.visit(ALBUM_URL, markup).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Pagination(PaginationError::ContainerNotFound { .. })
    ));
    assert!(h.dataset.records().await.is_empty());
}
