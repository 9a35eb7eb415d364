use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use postwatch_core::Target;
use serde_json::json;

use super::*;
use crate::platform::RawItem;
use crate::sanitize::TagStripper;

/// Serves a canned detail page and counts how often it is asked for one.
struct DetailFetcher {
    body: String,
    expansions: AtomicU32,
}

impl DetailFetcher {
    fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            expansions: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.expansions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for DetailFetcher {
    async fn fetch_list(&self, _target: &Target) -> Result<Vec<RawItem>, WeiboError> {
        Ok(Vec::new())
    }

    async fn fetch_expansion(&self, message_id: &str) -> Result<String, WeiboError> {
        assert_eq!(message_id, "4999000111");
        self.expansions.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }
}

fn status_json(text: &str, long_text: bool, pic_num: u32) -> Value {
    let pics: Vec<Value> = (0..pic_num.min(9))
        .map(|i| {
            json!({
                "pid": format!("p{i}"),
                "url": format!("https://wx1.sinaimg.cn/orj360/p{i}.jpg"),
                "large": { "url": format!("https://wx1.sinaimg.cn/large/p{i}.jpg") }
            })
        })
        .collect();
    json!({
        "id": "4999000111",
        "mid": "4999000111",
        "bid": "N1aBcD",
        "created_at": "Tue Mar 05 12:30:00 +0800 2024",
        "text": text,
        "isLongText": long_text,
        "pic_num": pic_num,
        "pics": pics,
        "user": { "id": 6_279_793_937_u64, "screen_name": "明日方舟Arknights" }
    })
}

fn ordinary(mblog: Value) -> DetectedItem {
    DetectedItem::Ordinary(json!({ "card_type": 9, "mblog": mblog }))
}

fn detail_page(status: &Value) -> String {
    format!(
        "<script>\nvar $render_data = [{{\n    \"status\": {},\n    \"hotScheme\": \"sinaweibo://detail?mblogid=4999000111\",\n    \"appScheme\": \"\"\n}}][0] || {{}};\n</script>",
        serde_json::to_string_pretty(status).unwrap()
    )
}

#[tokio::test]
async fn unpin_event_suppresses_images() {
    let fetcher = DetailFetcher::new("");
    let item = DetectedItem::Unpinned {
        account_name: "明日方舟Arknights".to_owned(),
    };

    let post = normalize_item(&fetcher, &TagStripper, &item).await.unwrap();

    assert_eq!(post.text, UNPIN_TEXT);
    assert_eq!(post.url, None);
    assert!(post.pics.is_empty());
    assert!(post.suppress_images);
    assert_eq!(post.target_name, "明日方舟Arknights");
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn short_status_is_normalized_without_expansion() {
    let fetcher = DetailFetcher::new("");
    let item = ordinary(status_json(
        "新活动<br />开始了<a href=\"/status/1\">全文</a>",
        false,
        2,
    ));

    let post = normalize_item(&fetcher, &TagStripper, &item).await.unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(post.platform, "weibo");
    assert_eq!(post.text, "新活动\n开始了全文");
    assert_eq!(post.url.as_deref(), Some("https://weibo.com/6279793937/N1aBcD"));
    assert_eq!(
        post.pics,
        vec![
            "https://wx1.sinaimg.cn/large/p0.jpg",
            "https://wx1.sinaimg.cn/large/p1.jpg"
        ]
    );
    assert!(!post.suppress_images);
}

#[tokio::test]
async fn nine_pictures_do_not_trigger_expansion() {
    let fetcher = DetailFetcher::new("");
    let item = ordinary(status_json("gallery", false, 9));

    let post = normalize_item(&fetcher, &TagStripper, &item).await.unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(post.pics.len(), 9);
}

#[tokio::test]
async fn long_text_is_expanded_from_detail_page() {
    let full = status_json("完整的<br />长文本", true, 0);
    let fetcher = DetailFetcher::new(detail_page(&full));
    let item = ordinary(status_json("截断的...", true, 0));

    let post = normalize_item(&fetcher, &TagStripper, &item).await.unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(post.text, "完整的\n长文本");
}

#[tokio::test]
async fn large_gallery_is_expanded_from_detail_page() {
    let mut full = status_json("gallery", false, 12);
    let pics: Vec<Value> = (0..12)
        .map(|i| json!({ "large": { "url": format!("https://wx1.sinaimg.cn/large/g{i}.jpg") } }))
        .collect();
    full["pics"] = json!(pics);
    let fetcher = DetailFetcher::new(detail_page(&full));

    let post = normalize_item(&fetcher, &TagStripper, &ordinary(status_json("gallery", false, 12)))
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(post.pics.len(), 12);
    assert_eq!(post.pics[11], "https://wx1.sinaimg.cn/large/g11.jpg");
}

#[tokio::test]
async fn missing_status_region_is_an_expansion_error() {
    let fetcher = DetailFetcher::new("<html><body>请先登录</body></html>");
    let item = ordinary(status_json("截断的...", true, 0));

    let err = normalize_item(&fetcher, &TagStripper, &item)
        .await
        .unwrap_err();

    assert!(
        matches!(err, WeiboError::ExpansionParse { ref message_id } if message_id == "4999000111"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn card_without_user_is_a_deserialize_error() {
    let fetcher = DetailFetcher::new("");
    let mut mblog = status_json("text", false, 0);
    mblog.as_object_mut().unwrap().remove("user");

    let err = normalize_item(&fetcher, &TagStripper, &ordinary(mblog))
        .await
        .unwrap_err();

    assert!(matches!(err, WeiboError::Deserialize { .. }));
}

#[test]
fn extract_expanded_status_rejects_broken_json() {
    let body = "\"status\": {\"id\": ,\n    \"hotScheme\": \"x\"";
    let err = extract_expanded_status(body, "1").unwrap_err();
    assert!(matches!(err, WeiboError::Deserialize { .. }));
}

#[test]
fn pictures_without_large_variant_are_skipped() {
    let mut mblog = status_json("text", false, 1);
    mblog["pics"] = json!([{ "url": "https://wx1.sinaimg.cn/orj360/x.jpg" }]);
    let status = parse_status(&mblog, "test").unwrap();
    let post = to_post(&status, &TagStripper);
    assert!(post.pics.is_empty());
}
