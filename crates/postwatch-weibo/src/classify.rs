//! Weibo card classification.

use chrono::DateTime;
use serde_json::Value;

use crate::platform::{Category, ItemId, Platform, RawItem, TimestampError};

/// Card type of an ordinary status card. Everything else (ads, recommended
/// users, topic banners) is injected by the timeline.
const STATUS_CARD_TYPE: i64 = 9;

/// Format of `mblog.created_at`, e.g. `Tue Mar 05 12:30:00 +0800 2024`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Classifier for cards returned by the `m.weibo.cn` timeline container.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weibo;

fn mblog(item: &RawItem) -> Option<&Value> {
    item.get("mblog").filter(|m| m.is_object())
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

impl Platform for Weibo {
    fn name(&self) -> &'static str {
        "weibo"
    }

    fn identity(&self, item: &RawItem) -> Option<ItemId> {
        mblog(item)
            .and_then(|m| m.get("id"))
            .and_then(ItemId::from_json)
    }

    fn is_relevant(&self, item: &RawItem) -> bool {
        item.get("card_type").and_then(Value::as_i64) == Some(STATUS_CARD_TYPE)
    }

    fn timestamp(&self, item: &RawItem) -> Result<f64, TimestampError> {
        let raw = mblog(item)
            .and_then(|m| m.get("created_at"))
            .and_then(Value::as_str)
            .ok_or_else(|| TimestampError {
                value: String::new(),
                reason: "missing mblog.created_at".to_owned(),
            })?;

        let parsed = DateTime::parse_from_str(raw, CREATED_AT_FORMAT).map_err(|e| {
            TimestampError {
                value: raw.to_owned(),
                reason: e.to_string(),
            }
        })?;

        #[allow(clippy::cast_precision_loss)]
        let secs = parsed.timestamp() as f64 + f64::from(parsed.timestamp_subsec_millis()) / 1000.0;
        Ok(secs)
    }

    fn category(&self, item: &RawItem) -> Category {
        let Some(m) = mblog(item) else {
            return Category::TextAndImage;
        };

        // A repost of a video is still a repost.
        if m.get("retweeted_status").is_some_and(|r| !r.is_null()) {
            return Category::Repost;
        }

        let is_video = m
            .get("page_info")
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            == Some("video");
        if is_video {
            Category::Video
        } else {
            Category::TextAndImage
        }
    }

    fn is_pinned(&self, item: &RawItem) -> bool {
        self.is_relevant(item) && truthy(mblog(item).and_then(|m| m.get("isTop")))
    }

    fn account_name(&self, item: &RawItem) -> Option<String> {
        mblog(item)
            .and_then(|m| m.get("user"))
            .and_then(|u| u.get("screen_name"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}
