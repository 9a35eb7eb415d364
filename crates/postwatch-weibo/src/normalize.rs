//! Conversion of detected items into [`CanonicalPost`]s.

use std::sync::OnceLock;

use postwatch_core::CanonicalPost;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::WeiboError;
use crate::fetch::Fetcher;
use crate::platform::DetectedItem;
use crate::sanitize::{line_breaks_to_newlines, MarkupSanitizer};
use crate::types::Status;

const PLATFORM: &str = "weibo";

/// Text of the placeholder post emitted when a pin is removed.
pub const UNPIN_TEXT: &str = "撤置顶";

/// Cards show at most this many pictures; anything above needs the detail page.
const MAX_INLINE_PICTURES: u32 = 9;

/// Builds the canonical post for one detected item.
///
/// Long statuses and large galleries are truncated in the timeline, so for
/// those the detail page is fetched and the full status is read from it.
///
/// # Errors
///
/// - [`WeiboError::Deserialize`] if the card's `mblog` (or the expanded
///   status) does not have the expected shape.
/// - [`WeiboError::ExpansionParse`] if the detail page has no embedded status.
/// - Any fetch error from the detail page request.
pub async fn normalize_item<F, S>(
    fetcher: &F,
    sanitizer: &S,
    item: &DetectedItem,
) -> Result<CanonicalPost, WeiboError>
where
    F: Fetcher + ?Sized,
    S: MarkupSanitizer + ?Sized,
{
    let raw = match item {
        DetectedItem::Unpinned { account_name } => return Ok(unpin_post(account_name)),
        DetectedItem::Ordinary(raw) => raw,
    };

    let mut status = parse_status(raw.get("mblog").unwrap_or(&Value::Null), "card mblog")?;

    if needs_expansion(&status) {
        let message_id = status.mid.to_string();
        tracing::debug!(
            message_id = %message_id,
            long_text = status.is_long_text,
            pic_num = status.pic_num,
            "fetching expanded status"
        );
        let body = fetcher.fetch_expansion(&message_id).await?;
        status = extract_expanded_status(&body, &message_id)?;
    }

    Ok(to_post(&status, sanitizer))
}

fn unpin_post(account_name: &str) -> CanonicalPost {
    CanonicalPost {
        platform: PLATFORM.to_owned(),
        text: UNPIN_TEXT.to_owned(),
        url: None,
        pics: Vec::new(),
        target_name: account_name.to_owned(),
        suppress_images: true,
    }
}

fn needs_expansion(status: &Status) -> bool {
    status.is_long_text || status.pic_num > MAX_INLINE_PICTURES
}

fn parse_status(value: &Value, context: &str) -> Result<Status, WeiboError> {
    Status::deserialize(value).map_err(|e| WeiboError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

/// Pulls the full status out of a `m.weibo.cn/detail/{mid}` page.
///
/// The page embeds its render data as a script literal; the status object
/// sits between `"status": ` and the following `"hotScheme"` key.
///
/// # Errors
///
/// Returns [`WeiboError::ExpansionParse`] if that region is absent, and
/// [`WeiboError::Deserialize`] if it is not a valid status object.
pub fn extract_expanded_status(body: &str, message_id: &str) -> Result<Status, WeiboError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?s)"status": (.+),\s+"hotScheme""#).expect("valid status regex")
    });

    let fragment = re
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| WeiboError::ExpansionParse {
            message_id: message_id.to_owned(),
        })?;

    let value: Value = serde_json::from_str(fragment).map_err(|e| WeiboError::Deserialize {
        context: format!("expanded status {message_id}"),
        source: e,
    })?;
    parse_status(&value, &format!("expanded status {message_id}"))
}

fn to_post<S: MarkupSanitizer + ?Sized>(status: &Status, sanitizer: &S) -> CanonicalPost {
    let text = sanitizer.strip_markup(&line_breaks_to_newlines(&status.text));
    let pics = status
        .pics
        .iter()
        .filter_map(|p| p.large.as_ref().map(|l| l.url.clone()))
        .collect();

    CanonicalPost {
        platform: PLATFORM.to_owned(),
        text,
        url: Some(format!(
            "https://weibo.com/{}/{}",
            status.user.id, status.bid
        )),
        pics,
        target_name: status.user.screen_name.clone(),
        suppress_images: false,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
