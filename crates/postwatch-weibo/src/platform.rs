//! Platform capability set used by the change detector.
//!
//! The detector never looks inside a [`RawItem`] itself; everything it needs
//! to know about a card goes through [`Platform`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// One card exactly as returned by the platform's timeline endpoint.
pub type RawItem = Value;

/// A publication date that is missing or not in the platform's format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timestamp {value:?}: {reason}")]
pub struct TimestampError {
    /// The raw date string, empty when the field was absent.
    pub value: String,
    pub reason: String,
}

/// Identity of a content item, unique within one account's stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds an id from a JSON string or integer. Other shapes have no identity.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content category, derived from an item on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Repost,
    Video,
    TextAndImage,
    UnpinEvent,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Repost,
        Category::Video,
        Category::TextAndImage,
        Category::UnpinEvent,
    ];

    /// Numeric code used by subscription settings.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Category::Repost => 1,
            Category::Video => 2,
            Category::TextAndImage => 3,
            Category::UnpinEvent => 50,
        }
    }

    /// Label shown to subscribers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Repost => "转发",
            Category::Video => "视频",
            Category::TextAndImage => "图文",
            Category::UnpinEvent => "撤置顶",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "repost" | "1" => Ok(Category::Repost),
            "video" | "2" => Ok(Category::Video),
            "text" | "text-and-image" | "3" => Ok(Category::TextAndImage),
            "unpin" | "50" => Ok(Category::UnpinEvent),
            other => Category::ALL
                .into_iter()
                .find(|c| c.label() == other)
                .ok_or_else(|| format!("unknown category '{s}'")),
        }
    }
}

/// An item emitted by the change detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectedItem {
    /// A genuine card from the timeline.
    Ordinary(RawItem),
    /// The previously pinned card is no longer pinned.
    Unpinned { account_name: String },
}

impl DetectedItem {
    #[must_use]
    pub fn category<P: Platform + ?Sized>(&self, platform: &P) -> Category {
        match self {
            DetectedItem::Ordinary(item) => platform.category(item),
            DetectedItem::Unpinned { .. } => Category::UnpinEvent,
        }
    }
}

/// Per-platform view of raw items.
///
/// All methods are pure.
pub trait Platform: Send + Sync {
    /// Platform tag carried by every canonical post.
    fn name(&self) -> &'static str;

    /// Stable identity, or `None` for cards that are not genuine content.
    fn identity(&self, item: &RawItem) -> Option<ItemId>;

    /// `false` for advertisement or injected cards.
    fn is_relevant(&self, item: &RawItem) -> bool;

    /// Publication time in Unix epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the date is missing or does not match
    /// the platform's format.
    fn timestamp(&self, item: &RawItem) -> Result<f64, TimestampError>;

    fn category(&self, item: &RawItem) -> Category;

    /// `true` only for relevant items carrying the pinned marker.
    fn is_pinned(&self, item: &RawItem) -> bool;

    /// Display name of the account that authored the item.
    fn account_name(&self, item: &RawItem) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn item_id_accepts_strings_and_numbers() {
        assert_eq!(
            ItemId::from_json(&json!("4987654321")),
            Some(ItemId::new("4987654321"))
        );
        assert_eq!(
            ItemId::from_json(&json!(4_987_654_321_u64)),
            Some(ItemId::new("4987654321"))
        );
        assert_eq!(ItemId::from_json(&json!("")), None);
        assert_eq!(ItemId::from_json(&json!(null)), None);
        assert_eq!(ItemId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn category_parses_names_codes_and_labels() {
        assert_eq!("repost".parse::<Category>().unwrap(), Category::Repost);
        assert_eq!("2".parse::<Category>().unwrap(), Category::Video);
        assert_eq!("Text".parse::<Category>().unwrap(), Category::TextAndImage);
        assert_eq!("撤置顶".parse::<Category>().unwrap(), Category::UnpinEvent);
        assert!("podcast".parse::<Category>().is_err());
    }

    #[test]
    fn category_codes_are_distinct() {
        let mut codes: Vec<u8> = Category::ALL.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Category::ALL.len());
    }
}
