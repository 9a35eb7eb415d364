use std::fmt;

use serde::{Deserialize, Serialize};

/// A monitored account on the external platform.
///
/// Opaque to everything except the platform adapter that builds request URLs
/// from it. Stable for the lifetime of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A normalized post ready for downstream delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPost {
    /// Platform tag, e.g. `weibo`.
    pub platform: String,
    /// Plain display text.
    pub text: String,
    /// Canonical link to the post. `None` for synthetic events.
    pub url: Option<String>,
    /// Image URLs in display order.
    pub pics: Vec<String>,
    /// Display name of the account the post is attributed to.
    pub target_name: String,
    /// When `true`, renderers must not attach images.
    pub suppress_images: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_serializes_as_bare_string() {
        let target = Target::new("1195230310");
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"1195230310\"");
        assert_eq!(target.to_string(), "1195230310");
    }

    #[test]
    fn canonical_post_json_shape() {
        let post = CanonicalPost {
            platform: "weibo".to_string(),
            text: "hello".to_string(),
            url: None,
            pics: vec![],
            target_name: "someone".to_string(),
            suppress_images: true,
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["url"], serde_json::Value::Null);
        assert_eq!(value["suppress_images"], true);
        assert_eq!(value["target_name"], "someone");
    }
}
