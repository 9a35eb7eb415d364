//! One poll cycle for one target: fetch, detect, filter, normalize.

use std::sync::Arc;

use postwatch_core::{AppConfig, CanonicalPost, Target};

use crate::classify::Weibo;
use crate::client::WeiboClient;
use crate::detect::{ChangeDetector, DetectorSettings};
use crate::error::WeiboError;
use crate::fetch::Fetcher;
use crate::normalize::normalize_item;
use crate::platform::{Category, DetectedItem, Platform};
use crate::sanitize::{MarkupSanitizer, TagStripper};

/// Weibo adapter wired end to end.
///
/// Safe to share across tasks; polls for different targets run concurrently,
/// polls for the same target queue behind each other.
pub struct WeiboPipeline {
    fetcher: Arc<dyn Fetcher>,
    sanitizer: Arc<dyn MarkupSanitizer>,
    detector: ChangeDetector<Weibo>,
}

impl WeiboPipeline {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sanitizer: Arc<dyn MarkupSanitizer>,
        settings: DetectorSettings,
    ) -> Self {
        Self {
            fetcher,
            sanitizer,
            detector: ChangeDetector::new(Weibo, settings),
        }
    }

    /// Builds the production pipeline: HTTP client, tag-stripping sanitizer.
    ///
    /// # Errors
    ///
    /// Returns [`WeiboError`] if the HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, WeiboError> {
        let client = WeiboClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(client),
            Arc::new(TagStripper),
            DetectorSettings::from_config(config),
        ))
    }

    pub fn detector(&self) -> &ChangeDetector<Weibo> {
        &self.detector
    }

    /// Runs one poll cycle and returns the new posts in detection order.
    ///
    /// `categories` restricts which kinds of item are delivered; an empty
    /// slice delivers everything. Items that fail to normalize are logged and
    /// skipped without affecting the rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the timeline could not be retrieved. The
    /// detector's memory for `target` is unchanged in that case.
    pub async fn run_cycle(
        &self,
        target: &Target,
        categories: &[Category],
    ) -> Result<Vec<CanonicalPost>, WeiboError> {
        let detected = self.detector.poll(self.fetcher.as_ref(), target).await?;
        let platform = self.detector.platform();

        let mut posts = Vec::with_capacity(detected.len());
        for item in &detected {
            let category = item.category(platform);
            if !categories.is_empty() && !categories.contains(&category) {
                tracing::debug!(
                    uid = %target,
                    item_id = ?item_id(platform, item),
                    category = %category,
                    "category not subscribed, skipping"
                );
                continue;
            }

            match normalize_item(self.fetcher.as_ref(), self.sanitizer.as_ref(), item).await {
                Ok(post) => posts.push(post),
                Err(e) => {
                    tracing::warn!(
                        uid = %target,
                        item_id = ?item_id(platform, item),
                        error = %e,
                        "failed to normalize item"
                    );
                }
            }
        }

        tracing::info!(
            uid = %target,
            detected = detected.len(),
            delivered = posts.len(),
            "poll cycle complete"
        );
        Ok(posts)
    }
}

fn item_id<P: Platform>(platform: &P, item: &DetectedItem) -> Option<String> {
    match item {
        DetectedItem::Ordinary(raw) => platform.identity(raw).map(|id| id.to_string()),
        DetectedItem::Unpinned { .. } => None,
    }
}
