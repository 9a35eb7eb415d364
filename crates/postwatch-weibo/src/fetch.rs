use async_trait::async_trait;
use postwatch_core::Target;

use crate::error::WeiboError;
use crate::platform::RawItem;

/// Source of raw timeline data.
///
/// Any `Err` from [`Fetcher::fetch_list`] means the fetch did not happen. It
/// must never be read as "the account has no content".
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the account's current timeline cards in display order.
    async fn fetch_list(&self, target: &Target) -> Result<Vec<RawItem>, WeiboError>;

    /// Returns the raw body of the detail page for one message.
    async fn fetch_expansion(&self, message_id: &str) -> Result<String, WeiboError>;
}
