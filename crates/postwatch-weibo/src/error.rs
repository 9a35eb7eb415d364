use thiserror::Error;

use crate::platform::TimestampError;

/// Errors produced while fetching, classifying, or normalizing Weibo content.
#[derive(Debug, Error)]
pub enum WeiboError {
    /// Network, TLS, or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited by weibo (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// The API envelope reported `ok != 1`.
    #[error("weibo API error: {0}")]
    Api(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    MalformedTimestamp(#[from] TimestampError),

    /// The expanded status could not be located in the detail page body.
    #[error("could not locate expanded status in detail page for message {message_id}")]
    ExpansionParse { message_id: String },

    #[error("relevant {platform} item has no derivable id")]
    IdentityMissing { platform: &'static str },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl WeiboError {
    /// Returns `true` for errors that mean "the fetch did not happen".
    ///
    /// Callers must treat these as "skip this cycle", never as "the account
    /// has no content".
    #[must_use]
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            WeiboError::Http(_)
                | WeiboError::UnexpectedStatus { .. }
                | WeiboError::RateLimited { .. }
                | WeiboError::Api(_)
        )
    }
}
