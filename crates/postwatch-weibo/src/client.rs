//! HTTP client for the `m.weibo.cn` mobile API.
//!
//! Every request carries a bounded timeout; transient failures are retried a
//! bounded number of times and then surfaced as [`WeiboError`] so the caller
//! can skip the cycle.

use std::time::Duration;

use async_trait::async_trait;
use postwatch_core::{AppConfig, Target};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::WeiboError;
use crate::fetch::Fetcher;
use crate::platform::RawItem;
use crate::types::{CardsData, ContainerEnvelope, ProfileData};

const DEFAULT_BASE_URL: &str = "https://m.weibo.cn/";

/// Container prefix for an account's timeline.
const TIMELINE_CONTAINER_PREFIX: &str = "107603";

/// Container prefix for an account's profile.
const PROFILE_CONTAINER_PREFIX: &str = "100505";

/// Longest single back-off sleep between attempts.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Client for the Weibo mobile API.
///
/// Use [`WeiboClient::new`] for production or [`WeiboClient::with_base_url`]
/// to point at a mock server in tests.
pub struct WeiboClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl WeiboClient {
    /// Creates a client pointed at `m.weibo.cn`.
    ///
    /// # Errors
    ///
    /// Returns [`WeiboError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, WeiboError> {
        Self::with_base_url(
            DEFAULT_BASE_URL,
            timeout_secs,
            user_agent,
            max_retries,
            backoff_base_ms,
        )
    }

    /// Creates a client with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`WeiboError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`WeiboError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, WeiboError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| WeiboError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a client from the application configuration.
    ///
    /// # Errors
    ///
    /// See [`WeiboClient::with_base_url`].
    pub fn from_config(config: &AppConfig) -> Result<Self, WeiboError> {
        Self::with_base_url(
            &config.weibo_base_url,
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_ms,
        )
    }

    /// Looks up the display name of an account.
    ///
    /// Returns `Ok(None)` when the API answers but does not know the account.
    ///
    /// # Errors
    ///
    /// Returns a fetch-failure [`WeiboError`] on transport errors or non-2xx
    /// statuses, and [`WeiboError::Deserialize`] on a malformed body.
    pub async fn account_name(&self, target: &Target) -> Result<Option<String>, WeiboError> {
        let url = self.container_url(PROFILE_CONTAINER_PREFIX, target)?;
        let envelope: ContainerEnvelope<ProfileData> = self
            .get_json(&url, &format!("profile of {target}"))
            .await?;

        if !envelope.is_ok() {
            tracing::debug!(uid = %target, msg = ?envelope.msg, "profile lookup returned ok != 1");
            return Ok(None);
        }

        Ok(envelope
            .data
            .and_then(|d| d.user_info)
            .map(|u| u.screen_name))
    }

    fn container_url(&self, prefix: &str, target: &Target) -> Result<Url, WeiboError> {
        let mut url = self.join("api/container/getIndex")?;
        url.query_pairs_mut()
            .append_pair("containerid", &format!("{prefix}{target}"));
        Ok(url)
    }

    fn detail_url(&self, message_id: &str) -> Result<Url, WeiboError> {
        self.join(&format!("detail/{message_id}"))
    }

    fn join(&self, path: &str) -> Result<Url, WeiboError> {
        self.base_url
            .join(path)
            .map_err(|e| WeiboError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: format!("cannot append {path:?}: {e}"),
            })
    }

    /// Sends a GET and returns the body of a 2xx response.
    ///
    /// Timeouts, connection failures and 5xx answers are retried up to
    /// `max_retries` times with jittered exponential back-off. A 429 is
    /// returned at once so the caller skips the cycle.
    async fn get_text(&self, url: &Url) -> Result<String, WeiboError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(url).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < self.max_retries && is_transient(&err) => {
                    attempt += 1;
                    let delay = backoff_delay(self.backoff_base_ms, attempt);
                    tracing::warn!(
                        url = %url,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient weibo error, retrying after back-off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, url: &Url) -> Result<String, WeiboError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(60);
            tracing::warn!(url = %url, retry_after_secs, "rate limited by weibo");
            return Err(WeiboError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(WeiboError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<T, WeiboError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| WeiboError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

/// Errors a second attempt can fix. Throttling is not one of them.
fn is_transient(err: &WeiboError) -> bool {
    match err {
        WeiboError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        WeiboError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        _ => false,
    }
}

/// `base_ms × 2^(attempt-1)`, capped, with ±25 % jitter.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped = exp.min(MAX_BACKOFF_MS);
    let jitter: f64 = rand::random_range(0.75..1.25);
    #[allow(clippy::cast_precision_loss)]
    let millis = capped as f64 * jitter;
    Duration::from_secs_f64(millis / 1000.0)
}

#[async_trait]
impl Fetcher for WeiboClient {
    async fn fetch_list(&self, target: &Target) -> Result<Vec<RawItem>, WeiboError> {
        let url = self.container_url(TIMELINE_CONTAINER_PREFIX, target)?;
        let envelope: ContainerEnvelope<CardsData> = self
            .get_json(&url, &format!("timeline of {target}"))
            .await?;

        if !envelope.is_ok() {
            return Err(WeiboError::Api(
                envelope
                    .msg
                    .unwrap_or_else(|| format!("timeline of {target} returned ok != 1")),
            ));
        }

        let cards = envelope.data.map(|d| d.cards).unwrap_or_default();
        tracing::debug!(uid = %target, count = cards.len(), "fetched weibo timeline");
        Ok(cards)
    }

    async fn fetch_expansion(&self, message_id: &str) -> Result<String, WeiboError> {
        let url = self.detail_url(message_id)?;
        self.get_text(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> WeiboClient {
        WeiboClient::with_base_url(base_url, 4, "postwatch-test/0.1", 0, 0)
            .expect("client construction should not fail")
    }

    #[test]
    fn container_url_prefixes_target() {
        let client = test_client("https://m.weibo.cn");
        let url = client
            .container_url(TIMELINE_CONTAINER_PREFIX, &Target::new("6279793937"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://m.weibo.cn/api/container/getIndex?containerid=1076036279793937"
        );
    }

    #[test]
    fn detail_url_keeps_base_path() {
        let client = test_client("http://127.0.0.1:8080/proxy/");
        let url = client.detail_url("4999000111").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/proxy/detail/4999000111");
    }

    #[test]
    fn only_transport_and_server_errors_are_transient() {
        assert!(is_transient(&WeiboError::UnexpectedStatus {
            status: 503,
            url: "https://m.weibo.cn/api/container/getIndex".to_owned(),
        }));
        assert!(!is_transient(&WeiboError::UnexpectedStatus {
            status: 403,
            url: "https://m.weibo.cn/detail/1".to_owned(),
        }));
        assert!(!is_transient(&WeiboError::RateLimited {
            retry_after_secs: 60
        }));
        assert!(!is_transient(&WeiboError::Api("ok=0".to_owned())));
    }

    #[test]
    fn backoff_doubles_within_jitter() {
        for _ in 0..32 {
            let first = backoff_delay(400, 1).as_millis();
            let third = backoff_delay(400, 3).as_millis();
            assert!((300..=500).contains(&first), "first={first}");
            assert!((1200..=2000).contains(&third), "third={third}");
        }
    }

    #[test]
    fn backoff_is_capped() {
        let delay = backoff_delay(5_000, 30);
        assert!(delay <= Duration::from_millis(MAX_BACKOFF_MS * 5 / 4));
        assert_eq!(backoff_delay(0, 3), Duration::ZERO);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = WeiboClient::with_base_url("not a url", 4, "ua", 0, 0);
        assert!(matches!(result, Err(WeiboError::InvalidBaseUrl { .. })));
    }
}
