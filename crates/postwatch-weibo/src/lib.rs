//! Weibo source adapter for postwatch.
//!
//! Polls an account's mobile timeline, works out which cards are new since
//! the previous poll (including pin removals, which the timeline never
//! reports directly), and turns each new card into a [`CanonicalPost`].
//!
//! [`CanonicalPost`]: postwatch_core::CanonicalPost

pub mod classify;
pub mod client;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod platform;
pub mod sanitize;
pub mod types;

pub use classify::Weibo;
pub use client::WeiboClient;
pub use detect::{ChangeDetector, DetectorSettings};
pub use error::WeiboError;
pub use fetch::Fetcher;
pub use normalize::{extract_expanded_status, normalize_item};
pub use pipeline::WeiboPipeline;
pub use platform::{Category, DetectedItem, ItemId, Platform, RawItem, TimestampError};
pub use sanitize::{MarkupSanitizer, TagStripper};
