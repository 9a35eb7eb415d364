//! Typed views of the Weibo mobile API payloads.
//!
//! Only the fields the adapter reads are modelled; everything else is ignored
//! by serde. Cards themselves stay as raw JSON until normalization.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Ids arrive as JSON numbers in some payloads and as strings in others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlexibleId {
    Num(u64),
    Str(String),
}

impl fmt::Display for FlexibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlexibleId::Num(n) => write!(f, "{n}"),
            FlexibleId::Str(s) => f.write_str(s),
        }
    }
}

/// Envelope shared by every `container/getIndex` response.
#[derive(Debug, Deserialize)]
pub struct ContainerEnvelope<T> {
    #[serde(default)]
    pub ok: Value,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ContainerEnvelope<T> {
    /// The API signals success with `"ok": 1`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok.as_i64() == Some(1) || self.ok.as_bool() == Some(true)
    }
}

/// `data` of the timeline container (`107603{uid}`).
#[derive(Debug, Deserialize)]
pub struct CardsData {
    #[serde(default)]
    pub cards: Vec<Value>,
}

/// `data` of the profile container (`100505{uid}`).
#[derive(Debug, Deserialize)]
pub struct ProfileData {
    #[serde(rename = "userInfo")]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub screen_name: String,
}

/// A single status (`mblog`), either from a card or from the detail page.
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub id: FlexibleId,
    pub mid: FlexibleId,
    pub bid: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "isLongText", default)]
    pub is_long_text: bool,
    #[serde(default)]
    pub pic_num: u32,
    #[serde(default)]
    pub pics: Vec<Picture>,
    pub user: StatusUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUser {
    pub id: FlexibleId,
    pub screen_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Picture {
    pub large: Option<PictureVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PictureVariant {
    pub url: String,
}
