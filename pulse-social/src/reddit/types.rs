use serde::Deserialize;

/// Reddit's generic `{"kind": "Listing", "data": {...}}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub kind: String,
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListingData<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
    #[serde(default)]
    pub children: Vec<Thing<T>>,
}

/// One child of a listing; `kind` is `t3` for links, `t1` for comments, `more` for stubs.
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

pub const KIND_LINK: &str = "t3";
pub const KIND_COMMENT: &str = "t1";

#[derive(Debug, Clone, Deserialize)]
pub struct LinkData {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    /// Seconds since the epoch, sent as a float.
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub num_comments: Option<u64>,
}

/// Shared shape for `t1` comments and `more` stubs; stubs carry no `body`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}
