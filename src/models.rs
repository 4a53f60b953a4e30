use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateSessionRequest {
    pub identifier: String,
    pub password: String,
}

/// Returned by createSession and refreshSession.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileViewBasic {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
}

/// getProfile response; only the fields the forwarder reads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyRef {
    pub root: StrongRef,
    pub parent: StrongRef,
}

/// An `app.bsky.feed.post` record. Embeds, facets and langs are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply: Option<ReplyRef>,
    pub created_at: Option<String>, // RFC 3339, parsed lazily
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: ProfileViewBasic,
    #[serde(default)]
    pub record: PostRecord,
    pub indexed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRepost {
    pub by: ProfileViewBasic,
    pub uri: Option<String>, // URI of the repost record; absent on older app views
    pub cid: Option<String>,
    pub indexed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "$type")]
pub enum FeedReason {
    #[serde(rename = "app.bsky.feed.defs#reasonRepost")]
    Repost(ReasonRepost),
    #[serde(other)]
    Unknown, // e.g. reasonPin
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedViewPost {
    pub post: PostView,
    #[serde(default)]
    pub reason: Option<FeedReason>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthorFeed {
    pub feed: Vec<FeedViewPost>,
    pub cursor: Option<String>,
}

/// Error body of a failed XRPC call, e.g. `{"error":"ExpiredToken","message":"..."}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XrpcErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookMessage {
    pub content: String,
}
