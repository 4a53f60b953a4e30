//! Classification of author-feed items and rendering of the forwarded messages.

use crate::at_uri::{AtUri, AtUriError};
use crate::models::{FeedReason, FeedViewPost, ProfileViewBasic};
use chrono::{DateTime, Utc};

const NO_TEXT: &str = "[No Text]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An original post, or a reply inside the author's own thread.
    Post,
    /// A reply in a thread rooted at someone else's post.
    Reply { root: AtUri },
    /// The watched account reposted `original`, written by `author`.
    Repost { original: AtUri, author: ProfileRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRef {
    pub did: String,
    pub handle: String,
}

impl From<&ProfileViewBasic> for ProfileRef {
    fn from(profile: &ProfileViewBasic) -> Self {
        Self {
            did: profile.did.clone(),
            handle: profile.handle.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    /// Identifier recorded in the posted cache.
    pub key: String,
    pub text: String,
    /// Record key of the watched account's post, or of the original for reposts.
    pub rkey: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: EventKind,
}

impl FeedEvent {
    /// DID whose handle has to be looked up before rendering, if any.
    pub fn needs_resolution(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Reply { root } => Some(root.authority()),
            _ => None,
        }
    }

    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp.is_some_and(|ts| ts < cutoff)
    }
}

pub fn classify(item: &FeedViewPost) -> Result<FeedEvent, AtUriError> {
    let post = &item.post;
    let post_uri = AtUri::parse(&post.uri)?;
    let text = match post.record.text.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => NO_TEXT.to_string(),
    };

    if let Some(FeedReason::Repost(reason)) = &item.reason {
        let key = reason
            .uri
            .clone()
            .unwrap_or_else(|| format!("{}#repost:{}", post.uri, reason.by.did));
        return Ok(FeedEvent {
            key,
            text,
            rkey: post_uri.require_rkey()?.to_string(),
            timestamp: reason.indexed_at.as_deref().and_then(parse_timestamp),
            kind: EventKind::Repost {
                author: ProfileRef::from(&post.author),
                original: post_uri,
            },
        });
    }

    let kind = match &post.record.reply {
        Some(reply) => {
            let root = AtUri::parse(&reply.root.uri)?;
            if root.authority() == post.author.did {
                EventKind::Post
            } else {
                EventKind::Reply { root }
            }
        }
        None => EventKind::Post,
    };

    Ok(FeedEvent {
        key: post.uri.clone(),
        text,
        rkey: post_uri.require_rkey()?.to_string(),
        timestamp: post.record.created_at.as_deref().and_then(parse_timestamp),
        kind,
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Builds web links to posts.
#[derive(Debug, Clone)]
pub struct PostLinks {
    app_url: String,
}

impl PostLinks {
    pub fn new(app_url: &str) -> Self {
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn post_url(&self, handle: &str, rkey: &str) -> String {
        format!("{}/profile/{}/post/{}", self.app_url, handle, rkey)
    }
}

/// Render the chat message for `event` seen on `watched`'s feed.
///
/// `target_handle` is the resolved handle of the reply root's author and is only
/// read for replies; callers fall back to the DID when resolution failed.
pub fn render(
    event: &FeedEvent,
    watched: &str,
    target_handle: Option<&str>,
    links: &PostLinks,
) -> String {
    match &event.kind {
        EventKind::Post => format!(
            "📝 **New post by {}**\n{}\n{}",
            watched,
            event.text,
            links.post_url(watched, &event.rkey)
        ),
        EventKind::Reply { root } => {
            let target = target_handle.unwrap_or_else(|| root.authority());
            let target_link = links.post_url(target, root.rkey().unwrap_or_default());
            format!(
                "💬 **{} commented on {}**\n{}\n🧵 Original: {}\n💬 Comment: {}",
                watched,
                target,
                event.text,
                target_link,
                links.post_url(watched, &event.rkey)
            )
        }
        EventKind::Repost { author, .. } => format!(
            "🔁 **{} reposted a post by {}**\n{}\n🔗 {}",
            watched,
            author.handle,
            event.text,
            links.post_url(&author.handle, &event.rkey)
        ),
    }
}
