use crate::config::AppSettings;
use crate::models::{AuthorFeed, CreateSessionRequest, ProfileView, Session, XrpcErrorBody};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const EXPIRED_TOKEN_ERROR: &str = "ExpiredToken";

#[derive(Error, Debug)]
pub enum BlueskyError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Failed to deserialize response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Not authenticated: log in before calling the API")]
    NotAuthenticated,
}

impl BlueskyError {
    /// True when the server rejected the access token as expired.
    pub fn is_expired_token(&self) -> bool {
        match self {
            BlueskyError::Api { body, .. } => serde_json::from_str::<XrpcErrorBody>(body)
                .ok()
                .and_then(|b| b.error)
                .is_some_and(|e| e == EXPIRED_TOKEN_ERROR),
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct BlueskyApiClient {
    client: Client,
    service_url: Url,
    session: RwLock<Option<Session>>,
}

impl BlueskyApiClient {
    pub fn new(settings: &AppSettings) -> Result<Self, BlueskyError> {
        let mut service_url = Url::parse(&settings.service_url)?;
        // Url::join replaces the last path segment unless the base ends with '/'
        if !service_url.path().ends_with('/') {
            let path = format!("{}/", service_url.path());
            service_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            service_url,
            session: RwLock::new(None),
        })
    }

    fn xrpc_url(&self, nsid: &str) -> Result<Url, BlueskyError> {
        Ok(self.service_url.join(&format!("xrpc/{}", nsid))?)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Session, BlueskyError> {
        let url = self.xrpc_url("com.atproto.server.createSession")?;
        let request = CreateSessionRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };

        let response = self.client.post(url).json(&request).send().await?;
        let session: Session = Self::parse_response(response).await?;

        info!(handle = %session.handle, did = %session.did, "Session created");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Session, BlueskyError> {
        let refresh_jwt = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_jwt.clone())
            .ok_or(BlueskyError::NotAuthenticated)?;

        let url = self.xrpc_url("com.atproto.server.refreshSession")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(refresh_jwt)
            .send()
            .await?;
        let session: Session = Self::parse_response(response).await?;

        debug!(handle = %session.handle, "Session refreshed");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn get_author_feed(&self, actor: &str, limit: u8) -> Result<AuthorFeed, BlueskyError> {
        let limit = limit.to_string();
        let query = [("actor", actor), ("limit", limit.as_str())];
        let feed: AuthorFeed = self.authed_get("app.bsky.feed.getAuthorFeed", &query).await?;
        debug!("Fetched {} feed items for {}", feed.feed.len(), actor);
        Ok(feed)
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, actor: &str) -> Result<ProfileView, BlueskyError> {
        self.authed_get("app.bsky.actor.getProfile", &[("actor", actor)])
            .await
    }

    /// GET with the access token; on ExpiredToken refresh the session and try once more.
    async fn authed_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BlueskyError> {
        match self.get_once(nsid, query).await {
            Err(e) if e.is_expired_token() => {
                warn!("Access token expired during {}, refreshing session", nsid);
                self.refresh_session().await?;
                self.get_once(nsid, query).await.map_err(|e| {
                    error!("Bluesky API call {} failed after session refresh: {}", nsid, e);
                    e
                })
            }
            other => other,
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        nsid: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BlueskyError> {
        let access_jwt = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_jwt.clone())
            .ok_or(BlueskyError::NotAuthenticated)?;

        let url = self.xrpc_url(nsid)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(access_jwt)
            .query(query)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, BlueskyError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            debug!("Bluesky API returned {} - {}", status, body);
            return Err(BlueskyError::Api { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(BlueskyError::Deserialization)
    }
}
