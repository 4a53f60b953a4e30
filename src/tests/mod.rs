//! HTTP-level tests, run against mockito servers standing in for Bluesky and Discord.
//!
//! Tests are organized by the module they test.


#[cfg(test)]
pub mod helpers {
    use crate::config::AppSettings;
    use serde_json::json;

    pub const ACCESS_TOKEN: &str = "access-token";
    pub const REFRESH_TOKEN: &str = "refresh-token";

    /// Settings pointing both the XRPC service and the webhook at `base_url`.
    pub fn test_settings(base_url: &str) -> AppSettings {
        let mut settings = AppSettings::default();
        settings.username = "forwarder.bsky.social".to_string();
        settings.password = "app-password".to_string();
        settings.service_url = base_url.to_string();
        settings.discord_webhook_url = format!("{}/webhook", base_url);
        settings.watch_handles = vec!["alice.bsky.social".to_string()];
        settings.log_level = "debug".to_string();
        settings
    }

    pub fn session_json(access: &str, refresh: &str) -> serde_json::Value {
        json!({
            "accessJwt": access,
            "refreshJwt": refresh,
            "handle": "forwarder.bsky.social",
            "did": "did:plc:forwarder",
            "email": "forwarder@example.com"
        })
    }

    pub async fn mock_create_session(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_json(ACCESS_TOKEN, REFRESH_TOKEN).to_string())
            .create_async()
            .await
    }
}
