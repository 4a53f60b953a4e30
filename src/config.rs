use clap::Parser;
use std::fmt::Debug;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "Polls Bluesky accounts and forwards new posts, replies and reposts to a Discord webhook"
)]
pub struct AppSettings {
    /// Bluesky login identifier (handle or email)
    #[arg(long, env = "USERNAME")]
    pub username: String,

    /// Bluesky password (an app password is recommended)
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Discord webhook URL that receives the summaries
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub discord_webhook_url: String,

    /// Comma-separated list of handles to watch (e.g. alice.bsky.social,bob.bsky.social)
    #[arg(long, env = "WATCH_HANDLES", value_delimiter = ',')]
    pub watch_handles: Vec<String>,

    /// How often to poll the watched feeds (in seconds)
    #[arg(long, env = "POLL_INTERVAL", default_value_t = 60)]
    pub poll_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory holding posted_cache.json and did_cache.json
    #[arg(long, env = "CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Number of feed items fetched per account and cycle (1 to 100)
    #[arg(long, env = "FEED_LIMIT", default_value_t = 10)]
    pub feed_limit: u8,

    /// AT Protocol service used for login and XRPC calls
    #[arg(long, env = "BSKY_SERVICE_URL", default_value = "https://bsky.social")]
    pub service_url: String,

    /// Web app base URL used to build post links
    #[arg(long, env = "BSKY_APP_URL", default_value = "https://bsky.app")]
    pub app_url: String,

    /// Skip feed items older than this many hours (unset forwards everything unseen)
    #[arg(long, env = "MAX_POST_AGE_HOURS")]
    pub max_post_age_hours: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            discord_webhook_url: String::new(),
            watch_handles: Vec::new(),
            poll_interval: 60,
            log_level: "info".to_string(),
            cache_dir: PathBuf::from("cache"),
            feed_limit: 10,
            service_url: "https://bsky.social".to_string(),
            app_url: "https://bsky.app".to_string(),
            max_post_age_hours: None,
        }
    }
}

/// Validate that log_level is one tracing understands, normalised to lowercase
fn validate_log_level(value: &str) -> Result<String, String> {
    let level = value.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(level),
        _ => Err(format!(
            "log_level must be one of trace, debug, info, warn, error, got '{}'",
            value
        )),
    }
}

/// Validate that feed_limit is within what getAuthorFeed accepts
fn validate_feed_limit(value: u8) -> Result<u8, String> {
    const MIN_FEED_LIMIT: u8 = 1;
    const MAX_FEED_LIMIT: u8 = 100;

    if value < MIN_FEED_LIMIT {
        Err(format!(
            "feed_limit must be at least {MIN_FEED_LIMIT}, got {value}"
        ))
    } else if value > MAX_FEED_LIMIT {
        Err(format!(
            "feed_limit must be at most {MAX_FEED_LIMIT}, got {value}"
        ))
    } else {
        Ok(value)
    }
}

fn validate_poll_interval(value: u64) -> Result<u64, String> {
    if value == 0 {
        Err("poll_interval must be at least 1 second".to_string())
    } else {
        Ok(value)
    }
}

/// Trim handles, strip a leading '@', drop empties and duplicates (first occurrence wins)
fn normalize_handles(handles: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(handles.len());
    for handle in handles {
        let handle = handle.trim().trim_start_matches('@');
        if handle.is_empty() || normalized.iter().any(|h| h == handle) {
            continue;
        }
        normalized.push(handle.to_string());
    }
    normalized
}

/// Normalise and validate settings that clap has already parsed
pub fn validate_settings(mut app_settings: AppSettings) -> anyhow::Result<AppSettings> {
    app_settings.watch_handles = normalize_handles(&app_settings.watch_handles);
    if app_settings.watch_handles.is_empty() {
        anyhow::bail!("WATCH_HANDLES must contain at least one handle");
    }

    app_settings.log_level =
        validate_log_level(&app_settings.log_level).map_err(|e| anyhow::anyhow!(e))?;
    app_settings.feed_limit =
        validate_feed_limit(app_settings.feed_limit).map_err(|e| anyhow::anyhow!(e))?;
    app_settings.poll_interval =
        validate_poll_interval(app_settings.poll_interval).map_err(|e| anyhow::anyhow!(e))?;

    Ok(app_settings)
}

pub fn load_config() -> anyhow::Result<AppSettings> {
    // Parse command line arguments and environment variables
    let app_settings = AppSettings::parse();
    validate_settings(app_settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_log_level_valid_values() {
        assert_eq!(validate_log_level("info"), Ok("info".to_string()));
        assert_eq!(validate_log_level("DEBUG"), Ok("debug".to_string()));
        assert_eq!(validate_log_level(" Warn "), Ok("warn".to_string()));
    }

    #[test]
    fn test_validate_log_level_invalid_values() {
        let err = validate_log_level("verbose").unwrap_err();
        assert!(err.contains("must be one of trace, debug, info, warn, error"));
        assert!(validate_log_level("").is_err());
    }

    #[test]
    fn test_validate_feed_limit_bounds() {
        assert_eq!(validate_feed_limit(1), Ok(1));
        assert_eq!(validate_feed_limit(100), Ok(100));

        let err = validate_feed_limit(0).unwrap_err();
        assert!(err.contains("must be at least 1"));

        let err = validate_feed_limit(101).unwrap_err();
        assert!(err.contains("must be at most 100"));
    }

    #[test]
    fn test_validate_poll_interval() {
        assert_eq!(validate_poll_interval(60), Ok(60));
        assert!(validate_poll_interval(0).is_err());
    }

    #[test]
    fn test_normalize_handles() {
        let raw = vec![
            " alice.bsky.social".to_string(),
            "@bob.bsky.social".to_string(),
            "".to_string(),
            "alice.bsky.social".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(
            normalize_handles(&raw),
            vec!["alice.bsky.social".to_string(), "bob.bsky.social".to_string()]
        );
    }
}
