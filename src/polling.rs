use crate::bluesky::BlueskyApiClient;
use crate::cache::{CacheStore, HandleCache, PostedCache};
use crate::config::AppSettings;
use crate::feed::{classify, render, EventKind, FeedEvent, PostLinks};
use crate::webhook::DiscordWebhookClient;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// The two caches, loaded at start and written back after every cycle.
#[derive(Debug, Default)]
pub struct CacheState {
    pub posted: PostedCache,
    pub handles: HandleCache,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub forwarded: usize,
    pub failed_deliveries: usize,
    pub failed_accounts: usize,
}

pub struct PollingService {
    bsky_client: Arc<BlueskyApiClient>,
    webhook_client: Arc<DiscordWebhookClient>,
    config: Arc<AppSettings>,
    store: CacheStore,
    links: PostLinks,
    state: Mutex<CacheState>,
}

impl PollingService {
    pub fn new(
        bsky_client: Arc<BlueskyApiClient>,
        webhook_client: Arc<DiscordWebhookClient>,
        config: Arc<AppSettings>,
    ) -> Result<Self> {
        let store = CacheStore::new(&config.cache_dir);
        let (posted, handles) = store
            .load()
            .with_context(|| format!("Failed to prepare cache directory {}", config.cache_dir.display()))?;
        info!(
            "Loaded {} forwarded ids and {} cached handles",
            posted.len(),
            handles.len()
        );

        Ok(Self {
            bsky_client,
            webhook_client,
            links: PostLinks::new(&config.app_url),
            config,
            store,
            state: Mutex::new(CacheState { posted, handles }),
        })
    }

    /// Poll until Ctrl-C, then flush the caches.
    pub async fn start_polling(&self) -> Result<()> {
        self.start_polling_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` completes, then flush the caches.
    pub async fn start_polling_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Starting polling service for handles: {:?}", self.config.watch_handles);

        tokio::select! {
            biased;
            _ = shutdown => info!("Shutdown signal received, saving caches"),
            _ = self.poll_forever() => {}
        }

        // The polling future is dropped by now, so the lock is free even mid-cycle
        let state = self.state.lock().await;
        self.persist(&state);
        Ok(())
    }

    async fn poll_forever(&self) {
        let mut interval = time::interval(Duration::from_secs(self.config.poll_interval));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let report = self.run_cycle().await;
            info!(
                "Cycle finished: {} forwarded, {} failed deliveries, {} failed accounts",
                report.forwarded, report.failed_deliveries, report.failed_accounts
            );
        }
    }

    /// One pass over every watched handle, followed by a cache save.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut state = self.state.lock().await;
        let mut report = CycleReport::default();

        for handle in &self.config.watch_handles {
            info!("Checking posts for {}", handle);
            if let Err(e) = self.poll_account(handle, &mut state, &mut report).await {
                error!("Failed to process {}: {:#}", handle, e);
                report.failed_accounts += 1;
            }
        }

        self.persist(&state);
        report
    }

    async fn poll_account(
        &self,
        handle: &str,
        state: &mut CacheState,
        report: &mut CycleReport,
    ) -> Result<()> {
        let feed = self
            .bsky_client
            .get_author_feed(handle, self.config.feed_limit)
            .await
            .with_context(|| format!("Failed to fetch feed for {}", handle))?;

        let cutoff = self.age_cutoff();

        // The API returns newest first; forward in the order things happened
        for item in feed.feed.iter().rev() {
            let event = match classify(item) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping malformed feed item {}: {}", item.post.uri, e);
                    continue;
                }
            };

            if state.posted.check(&event.key) {
                continue;
            }
            if let Some(cutoff) = cutoff {
                if event.is_older_than(cutoff) {
                    debug!("Skipping {} older than the configured maximum age", event.key);
                    continue;
                }
            }

            let target_handle = self.target_handle(&event, &mut state.handles).await;
            let message = render(&event, handle, target_handle.as_deref(), &self.links);
            self.log_detection(&event, handle, target_handle.as_deref());

            match self.webhook_client.send(&message).await {
                Ok(()) => report.forwarded += 1,
                Err(e) => {
                    error!("Failed to forward {} for {}: {}", event.key, handle, e);
                    report.failed_deliveries += 1;
                }
            }
            state.posted.add(event.key);
        }

        Ok(())
    }

    fn age_cutoff(&self) -> Option<DateTime<Utc>> {
        self.config
            .max_post_age_hours
            .and_then(|hours| i64::try_from(hours).ok())
            .and_then(ChronoDuration::try_hours)
            .map(|age| Utc::now() - age)
    }

    /// Handle to show for the other party of a reply or repost, if there is one.
    async fn target_handle(&self, event: &FeedEvent, handles: &mut HandleCache) -> Option<String> {
        if let EventKind::Repost { author, .. } = &event.kind {
            handles.insert(author.did.clone(), author.handle.clone());
            return Some(author.handle.clone());
        }
        let did = event.needs_resolution()?;
        Some(self.resolve_handle(did, handles).await)
    }

    /// Cached handle, else a profile lookup; the DID itself when the lookup fails.
    async fn resolve_handle(&self, did: &str, handles: &mut HandleCache) -> String {
        if let Some(handle) = handles.get(did) {
            return handle.to_string();
        }
        match self.bsky_client.get_profile(did).await {
            Ok(profile) => {
                debug!("Resolved {} to {}", did, profile.handle);
                handles.insert(did, profile.handle.clone());
                profile.handle
            }
            Err(e) => {
                warn!("Failed to resolve handle for DID {}: {}", did, e);
                did.to_string()
            }
        }
    }

    fn log_detection(&self, event: &FeedEvent, handle: &str, target: Option<&str>) {
        match &event.kind {
            EventKind::Post => debug!("Detected new post by {}", handle),
            EventKind::Reply { .. } => debug!(
                "Detected new comment by {} on {}",
                handle,
                target.unwrap_or("unknown")
            ),
            EventKind::Repost { .. } => debug!("Reported repost by {}", handle),
        }
    }

    fn persist(&self, state: &CacheState) {
        if let Err(e) = self.store.save(&state.posted, &state.handles) {
            error!("Failed to save caches: {}", e);
        }
    }
}
