// src/feeds/mod.rs
pub mod factory;
pub mod ledger;
pub mod pull;
pub mod push;
pub mod registry;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::Credentials;
use ledger::NotificationLedger;

pub use factory::create_feed;
pub use registry::{FeedRegistry, FeedStatus};

/// "Content became visible" record, keyed by the content identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub publish_reference: String,
    /// Raw RFC3339 value from the feed; parsed lazily.
    pub last_modified: String,
}

impl Notification {
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.last_modified.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Notification object as it appears on the wire (pull page and push frame).
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationDto {
    pub id: String,
    #[serde(rename = "publishReference", default)]
    pub publish_reference: String,
    #[serde(rename = "lastModified", default)]
    pub last_modified: String,
}

impl NotificationDto {
    /// `None` when `id` carries no trailing content identifier.
    pub fn into_notification(self) -> Option<Notification> {
        let id = content_id_from(&self.id)?;
        Some(Notification {
            id: id.to_string(),
            publish_reference: self.publish_reference,
            last_modified: self.last_modified,
        })
    }
}

/// Path segment following the last `/` of a notification id URL.
pub fn content_id_from(id: &str) -> Option<&str> {
    let last = id.trim().rsplit('/').next()?;
    (!last.is_empty()).then_some(last)
}

fn decode_batch(dtos: Vec<NotificationDto>) -> Vec<Notification> {
    dtos.into_iter()
        .filter_map(NotificationDto::into_notification)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Pull,
    Push,
}

impl FeedKind {
    /// Feeds whose alias mentions `push` stream; everything else is polled.
    pub fn from_alias(alias: &str) -> Self {
        if alias.to_ascii_lowercase().contains("push") {
            FeedKind::Push
        } else {
            FeedKind::Pull
        }
    }
}

/// Poll/purge interval and ledger retention derived from a metric's SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedTiming {
    pub interval: Duration,
    pub expiry: Duration,
}

impl FeedTiming {
    pub fn new(interval: Duration, expiry: Duration) -> Self {
        Self { interval, expiry }
    }

    /// `interval = threshold / granularity`, `expiry = threshold + 2 * interval`.
    pub fn for_sla(threshold_seconds: u64, granularity: u64) -> Result<Self> {
        anyhow::ensure!(
            threshold_seconds > 0 && granularity > 0,
            "feed needs a positive threshold and granularity (got {threshold_seconds}s / {granularity})"
        );
        let interval_secs = threshold_seconds / granularity;
        anyhow::ensure!(interval_secs > 0, "feed poll interval rounds down to zero");
        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            expiry: Duration::from_secs(threshold_seconds + 2 * interval_secs),
        })
    }
}

/// Client-side knobs shared by every feed the factory builds.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Longest a push stream may stay silent (heartbeats included) before
    /// it is treated as dead and reconnected.
    pub push_idle_timeout: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(4),
            reconnect_delay: Duration::from_secs(1),
            push_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Identity, credentials, ledger and liveness shared by both feed kinds.
pub struct FeedCore {
    pub name: String,
    pub base_url: String,
    pub timing: FeedTiming,
    pub ledger: NotificationLedger,
    client: reqwest::Client,
    credentials: RwLock<Option<Credentials>>,
    connected: AtomicBool,
}

impl FeedCore {
    pub fn new(
        name: &str,
        base_url: &str,
        timing: FeedTiming,
        credentials: Option<Credentials>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim().to_string(),
            timing,
            ledger: NotificationLedger::new(),
            client,
            credentials: RwLock::new(credentials),
            connected: AtomicBool::new(false),
        }
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        let creds = self
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match creds {
            Some(c) => req.basic_auth(c.username, Some(c.password)),
            None => req,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::Relaxed);
        gauge!("feed_connected", "feed" => self.name.clone()).set(if up { 1.0 } else { 0.0 });
    }

    fn ingest(&self, batch: Vec<Notification>) -> usize {
        let n = self.ledger.append_all(batch);
        counter!("feed_notifications_ingested_total", "feed" => self.name.clone())
            .increment(n as u64);
        n
    }

    fn purge(&self) -> usize {
        let removed = self.ledger.purge(self.timing.expiry);
        gauge!("feed_ledger_entries", "feed" => self.name.clone())
            .set(self.ledger.tracked_ids() as f64);
        removed
    }
}

/// A background notification source backing the notification check.
pub trait Feed: Send + Sync {
    fn core(&self) -> &FeedCore;

    fn kind(&self) -> FeedKind;

    /// Begin background ingestion. Must be called inside a tokio runtime.
    /// Calling it on a running feed is a no-op.
    fn start(&self);

    /// Signal the ingest loop to exit. Cooperative: an in-flight request is
    /// not aborted.
    fn stop(&self);

    fn name(&self) -> &str {
        &self.core().name
    }

    fn is_connected(&self) -> bool {
        self.core().is_connected()
    }

    fn set_credentials(&self, username: &str, password: &str) {
        self.core().set_credentials(Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }));
    }

    fn notifications_for(&self, id: &str) -> Vec<Notification> {
        self.core().ledger.notifications_for(id)
    }
}

/// Handles of a started feed: stop signal plus its background tasks.
struct Running {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    fn signal_stop(self) {
        let _ = self.stop.send(true);
        // Tasks observe the flag and finish on their own.
        drop(self.tasks);
    }
}

/// Purge the ledger every `timing.interval` until told to stop.
fn spawn_purger(core: std::sync::Arc<FeedCore>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(core.timing.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => {}
            }
            if *stop.borrow() {
                break;
            }
            let removed = core.purge();
            if removed > 0 {
                tracing::debug!(feed = %core.name, removed, "purged expired notifications");
            }
        }
    })
}

fn build_client(settings: &FeedSettings, with_request_timeout: bool) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("publish-sla-monitor/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(settings.connect_timeout);
    if with_request_timeout {
        builder = builder.timeout(settings.request_timeout);
    }
    builder.build().context("building feed http client")
}
