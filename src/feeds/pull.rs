// src/feeds/pull.rs
use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use super::{decode_batch, spawn_purger, Feed, FeedCore, FeedKind, NotificationDto, Running};

#[derive(Debug, Deserialize)]
struct NotificationsPage {
    #[serde(default)]
    notifications: Vec<NotificationDto>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

/// `since` query value carried by a "next page" link.
fn since_from_link(href: &str) -> Option<String> {
    let url = reqwest::Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "since")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Cursor-based notifications endpoint polled on a fixed interval.
pub struct PullFeed {
    core: Arc<FeedCore>,
    cursor: Arc<Mutex<String>>,
    running: Mutex<Option<Running>>,
}

impl PullFeed {
    /// Starts reading from "now".
    pub fn new(core: FeedCore) -> Self {
        let since = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Self::with_cursor(core, since)
    }

    pub fn with_cursor(core: FeedCore, since: String) -> Self {
        Self {
            core: Arc::new(core),
            cursor: Arc::new(Mutex::new(since)),
            running: Mutex::new(None),
        }
    }

    pub fn cursor(&self) -> String {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One poll cycle: fetch the page after the cursor, ingest, advance.
    pub async fn poll_once(&self) -> Result<usize> {
        poll_cycle(&self.core, &self.cursor).await
    }
}

async fn poll_cycle(core: &FeedCore, cursor: &Mutex<String>) -> Result<usize> {
    let since = cursor.lock().unwrap_or_else(PoisonError::into_inner).clone();
    counter!("feed_polls_total", "feed" => core.name.clone()).increment(1);

    let resp = core
        .get(&core.base_url)
        .query(&[("since", since.as_str())])
        .send()
        .await
        .with_context(|| format!("GET {} since={since}", core.base_url))?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        bail!("notifications endpoint returned {status}");
    }
    let page: NotificationsPage = resp
        .json()
        .await
        .context("decoding notifications page")?;

    let batch = decode_batch(page.notifications);
    let n = core.ingest(batch);

    if let Some(next) = page.links.iter().find_map(|l| since_from_link(&l.href)) {
        *cursor.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
    Ok(n)
}

async fn run(core: Arc<FeedCore>, cursor: Arc<Mutex<String>>, mut stop: watch::Receiver<bool>) {
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
        match poll_cycle(&core, &cursor).await {
            Ok(n) => {
                core.set_connected(true);
                if n > 0 {
                    tracing::debug!(feed = %core.name, ingested = n, "pulled notifications");
                }
            }
            Err(e) => {
                core.set_connected(false);
                counter!("feed_poll_errors_total", "feed" => core.name.clone()).increment(1);
                tracing::warn!(feed = %core.name, error = ?e, "notifications poll failed; skipping cycle");
            }
        }
    }
    core.set_connected(false);
    tracing::info!(feed = %core.name, "pull feed stopped");
}

impl Feed for PullFeed {
    fn core(&self) -> &FeedCore {
        &self.core
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Pull
    }

    fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let poller = tokio::spawn(run(self.core.clone(), self.cursor.clone(), rx.clone()));
        let purger = spawn_purger(self.core.clone(), rx);
        tracing::info!(feed = %self.core.name, url = %self.core.base_url, "pull feed started");
        *running = Some(Running {
            stop: tx,
            tasks: vec![poller, purger],
        });
    }

    fn stop(&self) {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(r) = taken {
            r.signal_stop();
        }
    }
}

impl Drop for PullFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
