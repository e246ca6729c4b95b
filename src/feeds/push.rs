// src/feeds/push.rs
use anyhow::{anyhow, bail, Context, Result};
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use super::{decode_batch, spawn_purger, Feed, FeedCore, FeedKind, NotificationDto, Running};

/// What a single streamed line turned out to be.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Heartbeat,
    Batch(usize),
    Ignored,
}

/// Longest partial line kept while waiting for its `\n`.
const MAX_PENDING_LINE: usize = 1024 * 1024;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Long-lived streaming subscription that reconnects on its own.
pub struct PushFeed {
    core: Arc<FeedCore>,
    reconnect_delay: Duration,
    idle_timeout: Duration,
    connections: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
}

impl PushFeed {
    pub fn new(core: FeedCore, reconnect_delay: Duration) -> Self {
        Self {
            core: Arc::new(core),
            reconnect_delay,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connections: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// Silence allowed on connect and between chunks before reconnecting.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Successful (200) connections opened so far.
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }
}

/// Decode one `data: [...]` line into the ledger.
fn handle_line(core: &FeedCore, line: &str) -> Frame {
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return Frame::Ignored;
    };
    let payload = payload.trim();
    match serde_json::from_str::<Vec<NotificationDto>>(payload) {
        Ok(dtos) if dtos.is_empty() => Frame::Heartbeat,
        Ok(dtos) => Frame::Batch(core.ingest(decode_batch(dtos))),
        Err(e) => {
            tracing::warn!(feed = %core.name, error = %e, "undecodable push frame dropped");
            Frame::Ignored
        }
    }
}

async fn stream_once(
    core: &FeedCore,
    connections: &AtomicU64,
    idle_timeout: Duration,
    stop: &mut watch::Receiver<bool>,
) -> Result<()> {
    let mut resp = timeout(idle_timeout, core.get(&core.base_url).send())
        .await
        .map_err(|_| anyhow!("no response from {} within {idle_timeout:?}", core.base_url))?
        .with_context(|| format!("connecting to {}", core.base_url))?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        bail!("push endpoint returned {status}");
    }
    core.set_connected(true);
    connections.fetch_add(1, Ordering::Relaxed);
    tracing::info!(feed = %core.name, "push stream connected");

    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = tokio::select! {
            chunk = timeout(idle_timeout, resp.chunk()) => chunk
                .map_err(|_| anyhow!("push stream silent for {idle_timeout:?}"))?
                .context("reading push stream")?,
            _ = stop.changed() => return Ok(()),
        };
        let Some(chunk) = chunk else { break };
        buf.extend_from_slice(&chunk);
        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            if let Frame::Batch(n) = handle_line(core, &String::from_utf8_lossy(&line)) {
                tracing::debug!(feed = %core.name, ingested = n, "pushed notifications");
            }
        }
        if buf.len() > MAX_PENDING_LINE {
            tracing::warn!(feed = %core.name, pending = buf.len(), "push line too long; dropping stream");
            bail!("push line exceeded {MAX_PENDING_LINE} bytes");
        }
    }
    Ok(())
}

async fn run(
    core: Arc<FeedCore>,
    connections: Arc<AtomicU64>,
    reconnect_delay: Duration,
    idle_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        match stream_once(&core, &connections, idle_timeout, &mut stop).await {
            Ok(()) => tracing::info!(feed = %core.name, "push stream ended"),
            Err(e) => tracing::warn!(feed = %core.name, error = ?e, "push stream failed"),
        }
        core.set_connected(false);
        if *stop.borrow() {
            break;
        }
        counter!("push_feed_reconnects_total", "feed" => core.name.clone()).increment(1);
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = stop.changed() => {}
        }
    }
    tracing::info!(feed = %core.name, "push feed stopped");
}

impl Feed for PushFeed {
    fn core(&self) -> &FeedCore {
        &self.core
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Push
    }

    fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let reader = tokio::spawn(run(
            self.core.clone(),
            self.connections.clone(),
            self.reconnect_delay,
            self.idle_timeout,
            rx.clone(),
        ));
        let purger = spawn_purger(self.core.clone(), rx);
        tracing::info!(feed = %self.core.name, url = %self.core.base_url, "push feed started");
        *running = Some(Running {
            stop: tx,
            tasks: vec![reader, purger],
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

impl Drop for PushFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
