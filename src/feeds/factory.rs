// src/feeds/factory.rs
use anyhow::{Context, Result};
use std::sync::Arc;

use super::{build_client, pull::PullFeed, push::PushFeed, Feed, FeedCore, FeedKind, FeedSettings, FeedTiming};
use crate::model::Credentials;

/// Build (but do not start) the feed behind `alias`.
///
/// The kind is picked from the alias; timing comes from the owning metric's SLA.
pub fn create_feed(
    alias: &str,
    base_url: &str,
    threshold_seconds: u64,
    granularity: u64,
    credentials: Option<Credentials>,
    settings: &FeedSettings,
) -> Result<Arc<dyn Feed>> {
    let timing = FeedTiming::for_sla(threshold_seconds, granularity)
        .with_context(|| format!("feed `{alias}`"))?;
    reqwest::Url::parse(base_url).with_context(|| format!("feed `{alias}` url `{base_url}`"))?;

    let feed: Arc<dyn Feed> = match FeedKind::from_alias(alias) {
        FeedKind::Pull => {
            let client = build_client(settings, true)?;
            Arc::new(PullFeed::new(FeedCore::new(alias, base_url, timing, credentials, client)))
        }
        FeedKind::Push => {
            // Streaming connection: no total request timeout, only the idle window.
            let client = build_client(settings, false)?;
            Arc::new(
                PushFeed::new(
                    FeedCore::new(alias, base_url, timing, credentials, client),
                    settings.reconnect_delay,
                )
                .with_idle_timeout(settings.push_idle_timeout),
            )
        }
    };
    Ok(feed)
}
