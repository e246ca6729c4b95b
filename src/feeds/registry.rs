// src/feeds/registry.rs
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{create_feed, Feed, FeedKind, FeedSettings};
use crate::checks::CheckKind;
use crate::model::{Environment, MetricConfig};

type FeedMap = HashMap<String, HashMap<String, Arc<dyn Feed>>>;

/// Running feeds keyed by environment name, then feed alias.
///
/// Owned by the process root and handed to the scheduler and API; clones
/// share the same map.
#[derive(Clone, Default)]
pub struct FeedRegistry {
    inner: Arc<RwLock<FeedMap>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedStatus {
    pub environment: String,
    pub alias: String,
    pub kind: FeedKind,
    pub connected: bool,
    pub tracked_ids: usize,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, environment: &str, alias: &str) -> Option<Arc<dyn Feed>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(environment)?.get(alias).cloned()
    }

    /// Register `feed`; a feed previously under the same key is stopped.
    pub fn insert(&self, environment: &str, alias: &str, feed: Arc<dyn Feed>) {
        let previous = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            guard
                .entry(environment.to_string())
                .or_default()
                .insert(alias.to_string(), feed)
        };
        if let Some(old) = previous {
            old.stop();
        }
    }

    /// Stop and forget every feed of `environment`. Returns how many were removed.
    pub fn remove_environment(&self, environment: &str) -> usize {
        let removed = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            guard.remove(environment)
        };
        let Some(feeds) = removed else {
            return 0;
        };
        for feed in feeds.values() {
            feed.stop();
        }
        tracing::info!(environment, feeds = feeds.len(), "environment feeds removed");
        feeds.len()
    }

    /// (Re)build and start the feeds `environment` needs for the notification
    /// metrics in `metrics`. Feeds that fail to build are logged and skipped.
    pub fn sync_environment(
        &self,
        environment: &Environment,
        metrics: &[MetricConfig],
        settings: &FeedSettings,
    ) -> usize {
        self.remove_environment(&environment.name);
        let mut started = 0usize;
        for metric in metrics {
            if CheckKind::from_alias(&metric.alias) != Some(CheckKind::Notifications) {
                continue;
            }
            let alias = metric.feed_alias();
            let url = environment.url_for(&metric.endpoint);
            match create_feed(
                alias,
                &url,
                metric.threshold_seconds,
                metric.granularity,
                environment.credentials(),
                settings,
            ) {
                Ok(feed) => {
                    feed.start();
                    self.insert(&environment.name, alias, feed);
                    started += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        environment = %environment.name,
                        alias,
                        error = ?e,
                        "feed not created"
                    );
                }
            }
        }
        started
    }

    /// Rotate credentials on every feed of `environment` without restarting.
    pub fn set_credentials(&self, environment: &str, username: &str, password: &str) {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(feeds) = guard.get(environment) {
            for feed in feeds.values() {
                feed.set_credentials(username, password);
            }
        }
    }

    pub fn stop_all(&self) {
        let drained: Vec<_> = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            guard.drain().collect()
        };
        for (_, feeds) in drained {
            for feed in feeds.values() {
                feed.stop();
            }
        }
    }

    pub fn snapshot(&self) -> Vec<FeedStatus> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<FeedStatus> = guard
            .iter()
            .flat_map(|(env, feeds)| {
                feeds.iter().map(move |(alias, feed)| FeedStatus {
                    environment: env.clone(),
                    alias: alias.clone(),
                    kind: feed.kind(),
                    connected: feed.is_connected(),
                    tracked_ids: feed.core().ledger.tracked_ids(),
                })
            })
            .collect();
        out.sort_by(|a, b| (&a.environment, &a.alias).cmp(&(&b.environment, &b.alias)));
        out
    }
}
