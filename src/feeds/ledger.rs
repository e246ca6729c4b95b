//! # Notification Ledger
//! Per-feed history of notifications keyed by content identifier.
//!
//! One writer (the owning feed's ingest path and its purger) and many
//! readers (notification checks). Entries are kept in arrival order per id
//! and dropped once their `lastModified` falls out of the expiry window.
//! An entry whose `lastModified` cannot be parsed ages from its arrival
//! instead, so a matching reference stays visible for a full window.

use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use super::Notification;

#[derive(Debug, Clone)]
struct Stored {
    notification: Notification,
    received_at: DateTime<Utc>,
}

impl Stored {
    fn aged_at(&self) -> DateTime<Utc> {
        self.notification
            .last_modified_at()
            .unwrap_or(self.received_at)
    }
}

#[derive(Debug, Default)]
pub struct NotificationLedger {
    entries: RwLock<HashMap<String, Vec<Stored>>>,
}

impl NotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, notification: Notification) {
        self.append_all(std::iter::once(notification));
    }

    /// Append a decoded batch under a single write lock, so readers see
    /// either none or all of it.
    pub fn append_all<I>(&self, batch: I) -> usize
    where
        I: IntoIterator<Item = Notification>,
    {
        let received_at = Utc::now();
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut n = 0usize;
        for notification in batch {
            guard
                .entry(notification.id.clone())
                .or_default()
                .push(Stored {
                    notification,
                    received_at,
                });
            n += 1;
        }
        n
    }

    /// Ordered (by arrival) copy of everything seen for `id`.
    pub fn notifications_for(&self, id: &str) -> Vec<Notification> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(id)
            .map(|history| history.iter().map(|s| s.notification.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of content identifiers currently tracked.
    pub fn tracked_ids(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop everything whose `lastModified` (or arrival, when unparsable)
    /// is before `cutoff`. Returns the number of removed notifications.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0usize;
        guard.retain(|_, history| {
            let before = history.len();
            history.retain(|s| s.aged_at() >= cutoff);
            removed += before - history.len();
            !history.is_empty()
        });
        removed
    }

    /// Purge relative to the wall clock.
    pub fn purge(&self, expiry: Duration) -> usize {
        let expiry = chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(expiry)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.purge_older_than(cutoff)
    }
}
