//! Offline action queue held by the resilience heartbeat.
//!
//! Capacity comes from the device profile. Entries leave when the sync
//! endpoint acknowledges their ids, or oldest-first once the queue is full.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// An action captured while offline, replayed to the sync endpoint on recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineQueueEntry {
    pub id: String,
    pub payload: serde_json::Value,
    pub enqueued_at_ms: i64,
}

impl OfflineQueueEntry {
    pub fn new(payload: serde_json::Value, enqueued_at_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            enqueued_at_ms,
        }
    }
}

/// Bounded FIFO; pushing past capacity evicts the oldest entry
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    entries: VecDeque<OfflineQueueEntry>,
    capacity: usize,
}

impl OfflineQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the evicted entry, if any
    pub fn push(&mut self, entry: OfflineQueueEntry) -> Option<OfflineQueueEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Restores persisted entries in order, keeping capacity
    pub fn extend(&mut self, entries: impl IntoIterator<Item = OfflineQueueEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn snapshot(&self) -> Vec<OfflineQueueEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Drops the entries that were acknowledged by the server. Entries queued
    /// after the snapshot was taken stay.
    pub fn acknowledge(&mut self, ids: &[String]) {
        self.entries.retain(|e| !ids.contains(&e.id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
