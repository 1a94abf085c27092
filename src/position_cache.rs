//! Memoized match positions for the live snapshot
//!
//! Entries are only valid for one [`SnapshotId`]. Seeing a different id
//! drops the whole store, so a position measured against old text can
//! never be served for new text.

use crate::coordinates::Position;
use crate::snapshot::{SnapshotId, TextSnapshot};
use ahash::AHashMap;
use std::sync::Arc;

/// Entry count above which the oldest half is evicted
pub const DEFAULT_THRESHOLD: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Wholesale clears caused by a snapshot change or `clear()`
    pub clears: u64,
    /// Entries dropped by size-triggered eviction
    pub evicted: u64,
}

struct Entry {
    position: Arc<Position>,
    /// Insertion order, for most-recent-half eviction
    seq: u64,
}

pub struct PositionCache {
    snapshot: Option<SnapshotId>,
    entries: AHashMap<(usize, Arc<str>), Entry>,
    next_seq: u64,
    threshold: usize,
    stats: CacheStats,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            snapshot: None,
            entries: AHashMap::new(),
            next_seq: 0,
            threshold: threshold.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Cached position of `text` at `start`, if measured against this snapshot
    pub fn get(&mut self, snapshot: &TextSnapshot, start: usize, text: &Arc<str>) -> Option<Arc<Position>> {
        if self.snapshot != Some(snapshot.id()) {
            self.rescope(snapshot.id());
            self.stats.misses += 1;
            return None;
        }

        match self.entries.get(&(start, text.clone())) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry.position.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a position; returns the shared handle callers should keep
    pub fn set(
        &mut self,
        snapshot: &TextSnapshot,
        start: usize,
        text: &Arc<str>,
        position: Position,
    ) -> Arc<Position> {
        if self.snapshot != Some(snapshot.id()) {
            self.rescope(snapshot.id());
        }

        let position = Arc::new(position);
        self.entries.insert(
            (start, text.clone()),
            Entry {
                position: position.clone(),
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;

        if self.entries.len() > self.threshold {
            self.evict_oldest_half();
        }
        position
    }

    /// Drop everything, including the snapshot scope
    pub fn clear(&mut self) {
        if !self.entries.is_empty() || self.snapshot.is_some() {
            self.stats.clears += 1;
        }
        self.entries.clear();
        self.snapshot = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot_id(&self) -> Option<SnapshotId> {
        self.snapshot
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn rescope(&mut self, id: SnapshotId) {
        if !self.entries.is_empty() {
            tracing::trace!(dropped = self.entries.len(), "position cache rescoped to new snapshot");
            self.stats.clears += 1;
        }
        self.entries.clear();
        self.snapshot = Some(id);
    }

    fn evict_oldest_half(&mut self) {
        let mut seqs: Vec<u64> = self.entries.values().map(|e| e.seq).collect();
        seqs.sort_unstable();
        let cutoff = seqs[seqs.len() / 2];

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.seq >= cutoff);
        let evicted = before - self.entries.len();
        self.stats.evicted += evicted as u64;
        tracing::debug!(evicted, kept = self.entries.len(), "position cache evicted oldest entries");
    }
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new()
    }
}
