//! Immutable captures of the text buffer
//!
//! Every text change produces a new [`TextSnapshot`] with a fresh
//! [`SnapshotId`]; anything derived from a snapshot is keyed by that id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic id source shared by every engine in the process
static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one captured text state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

impl SnapshotId {
    fn next() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Full text content plus identity
#[derive(Clone, Debug)]
pub struct TextSnapshot {
    id: SnapshotId,
    text: Arc<str>,
}

impl TextSnapshot {
    /// Capture text under a brand new identity
    pub fn capture(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: SnapshotId::next(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether `text` is what this snapshot captured
    pub fn matches_text(&self, text: &Arc<str>) -> bool {
        Arc::ptr_eq(&self.text, text) || *self.text == **text
    }
}
