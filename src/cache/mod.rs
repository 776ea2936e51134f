//! Per-buffer statement cache
//!
//! The cache owns one entry per registered buffer. An entry holds the buffer
//! source, the last [`BufferSnapshot`] built from it and the time of the most
//! recent unhandled change notification.
//!
//! Change notifications are debounced: [`StatementCache::poll`] rebuilds only
//! the buffers whose quiet period has elapsed. [`StatementCache::get_or_build`]
//! never waits; a missing or stale snapshot is rebuilt on the spot. Validity is
//! decided purely by revision equality.

mod buffer;
mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::SqlScopeError;

pub use buffer::{BufferSource, InMemoryBuffer};
pub use snapshot::{clause_at, BufferSnapshot};

struct CacheEntry {
    source: Arc<dyn BufferSource>,
    snapshot: Option<Arc<BufferSnapshot>>,
    pending_since: Option<Instant>,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|s| s.revision == self.source.current_revision())
    }
}

/// Map of buffer id to its latest snapshot.
pub struct StatementCache {
    entries: HashMap<String, CacheEntry>,
    debounce: Duration,
    max_scope_depth: usize,
}

impl StatementCache {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            entries: HashMap::new(),
            debounce: config.debounce(),
            max_scope_depth: config.max_scope_depth,
        }
    }

    /// Start tracking a buffer. Re-registering replaces the old source.
    pub fn register(&mut self, buffer_id: impl Into<String>, source: Arc<dyn BufferSource>) {
        let buffer_id = buffer_id.into();
        debug!(buffer = %buffer_id, "registered buffer");
        self.entries.insert(
            buffer_id,
            CacheEntry {
                source,
                snapshot: None,
                pending_since: None,
            },
        );
    }

    pub fn unregister(&mut self, buffer_id: &str) -> bool {
        self.entries.remove(buffer_id).is_some()
    }

    pub fn contains(&self, buffer_id: &str) -> bool {
        self.entries.contains_key(buffer_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an edit. Each notification restarts the buffer's quiet period.
    pub fn notify_change(&mut self, buffer_id: &str, now: Instant) -> Result<(), SqlScopeError> {
        let entry = self.entry_mut(buffer_id)?;
        entry.pending_since = Some(now);
        trace!(buffer = buffer_id, "change notification");
        Ok(())
    }

    /// Rebuild every buffer whose quiet period has elapsed by `now`.
    ///
    /// Returns the ids that were actually reparsed; a buffer whose revision
    /// did not move keeps its snapshot.
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        let mut rebuilt = Vec::new();
        for (buffer_id, entry) in self.entries.iter_mut() {
            let Some(since) = entry.pending_since else {
                continue;
            };
            if now.saturating_duration_since(since) < self.debounce {
                continue;
            }
            entry.pending_since = None;
            if entry.is_fresh() {
                trace!(buffer = %buffer_id, "debounced change without new revision");
                continue;
            }
            rebuild(buffer_id, entry, self.max_scope_depth);
            rebuilt.push(buffer_id.clone());
        }
        rebuilt.sort();
        rebuilt
    }

    /// Current snapshot, rebuilding synchronously when missing or stale.
    pub fn get_or_build(&mut self, buffer_id: &str) -> Result<Arc<BufferSnapshot>, SqlScopeError> {
        let max_scope_depth = self.max_scope_depth;
        let entry = self.entry_mut(buffer_id)?;
        if entry.is_fresh() {
            if let Some(snapshot) = &entry.snapshot {
                trace!(buffer = buffer_id, revision = snapshot.revision, "cache hit");
                return Ok(Arc::clone(snapshot));
            }
        }
        debug!(buffer = buffer_id, "cache miss");
        entry.pending_since = None;
        Ok(rebuild(buffer_id, entry, max_scope_depth))
    }

    /// Last snapshot built for a buffer, without checking its revision.
    pub fn cached(&self, buffer_id: &str) -> Option<Arc<BufferSnapshot>> {
        self.entries
            .get(buffer_id)
            .and_then(|entry| entry.snapshot.clone())
    }

    /// Drop the cached snapshot; the next lookup reparses.
    pub fn invalidate(&mut self, buffer_id: &str) -> bool {
        match self.entries.get_mut(buffer_id) {
            Some(entry) => entry.snapshot.take().is_some(),
            None => false,
        }
    }

    fn entry_mut(&mut self, buffer_id: &str) -> Result<&mut CacheEntry, SqlScopeError> {
        self.entries
            .get_mut(buffer_id)
            .ok_or_else(|| SqlScopeError::UnknownBuffer {
                buffer_id: buffer_id.to_string(),
            })
    }
}

fn rebuild(buffer_id: &str, entry: &mut CacheEntry, max_scope_depth: usize) -> Arc<BufferSnapshot> {
    let started = Instant::now();
    let revision = entry.source.current_revision();
    let text = entry.source.text();
    let snapshot = Arc::new(BufferSnapshot::build(revision, text, max_scope_depth));
    debug!(
        buffer = buffer_id,
        revision,
        chunks = snapshot.chunks.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "rebuilt statement cache"
    );
    entry.snapshot = Some(Arc::clone(&snapshot));
    snapshot
}
