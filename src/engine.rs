//! Completion engine facade: cache, detector and metadata behind one API

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::{BufferSnapshot, BufferSource, StatementCache};
use crate::config::EngineConfig;
use crate::context::{Context, ContextDetector, ContextRequest};
use crate::error::SqlScopeError;
use crate::model::Position;
use crate::provider::{candidate_columns, MetadataProvider, StaticMetadata};

/// Owns the per-buffer cache and answers cursor queries.
///
/// All mutation goes through `&mut self`; hosts that share an engine across
/// threads wrap it in a mutex.
pub struct CompletionEngine {
    config: EngineConfig,
    cache: StatementCache,
    detector: ContextDetector,
    metadata: Arc<dyn MetadataProvider>,
}

impl CompletionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_metadata(config, Arc::new(StaticMetadata::new()))
    }

    pub fn with_metadata(config: EngineConfig, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            cache: StatementCache::new(&config),
            detector: ContextDetector::new(&config),
            config,
            metadata,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub fn open(&mut self, buffer_id: impl Into<String>, source: Arc<dyn BufferSource>) {
        self.cache.register(buffer_id, source);
    }

    pub fn close(&mut self, buffer_id: &str) -> bool {
        self.cache.unregister(buffer_id)
    }

    pub fn notify_change(&mut self, buffer_id: &str, now: Instant) -> Result<(), SqlScopeError> {
        self.cache.notify_change(buffer_id, now)
    }

    /// Fire debounced reparses; returns the rebuilt buffer ids.
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        self.cache.poll(now)
    }

    pub fn get_or_build_cache(
        &mut self,
        buffer_id: &str,
    ) -> Result<Arc<BufferSnapshot>, SqlScopeError> {
        self.cache.get_or_build(buffer_id)
    }

    pub fn invalidate(&mut self, buffer_id: &str) -> bool {
        self.cache.invalidate(buffer_id)
    }

    /// Classify the cursor at 1-based `(line, col)`.
    ///
    /// Fails only for a buffer that was never opened.
    pub fn context_at(
        &mut self,
        buffer_id: &str,
        line: usize,
        col: usize,
    ) -> Result<Context, SqlScopeError> {
        let snapshot = self.cache.get_or_build(buffer_id)?;
        let ctx = detect(
            &snapshot,
            Position::new(line, col),
            &self.config,
            &self.detector,
            self.metadata.as_ref(),
        );
        debug!(
            buffer = buffer_id,
            line,
            col,
            context_type = ?ctx.context_type,
            mode = ?ctx.mode,
            "context_at"
        );
        Ok(ctx)
    }

    /// Column candidates for the cursor, empty unless it is in a column position.
    pub fn column_candidates(
        &mut self,
        buffer_id: &str,
        line: usize,
        col: usize,
    ) -> Result<Vec<String>, SqlScopeError> {
        let snapshot = self.cache.get_or_build(buffer_id)?;
        let ctx = detect(
            &snapshot,
            Position::new(line, col),
            &self.config,
            &self.detector,
            self.metadata.as_ref(),
        );
        Ok(candidate_columns(&ctx, &snapshot, self.metadata.as_ref()))
    }
}

fn detect(
    snapshot: &BufferSnapshot,
    position: Position,
    config: &EngineConfig,
    detector: &ContextDetector,
    metadata: &dyn MetadataProvider,
) -> Context {
    let req = ContextRequest::new(snapshot, position, config, metadata);
    detector.detect(&req)
}

/// One-shot context detection over a text, without a cache.
pub fn context_for_text(
    text: &str,
    line: usize,
    col: usize,
    config: &EngineConfig,
    metadata: &dyn MetadataProvider,
) -> Context {
    let snapshot = BufferSnapshot::build(0, text.to_string(), config.max_scope_depth);
    let detector = ContextDetector::new(config);
    detect(&snapshot, Position::new(line, col), config, &detector, metadata)
}
