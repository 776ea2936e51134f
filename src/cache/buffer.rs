//! Buffer text sources

use std::sync::RwLock;

/// Where the cache reads buffer text from.
///
/// Lines are 0-based and `end` is exclusive; implementations clamp
/// out-of-range requests instead of failing.
pub trait BufferSource: Send + Sync {
    fn get_lines(&self, start: usize, end: usize) -> String;

    /// Monotonic counter bumped on every edit.
    fn current_revision(&self) -> u64;

    fn line_count(&self) -> usize;

    /// The whole buffer.
    fn text(&self) -> String {
        self.get_lines(0, self.line_count())
    }
}

#[derive(Debug, Default)]
struct BufferState {
    lines: Vec<String>,
    revision: u64,
}

/// A buffer held in memory, for hosts without their own text store and for tests.
#[derive(Debug, Default)]
pub struct InMemoryBuffer {
    state: RwLock<BufferState>,
}

impl InMemoryBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            state: RwLock::new(BufferState {
                lines: split_lines(text),
                revision: 1,
            }),
        }
    }

    /// Replace the whole text.
    pub fn set_text(&self, text: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.lines = split_lines(text);
        state.revision += 1;
    }

    /// Replace a single 0-based line, appending empty lines as needed.
    pub fn set_line(&self, index: usize, text: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.lines.len() <= index {
            state.lines.resize(index + 1, String::new());
        }
        state.lines[index] = text.to_string();
        state.revision += 1;
    }
}

impl BufferSource for InMemoryBuffer {
    fn get_lines(&self, start: usize, end: usize) -> String {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let end = end.min(state.lines.len());
        let start = start.min(end);
        state.lines[start..end].join("\n")
    }

    fn current_revision(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).revision
    }

    fn line_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).lines.len()
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
