//! Shared Output Sinks
//!
//! Collects the stdout/stderr of every patch command in one place, so output
//! from different nodes interleaves in the order the commands ran. Each line
//! is also mirrored to `tracing`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Output stream a line was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A captured line of command output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    /// Node or cluster that produced the line
    pub source: String,
    pub stream: Stream,
    pub line: String,
    pub at: DateTime<Utc>,
}

/// Cloneable handle to one shared output buffer
#[derive(Debug, Clone, Default)]
pub struct OutputSinks {
    lines: Arc<Mutex<Vec<OutputLine>>>,
}

impl OutputSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record stdout text
    pub fn stdout(&self, source: &str, text: &str) {
        self.record(source, Stream::Stdout, text);
    }

    /// Record stderr text
    pub fn stderr(&self, source: &str, text: &str) {
        self.record(source, Stream::Stderr, text);
    }

    fn record(&self, source: &str, stream: Stream, text: &str) {
        let mut lines = self.lines.lock();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match stream {
                Stream::Stdout => debug!(source, "{}", line),
                Stream::Stderr => warn!(source, "{}", line),
            }
            lines.push(OutputLine {
                source: source.to_string(),
                stream,
                line: line.to_string(),
                at: Utc::now(),
            });
        }
    }

    /// Snapshot of everything captured so far
    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().clone()
    }

    /// Lines captured from one source
    pub fn for_source(&self, source: &str) -> Vec<OutputLine> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.source == source)
            .cloned()
            .collect()
    }

    /// Last stderr line of a source, used in error messages
    pub fn last_error(&self, source: &str) -> Option<String> {
        self.lines
            .lock()
            .iter()
            .rev()
            .find(|l| l.source == source && l.stream == Stream::Stderr)
            .map(|l| l.line.clone())
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Whether two handles write to the same buffer
    pub fn same_sink(&self, other: &OutputSinks) -> bool {
        Arc::ptr_eq(&self.lines, &other.lines)
    }
}
