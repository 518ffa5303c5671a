//! Bounded output capture for supervised processes.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which stdio stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// One captured line of child output, newline trimmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub text: String,
}

impl LogEntry {
    pub fn new(stream: LogStream, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            text: text.into(),
        }
    }
}

/// Ring buffer for captured output.
///
/// When an append pushes the buffer past [`Self::CAPACITY`] entries it is
/// trimmed to the most recent [`Self::RETAIN`], so a chatty process settles
/// into a bounded window instead of trimming on every line.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    /// Appends allowed before a trim kicks in.
    pub const CAPACITY: usize = 1000;
    /// Entries kept after a trim.
    pub const RETAIN: usize = 500;

    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, trimming to the retention window when the buffer
    /// exceeds capacity.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        if self.entries.len() > Self::CAPACITY {
            let excess = self.entries.len() - Self::RETAIN;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of the buffer, oldest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> LogEntry {
        LogEntry::new(LogStream::Stdout, format!("line {n}"))
    }

    #[test]
    fn keeps_everything_up_to_capacity() {
        let mut buf = LogBuffer::new();
        for n in 0..LogBuffer::CAPACITY {
            buf.push(line(n));
        }
        assert_eq!(buf.len(), LogBuffer::CAPACITY);
    }

    #[test]
    fn overflow_trims_to_most_recent_retain() {
        let mut buf = LogBuffer::new();
        for n in 0..=LogBuffer::CAPACITY {
            buf.push(line(n));
        }
        assert_eq!(buf.len(), LogBuffer::RETAIN);
        let entries = buf.to_vec();
        // newest entry survives at the end of the window
        assert_eq!(entries.last().unwrap().text, "line 1000");
        assert_eq!(entries.first().unwrap().text, "line 501");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buf = LogBuffer::new();
        buf.push(line(0));
        assert!(!buf.is_empty());
        buf.clear();
        assert!(buf.is_empty());
    }
}
