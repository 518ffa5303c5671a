//! Process lifecycle events broadcast by the supervisor.
//!
//! One tagged union on a `tokio::sync::broadcast` bus replaces per-process
//! callback wiring: the orchestrators subscribe to attribute output and
//! react to exits, and a CLI session subscribes to stream output live.
//!
//! # Wire Format
//!
//! Events serialize with a `type` tag:
//!
//! ```json
//! { "type": "exited", "pid": 4242, "info": { "code": 0, "forced": false } }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::LogEntry;

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitInfo {
    /// Exit code when the OS reported one (`None` for signal deaths).
    pub code: Option<i32>,
    /// Whether the exit followed a force-kill.
    pub forced: bool,
}

impl ExitInfo {
    /// A voluntary, zero-code exit.
    pub const fn is_clean(self) -> bool {
        matches!(self.code, Some(0)) && !self.forced
    }

    /// Human-readable description for status output and error messages.
    pub fn describe(self) -> String {
        match (self.code, self.forced) {
            (_, true) => "force-killed".to_string(),
            (Some(code), false) => format!("exited with code {code}"),
            (None, false) => "terminated by signal".to_string(),
        }
    }
}

/// Everything the supervisor announces about its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    /// A child process is up and registered.
    Started { pid: u32 },

    /// A graceful stop was requested for the process.
    Stopping { pid: u32 },

    /// One line of child output.
    Output { pid: u32, entry: LogEntry },

    /// The process is gone; it has already left the registry.
    Exited { pid: u32, info: ExitInfo },

    /// The child failed after spawn (I/O error on wait or its streams).
    Error { pid: u32, message: String },
}

impl ProcessEvent {
    /// The pid the event is about.
    pub const fn pid(&self) -> u32 {
        match self {
            Self::Started { pid }
            | Self::Stopping { pid }
            | Self::Output { pid, .. }
            | Self::Exited { pid, .. }
            | Self::Error { pid, .. } => *pid,
        }
    }

    /// Stable event name for log output.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "process:started",
            Self::Stopping { .. } => "process:stopping",
            Self::Output { .. } => "process:output",
            Self::Exited { .. } => "process:exited",
            Self::Error { .. } => "process:error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = ProcessEvent::Exited {
            pid: 4242,
            info: ExitInfo {
                code: Some(0),
                forced: false,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"exited\""));
        assert!(json.contains("\"pid\":4242"));
        assert!(json.contains("\"code\":0"));
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(
            ProcessEvent::Started { pid: 1 }.event_name(),
            "process:started"
        );
        assert_eq!(
            ProcessEvent::Error {
                pid: 1,
                message: String::new()
            }
            .event_name(),
            "process:error"
        );
    }

    #[test]
    fn exit_descriptions() {
        let clean = ExitInfo {
            code: Some(0),
            forced: false,
        };
        assert!(clean.is_clean());
        assert_eq!(clean.describe(), "exited with code 0");

        let crashed = ExitInfo {
            code: Some(1),
            forced: false,
        };
        assert!(!crashed.is_clean());
        assert_eq!(crashed.describe(), "exited with code 1");

        let signalled = ExitInfo {
            code: None,
            forced: false,
        };
        assert_eq!(signalled.describe(), "terminated by signal");

        let killed = ExitInfo {
            code: None,
            forced: true,
        };
        assert!(!killed.is_clean());
        assert_eq!(killed.describe(), "force-killed");
    }
}
