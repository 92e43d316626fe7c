//! The Invocation summary record
//!
//! One `Invocation` summarises one build/test run. Identity fields are set by
//! whoever drives the event stream; everything else is filled in from the
//! stream when it is finalized.

use crate::events::{ExitCode, InvocationEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an invocation as seen by the ingesting service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    #[default]
    Unknown,
    /// Stream still open; more events may follow
    Partial,
    /// Stream ended with its final event
    Complete,
    /// Producer went away before the final event
    Disconnected,
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationStatus::Unknown => write!(f, "unknown"),
            InvocationStatus::Partial => write!(f, "partial"),
            InvocationStatus::Complete => write!(f, "complete"),
            InvocationStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl std::str::FromStr for InvocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(InvocationStatus::Unknown),
            "partial" => Ok(InvocationStatus::Partial),
            "complete" => Ok(InvocationStatus::Complete),
            "disconnected" => Ok(InvocationStatus::Disconnected),
            other => Err(format!("unknown invocation status: {other}")),
        }
    }
}

/// Canonical summary of one build/test invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invocation {
    /// Caller-assigned identity; never derived from the stream
    pub invocation_id: String,

    /// Caller-assigned status; never derived from the stream
    pub invocation_status: InvocationStatus,

    /// Every event of the stream after redaction, in arrival order. Payloads
    /// of unknown kinds are kept as received.
    pub events: Vec<InvocationEvent>,

    /// `BUILD_USER` from workspace status
    pub user: String,

    /// `BUILD_HOST` from workspace status
    pub host: String,

    /// `ROLE` from build metadata (e.g. "CI")
    pub role: String,

    /// `REPO_URL` from build metadata, without userinfo credentials
    pub repo_url: String,

    /// Build tool command, e.g. "build" or "test"
    pub command: String,

    pub build_tool_version: String,

    /// Concatenated stderr/stdout of all progress events
    pub console_buffer: String,

    pub success: bool,

    pub exit_code: Option<ExitCode>,

    pub started_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in microseconds; `None` when the stream did not
    /// carry both a start and a finish time
    pub duration_usec: Option<i64>,

    pub action_count: u64,
}

impl Invocation {
    /// A fresh record carrying only caller identity.
    pub fn new(invocation_id: impl Into<String>, invocation_status: InvocationStatus) -> Self {
        Invocation {
            invocation_id: invocation_id.into(),
            invocation_status,
            ..Default::default()
        }
    }

    /// True when the stream carried both a start and a finish time.
    pub fn has_complete_timing(&self) -> bool {
        self.duration_usec.is_some()
    }
}
