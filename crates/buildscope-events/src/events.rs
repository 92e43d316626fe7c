//! Build lifecycle events
//!
//! One build/test invocation emits an ordered stream of these events. Every
//! event carries exactly one payload; payload kinds this crate does not know
//! about decode to [`Payload::Unknown`], which keeps the raw payload body, so
//! older consumers keep working (and lose nothing) when the producer grows new
//! kinds.

use crate::command_line::CommandLine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// EVENT ENVELOPE
// ============================================================================

/// One event in an invocation's stream, as handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// Position of this event in the producer's stream
    #[serde(default)]
    pub sequence_number: i64,

    /// When the event was received, if the transport recorded it
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,

    pub build_event: BuildEvent,
}

impl InvocationEvent {
    pub fn new(sequence_number: i64, payload: Payload) -> Self {
        InvocationEvent {
            sequence_number,
            event_time: None,
            build_event: BuildEvent { payload },
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.build_event.payload
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    #[serde(with = "payload_serde")]
    pub payload: Payload,
}

/// Build event payload - exactly one variant per event.
///
/// Consumers in other crates must include a wildcard arm when matching;
/// new kinds are added here without touching existing ones.
///
/// Serialize through [`BuildEvent`]: `Unknown` is written back as its raw
/// body there and cannot be serialized on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Payload {
    /// Console output produced since the previous progress event
    Progress(Progress),

    /// The build tool accepted the command
    Started(BuildStarted),

    /// Raw argument vector as typed by the user
    UnstructuredCommandLine(UnstructuredCommandLine),

    /// Parsed command line, grouped into sections
    StructuredCommandLine(CommandLine),

    /// Effective options after rc-file expansion
    OptionsParsed(OptionsParsed),

    /// Key/value pairs from the workspace status command
    WorkspaceStatus(WorkspaceStatus),

    /// An action finished executing
    Action(ActionExecuted),

    /// A named set of output files
    NamedSetOfFiles(NamedSetOfFiles),

    /// A target finished building
    Completed(TargetComplete),

    /// One attempt of one test finished
    TestResult(TestResult),

    /// Aggregate result across all attempts of one test
    TestSummary(TestSummary),

    /// The build finished, successfully or not
    Finished(BuildFinished),

    /// User-supplied `--build_metadata` key/value pairs
    BuildMetadata(BuildMetadata),

    /// Any payload kind this version does not recognise, kept verbatim
    #[serde(skip)]
    Unknown(UnknownPayload),
}

impl Payload {
    /// Stable short name of the payload kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Progress(_) => "progress",
            Payload::Started(_) => "started",
            Payload::UnstructuredCommandLine(_) => "unstructured_command_line",
            Payload::StructuredCommandLine(_) => "structured_command_line",
            Payload::OptionsParsed(_) => "options_parsed",
            Payload::WorkspaceStatus(_) => "workspace_status",
            Payload::Action(_) => "action",
            Payload::NamedSetOfFiles(_) => "named_set_of_files",
            Payload::Completed(_) => "completed",
            Payload::TestResult(_) => "test_result",
            Payload::TestSummary(_) => "test_summary",
            Payload::Finished(_) => "finished",
            Payload::BuildMetadata(_) => "build_metadata",
            Payload::Unknown(_) => "unknown",
        }
    }

    /// Whether `tag` is the wire `type` of a payload kind this version decodes.
    pub fn is_known_kind(tag: &str) -> bool {
        KNOWN_KINDS.contains(&tag)
    }
}

/// Wire `type` tags of every typed payload variant.
const KNOWN_KINDS: &[&str] = &[
    "progress",
    "started",
    "unstructured_command_line",
    "structured_command_line",
    "options_parsed",
    "workspace_status",
    "action",
    "named_set_of_files",
    "completed",
    "test_result",
    "test_summary",
    "finished",
    "build_metadata",
];

/// Body of a payload whose kind is not known to this version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownPayload {
    /// The payload object exactly as received, `type` tag included
    pub raw: Value,
}

impl UnknownPayload {
    /// The producer's `type` tag, if the body carried one.
    pub fn kind(&self) -> Option<&str> {
        self.raw.get("type").and_then(Value::as_str)
    }
}

/// Payload (de)serialization that routes unknown kinds to [`UnknownPayload`]
/// and writes them back unchanged.
mod payload_serde {
    use super::{Payload, UnknownPayload};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(payload: &Payload, serializer: S) -> Result<S::Ok, S::Error> {
        match payload {
            Payload::Unknown(unknown) => unknown.raw.serialize(serializer),
            known => known.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Payload, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match raw.get("type").and_then(Value::as_str) {
            Some(tag) if !Payload::is_known_kind(tag) => {
                Ok(Payload::Unknown(UnknownPayload { raw }))
            }
            _ => Payload::deserialize(raw).map_err(D::Error::custom),
        }
    }
}

// ============================================================================
// ARTIFACT REFERENCES
// ============================================================================

/// A reference to a build artifact (log, output, test xml, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct File {
    /// Identifier of the file within its context (e.g. "stdout", "test.log")
    pub name: String,

    /// Path components to prepend to `name` to get the workspace-relative path
    pub path_prefix: Vec<String>,

    pub file: Option<FileLocator>,
}

impl File {
    /// A file located by URI.
    pub fn from_uri(name: impl Into<String>, uri: impl Into<String>) -> Self {
        File {
            name: name.into(),
            path_prefix: Vec::new(),
            file: Some(FileLocator::Uri(uri.into())),
        }
    }

    /// The URI locator, if this file is located by URI.
    pub fn uri(&self) -> Option<&str> {
        match &self.file {
            Some(FileLocator::Uri(uri)) => Some(uri),
            _ => None,
        }
    }
}

/// Where the bytes of a [`File`] live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileLocator {
    /// A URI such as `bytestream://host/blobs/<hash>/<size>`, possibly with a
    /// credential prefix (`<token>@...`) attached by the producer.
    Uri(String),

    /// Inline file contents
    Contents(Vec<u8>),
}

// ============================================================================
// PAYLOAD TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildStarted {
    pub uuid: String,
    pub start_time_millis: i64,
    pub build_tool_version: String,
    /// Human-readable options summary; may embed credential-bearing URIs
    pub options_description: String,
    pub command: String,
    pub working_directory: String,
    pub workspace_directory: String,
    pub server_pid: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnstructuredCommandLine {
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsParsed {
    pub startup_options: Vec<String>,
    pub explicit_startup_options: Vec<String>,
    pub cmd_line: Vec<String>,
    pub explicit_cmd_line: Vec<String>,
    pub tool_tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceStatus {
    pub item: Vec<WorkspaceStatusItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceStatusItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionExecuted {
    pub success: bool,
    /// Mnemonic of the action, e.g. "CppCompile"
    pub action_type: String,
    pub exit_code: i32,
    pub label: String,
    pub stdout: Option<File>,
    pub stderr: Option<File>,
    pub primary_output: Option<File>,
    pub action_metadata_logs: Vec<File>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedSetOfFiles {
    pub files: Vec<File>,
    /// Other sets transitively included in this one
    pub file_sets: Vec<NamedSetOfFilesId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedSetOfFilesId {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetComplete {
    pub success: bool,
    pub important_output: Vec<File>,
    pub tag: Vec<String>,
}

/// Outcome of a test attempt or a test summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    #[default]
    NoStatus,
    Passed,
    Flaky,
    Timeout,
    Failed,
    Incomplete,
    RemoteFailure,
    FailedToBuild,
    ToolHaltedBeforeTesting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResult {
    pub status: TestStatus,
    pub test_action_output: Vec<File>,
    pub cached_locally: bool,
    pub test_attempt_duration_millis: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSummary {
    pub overall_status: TestStatus,
    pub total_run_count: i32,
    pub passed: Vec<File>,
    pub failed: Vec<File>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildFinished {
    pub overall_success: bool,
    pub exit_code: Option<ExitCode>,
    pub finish_time_millis: i64,
}

/// Exit status of the build tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitCode {
    /// Symbolic name, e.g. "SUCCESS", "BUILD_FAILURE"
    pub name: String,
    pub code: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildMetadata {
    pub metadata: BTreeMap<String, String>,
}

// ============================================================================
// TESTS
// ============================================================================
