//! BuildScope event model
//!
//! Defines the typed build event stream and the summary record built from it:
//! - InvocationEvent / Payload: one lifecycle event from the build tool
//! - File: artifact reference (URI or inline contents)
//! - CommandLine: structured command line with parsed options
//! - Invocation: the canonical per-invocation summary
//!
//! Payload kinds unknown to this version decode to `Payload::Unknown`, body kept.

pub mod command_line;
pub mod error;
pub mod events;
pub mod invocation;

pub use command_line::{
    ChunkList, CommandLine, CommandLineOption, CommandLineSection, OptionList, SectionType,
};
pub use error::{BuildscopeError, Result};
pub use events::{
    ActionExecuted, BuildEvent, BuildFinished, BuildMetadata, BuildStarted, ExitCode, File,
    FileLocator, InvocationEvent, NamedSetOfFiles, NamedSetOfFilesId, OptionsParsed, Payload,
    Progress, TargetComplete, TestResult, TestStatus, TestSummary, UnknownPayload,
    UnstructuredCommandLine, WorkspaceStatus, WorkspaceStatusItem,
};
pub use invocation::{Invocation, InvocationStatus};

/// BuildScope event model version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
