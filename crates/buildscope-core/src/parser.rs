//! Streaming fold of a build event stream into an [`Invocation`].
//!
//! Ingestion happens in two phases:
//!
//! 1. [`StreamingEventParser::parse_event`] folds each event into private
//!    state as it arrives. Anything that can be made safe immediately is:
//!    URI credential prefixes are stripped and progress text is moved into
//!    the console buffer. Environment-carrying options are only *recorded*,
//!    because the `ALLOW_ENV` policy that governs them may arrive later.
//! 2. [`StreamingEventParser::fill_invocation`] consumes the parser, masks
//!    every recorded option against the final allow-list, and moves the
//!    result into the caller's [`Invocation`].
//!
//! Events are taken by value. The processed (redacted) events come back to
//! the caller only through `Invocation::events`.

use buildscope_events::{
    CommandLine, CommandLineOption, ExitCode, Invocation, InvocationEvent, Payload,
};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::metrics::METRICS;
use crate::obs;
use crate::redact::{
    redact_env_option, strip_files, strip_optional_file, strip_uri_secret_in_place,
    strip_uri_secrets, strip_url_userinfo, EnvAllowList,
};

/// Build metadata key carrying the comma-separated env allow-list.
pub const ALLOW_ENV_KEY: &str = "ALLOW_ENV";
/// Build metadata key carrying the invocation's role (e.g. "CI").
pub const ROLE_KEY: &str = "ROLE";
/// Build metadata key carrying the repository URL.
pub const REPO_URL_KEY: &str = "REPO_URL";
/// Workspace status key carrying the user who ran the build.
pub const BUILD_USER_KEY: &str = "BUILD_USER";
/// Workspace status key carrying the machine the build ran on.
pub const BUILD_HOST_KEY: &str = "BUILD_HOST";

/// Location of an env-carrying option inside the retained event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRedaction {
    event: usize,
    section: usize,
    option: usize,
}

/// Everything accumulated for one invocation before finalize.
#[derive(Debug, Default)]
struct AggregationState {
    events: Vec<InvocationEvent>,
    console_buffer: String,
    command: String,
    build_tool_version: String,
    start_time_millis: Option<i64>,
    finish_time_millis: Option<i64>,
    exit_code: Option<ExitCode>,
    overall_success: bool,
    user: String,
    host: String,
    role: String,
    repo_url: String,
    action_count: u64,
    allowed_env: EnvAllowList,
    pending_redactions: Vec<PendingRedaction>,
}

impl AggregationState {
    /// Mask every recorded env option against the final allow-list.
    fn commit_redactions(&mut self) -> usize {
        let AggregationState {
            events,
            pending_redactions,
            allowed_env,
            ..
        } = self;

        if allowed_env.is_empty() {
            debug!(
                pending = pending_redactions.len(),
                "no ALLOW_ENV seen; masking every env value"
            );
        } else {
            debug!(
                allowed = ?allowed_env.iter().collect::<Vec<_>>(),
                pending = pending_redactions.len(),
                "committing env redactions"
            );
        }

        let mut redacted = 0;
        for target in pending_redactions.drain(..) {
            match option_at(events, target) {
                Some(option) => {
                    if redact_env_option(option, allowed_env) {
                        redacted += 1;
                    }
                }
                None => warn!(?target, "pending redaction no longer resolves to an option"),
            }
        }
        redacted
    }

    /// Build duration in microseconds, if both ends of the build were seen.
    fn duration_usec(&self) -> Option<i64> {
        let (start, finish) = (self.start_time_millis?, self.finish_time_millis?);
        let elapsed = finish.checked_sub(start)?;
        if elapsed < 0 {
            warn!(start, finish, "finish time precedes start time; duration unknown");
            return None;
        }
        TimeDelta::try_milliseconds(elapsed)?.num_microseconds()
    }

    fn success(&self) -> bool {
        match &self.exit_code {
            Some(code) => code.code == 0,
            None => self.overall_success,
        }
    }
}

fn option_at(
    events: &mut [InvocationEvent],
    target: PendingRedaction,
) -> Option<&mut CommandLineOption> {
    match &mut events.get_mut(target.event)?.build_event.payload {
        Payload::StructuredCommandLine(command_line) => command_line
            .sections
            .get_mut(target.section)?
            .option_list_mut()?
            .option
            .get_mut(target.option),
        _ => None,
    }
}

/// Folds one invocation's event stream into an [`Invocation`].
///
/// Create one parser per invocation, feed every event in arrival order with
/// [`parse_event`](Self::parse_event), then call
/// [`fill_invocation`](Self::fill_invocation) once. `fill_invocation` takes
/// the parser by value, so it cannot be fed again afterwards.
#[derive(Debug, Default)]
pub struct StreamingEventParser {
    config: ParserConfig,
    state: AggregationState,
}

impl StreamingEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        StreamingEventParser {
            config,
            state: AggregationState::default(),
        }
    }

    /// Number of events folded so far.
    pub fn event_count(&self) -> usize {
        self.state.events.len()
    }

    /// Number of env-carrying options awaiting the final allow-list.
    pub fn pending_redaction_count(&self) -> usize {
        self.state.pending_redactions.len()
    }

    /// Fold one event into the aggregation state.
    ///
    /// Never fails: unknown payloads and malformed fields are retained or
    /// passed through, so a bad event cannot stop the rest of the stream.
    pub fn parse_event(&mut self, mut event: InvocationEvent) {
        METRICS.inc_events_processed();

        let index = self.state.events.len();
        let stripped = self.fold_payload(index, &mut event.build_event.payload);
        METRICS.add_uri_secrets_stripped(stripped as u64);

        trace!(
            seq = event.sequence_number,
            kind = event.payload().kind(),
            stripped,
            "event folded"
        );
        self.state.events.push(event);
    }

    /// Apply the aggregation rule for one payload. Returns the number of URI
    /// credential prefixes removed.
    fn fold_payload(&mut self, index: usize, payload: &mut Payload) -> usize {
        let state = &mut self.state;
        match payload {
            Payload::Progress(progress) => {
                // Moved, not copied: progress text is only kept in the console buffer.
                state.console_buffer.push_str(&std::mem::take(&mut progress.stderr));
                state.console_buffer.push_str(&std::mem::take(&mut progress.stdout));
                0
            }
            Payload::Started(started) => {
                state.command = started.command.clone();
                state.build_tool_version = started.build_tool_version.clone();
                state.start_time_millis = Some(started.start_time_millis);
                usize::from(strip_uri_secret_in_place(&mut started.options_description))
            }
            Payload::UnstructuredCommandLine(_) => 0,
            Payload::StructuredCommandLine(command_line) => {
                self.register_env_options(index, command_line);
                0
            }
            Payload::OptionsParsed(options) => {
                strip_uri_secrets(&mut options.cmd_line)
                    + strip_uri_secrets(&mut options.explicit_cmd_line)
            }
            Payload::WorkspaceStatus(status) => {
                for item in &status.item {
                    match item.key.as_str() {
                        BUILD_USER_KEY => state.user = item.value.clone(),
                        BUILD_HOST_KEY => state.host = item.value.clone(),
                        _ => {}
                    }
                }
                0
            }
            Payload::Action(action) => {
                state.action_count += 1;
                usize::from(strip_optional_file(&mut action.stdout))
                    + usize::from(strip_optional_file(&mut action.stderr))
                    + usize::from(strip_optional_file(&mut action.primary_output))
                    + strip_files(&mut action.action_metadata_logs)
            }
            Payload::NamedSetOfFiles(set) => strip_files(&mut set.files),
            Payload::Completed(target) => strip_files(&mut target.important_output),
            Payload::TestResult(result) => strip_files(&mut result.test_action_output),
            Payload::TestSummary(summary) => {
                strip_files(&mut summary.passed) + strip_files(&mut summary.failed)
            }
            Payload::Finished(finished) => {
                state.finish_time_millis = Some(finished.finish_time_millis);
                state.exit_code = finished.exit_code.clone();
                state.overall_success = finished.overall_success;
                0
            }
            Payload::BuildMetadata(build_metadata) => {
                let metadata = &mut build_metadata.metadata;
                if let Some(allow_env) = metadata.get(ALLOW_ENV_KEY) {
                    state.allowed_env.extend_from_csv(allow_env);
                }
                if let Some(role) = metadata.get(ROLE_KEY) {
                    state.role = role.clone();
                }
                if let Some(repo_url) = metadata.get_mut(REPO_URL_KEY) {
                    let clean = strip_url_userinfo(repo_url).into_owned();
                    *repo_url = clean.clone();
                    state.repo_url = clean;
                }
                0
            }
            Payload::Unknown(unknown) => {
                METRICS.inc_unknown_payloads();
                debug!(index, tag = unknown.kind(), "retaining payload of unknown kind");
                0
            }
            other => {
                debug!(index, kind = other.kind(), "no aggregation rule for payload");
                0
            }
        }
    }

    fn register_env_options(&mut self, index: usize, command_line: &CommandLine) {
        for (section_idx, section) in command_line.sections.iter().enumerate() {
            let Some(list) = section.option_list() else {
                continue;
            };
            for (option_idx, option) in list.option.iter().enumerate() {
                if !self.config.is_env_option(&option.option_name) {
                    continue;
                }
                debug!(
                    option = %option.option_name,
                    env_name = option.option_value.split('=').next().unwrap_or_default(),
                    "env option recorded for redaction"
                );
                self.state.pending_redactions.push(PendingRedaction {
                    event: index,
                    section: section_idx,
                    option: option_idx,
                });
            }
        }
    }

    /// Finalize into `invocation`, committing all deferred redactions.
    ///
    /// `invocation_id` and `invocation_status` are left as the caller set
    /// them. Works on any prefix of a stream: a producer that died early
    /// yields a best-effort record with `duration_usec == None` when timing
    /// is incomplete.
    pub fn fill_invocation(self, invocation: &mut Invocation) {
        let mut state = self.state;
        let redacted = state.commit_redactions();
        METRICS.add_env_values_redacted(redacted as u64);

        let duration_usec = state.duration_usec();
        let success = state.success();
        let started_at = state
            .start_time_millis
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        obs::emit_invocation_finalized(
            &invocation.invocation_id,
            state.events.len(),
            duration_usec,
            redacted,
        );

        invocation.events = state.events;
        invocation.console_buffer = state.console_buffer;
        invocation.command = state.command;
        invocation.build_tool_version = state.build_tool_version;
        invocation.user = state.user;
        invocation.host = state.host;
        invocation.role = state.role;
        invocation.repo_url = state.repo_url;
        invocation.exit_code = state.exit_code;
        invocation.success = success;
        invocation.started_at = started_at;
        invocation.duration_usec = duration_usec;
        invocation.action_count = state.action_count;
    }
}
