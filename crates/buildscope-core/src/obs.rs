//! Structured lifecycle logging for invocation ingestion.
//!
//! - [`InvocationSpan`]: RAII guard that tags everything logged while one
//!   invocation is folded with its `invocation_id`
//! - `emit_*` functions for the lifecycle points worth an `info!`/`warn!`
//!
//! Only identifiers, counts and names are logged, never event text.

use tracing::{info, warn};

/// RAII guard that enters an invocation-scoped span.
///
/// ```ignore
/// let _span = InvocationSpan::enter("4b6f9c1e-...");
/// // every event logged here carries invocation_id
/// ```
pub struct InvocationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    pub fn enter(invocation_id: &str) -> Self {
        let span = tracing::info_span!("buildscope.invocation", invocation_id = %invocation_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: an event stream was opened for ingestion.
pub fn emit_stream_opened(invocation_id: &str, source: &str) {
    info!(event = "stream.opened", invocation_id = %invocation_id, source = %source);
}

/// Emit event: an invocation was finalized.
pub fn emit_invocation_finalized(
    invocation_id: &str,
    total_events: usize,
    duration_usec: Option<i64>,
    env_values_redacted: usize,
) {
    info!(
        event = "invocation.finalized",
        invocation_id = %invocation_id,
        total_events = total_events,
        duration_usec = ?duration_usec,
        env_values_redacted = env_values_redacted,
    );
}

/// Emit event: an input record was skipped (warning level).
pub fn emit_event_skipped(source: &str, line: usize, error: &dyn std::fmt::Display) {
    warn!(event = "stream.event_skipped", source = %source, line = line, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_span_create() {
        let _span = InvocationSpan::enter("test-invocation");
        emit_stream_opened("test-invocation", "events.ndjson");
        emit_invocation_finalized("test-invocation", 3, None, 1);
    }
}
