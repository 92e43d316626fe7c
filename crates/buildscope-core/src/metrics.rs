//! Process-wide counters for event ingestion.
//!
//! Counters are bumped at the call site without logging anything sensitive.
//! Call [`Metrics::flush`] to emit the current values as one `info!` event,
//! e.g. after a batch of invocations has been finalized.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Relaxed atomic counters, shared by every parser in the process.
pub struct Metrics {
    events_processed: AtomicU64,
    unknown_payloads: AtomicU64,
    uri_secrets_stripped: AtomicU64,
    env_values_redacted: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_processed: AtomicU64::new(0),
            unknown_payloads: AtomicU64::new(0),
            uri_secrets_stripped: AtomicU64::new(0),
            env_values_redacted: AtomicU64::new(0),
        }
    }

    pub fn inc_events_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_payloads(&self) {
        self.unknown_payloads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "unknown_payloads", "counter incremented");
    }

    /// Add `n` stripped URI prefixes. Zero is a no-op.
    pub fn add_uri_secrets_stripped(&self, n: u64) {
        if n > 0 {
            self.uri_secrets_stripped.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn add_env_values_redacted(&self, n: u64) {
        if n > 0 {
            self.env_values_redacted.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_processed = self.events_processed(),
            unknown_payloads = self.unknown_payloads(),
            uri_secrets_stripped = self.uri_secrets_stripped(),
            env_values_redacted = self.env_values_redacted(),
        );
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn unknown_payloads(&self) -> u64 {
        self.unknown_payloads.load(Ordering::Relaxed)
    }

    pub fn uri_secrets_stripped(&self) -> u64 {
        self.uri_secrets_stripped.load(Ordering::Relaxed)
    }

    pub fn env_values_redacted(&self) -> u64 {
        self.env_values_redacted.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.events_processed.store(0, Ordering::Relaxed);
        self.unknown_payloads.store(0, Ordering::Relaxed);
        self.uri_secrets_stripped.store(0, Ordering::Relaxed);
        self.env_values_redacted.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.events_processed(), 0);
        m.inc_events_processed();
        m.inc_events_processed();
        assert_eq!(m.events_processed(), 2);

        m.inc_unknown_payloads();
        assert_eq!(m.unknown_payloads(), 1);

        m.add_uri_secrets_stripped(3);
        m.add_uri_secrets_stripped(0);
        assert_eq!(m.uri_secrets_stripped(), 3);

        m.add_env_values_redacted(2);
        assert_eq!(m.env_values_redacted(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_events_processed();
        m.inc_unknown_payloads();
        m.add_uri_secrets_stripped(1);
        m.add_env_values_redacted(1);
        m.reset();
        assert_eq!(m.events_processed(), 0);
        assert_eq!(m.unknown_payloads(), 0);
        assert_eq!(m.uri_secrets_stripped(), 0);
        assert_eq!(m.env_values_redacted(), 0);
    }
}
