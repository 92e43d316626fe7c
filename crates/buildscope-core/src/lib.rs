//! BuildScope Core Library
//!
//! Folds a build tool's lifecycle event stream into one redacted
//! [`Invocation`](buildscope_events::Invocation) summary.
//!
//! - [`parser`]: `StreamingEventParser`, the per-invocation fold
//! - [`redact`]: credential stripping and env value masking
//! - [`config`]: parser tunables
//! - [`telemetry`], [`obs`], [`metrics`]: logging and counters

pub mod config;
pub mod metrics;
pub mod obs;
pub mod parser;
pub mod redact;
pub mod telemetry;

pub use config::{ParserConfig, DEFAULT_ENV_OPTION_NAMES};
pub use metrics::METRICS;
pub use obs::{emit_event_skipped, emit_invocation_finalized, emit_stream_opened, InvocationSpan};
pub use parser::{
    StreamingEventParser, ALLOW_ENV_KEY, BUILD_HOST_KEY, BUILD_USER_KEY, REPO_URL_KEY, ROLE_KEY,
};
pub use redact::{
    redact_env_option, redact_env_value, strip_uri_secret, strip_url_userinfo, EnvAllowList,
    REDACTED, URI_SECRET_DELIMITER,
};
pub use telemetry::init_tracing;

/// BuildScope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
