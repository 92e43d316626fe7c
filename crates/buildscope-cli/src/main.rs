//! BuildScope - build event stream summariser
//!
//! The `buildscope` command folds recorded build event streams into redacted
//! invocation summaries.
//!
//! ## Commands
//!
//! - `fold`: read one or more newline-delimited JSON event streams and write
//!   one `Invocation` per stream

use anyhow::{Context, Result};
use buildscope_core::{
    emit_event_skipped, emit_stream_opened, InvocationSpan, ParserConfig, StreamingEventParser,
    METRICS,
};
use buildscope_events::{BuildscopeError, Invocation, InvocationEvent, InvocationStatus};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Level};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "buildscope")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build event stream summariser", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "BUILDSCOPE_LOG_JSON")]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "BUILDSCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold event streams into invocation summaries
    Fold {
        /// Newline-delimited JSON event stream files, one invocation each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write `<invocation_id>.json` files here instead of printing to stdout
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Invocation ID to assign (single input only; random UUID otherwise)
        #[arg(long)]
        invocation_id: Option<String>,

        /// Status recorded on every produced invocation
        #[arg(long, default_value = "complete")]
        status: InvocationStatus,
    },
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    parser: ParserConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    buildscope_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fold {
            inputs,
            out_dir,
            invocation_id,
            status,
        } => cmd_fold(inputs, out_dir, invocation_id, status, config.parser).await,
    }
}

/// Load and validate the configuration file, or fall back to defaults.
fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let config: CliConfig = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&text).with_context(|| format!("Invalid TOML in {:?}", path))?
        }
        None => CliConfig::default(),
    };

    config
        .parser
        .validate()
        .context("Invalid parser configuration")?;
    Ok(config)
}

/// Fold every input concurrently and write the resulting invocations in
/// input order.
///
/// An input that cannot be folded is logged and does not stop the others.
/// The command still fails afterwards so the exit status reports it.
async fn cmd_fold(
    inputs: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    invocation_id: Option<String>,
    status: InvocationStatus,
    config: ParserConfig,
) -> Result<()> {
    if invocation_id.is_some() && inputs.len() > 1 {
        anyhow::bail!("--invocation-id can only be used with a single input");
    }
    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }

    let total = inputs.len();
    let mut tasks = JoinSet::new();
    for (order, path) in inputs.into_iter().enumerate() {
        let id = invocation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let config = config.clone();
        tasks.spawn_blocking(move || {
            let result = fold_file(&path, id, status, config);
            (order, path, result)
        });
    }

    let mut failed = 0;
    let mut invocations = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((order, _, Ok(invocation))) => invocations.push((order, invocation)),
            Ok((_, path, Err(err))) => {
                error!(input = ?path, error = %format!("{err:#}"), "input could not be folded");
                failed += 1;
            }
            Err(err) => {
                error!(error = %err, "fold task failed");
                failed += 1;
            }
        }
    }
    invocations.sort_by_key(|(order, _)| *order);

    for (_, invocation) in &invocations {
        if let Err(err) = write_invocation(invocation, out_dir.as_deref()) {
            error!(
                invocation_id = %invocation.invocation_id,
                error = %format!("{err:#}"),
                "invocation could not be written"
            );
            failed += 1;
        }
    }

    METRICS.flush();
    if failed > 0 {
        anyhow::bail!("{failed} of {total} inputs failed; see log for details");
    }
    Ok(())
}

/// Fold one event stream file into an invocation.
fn fold_file(
    path: &Path,
    invocation_id: String,
    status: InvocationStatus,
    config: ParserConfig,
) -> Result<Invocation> {
    let source = path.display().to_string();
    let _span = InvocationSpan::enter(&invocation_id);
    emit_stream_opened(&invocation_id, &source);

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open event stream: {:?}", path))?;

    let mut parser = StreamingEventParser::with_config(config);
    let skipped = fold_reader(BufReader::new(file), &source, &mut parser)
        .with_context(|| format!("Failed to read event stream: {:?}", path))?;
    if skipped > 0 {
        warn!(source = %source, skipped, "some lines could not be decoded");
    }

    let mut invocation = Invocation::new(invocation_id, status);
    parser.fill_invocation(&mut invocation);
    Ok(invocation)
}

/// Feed every decodable line of a newline-delimited JSON stream to `parser`.
///
/// Blank lines are ignored. Lines that fail to decode, including lines that
/// are not valid UTF-8, are logged and skipped. Returns the number of skipped
/// lines; only read failures are errors.
fn fold_reader<R: BufRead>(
    mut reader: R,
    source: &str,
    parser: &mut StreamingEventParser,
) -> buildscope_events::Result<usize> {
    let mut skipped = 0;
    let mut line_no = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<InvocationEvent>(&line) {
            Ok(event) => parser.parse_event(event),
            Err(source_err) => {
                let err = BuildscopeError::Decode {
                    line: line_no,
                    source: source_err,
                };
                emit_event_skipped(source, line_no, &err);
                skipped += 1;
            }
        }
    }
    Ok(skipped)
}

fn write_invocation(invocation: &Invocation, out_dir: Option<&Path>) -> Result<()> {
    let json =
        serde_json::to_string_pretty(invocation).context("Failed to serialize invocation")?;

    match out_dir {
        Some(dir) => {
            let id = &invocation.invocation_id;
            if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
                anyhow::bail!("Invocation ID {:?} cannot be used as a file name", id);
            }
            let path = dir.join(format!("{id}.json"));
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write invocation to {:?}", path))?;
            info!(path = ?path, invocation_id = %id, "invocation written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
