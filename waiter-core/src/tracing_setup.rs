//! Logging for the gateway process
//!
//! Operators pick a console level; the audit log file always receives
//! everything Waiter itself emits, so rejected GUIDs and swallowed tracking
//! failures are retained even when the console is quiet.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File the previous run's log is overwritten into
pub const LOG_FILE_NAME: &str = "waiter-last-run.log";

/// Directory used when none is given
const DEFAULT_LOGS_DIR: &str = "logs";

/// HTTP plumbing that would otherwise flood the audit file at trace level
const AUDIT_FILTER: &str = "trace,hyper=info,hyper_util=info,h2=info,reqwest=info,tower=info";

/// Errors installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// The log directory or file could not be created
    #[error("Cannot create log file {}: {source}", path.display())]
    LogFile {
        /// File or directory that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed
    #[error("Tracing already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs console and audit-file logging for the process.
///
/// The console shows `console_level` and above unless `RUST_LOG` is set, in
/// which case `RUST_LOG` wins. The audit file under `logs_dir` (default
/// `./logs`) gets every level. Returns the audit file path.
///
/// # Errors
///
/// - `TracingSetupError::LogFile` - If the directory or file cannot be created
/// - `TracingSetupError::AlreadyInitialized` - If called twice in one process
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, TracingSetupError> {
    let (log_file, log_path) = open_log_file(logs_dir.unwrap_or(Path::new(DEFAULT_LOGS_DIR)))?;

    let console_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter(console_level));

    let audit_layer = fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(AUDIT_FILTER));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(audit_layer)
        .try_init()?;

    tracing::info!(
        console = %console_level,
        audit_log = %log_path.display(),
        "Logging initialized"
    );
    Ok(log_path)
}

fn console_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn open_log_file(dir: &Path) -> Result<(File, PathBuf), TracingSetupError> {
    std::fs::create_dir_all(dir).map_err(|source| TracingSetupError::LogFile {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(LOG_FILE_NAME);
    let file = File::create(&path).map_err(|source| TracingSetupError::LogFile {
        path: path.clone(),
        source,
    })?;
    Ok((file, path))
}

/// Console verbosity selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    /// Startup, requests served, and rejections
    Info,
    /// Adds offload headers and per-mount probe results
    Debug,
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Level::from(*self).as_str().to_lowercase())
    }
}
