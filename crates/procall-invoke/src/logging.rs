//! Logging bootstrap for applications using procall
//!
//! Installs a `tracing` subscriber with a pretty console layer and an
//! optional daily-rolling JSON file under the log directory. `RUST_LOG`
//! overrides the configured filter.

use anyhow::Context as _;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// File name prefix of the rolling log files
pub const LOG_FILE_PREFIX: &str = "procall.log";

const VERBOSE_FILTER: &str = "info,procall_core=debug,procall_invoke=debug,procall_driver_mssql=debug";
const QUIET_FILTER: &str = "warn,procall_core=info,procall_invoke=info,procall_driver_mssql=info";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; `None` writes no files
    pub log_dir: Option<PathBuf>,
    pub console: bool,
    /// Add file and line to console events
    pub include_location: bool,
    /// Emit span open/close events, e.g. around driver connects
    pub span_events: bool,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: Some(log_directory()),
            console: true,
            include_location: cfg!(debug_assertions),
            span_events: cfg!(debug_assertions),
            default_filter: VERBOSE_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Files only, warnings plus procall info events
    pub fn service() -> Self {
        Self {
            console: false,
            include_location: false,
            span_events: false,
            default_filter: QUIET_FILTER.to_string(),
            ..Self::default()
        }
    }

    pub fn console_only() -> Self {
        Self {
            log_dir: None,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }

    fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes the file writer. Fails if a subscriber is already set.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.console {
        layers.push(console_layer(&config));
    }
    if let Some(dir) = &config.log_dir {
        let (layer, worker_guard) = file_layer(dir, &config)?;
        layers.push(layer);
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        log_dir = ?config.log_dir,
        console = config.console,
        "procall logging initialized"
    );
    Ok(guard)
}

/// `init` with the verbose config in debug builds and `service()` otherwise
pub fn init_default() -> anyhow::Result<Option<WorkerGuard>> {
    if cfg!(debug_assertions) {
        init(LoggingConfig::default())
    } else {
        init(LoggingConfig::service())
    }
}

/// `<data-local-dir>/procall/logs`, or `./procall/logs` without one
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procall")
        .join("logs")
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(config.fmt_span())
        .pretty()
        .with_filter(config.filter())
        .boxed()
}

fn file_layer(dir: &Path, config: &LoggingConfig) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));

    let layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_names(true)
        .with_span_events(config.fmt_span())
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(config.filter())
        .boxed();
    Ok((layer, guard))
}
