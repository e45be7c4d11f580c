//! Tracing subscriber setup.
//!
//! Commands log to a daily rolling file under the configured log directory
//! (JSON lines by default) and, when requested, to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use ldapmerge_core::config::LoggingConfig;

/// Log file prefix; rotated files are `ldapmerge.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "ldapmerge.log";

/// Effective logging settings after command-line overrides.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub dir: PathBuf,
    pub level: String,
    /// Whether the level came from `--log-level` and should beat `RUST_LOG`.
    pub level_explicit: bool,
    pub console: bool,
    pub json: bool,
    pub max_files: usize,
}

impl LogOptions {
    pub fn from_config(
        config: &LoggingConfig,
        dir: Option<PathBuf>,
        level: Option<String>,
        console: bool,
    ) -> Self {
        Self {
            dir: dir.unwrap_or_else(|| config.dir.clone()),
            level_explicit: level.is_some(),
            level: level.unwrap_or_else(|| config.level.clone()),
            console: console || config.console,
            json: config.json,
            max_files: config.max_files,
        }
    }

    fn filter(&self) -> EnvFilter {
        if !self.level_explicit {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Output layers sit above the level filter so it applies to all of them.
type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop and must be held until the process exits.
pub fn init(options: &LogOptions) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&options.dir).with_context(|| {
        format!("failed to create log directory: {}", options.dir.display())
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(options.max_files)
        .build(&options.dir)
        .context("failed to open log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    layers.push(if options.json {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    });

    if options.console {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(options.filter())
        .with(layers)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
