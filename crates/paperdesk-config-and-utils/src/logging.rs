//! Logging initialization for the client.
//!
//! Components never configure output themselves; they use the `tracing`
//! macros and the binary calls [`init_logging`] once at startup. Records are
//! written as JSON lines to `~/.paperdesk/logs/client.jsonl` and, optionally,
//! in compact form to stderr.

use crate::{CoreError, CoreResult, Paths};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, recorded in the "logging initialized" event.
    pub service_name: String,
    /// Default log level filter. `RUST_LOG` takes precedence when set.
    pub default_level: String,
    /// JSONL output file. `None` disables file output.
    pub log_path: Option<PathBuf>,
    /// Also emit compact records to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "paperdesk".into(),
            default_level: "info".into(),
            log_path: Paths::new().ok().map(|paths| paths.log_file()),
            also_stderr: false,
        }
    }
}

/// Append-only file writer, flushed after every record so concurrent
/// processes interleave whole lines.
#[derive(Clone)]
struct JsonlWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl JsonlWriter {
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for JsonlWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for JsonlWriter {
    type Writer = JsonlWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with an explicit configuration.
///
/// Fails if the log file can't be opened or a global subscriber is already
/// installed.
pub fn init_with_config(config: LogConfig) -> CoreResult<()> {
    let file_layer = match &config.log_path {
        Some(path) => {
            let writer = JsonlWriter::open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true)
                    .with_writer(writer)
                    .with_filter(env_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| CoreError::Logging(e.to_string()))?;

    tracing::info!(service = %config.service_name, "logging initialized");
    Ok(())
}

/// Initialize logging for the client with the given default level, writing
/// JSONL under `paths` and compact lines to stderr.
pub fn init_logging(level: &str, paths: &Paths) -> CoreResult<()> {
    init_with_config(LogConfig {
        service_name: "paperdesk".into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    })
}

/// Parse a log level string into a tracing Level. Unknown values map to INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
