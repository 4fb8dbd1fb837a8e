//! Logging context for the hub and its monitors
//!
//! A [`LogContext`] is built once from a [`LogConfig`] and handed to the
//! hub, which runs every worker under its dispatcher. Nothing here
//! touches the process-wide default subscriber unless
//! [`LogContext::install_global`] is called.
//!
//! Sinks:
//! - console: stderr, optional ANSI colors, filtered at the configured level
//!   unless `RUST_LOG` is set
//! - run log: `<dir>/tunnelhub.log`, appended, DEBUG and above, no colors
//! - tunnel logs: `<dir>/tunnel_<name>.log`, truncated per run, written by
//!   [`TunnelLog`]

use std::fs::OpenOptions;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use regex::Regex;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::LogConfig;
use crate::error::ConfigError;

/// File name of the combined run log
pub const RUN_LOG_FILE: &str = "tunnelhub.log";

/// Logger name prefixed to every tunnel log line
const LOGGER_NAME: &str = "TunnelHub";

/// An explicitly constructed logging setup
#[derive(Clone)]
pub struct LogContext {
    config: LogConfig,
    dispatch: Dispatch,
}

impl LogContext {
    /// Build the sinks described by `config`.
    ///
    /// Creates the log directory if needed and opens the run log.
    pub fn new(config: LogConfig) -> Result<Self, ConfigError> {
        let level = config.level_filter()?;

        let console = config.console.then(|| {
            fmt::layer()
                .with_ansi(config.color)
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(level.into())
                        .from_env_lossy(),
                )
        });

        let run_log = match &config.dir {
            Some(dir) => {
                let file = open_run_log(dir).map_err(|e| {
                    ConfigError::Invalid(format!("Failed to open run log in {:?}: {}", dir, e))
                })?;
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(LevelFilter::DEBUG),
                )
            }
            None => None,
        };

        let subscriber = Registry::default().with(console).with(run_log);

        Ok(Self {
            config,
            dispatch: Dispatch::new(subscriber),
        })
    }

    /// A context that discards everything
    pub fn silent() -> Self {
        Self {
            config: LogConfig::silent(),
            dispatch: Dispatch::none(),
        }
    }

    /// The configuration this context was built from
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Whether console output and reports should be colorized
    pub fn color(&self) -> bool {
        self.config.color
    }

    /// The dispatcher backing this context
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run a synchronous closure with this context as the default subscriber
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Attach this context to a future, typically before spawning it
    pub fn instrument<F: Future>(&self, future: F) -> WithDispatch<F> {
        future.with_subscriber(self.dispatch.clone())
    }

    /// Make this context the process-wide default (binaries only)
    pub fn install_global(&self) -> Result<(), ConfigError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| ConfigError::Invalid(format!("Failed to install logger: {}", e)))
    }

    /// Path of the private log for tunnel `name`, if file logging is on
    pub fn tunnel_log_path(&self, name: &str) -> Option<PathBuf> {
        self.config
            .dir
            .as_ref()
            .map(|dir| dir.join(format!("tunnel_{}.log", sanitize_file_name(name))))
    }
}

impl std::fmt::Debug for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn open_run_log(dir: &Path) -> io::Result<std::fs::File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(RUN_LOG_FILE))
}

/// Keep tunnel names from escaping the log directory
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Remove ANSI escape sequences
pub fn strip_ansi_codes(text: &str) -> std::borrow::Cow<'_, str> {
    static ANSI: OnceLock<Option<Regex>> = OnceLock::new();
    let ansi = ANSI.get_or_init(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").ok());
    match ansi {
        Some(ansi) => ansi.replace_all(text, ""),
        None => std::borrow::Cow::Borrowed(text),
    }
}

/// Private, per-run log of one tunnel's process output
pub struct TunnelLog {
    prefix: String,
    writer: Option<BufWriter<tokio::fs::File>>,
}

impl TunnelLog {
    /// Open (truncating) the log at `path`; `None` yields a log that drops lines
    pub async fn create(name: &str, path: Option<&Path>) -> io::Result<Self> {
        let writer = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Some(BufWriter::new(tokio::fs::File::create(path).await?))
            }
            None => None,
        };

        Ok(Self {
            prefix: format!("[{}.{}]: ", LOGGER_NAME, name),
            writer,
        })
    }

    /// A log that drops every line
    pub fn disabled(name: &str) -> Self {
        Self {
            prefix: format!("[{}.{}]: ", LOGGER_NAME, name),
            writer: None,
        }
    }

    /// Whether lines are being written anywhere
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Append and flush one line. A failing writer is dropped after a warning.
    pub async fn write_line(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let entry = format!("{}{}\n", self.prefix, strip_ansi_codes(line));
        let written = match writer.write_all(entry.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!("Tunnel log write failed, disabling it: {}", e);
            self.writer = None;
        }
    }

    /// Flush and release the file
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush().await {
                tracing::warn!("Failed to flush tunnel log: {}", e);
            }
        }
    }
}
