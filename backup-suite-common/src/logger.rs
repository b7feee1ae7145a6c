//! Leveled log sink shared by backup and drive operations
//!
//! A `LogSink` is constructed once by the front end and handed to every
//! component that needs to report progress. Each message is:
//! - forwarded to the `log` facade (target `backup_suite`)
//! - appended to the daily log file, if one was opened
//! - mirrored to the UI callback, if set, for `Info` and above
//!
//! Delivery failures are swallowed; logging never aborts an operation.

use chrono::Local;
use fs2::FileExt;
use log::Level;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Target used when forwarding to the `log` facade
pub const LOG_TARGET: &str = "backup_suite";

/// Callback receiving already formatted messages for live display
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LogSink {
    file: Option<PathBuf>,
    callback: Option<LogCallback>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("file", &self.file)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl LogSink {
    /// Sink that only forwards to the `log` facade
    pub fn discard() -> Self {
        Self::default()
    }

    /// Open the daily log file `backup_<YYYYMMDD>.log` inside `log_dir`
    pub fn open(log_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let file = log_dir.join(format!("backup_{}.log", Local::now().format("%Y%m%d")));

        Ok(Self {
            file: Some(file),
            callback: None,
        })
    }

    /// Mirror `Info` and higher messages to `callback`
    pub fn with_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Path of the log file messages are appended to
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn log(&self, level: Level, message: &str) {
        log::log!(target: LOG_TARGET, level, "{message}");

        if let Some(path) = &self.file {
            let _ = append_line(path, level, message);
        }

        if level <= Level::Info {
            if let Some(callback) = &self.callback {
                callback(message);
            }
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug | Level::Trace => "DEBUG",
    }
}

/// Append one complete line under an exclusive lock
fn append_line(path: &Path, level: Level, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let line = format!(
        "{} - {} - {message}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level_name(level)
    );
    let result = file.write_all(line.as_bytes());

    FileExt::unlock(&file).ok();
    result
}
