//! Append-only per-worker log file.
//!
//! One file per (application, environment, worker):
//! `<dir>/<application>_<environment>_<worker>.log`. Every call appends a
//! single `<timestamp> beanstalk [<severity>] {<source>} <message>` record
//! with one `write_all` on an `O_APPEND` handle under a mutex, so records
//! from the same process never interleave.

use crate::error::{Error, Result};
use crate::queue::QueueError;
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Fixed tag written on every record.
pub const LOG_TAG: &str = "beanstalk";

/// Source name for failures whose type this crate does not know.
pub const ERROR_SOURCE: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console sink of the command that launched the worker.
pub trait SectionLog: Send + Sync {
    fn log_section(&self, section: &str, message: &str);
}

pub struct WorkerLog {
    path: PathBuf,
    worker: String,
    file: Mutex<File>,
    section: Option<Arc<dyn SectionLog>>,
}

impl WorkerLog {
    /// Open (creating if needed) the log file for a worker.
    ///
    /// Failing to create the directory or open the file is a configuration
    /// error: it surfaces here, before the loop starts.
    pub fn open(dir: &Path, application: &str, environment: &str, worker: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::InvalidConfiguration(format!("cannot create log dir {}: {e}", dir.display()))
        })?;

        let path = log_file_path(dir, application, environment, worker);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                Error::InvalidConfiguration(format!("cannot open log file {}: {e}", path.display()))
            })?;

        Ok(Self {
            path,
            worker: worker.to_string(),
            file: Mutex::new(file),
            section: None,
        })
    }

    /// Also forward non-error records to the launching command.
    pub fn with_section(mut self, section: Arc<dyn SectionLog>) -> Self {
        self.section = Some(section);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record attributed to the worker.
    pub fn log(&self, severity: Severity, message: &str) {
        if let Some(section) = &self.section {
            section.log_section("worker", message);
        }
        self.append(severity, &self.worker, message);
    }

    /// Append a record attributed to a failure of type `source`. Never
    /// echoed to the console section.
    pub fn log_error(&self, severity: Severity, source: &str, message: &str) {
        self.append(severity, source, message);
    }

    fn append(&self, severity: Severity, source: &str, message: &str) {
        mirror(severity, &self.worker, source, message);

        let record = format_record(Local::now(), severity, source, message);
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(record.as_bytes()) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append worker log");
        }
    }
}

/// Source name for a failure record: the type of the root cause when it is
/// one of this crate's errors, an I/O or a database error; [`ERROR_SOURCE`]
/// otherwise.
pub fn failure_source(err: &anyhow::Error) -> &'static str {
    let root = err.root_cause();
    if let Some(e) = root.downcast_ref::<Error>() {
        e.kind()
    } else if let Some(e) = root.downcast_ref::<QueueError>() {
        e.kind()
    } else if root.is::<std::io::Error>() {
        "Io"
    } else if root.is::<sqlx::Error>() {
        "Database"
    } else {
        ERROR_SOURCE
    }
}

/// `<dir>/<application>_<environment>_<worker>.log`
pub fn log_file_path(dir: &Path, application: &str, environment: &str, worker: &str) -> PathBuf {
    dir.join(format!("{application}_{environment}_{worker}.log"))
}

/// Render one record, newline included.
pub fn format_record(
    at: DateTime<Local>,
    severity: Severity,
    source: &str,
    message: &str,
) -> String {
    format!(
        "{} {LOG_TAG} [{severity}] {{{source}}} {message}\n",
        at.format("%b %d %H:%M:%S")
    )
}

fn mirror(severity: Severity, worker: &str, source: &str, message: &str) {
    match severity {
        // Per-iteration info records would flood stderr; they stay in the file.
        Severity::Debug | Severity::Info => tracing::debug!(worker, source, "{message}"),
        Severity::Notice => tracing::info!(worker, source, "{message}"),
        Severity::Warning => tracing::warn!(worker, source, "{message}"),
        Severity::Error | Severity::Fatal => tracing::error!(worker, source, "{message}"),
    }
}
