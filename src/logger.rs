/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging utilities for
    Syn-Mac-Core catalog queries, downloads and install jobs.

  Security / Safety Notes:
    Structured fields whose key names a secret are rendered as
    `<redacted>` unconditionally. Credentials are never handed
    to the logger in the first place.

  Dependencies:
    chrono for timestamps, sha2 for session digests.

  Operational Scope:
    Used by runtime components to emit RFC-3339 UTC stamped
    log entries and produce session hash digests.

  Revision History:
    2026-10-16 COD  Adapted logger with structured job fields.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynmacError};

const REDACTED: &str = "<redacted>";
const SENSITIVE_KEYS: &[&str] = &["password", "passwd", "secret", "token"];

/// Structured log level for Syn-Mac-Core events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Shared logger that emits append-only entries in Synavera format.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match path.as_deref() {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_append(file_path)?))),
            None => None,
        };
        Ok(Self {
            file,
            path,
            verbose,
        })
    }

    /// Logger that only mirrors warnings and errors to stderr.
    pub fn stderr_only() -> Self {
        Self {
            file: None,
            path: None,
            verbose: false,
        }
    }

    /// Start a structured entry; fields are appended as `key=value`.
    pub fn event<'a>(&'a self, level: LogLevel, code: &'a str) -> LogEvent<'a> {
        LogEvent {
            logger: self,
            level,
            code,
            message: String::new(),
            fields: Vec::new(),
        }
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        self.write_line(level, code, message.as_ref());
    }

    /// Convenience wrapper for `INFO` level events.
    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    /// Convenience wrapper for `WARN` level events.
    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    /// Convenience wrapper for `ERROR` level events.
    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    /// Convenience wrapper for `DEBUG` level events.
    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_line(&self, level: LogLevel, code: &str, body: &str) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let payload = format!("{timestamp} [{}] [{code}] {body}", level.as_str());

        if self.verbose || matches!(level, LogLevel::Error | LogLevel::Warn) {
            eprintln!("{payload}");
        }

        let Some(file) = &self.file else {
            return;
        };
        let Ok(mut guard) = file.lock() else {
            return;
        };
        if writeln!(guard, "{payload}").is_err() || guard.flush().is_err() {
            eprintln!(
                "{timestamp} [{}] [LOGGER] Failed to write to log file",
                LogLevel::Error.as_str()
            );
        }
    }

    /// Compute and persist SHA-256 digest of the log file.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                guard.flush()?;
            }
        }
        let data = std::fs::read(path).map_err(|err| {
            SynmacError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);
        let mut hash_os = path.as_os_str().to_os_string();
        hash_os.push(".hash");
        let hash_path = PathBuf::from(hash_os);
        let line = format!(
            "{:x}  {}\n",
            digest,
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        std::fs::write(&hash_path, line).map_err(|err| {
            SynmacError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })
    }
}

/// Builder for one structured log entry.
pub struct LogEvent<'a> {
    logger: &'a Logger,
    level: LogLevel,
    code: &'a str,
    message: String,
    fields: Vec<(&'a str, String)>,
}

impl<'a> LogEvent<'a> {
    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    pub fn field<V: Display>(mut self, key: &'a str, value: V) -> Self {
        let rendered = if is_sensitive(key) {
            REDACTED.to_string()
        } else {
            value.to_string()
        };
        self.fields.push((key, rendered));
        self
    }

    pub fn emit(self) {
        let mut body = self.message;
        for (key, value) in &self.fields {
            if !body.is_empty() {
                body.push(' ');
            }
            if value.contains(char::is_whitespace) {
                body.push_str(&format!("{key}={value:?}"));
            } else {
                body.push_str(&format!("{key}={value}"));
            }
        }
        self.logger.write_line(self.level, self.code, &body);
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|needle| key.contains(needle))
}

fn open_append(file_path: &Path) -> Result<File> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynmacError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
        .map_err(|err| {
            SynmacError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                file_path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_fields_are_rendered_and_secrets_masked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.log");
        let logger = Logger::new(Some(path.clone()), false).unwrap();

        logger
            .event(LogLevel::Info, "SUBMIT")
            .message("install submitted")
            .field("label", "macOS Sonoma 14.7.2-23H311")
            .field("pid", 4242)
            .field("password", "hunter2")
            .emit();
        logger.finalize().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[INFO] [SUBMIT] install submitted"));
        assert!(contents.contains("label=\"macOS Sonoma 14.7.2-23H311\""));
        assert!(contents.contains("pid=4242"));
        assert!(contents.contains("password=<redacted>"));
        assert!(!contents.contains("hunter2"));
    }

    #[test]
    fn finalize_writes_digest_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("core.log");
        let logger = Logger::new(Some(path.clone()), false).unwrap();
        logger.info("INIT", "Syn-Mac Core awakening.");
        logger.finalize().unwrap();

        let hash = std::fs::read_to_string(dir.path().join("nested").join("core.log.hash")).unwrap();
        let (digest, name) = hash.trim().split_once("  ").unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(name, "core.log");
    }

    #[test]
    fn stderr_only_logger_has_no_path() {
        let logger = Logger::stderr_only();
        assert!(logger.path().is_none());
        assert!(logger.finalize().is_ok());
    }
}
