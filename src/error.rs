/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Mac-Core error types so every boundary
    operation reports failures with consistent diagnostics,
    retry guidance and exit semantics.

  Security / Safety Notes:
    Error contexts carry raw command output and offending
    catalog lines for diagnosis but never credential material;
    passwords only ever travel over a child's stdin.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate failures and consolidate
    exit codes for the binary entry point.

  Revision History:
    2026-10-16 COD  Established Syn-Mac error taxonomy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Mac-Core operations.
pub type Result<T> = std::result::Result<T, SynmacError>;

/// Enumerates high-level error domains surfaced by Syn-Mac-Core.
#[derive(Debug, Error)]
pub enum SynmacError {
    #[error("Required command `{command}` not found")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Update catalog unavailable: {details}")]
    CatalogUnavailable { details: String },
    #[error("Invalid filter pattern `{pattern}`: {reason}")]
    InvalidFilter { pattern: String, reason: String },
    #[error("Invalid version string `{input}`")]
    InvalidVersion { input: String },
    #[error("No installer or update matches version {version}")]
    VersionNotFound { version: String },
    #[error("Installer not found: {path}. Fetch it first with `download-installer`")]
    InstallerMissing { path: String },
    #[error(
        "Installer for {version} did not appear at {path} within {waited_secs}s (partial bundle present: {partial})"
    )]
    DownloadTimeout {
        version: String,
        path: String,
        waited_secs: u64,
        partial: bool,
    },
    #[error("Download of installer {version} failed with status {status}: {log_tail}")]
    DownloadFailed {
        version: String,
        status: i32,
        log_tail: String,
    },
    #[error("Credentials rejected while starting {target}: {details}")]
    CredentialsRejected { target: String, details: String },
    #[error("Failed to background {target}: {details}")]
    BackgroundSubmission { target: String, details: String },
    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),
    #[error("Operation requires root privileges (current euid {euid})")]
    PrivilegeRequired { euid: u32 },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynmacError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynmacError::CommandMissing { .. } => ExitCode::from(10),
            SynmacError::CommandFailure { .. } => ExitCode::from(11),
            SynmacError::CatalogUnavailable { .. } => ExitCode::from(12),
            SynmacError::InvalidFilter { .. } => ExitCode::from(21),
            SynmacError::InvalidVersion { .. } => ExitCode::from(22),
            SynmacError::Config(_) => ExitCode::from(20),
            SynmacError::VersionNotFound { .. } => ExitCode::from(23),
            SynmacError::InstallerMissing { .. } => ExitCode::from(24),
            SynmacError::DownloadTimeout { .. } => ExitCode::from(30),
            SynmacError::DownloadFailed { .. } => ExitCode::from(31),
            SynmacError::CredentialsRejected { .. } => ExitCode::from(32),
            SynmacError::BackgroundSubmission { .. } => ExitCode::from(33),
            SynmacError::UnsupportedHost(_) => ExitCode::from(34),
            SynmacError::PrivilegeRequired { .. } => ExitCode::from(35),
            SynmacError::Serialization(_) => ExitCode::from(36),
            SynmacError::Filesystem(_) => ExitCode::from(40),
            SynmacError::Io(_) => ExitCode::from(41),
            SynmacError::Runtime(_) => ExitCode::from(50),
        }
    }

    /// Stable tag emitted in the JSON failure document.
    pub fn kind(&self) -> &'static str {
        match self {
            SynmacError::CommandMissing { .. } => "command_missing",
            SynmacError::CommandFailure { .. } => "command_failure",
            SynmacError::CatalogUnavailable { .. } => "catalog_unavailable",
            SynmacError::InvalidFilter { .. } => "invalid_filter",
            SynmacError::InvalidVersion { .. } => "invalid_version",
            SynmacError::VersionNotFound { .. } => "version_not_found",
            SynmacError::InstallerMissing { .. } => "installer_missing",
            SynmacError::DownloadTimeout { .. } => "download_timeout",
            SynmacError::DownloadFailed { .. } => "download_failed",
            SynmacError::CredentialsRejected { .. } => "credentials_rejected",
            SynmacError::BackgroundSubmission { .. } => "background_submission",
            SynmacError::UnsupportedHost(_) => "unsupported_host",
            SynmacError::PrivilegeRequired { .. } => "privilege_required",
            SynmacError::Config(_) => "config",
            SynmacError::Serialization(_) => "serialization",
            SynmacError::Filesystem(_) => "filesystem",
            SynmacError::Runtime(_) => "runtime",
            SynmacError::Io(_) => "io",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Credential rejection is never retryable: secrets must be
    /// re-supplied. Background submission failures are retryable once
    /// the environment has been remediated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SynmacError::DownloadTimeout { .. }
                | SynmacError::DownloadFailed { .. }
                | SynmacError::BackgroundSubmission { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_rejection_is_not_retryable() {
        let err = SynmacError::CredentialsRejected {
            target: "macOS 14.7.2".into(),
            details: "Incorrect password".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "credentials_rejected");
    }

    #[test]
    fn download_errors_are_retryable() {
        let timeout = SynmacError::DownloadTimeout {
            version: "14.7.2".into(),
            path: "/Applications/Install macOS Sonoma.app".into(),
            waited_secs: 3600,
            partial: false,
        };
        let failed = SynmacError::DownloadFailed {
            version: "14.7.2".into(),
            status: 1,
            log_tail: "network connection lost".into(),
        };
        assert!(timeout.is_retryable());
        assert!(failed.is_retryable());
    }

    #[test]
    fn catalog_errors_surface_raw_text() {
        let err = SynmacError::CatalogUnavailable {
            details: "unparseable record line `Title: broken`".into(),
        };
        assert!(err.to_string().contains("Title: broken"));
        assert!(!err.is_retryable());
    }
}
