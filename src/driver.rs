/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::driver
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Submit incremental updates and full-OS installs as
    backgrounded jobs and classify the early outcome.

  Security / Safety Notes:
    Credentials are moved in, converted to a zeroizing stdin
    payload, and dropped as soon as the child is spawned. They
    never reach logs, errors or the returned job.

  Dependencies:
    chrono for job timestamps, regex for log classification,
    serde for the outcome document.

  Operational Scope:
    Backs the install operation. The install itself, and the
    reboot that follows, happen after this call returns; the
    terminal state observed here is "accepted", not "completed".

  Revision History:
    2026-10-16 COD  Authored install driver and job states.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit job state machine with validated transitions
    - Nothing-to-do detected before any side effect
============================================================*/

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;

use crate::context::{bundle_ready, Context};
use crate::credentials::Credentials;
use crate::dialect::{incremental_install_command, Dialect};
use crate::error::{Result, SynmacError};
use crate::host::HostInfo;
use crate::logger::LogLevel;
use crate::runner::{log_tail, CommandSpec, SubmittedProcess};
use crate::version::VersionSpec;

const INCREMENTAL_LOG: &str = "softwareupdate_install.log";
const OSINSTALL_LOG: &str = "startosinstall.log";

/// Lifecycle of one install submission.
///
/// `AcceptedWillReboot` is terminal from this tool's point of view: the
/// job keeps running detached and its completion is never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    Backgrounded,
    AcceptedWillReboot,
    FailedSynchronously,
}

impl JobState {
    fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, Backgrounded)
                | (Submitted, FailedSynchronously)
                | (Backgrounded, AcceptedWillReboot)
                | (Backgrounded, FailedSynchronously)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallKind {
    Incremental,
    FullOs,
}

/// Transient record of a submission. Holds no credentials.
#[derive(Debug, Clone, Serialize)]
pub struct InstallJob {
    pub target: String,
    pub kind: InstallKind,
    pub command: String,
    pub log_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub background_pid: Option<u32>,
    pub state: JobState,
}

impl InstallJob {
    fn new(target: String, kind: InstallKind, command: &CommandSpec, log_path: PathBuf) -> Self {
        Self {
            target,
            kind,
            command: command.to_string(),
            log_path,
            started_at: Utc::now(),
            background_pid: None,
            state: JobState::Pending,
        }
    }

    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(SynmacError::Runtime(format!(
                "invalid job transition {:?} -> {next:?} for {}",
                self.state, self.target
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    NothingToDo,
    /// Check mode: a submission would have been made.
    Planned,
    AcceptedWillReboot,
}

/// Outcome of an install request that did not fail.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub status: InstallStatus,
    pub changed: bool,
    pub message: String,
    pub job: Option<InstallJob>,
}

impl InstallOutcome {
    fn nothing_to_do(message: String) -> Self {
        Self {
            status: InstallStatus::NothingToDo,
            changed: false,
            message,
            job: None,
        }
    }
}

/// Decision taken before any side effect.
#[derive(Debug, Clone)]
pub enum InstallPlan {
    NothingToDo {
        reason: String,
    },
    Submit {
        target: String,
        kind: InstallKind,
        command: CommandSpec,
        log_path: PathBuf,
    },
}

pub struct InstallDriver<'a> {
    ctx: &'a Context<'a>,
    host: &'a HostInfo,
}

impl<'a> InstallDriver<'a> {
    pub fn new(ctx: &'a Context<'a>, host: &'a HostInfo) -> Self {
        Self { ctx, host }
    }

    /// Resolve an incremental install. A label absent from the current
    /// catalog means there is nothing to install.
    pub async fn plan_incremental(
        &self,
        label: &str,
        credentials: Option<&Credentials>,
    ) -> Result<InstallPlan> {
        let updates = self.ctx.catalog().list_updates().await?;
        if !updates.iter().any(|update| update.label == label) {
            return Ok(InstallPlan::NothingToDo {
                reason: format!("Update '{label}' is not offered; nothing to install"),
            });
        }
        Ok(InstallPlan::Submit {
            target: label.to_string(),
            kind: InstallKind::Incremental,
            command: incremental_install_command(self.ctx.softwareupdate(), label, credentials),
            log_path: self.ctx.job_log(INCREMENTAL_LOG),
        })
    }

    /// Resolve a full-OS install. Flags follow the target release, not
    /// the host's.
    pub async fn plan_full_os(
        &self,
        target: &VersionSpec,
        credentials: Option<&Credentials>,
    ) -> Result<InstallPlan> {
        let dialect = Dialect::for_major(target.major()).ok_or_else(|| SynmacError::VersionNotFound {
            version: target.to_string(),
        })?;
        if self.host.product_version >= *target {
            return Ok(InstallPlan::NothingToDo {
                reason: format!(
                    "Host already runs macOS {}; nothing to install for {target}",
                    self.host.product_version
                ),
            });
        }
        let bundle = self
            .ctx
            .installer_bundle(dialect.major)
            .ok_or_else(|| SynmacError::VersionNotFound {
                version: target.to_string(),
            })?;
        if !bundle_ready(&bundle) {
            return Err(SynmacError::InstallerMissing {
                path: Dialect::startosinstall_path(&bundle).display().to_string(),
            });
        }
        Ok(InstallPlan::Submit {
            target: format!("macOS {} {target}", dialect.codename),
            kind: InstallKind::FullOs,
            command: dialect.startosinstall_command(&bundle, credentials),
            log_path: self.ctx.job_log(OSINSTALL_LOG),
        })
    }

    pub async fn install_incremental(
        &self,
        label: &str,
        credentials: Option<Credentials>,
    ) -> Result<InstallOutcome> {
        let plan = self.plan_incremental(label, credentials.as_ref()).await?;
        self.execute(plan, credentials).await
    }

    pub async fn install_full_os(
        &self,
        target: &VersionSpec,
        credentials: Option<Credentials>,
    ) -> Result<InstallOutcome> {
        let plan = self.plan_full_os(target, credentials.as_ref()).await?;
        self.execute(plan, credentials).await
    }

    /// Carry out a plan. Credentials are consumed here and dropped right
    /// after the child has been spawned and fed.
    async fn execute(
        &self,
        plan: InstallPlan,
        credentials: Option<Credentials>,
    ) -> Result<InstallOutcome> {
        let (target, kind, command, log_path) = match plan {
            InstallPlan::NothingToDo { reason } => {
                self.ctx.logger.info("INSTALL", &reason);
                return Ok(InstallOutcome::nothing_to_do(reason));
            }
            InstallPlan::Submit {
                target,
                kind,
                command,
                log_path,
            } => (target, kind, command, log_path),
        };

        let mut job = InstallJob::new(target, kind, &command, log_path);
        let payload = credentials.as_ref().map(Credentials::stdin_payload);
        drop(credentials);

        job.advance(JobState::Submitted)?;
        let submitted = self.ctx.runner.submit(&command, payload, &job.log_path).await;
        let process = match submitted {
            Ok(process) => process,
            Err(err) => {
                job.advance(JobState::FailedSynchronously)?;
                self.ctx
                    .logger
                    .event(LogLevel::Error, "SUBMIT")
                    .message("process could not be started")
                    .field("target", &job.target)
                    .field("error", &err)
                    .emit();
                return Err(SynmacError::BackgroundSubmission {
                    target: job.target,
                    details: err.to_string(),
                });
            }
        };

        job.background_pid = process.pid();
        job.advance(JobState::Backgrounded)?;
        self.ctx
            .logger
            .event(LogLevel::Info, "SUBMIT")
            .message("install backgrounded")
            .field("target", &job.target)
            .field("pid", job.background_pid.map_or_else(|| "-".to_string(), |pid| pid.to_string()))
            .field("command", &job.command)
            .field("log", job.log_path.display())
            .emit();

        self.await_grace(job, process).await
    }

    /// Watch the job through the grace period. An exit inside the window
    /// is a synchronous failure; surviving it (or showing progress)
    /// means the submission was accepted.
    async fn await_grace(
        &self,
        mut job: InstallJob,
        mut process: Box<dyn SubmittedProcess>,
    ) -> Result<InstallOutcome> {
        let timing = self.ctx.timing;
        let deadline = Instant::now() + timing.submit_grace;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match process.wait_for(timing.submit_poll_interval.min(remaining)).await? {
                Some(0) => break,
                Some(status) => return Err(self.classify_failure(job, status).await),
                None => {
                    let log = log_tail(&job.log_path, 50).await;
                    if shows_progress(&log) {
                        break;
                    }
                }
            }
        }

        job.advance(JobState::AcceptedWillReboot)?;
        let message = match job.kind {
            InstallKind::Incremental => format!(
                "Update '{}' installation started successfully in background.",
                job.target
            ),
            InstallKind::FullOs => format!(
                "{} installation started, the machine will reboot",
                job.target
            ),
        };
        self.ctx
            .logger
            .event(LogLevel::Info, "ACCEPTED")
            .message("job accepted; completion happens outside this call")
            .field("target", &job.target)
            .emit();
        Ok(InstallOutcome {
            status: InstallStatus::AcceptedWillReboot,
            changed: true,
            message,
            job: Some(job),
        })
    }

    async fn classify_failure(&self, mut job: InstallJob, status: i32) -> SynmacError {
        if let Err(err) = job.advance(JobState::FailedSynchronously) {
            return err;
        }
        let tail = log_tail(&job.log_path, 20).await;
        self.ctx
            .logger
            .event(LogLevel::Error, "SUBMIT")
            .message("job exited during grace period")
            .field("target", &job.target)
            .field("status", status)
            .field("log", job.log_path.display())
            .emit();

        if credentials_rejected(&tail) {
            SynmacError::CredentialsRejected {
                target: job.target,
                details: tail,
            }
        } else {
            SynmacError::BackgroundSubmission {
                target: job.target,
                details: format!("exited with status {status}: {tail}"),
            }
        }
    }
}

const PROGRESS_PATTERN: &str = r"(?:Downloading|Preparing):\s*\d+(?:\.\d+)?%";
const CREDENTIAL_REJECTION_PATTERN: &str = r"(?i)incorrect password|password (?:is )?(?:incorrect|invalid)|failed to authenticate|authentication (?:failed|error)|not authorized|could not (?:get|obtain) authorization|invalid (?:user(?:name)?|credentials)";

fn shows_progress(log: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(PROGRESS_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(log))
}

fn credentials_rejected(log: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(CREDENTIAL_REJECTION_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(log))
}
