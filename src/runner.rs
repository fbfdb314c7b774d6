/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::runner
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Execute the platform update tools: captured read-only
    queries and detached, backgrounded submissions whose
    lifetime exceeds the orchestrating call.

  Security / Safety Notes:
    Secrets are written to the child's stdin and the buffer is
    zeroized once written. Command lines never carry them, so
    `CommandSpec` display output is safe to log.

  Dependencies:
    tokio::process for async execution, async-trait for the
    runner seam, zeroize for stdin payloads.

  Operational Scope:
    The single boundary between Syn-Mac-Core and the host's
    softwareupdate, sw_vers and startosinstall binaries.

  Revision History:
    2026-10-16 COD  Extracted command runner boundary.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Reusable helpers for external command diagnostics
============================================================*/

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use zeroize::Zeroizing;

use crate::error::{Result, SynmacError};

/// Fully constructed command line, inspectable before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout followed by stderr, the way softwareupdate interleaves them.
    pub fn combined(&self) -> String {
        if self.stderr.trim().is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// A process detached from the orchestrating call.
#[async_trait]
pub trait SubmittedProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Wait up to `limit` for the process to exit. `Ok(None)` means it
    /// is still running; the process is never killed by this call.
    async fn wait_for(&mut self, limit: Duration) -> Result<Option<i32>>;
}

/// Execution boundary for platform commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output; non-zero exit is returned,
    /// not raised.
    async fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Start a detached process with stdout and stderr appended to
    /// `log_path`, optionally feeding `stdin` before closing it.
    async fn submit(
        &self,
        spec: &CommandSpec,
        stdin: Option<Zeroizing<Vec<u8>>>,
        log_path: &Path,
    ) -> Result<Box<dyn SubmittedProcess>>;
}

/// Run a command and fail on non-zero exit.
pub async fn capture_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<String> {
    let output = runner.capture(spec).await?;
    if !output.success() {
        return Err(SynmacError::CommandFailure {
            command: spec.to_string(),
            status: output.status,
            stderr: output.combined().trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Runner backed by real host processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| map_spawn_error(err, spec))?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn submit(
        &self,
        spec: &CommandSpec,
        stdin: Option<Zeroizing<Vec<u8>>>,
        log_path: &Path,
    ) -> Result<Box<dyn SubmittedProcess>> {
        let log = open_job_log(log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(false);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|err| map_spawn_error(err, spec))?;

        if let Some(payload) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                // An early exit closes the pipe; the caller classifies that exit.
                let written = match pipe.write_all(&payload).await {
                    Ok(()) => pipe.shutdown().await,
                    Err(err) => Err(err),
                };
                if let Err(err) = written {
                    if err.kind() != io::ErrorKind::BrokenPipe {
                        return Err(err.into());
                    }
                }
            }
        }

        Ok(Box::new(DetachedChild { child }))
    }
}

struct DetachedChild {
    child: Child,
}

#[async_trait]
impl SubmittedProcess for DetachedChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_for(&mut self, limit: Duration) -> Result<Option<i32>> {
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(status) => Ok(Some(status?.code().unwrap_or(-1))),
            Err(_) => Ok(None),
        }
    }
}

/// Last `lines` lines of a job log; empty when the log is missing.
pub async fn log_tail(path: &Path, lines: usize) -> String {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let collected: Vec<&str> = text.lines().rev().take(lines).collect();
    collected
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn open_job_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynmacError::Filesystem(format!(
                "Failed to create job log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    File::create(path).map_err(|err| {
        SynmacError::Filesystem(format!("Failed to open job log {}: {err}", path.display()))
    })
}

fn map_spawn_error(err: io::Error, spec: &CommandSpec) -> SynmacError {
    if err.kind() == io::ErrorKind::NotFound {
        SynmacError::CommandMissing {
            command: spec.program.display().to_string(),
        }
    } else {
        SynmacError::Runtime(format!("Failed to spawn {}: {err}", spec.program_name()))
    }
}
