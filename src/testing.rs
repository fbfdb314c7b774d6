/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::testing
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Scripted stand-in for the platform tools used by unit
    tests. Records every command and submission.

  Operational Scope:
    Compiled for tests only.

  Revision History:
    2026-10-16 COD  Added scripted runner.
============================================================*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::dialect::Dialect;
use crate::error::{Result, SynmacError};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, SubmittedProcess};

/// How a scripted submission behaves once started.
#[derive(Debug, Clone, Default)]
pub struct SubmitScript {
    /// `None` keeps the process running for the whole test.
    pub exit: Option<i32>,
    pub log: String,
    /// Installer bundle materialised by the submission.
    pub creates_bundle: Option<PathBuf>,
}

/// One recorded submission; stdin is kept so tests can assert delivery.
#[derive(Debug, Clone)]
pub struct Submission {
    pub spec: CommandSpec,
    pub stdin: Option<Vec<u8>>,
    pub log_path: PathBuf,
}

#[derive(Default)]
pub struct ScriptedRunner {
    outputs: HashMap<String, CommandOutput>,
    script: SubmitScript,
    captured: Mutex<Vec<CommandSpec>>,
    submitted: Mutex<Vec<Submission>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, command: &str, status: i32, stdout: &str) -> Self {
        self.outputs.insert(
            command.to_string(),
            CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    pub fn with_submit(mut self, script: SubmitScript) -> Self {
        self.script = script;
        self
    }

    pub fn captured(&self) -> Vec<CommandSpec> {
        self.captured.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut captured) = self.captured.lock() {
            captured.push(spec.clone());
        }
        self.outputs
            .get(&spec.to_string())
            .cloned()
            .ok_or_else(|| SynmacError::CommandMissing {
                command: spec.to_string(),
            })
    }

    async fn submit(
        &self,
        spec: &CommandSpec,
        stdin: Option<Zeroizing<Vec<u8>>>,
        log_path: &Path,
    ) -> Result<Box<dyn SubmittedProcess>> {
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(Submission {
                spec: spec.clone(),
                stdin: stdin.as_ref().map(|payload| payload.to_vec()),
                log_path: log_path.to_path_buf(),
            });
        }
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(log_path, &self.script.log)?;
        if let Some(bundle) = &self.script.creates_bundle {
            make_bundle(bundle);
        }
        Ok(Box::new(ScriptedProcess {
            exit: self.script.exit,
        }))
    }
}

struct ScriptedProcess {
    exit: Option<i32>,
}

#[async_trait]
impl SubmittedProcess for ScriptedProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    async fn wait_for(&mut self, limit: Duration) -> Result<Option<i32>> {
        match self.exit {
            Some(code) => Ok(Some(code)),
            None => {
                tokio::time::sleep(limit).await;
                Ok(None)
            }
        }
    }
}

/// Lay down an installer bundle containing `startosinstall`.
pub fn make_bundle(bundle: &Path) {
    let tool = Dialect::startosinstall_path(bundle);
    if let Some(parent) = tool.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(tool, "#!/bin/sh\n").unwrap();
}
