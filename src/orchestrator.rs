/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::orchestrator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Expose the four boundary operations (list installers, list
    updates, download installer, install) as thin compositions
    of catalog, selector, fetcher and driver, each producing a
    structured report with an idempotency signal.

  Security / Safety Notes:
    Side-effecting operations are gated on root unless the
    configuration opts out. Check mode never spawns a
    side-effecting process.

  Dependencies:
    serde for the report document.

  Operational Scope:
    Called once per CLI invocation by the binary entry point.

  Revision History:
    2026-10-16 COD  Authored orchestration facade.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Host gating before any platform query
    - "Nothing to do", "failed" and "accepted" kept distinct
============================================================*/

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{InstallerRecord, ProductKind, UpdateRecord};
use crate::context::Context;
use crate::credentials::Credentials;
use crate::driver::{InstallDriver, InstallJob, InstallPlan, InstallStatus};
use crate::error::Result;
use crate::fetcher::{FetchPlan, InstallerFetcher};
use crate::host::{self, HostInfo};
use crate::selector::{select, sort_newest_first, FilterCriteria};
use crate::version::VersionSpec;

/// Result document shared by every operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport<T: Serialize> {
    pub changed: bool,
    pub msg: String,
    /// Major release of the host.
    pub macos_version: u64,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallerListing {
    pub installers: Vec<InstallerRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateListing {
    pub updates: Vec<UpdateRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadPayload {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallPayload {
    pub status: InstallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<InstallJob>,
    /// Command that would run; check mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// What `install` should act on.
#[derive(Debug, Clone)]
pub enum InstallTarget {
    Label(String),
    Version(VersionSpec),
}

pub struct Orchestrator<'a> {
    ctx: &'a Context<'a>,
    check_mode: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a Context<'a>, check_mode: bool) -> Self {
        Self { ctx, check_mode }
    }

    async fn host(&self) -> Result<HostInfo> {
        let info = host::detect(self.ctx.runner, &self.ctx.config.paths.sw_vers).await?;
        self.ctx.logger.info(
            "HOST",
            format!("Detected macOS {}", info.product_version),
        );
        Ok(info)
    }

    fn require_privileges(&self) -> Result<()> {
        if self.ctx.config.require_root {
            host::ensure_root()?;
        }
        Ok(())
    }

    fn log_criteria(&self, criteria: &FilterCriteria) {
        let pattern = criteria
            .version_pattern
            .as_ref()
            .map_or("<any>", |pattern| pattern.as_str());
        self.ctx.logger.debug(
            "FILTER",
            format!("pattern={pattern} latest_only={}", criteria.latest_only),
        );
    }

    fn report<T: Serialize>(
        &self,
        host: &HostInfo,
        changed: bool,
        msg: String,
        payload: T,
    ) -> OperationReport<T> {
        OperationReport {
            changed,
            msg,
            macos_version: host.major(),
            payload,
        }
    }

    /// Full installers, newest first. Read-only.
    pub async fn list_installers(
        &self,
        version_pattern: Option<&str>,
        latest_only: bool,
    ) -> Result<OperationReport<InstallerListing>> {
        let host = self.host().await?;
        let criteria = FilterCriteria::new(None, version_pattern, latest_only)?;
        self.log_criteria(&criteria);
        if self.check_mode {
            return Ok(self.report(
                &host,
                false,
                "Check mode: no changes.".into(),
                InstallerListing { installers: Vec::new() },
            ));
        }

        let mut installers = select(self.ctx.catalog().list_installers().await?, &criteria);
        sort_newest_first(&mut installers);
        self.ctx
            .logger
            .info("LIST", format!("{} installers selected", installers.len()));
        Ok(self.report(
            &host,
            false,
            "Installers listed successfully.".into(),
            InstallerListing { installers },
        ))
    }

    /// Pending incremental updates in catalog order. Read-only.
    pub async fn list_updates(
        &self,
        product: Option<ProductKind>,
        version_pattern: Option<&str>,
        latest_only: bool,
    ) -> Result<OperationReport<UpdateListing>> {
        let host = self.host().await?;
        let criteria = FilterCriteria::new(product, version_pattern, latest_only)?;
        self.log_criteria(&criteria);
        if self.check_mode {
            return Ok(self.report(
                &host,
                false,
                "Check mode: no changes.".into(),
                UpdateListing { updates: Vec::new() },
            ));
        }

        let updates = select(self.ctx.catalog().list_updates().await?, &criteria);
        let msg = if updates.is_empty() {
            "No updates available.".to_string()
        } else {
            format!("{} updates available.", updates.len())
        };
        Ok(self.report(&host, false, msg, UpdateListing { updates }))
    }

    /// Fetch a full installer unless its bundle is already present.
    pub async fn download_installer(
        &self,
        version: &VersionSpec,
    ) -> Result<OperationReport<DownloadPayload>> {
        let host = self.host().await?;
        self.require_privileges()?;
        let fetcher = InstallerFetcher::new(self.ctx);

        if self.check_mode {
            let (changed, msg, path) = match fetcher.plan(version).await? {
                FetchPlan::AlreadyPresent { bundle } => {
                    (false, already_present_msg(version, &bundle), bundle)
                }
                FetchPlan::Download { bundle, command, .. } => {
                    (true, format!("Check mode: would run `{command}`."), bundle)
                }
            };
            return Ok(self.report(&host, changed, msg, DownloadPayload { path }));
        }

        let outcome = fetcher.fetch_full_installer(version).await?;
        let msg = if outcome.changed {
            format!(
                "Successfully fetched full installer '{version}', located at '{}'.",
                outcome.path.display()
            )
        } else {
            already_present_msg(version, &outcome.path)
        };
        Ok(self.report(
            &host,
            outcome.changed,
            msg,
            DownloadPayload { path: outcome.path },
        ))
    }

    /// Start an incremental or full-OS install in the background.
    pub async fn install(
        &self,
        target: &InstallTarget,
        credentials: Option<Credentials>,
    ) -> Result<OperationReport<InstallPayload>> {
        let host = self.host().await?;
        self.require_privileges()?;
        let driver = InstallDriver::new(self.ctx, &host);

        if self.check_mode {
            let plan = match target {
                InstallTarget::Label(label) => driver.plan_incremental(label, credentials.as_ref()).await?,
                InstallTarget::Version(version) => driver.plan_full_os(version, credentials.as_ref()).await?,
            };
            drop(credentials);
            let report = match plan {
                InstallPlan::NothingToDo { reason } => self.report(
                    &host,
                    false,
                    reason,
                    InstallPayload {
                        status: InstallStatus::NothingToDo,
                        job: None,
                        command: None,
                    },
                ),
                InstallPlan::Submit { target, command, .. } => self.report(
                    &host,
                    true,
                    format!("Check mode: would start {target}."),
                    InstallPayload {
                        status: InstallStatus::Planned,
                        job: None,
                        command: Some(command.to_string()),
                    },
                ),
            };
            return Ok(report);
        }

        let outcome = match target {
            InstallTarget::Label(label) => driver.install_incremental(label, credentials).await?,
            InstallTarget::Version(version) => driver.install_full_os(version, credentials).await?,
        };
        Ok(self.report(
            &host,
            outcome.changed,
            outcome.message,
            InstallPayload {
                status: outcome.status,
                job: outcome.job,
                command: None,
            },
        ))
    }
}

/// Bundles are keyed by major release, so a present bundle may hold a
/// different point release than the one requested.
fn already_present_msg(version: &VersionSpec, bundle: &Path) -> String {
    format!(
        "Installer for macOS {} already present at '{}'; its point release was not \
         verified against the requested {version}. Remove the bundle to force a fresh download.",
        version.major(),
        bundle.display()
    )
}
