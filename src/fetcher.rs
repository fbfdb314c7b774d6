/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::fetcher
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Download a full macOS installer for an exact version and
    resolve the resulting application bundle path.

  Security / Safety Notes:
    Runs softwareupdate --fetch-full-installer only; Apple's
    own signature and integrity checks are left untouched.

  Dependencies:
    tokio::time for the bounded poll loop.

  Operational Scope:
    Backs the download-installer operation. Existing bundles
    short-circuit the download entirely.

  Revision History:
    2026-10-16 COD  Authored installer fetcher.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Idempotent: present bundle means no download
    - Bounded waits with explicit timeout errors
============================================================*/

use std::path::PathBuf;

use tokio::time::Instant;

use crate::catalog::InstallerRecord;
use crate::context::{bundle_ready, Context};
use crate::dialect::{fetch_installer_command, Dialect};
use crate::error::{Result, SynmacError};
use crate::logger::LogLevel;
use crate::runner::{log_tail, CommandSpec};
use crate::selector::{select, FilterCriteria};
use crate::version::{exact_pattern, VersionSpec};

const FETCH_LOG: &str = "softwareupdate_fetch.log";

/// What a fetch would do, decided before any side effect.
#[derive(Debug, Clone)]
pub enum FetchPlan {
    AlreadyPresent { bundle: PathBuf },
    Download {
        bundle: PathBuf,
        installer: InstallerRecord,
        command: CommandSpec,
    },
}

/// Result of a completed fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub changed: bool,
}

pub struct InstallerFetcher<'a> {
    ctx: &'a Context<'a>,
}

impl<'a> InstallerFetcher<'a> {
    pub fn new(ctx: &'a Context<'a>) -> Self {
        Self { ctx }
    }

    /// Resolve the request against the bundle directory and catalog.
    pub async fn plan(&self, version: &VersionSpec) -> Result<FetchPlan> {
        let not_found = || SynmacError::VersionNotFound {
            version: version.to_string(),
        };
        if Dialect::for_major(version.major()).is_none() {
            return Err(not_found());
        }
        let bundle = self.ctx.installer_bundle(version.major()).ok_or_else(not_found)?;

        if bundle_ready(&bundle) {
            return Ok(FetchPlan::AlreadyPresent { bundle });
        }

        let installers = self.ctx.catalog().list_installers().await?;
        let criteria = FilterCriteria::exact(exact_pattern(version)?);
        let installer = select(installers, &criteria)
            .into_iter()
            .next()
            .ok_or_else(not_found)?;

        Ok(FetchPlan::Download {
            command: fetch_installer_command(self.ctx.softwareupdate(), &installer.version.to_string()),
            bundle,
            installer,
        })
    }

    pub async fn fetch_full_installer(&self, version: &VersionSpec) -> Result<FetchOutcome> {
        match self.plan(version).await? {
            FetchPlan::AlreadyPresent { bundle } => {
                self.ctx
                    .logger
                    .event(LogLevel::Info, "FETCH")
                    .message("installer already present; skipping download")
                    .field("path", bundle.display())
                    .emit();
                Ok(FetchOutcome {
                    path: bundle,
                    changed: false,
                })
            }
            FetchPlan::Download {
                bundle,
                installer,
                command,
            } => self.download(version, bundle, &installer, &command).await,
        }
    }

    async fn download(
        &self,
        version: &VersionSpec,
        bundle: PathBuf,
        installer: &InstallerRecord,
        command: &CommandSpec,
    ) -> Result<FetchOutcome> {
        let timing = self.ctx.timing;
        let log_path = self.ctx.job_log(FETCH_LOG);
        self.ctx
            .logger
            .event(LogLevel::Info, "FETCH")
            .message("starting full installer download")
            .field("version", &installer.version)
            .field("build", &installer.build)
            .field("command", command)
            .emit();

        let mut process = self.ctx.runner.submit(command, None, &log_path).await?;
        let started = Instant::now();
        let mut exited = false;

        loop {
            if bundle_ready(&bundle) {
                self.ctx
                    .logger
                    .event(LogLevel::Info, "FETCH")
                    .message("installer bundle available")
                    .field("path", bundle.display())
                    .field("elapsed_secs", started.elapsed().as_secs())
                    .emit();
                return Ok(FetchOutcome {
                    path: bundle,
                    changed: true,
                });
            }

            let elapsed = started.elapsed();
            if elapsed >= timing.download_timeout {
                return Err(SynmacError::DownloadTimeout {
                    version: version.to_string(),
                    path: bundle.display().to_string(),
                    waited_secs: elapsed.as_secs(),
                    partial: bundle.exists(),
                });
            }
            let slice = timing
                .download_poll_interval
                .min(timing.download_timeout - elapsed);

            if exited {
                tokio::time::sleep(slice).await;
                continue;
            }
            if let Some(status) = process.wait_for(slice).await? {
                exited = true;
                if status != 0 && !bundle.exists() {
                    let log_tail = log_tail(&log_path, 20).await;
                    self.ctx
                        .logger
                        .event(LogLevel::Error, "FETCH")
                        .message("download command failed")
                        .field("status", status)
                        .field("log", log_path.display())
                        .emit();
                    return Err(SynmacError::DownloadFailed {
                        version: version.to_string(),
                        status,
                        log_tail,
                    });
                }
                self.ctx
                    .logger
                    .debug("FETCH", format!("download command exited with status {status}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::fixtures;
    use crate::config::{SynmacConfig, Timing};
    use crate::logger::Logger;
    use crate::testing::{make_bundle, ScriptedRunner, SubmitScript};

    fn config(apps: &std::path::Path) -> SynmacConfig {
        let mut config = SynmacConfig::default();
        config.paths.softwareupdate = PathBuf::from("softwareupdate");
        config.paths.applications_dir = apps.join("Applications");
        config.paths.job_log_dir = apps.join("logs");
        config
    }

    fn timing() -> Timing {
        Timing {
            download_timeout: Duration::from_millis(150),
            download_poll_interval: Duration::from_millis(10),
            submit_grace: Duration::from_millis(50),
            submit_poll_interval: Duration::from_millis(10),
        }
    }

    fn catalog_runner() -> ScriptedRunner {
        ScriptedRunner::new().with_output("softwareupdate --list-full-installers", 0, fixtures::INSTALLERS)
    }

    fn v(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn existing_bundle_short_circuits_twice() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let bundle = config.paths.applications_dir.join("Install macOS Sonoma.app");
        make_bundle(&bundle);
        let runner = catalog_runner();
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());
        let fetcher = InstallerFetcher::new(&ctx);

        for _ in 0..2 {
            let outcome = fetcher.fetch_full_installer(&v("14.7.2")).await.unwrap();
            assert!(!outcome.changed);
            assert_eq!(outcome.path, bundle);
        }
        assert!(runner.submissions().is_empty());
        assert!(runner.captured().is_empty());
    }

    #[tokio::test]
    async fn downloads_and_waits_for_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let bundle = config.paths.applications_dir.join("Install macOS Sonoma.app");
        let runner = catalog_runner().with_submit(SubmitScript {
            exit: Some(0),
            log: "Downloading: 100.00%\nInstall finished successfully\n".into(),
            creates_bundle: Some(bundle.clone()),
        });
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());

        let outcome = InstallerFetcher::new(&ctx)
            .fetch_full_installer(&v("14.7.2"))
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.path, bundle);

        let submissions = runner.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0].spec.flag_value("--full-installer-version"),
            Some("14.7.2")
        );
        assert!(submissions[0].stdin.is_none());
    }

    #[tokio::test]
    async fn unknown_version_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let runner = catalog_runner();
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());

        let err = InstallerFetcher::new(&ctx)
            .fetch_full_installer(&v("14.9"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynmacError::VersionNotFound { .. }));
        assert!(runner.submissions().is_empty());
    }

    #[tokio::test]
    async fn unsupported_major_is_not_found_without_catalog_query() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let runner = catalog_runner();
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());

        let err = InstallerFetcher::new(&ctx)
            .fetch_full_installer(&v("12.7.6"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynmacError::VersionNotFound { .. }));
        assert!(runner.captured().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_without_bundle_is_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let runner = catalog_runner().with_submit(SubmitScript {
            exit: Some(1),
            log: "Install failed with error: The network connection was lost.\n".into(),
            creates_bundle: None,
        });
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());

        let err = InstallerFetcher::new(&ctx)
            .fetch_full_installer(&v("15.2"))
            .await
            .unwrap_err();
        match err {
            SynmacError::DownloadFailed { status, log_tail, .. } => {
                assert_eq!(status, 1);
                assert!(log_tail.contains("network connection was lost"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn bundle_that_never_appears_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let runner = catalog_runner().with_submit(SubmitScript {
            exit: None,
            log: "Downloading: 12.00%\n".into(),
            creates_bundle: None,
        });
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger).with_timing(timing());

        let err = InstallerFetcher::new(&ctx)
            .fetch_full_installer(&v("13.7.2"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynmacError::DownloadTimeout { partial: false, .. }));
        assert!(err.is_retryable());
    }
}
