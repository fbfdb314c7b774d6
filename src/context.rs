/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::context
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Bundle the per-invocation collaborators (runner, config,
    timing, logger) and resolve installer bundle locations.

  Security / Safety Notes:
    Holds no secrets.

  Operational Scope:
    Borrowed by the fetcher, driver and orchestrator for the
    duration of one boundary operation.

  Revision History:
    2026-10-16 COD  Introduced invocation context.
============================================================*/

use std::path::{Path, PathBuf};

use crate::catalog::CatalogReader;
use crate::config::{SynmacConfig, Timing};
use crate::dialect::Dialect;
use crate::logger::Logger;
use crate::runner::CommandRunner;

pub struct Context<'a> {
    pub runner: &'a dyn CommandRunner,
    pub config: &'a SynmacConfig,
    pub timing: Timing,
    pub logger: &'a Logger,
}

impl<'a> Context<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a SynmacConfig, logger: &'a Logger) -> Self {
        Self {
            runner,
            config,
            timing: config.timing(),
            logger,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn catalog(&self) -> CatalogReader<'a> {
        CatalogReader::new(self.runner, &self.config.paths.softwareupdate, self.logger)
    }

    pub fn softwareupdate(&self) -> &'a Path {
        &self.config.paths.softwareupdate
    }

    /// Expected installer bundle for a target major release, honouring
    /// configured name overrides.
    pub fn installer_bundle(&self, major: u64) -> Option<PathBuf> {
        let name = match self.config.installer_override(major) {
            Some(name) => name,
            None => Dialect::for_major(major)?.installer_app,
        };
        Some(self.config.paths.applications_dir.join(name))
    }

    pub fn job_log(&self, name: &str) -> PathBuf {
        self.config.paths.job_log_dir.join(name)
    }
}

/// A bundle is usable once its `startosinstall` exists.
pub fn bundle_ready(bundle: &Path) -> bool {
    Dialect::startosinstall_path(bundle).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn bundle_names_follow_overrides_then_table() {
        let mut config = SynmacConfig::default();
        config
            .installers
            .insert("15".into(), "Install macOS Sequoia.app".into());
        let runner = ScriptedRunner::new();
        let logger = Logger::stderr_only();
        let ctx = Context::new(&runner, &config, &logger);

        assert_eq!(
            ctx.installer_bundle(15),
            Some(PathBuf::from("/Applications/Install macOS Sequoia.app"))
        );
        assert_eq!(
            ctx.installer_bundle(13),
            Some(PathBuf::from("/Applications/Install macOS Ventura.app"))
        );
        assert_eq!(ctx.installer_bundle(11), None);
    }

    #[test]
    fn bundle_ready_requires_startosinstall() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Install macOS Sonoma.app");
        std::fs::create_dir_all(&bundle).unwrap();
        assert!(!bundle_ready(&bundle));
        crate::testing::make_bundle(&bundle);
        assert!(bundle_ready(&bundle));
    }
}
