/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::host
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Probe the managed host: running macOS version, support for
    its major release, and effective privileges.

  Security / Safety Notes:
    Read-only: sw_vers and geteuid.

  Dependencies:
    libc for geteuid, runner boundary for sw_vers.

  Operational Scope:
    Every boundary operation gates on the probe and reports the
    host major version in its result document.

  Revision History:
    2026-10-16 COD  Authored host probe.
============================================================*/

use std::path::Path;

use crate::dialect::Dialect;
use crate::error::{Result, SynmacError};
use crate::runner::{capture_checked, CommandRunner, CommandSpec};
use crate::version::VersionSpec;

/// The macOS release currently running on the host.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub product_version: VersionSpec,
}

impl HostInfo {
    pub fn major(&self) -> u64 {
        self.product_version.major()
    }
}

/// Read `sw_vers -productVersion` and reject unsupported releases.
pub async fn detect(runner: &dyn CommandRunner, sw_vers: &Path) -> Result<HostInfo> {
    let spec = CommandSpec::new(sw_vers).arg("-productVersion");
    let stdout = capture_checked(runner, &spec).await?;
    let raw = stdout.trim();
    let product_version: VersionSpec = raw.parse().map_err(|_| {
        SynmacError::UnsupportedHost(format!("could not determine macOS version from `{raw}`"))
    })?;

    if Dialect::for_major(product_version.major()).is_none() {
        return Err(SynmacError::UnsupportedHost(format!(
            "macOS {product_version} is not supported; supported major versions: {:?}",
            Dialect::supported_majors()
        )));
    }
    Ok(HostInfo { product_version })
}

/// Reject non-macOS platforms before touching any tool.
pub fn ensure_darwin() -> Result<()> {
    if cfg!(target_os = "macos") {
        Ok(())
    } else {
        Err(SynmacError::UnsupportedHost(format!(
            "only macOS (Darwin) hosts are supported; current OS: {}",
            std::env::consts::OS
        )))
    }
}

/// Side-effecting operations must run as root.
pub fn ensure_root() -> Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        Ok(())
    } else {
        Err(SynmacError::PrivilegeRequired { euid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn detects_supported_release() {
        let runner = ScriptedRunner::new().with_output("sw_vers -productVersion", 0, "14.6.1\n");
        let host = detect(&runner, Path::new("sw_vers")).await.unwrap();
        assert_eq!(host.major(), 14);
        assert_eq!(host.product_version.to_string(), "14.6.1");
    }

    #[tokio::test]
    async fn rejects_unsupported_release() {
        let runner = ScriptedRunner::new().with_output("sw_vers -productVersion", 0, "12.7.6\n");
        let err = detect(&runner, Path::new("sw_vers")).await.unwrap_err();
        assert!(matches!(err, SynmacError::UnsupportedHost(_)));
    }

    #[tokio::test]
    async fn rejects_garbage_version() {
        let runner = ScriptedRunner::new().with_output("sw_vers -productVersion", 0, "unknown\n");
        assert!(detect(&runner, Path::new("sw_vers")).await.is_err());
    }
}
