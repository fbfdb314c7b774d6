/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::dialect
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Strategy table of per-release behaviour keyed by the
    target macOS major version: installer bundle name and the
    startosinstall flag set.

  Security / Safety Notes:
    Built commands pass credentials via --stdinpass only; the
    password never appears in an argument vector.

  Dependencies:
    runner::CommandSpec for inspectable command construction.

  Operational Scope:
    Consulted by the fetcher (bundle location) and the driver
    (full-OS install command). Incremental installs share one
    command form across releases and live here as well.

  Revision History:
    2026-10-16 COD  Introduced release dialect table.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Release differences localised in one table
    - Commands inspectable before execution
============================================================*/

use std::path::{Path, PathBuf};

use crate::credentials::Credentials;
use crate::runner::CommandSpec;

/// Behaviour of one supported macOS release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub major: u64,
    pub codename: &'static str,
    pub installer_app: &'static str,
    /// Accepts the undocumented `--nointeraction` switch.
    pub no_interaction: bool,
    /// Seconds passed to `--rebootdelay`, when the release honours it.
    pub reboot_delay: Option<u32>,
}

const DIALECTS: [Dialect; 3] = [
    Dialect {
        major: 13,
        codename: "Ventura",
        installer_app: "Install macOS Ventura.app",
        no_interaction: true,
        reboot_delay: None,
    },
    Dialect {
        major: 14,
        codename: "Sonoma",
        installer_app: "Install macOS Sonoma.app",
        no_interaction: true,
        reboot_delay: Some(30),
    },
    Dialect {
        major: 15,
        codename: "Sequoia",
        installer_app: "Install macOS 15.app",
        no_interaction: false,
        reboot_delay: Some(30),
    },
];

impl Dialect {
    pub fn for_major(major: u64) -> Option<&'static Dialect> {
        DIALECTS.iter().find(|dialect| dialect.major == major)
    }

    pub fn supported_majors() -> Vec<u64> {
        DIALECTS.iter().map(|dialect| dialect.major).collect()
    }

    /// `startosinstall` inside an installer bundle.
    pub fn startosinstall_path(bundle: &Path) -> PathBuf {
        bundle
            .join("Contents")
            .join("Resources")
            .join("startosinstall")
    }

    /// Flags for a full-OS install targeting this release.
    pub fn startosinstall_flags(&self) -> Vec<String> {
        let mut flags = vec!["--agreetolicense".to_string(), "--forcequitapps".to_string()];
        if self.no_interaction {
            flags.push("--nointeraction".into());
        }
        if let Some(delay) = self.reboot_delay {
            flags.push("--rebootdelay".into());
            flags.push(delay.to_string());
        }
        flags
    }

    pub fn startosinstall_command(
        &self,
        bundle: &Path,
        credentials: Option<&Credentials>,
    ) -> CommandSpec {
        let spec = CommandSpec::new(Self::startosinstall_path(bundle)).args(self.startosinstall_flags());
        match credentials {
            Some(creds) => spec
                .arg("--user")
                .arg(creds.username())
                .arg("--stdinpass"),
            None => spec,
        }
    }
}

/// Incremental install; identical on every supported release.
pub fn incremental_install_command(
    softwareupdate: &Path,
    label: &str,
    credentials: Option<&Credentials>,
) -> CommandSpec {
    let spec = CommandSpec::new(softwareupdate)
        .arg("--install")
        .arg(label)
        .args(["--agree-to-license", "--verbose", "--no-scan", "--restart"]);
    match credentials {
        Some(creds) => spec
            .arg("--user")
            .arg(creds.username())
            .arg("--stdinpass"),
        None => spec,
    }
}

/// Full-installer download for an exact version.
pub fn fetch_installer_command(softwareupdate: &Path, version: &str) -> CommandSpec {
    CommandSpec::new(softwareupdate)
        .arg("--fetch-full-installer")
        .arg("--full-installer-version")
        .arg(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("admin", "s3cr3t-pass")
    }

    #[test]
    fn supported_releases_are_thirteen_to_fifteen() {
        assert_eq!(Dialect::supported_majors(), vec![13, 14, 15]);
        assert!(Dialect::for_major(12).is_none());
        assert_eq!(Dialect::for_major(14).unwrap().installer_app, "Install macOS Sonoma.app");
    }

    #[test]
    fn flag_sets_differ_between_target_releases() {
        let bundle = Path::new("/Applications/Install macOS Ventura.app");
        let ventura = Dialect::for_major(13).unwrap().startosinstall_command(bundle, None);
        let sequoia = Dialect::for_major(15)
            .unwrap()
            .startosinstall_command(Path::new("/Applications/Install macOS 15.app"), None);

        assert_ne!(ventura.args, sequoia.args);
        assert!(ventura.has_flag("--nointeraction"));
        assert!(!ventura.has_flag("--rebootdelay"));
        assert!(!sequoia.has_flag("--nointeraction"));
        assert_eq!(sequoia.flag_value("--rebootdelay"), Some("30"));
        for spec in [&ventura, &sequoia] {
            assert!(spec.has_flag("--agreetolicense"));
            assert!(spec.has_flag("--forcequitapps"));
        }
        assert_eq!(
            ventura.program,
            PathBuf::from("/Applications/Install macOS Ventura.app/Contents/Resources/startosinstall")
        );
    }

    #[test]
    fn credentials_travel_as_user_and_stdinpass_only() {
        let creds = creds();
        let spec = Dialect::for_major(14)
            .unwrap()
            .startosinstall_command(Path::new("/Applications/Install macOS Sonoma.app"), Some(&creds));
        assert_eq!(spec.flag_value("--user"), Some("admin"));
        assert!(spec.has_flag("--stdinpass"));
        assert!(!spec.to_string().contains("s3cr3t-pass"));
    }

    #[test]
    fn incremental_command_is_release_independent() {
        let creds = creds();
        let spec = incremental_install_command(
            Path::new("/usr/sbin/softwareupdate"),
            "macOS Sonoma 14.7.2-23H311",
            Some(&creds),
        );
        assert_eq!(spec.flag_value("--install"), Some("macOS Sonoma 14.7.2-23H311"));
        for flag in ["--agree-to-license", "--verbose", "--no-scan", "--restart", "--stdinpass"] {
            assert!(spec.has_flag(flag), "missing {flag}");
        }
        assert!(!spec.to_string().contains("s3cr3t-pass"));

        let anonymous = incremental_install_command(Path::new("/usr/sbin/softwareupdate"), "X", None);
        assert!(!anonymous.has_flag("--user"));
        assert!(!anonymous.has_flag("--stdinpass"));
    }

    #[test]
    fn fetch_command_pins_exact_version() {
        let spec = fetch_installer_command(Path::new("/usr/sbin/softwareupdate"), "14.7.2");
        assert!(spec.has_flag("--fetch-full-installer"));
        assert_eq!(spec.flag_value("--full-installer-version"), Some("14.7.2"));
    }
}
