/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load Syn-Mac-Core configuration: platform tool paths,
    installer directory, poll/grace timings and installer
    bundle name overrides.

  Security / Safety Notes:
    Configuration never holds credentials; secrets are only
    accepted per invocation.

  Dependencies:
    serde + toml for parsing, dirs for default locations.

  Operational Scope:
    Read once at startup by the binary entry point.

  Revision History:
    2026-10-16 COD  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Every field defaulted; absent file means defaults
    - Explicit validation with actionable messages
============================================================*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SynmacError};

const CONFIG_DIR: &str = "syn-mac";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynmacConfig {
    pub paths: PathsConfig,
    pub timing: TimingConfig,
    /// Installer bundle name overrides keyed by target major version.
    pub installers: BTreeMap<String, String>,
    pub require_root: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub softwareupdate: PathBuf,
    pub sw_vers: PathBuf,
    pub applications_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub job_log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub download_timeout_secs: u64,
    pub download_poll_interval_secs: u64,
    pub submit_grace_secs: u64,
    pub submit_poll_interval_secs: u64,
}

/// Resolved wait bounds used by the fetcher and driver.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub download_timeout: Duration,
    pub download_poll_interval: Duration,
    pub submit_grace: Duration,
    pub submit_poll_interval: Duration,
}

impl Default for SynmacConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            timing: TimingConfig::default(),
            installers: BTreeMap::new(),
            require_root: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            softwareupdate: PathBuf::from("/usr/sbin/softwareupdate"),
            sw_vers: PathBuf::from("/usr/bin/sw_vers"),
            applications_dir: PathBuf::from("/Applications"),
            log_dir: None,
            job_log_dir: PathBuf::from("/tmp"),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 3600,
            download_poll_interval_secs: 10,
            submit_grace_secs: 30,
            submit_poll_interval_secs: 3,
        }
    }
}

impl SynmacConfig {
    /// Load from an explicit path, or from the default location when
    /// present. An explicit path that does not exist is an error.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(SynmacError::Config(format!(
                        "Configuration file {} does not exist",
                        explicit.display()
                    )));
                }
                Self::load(explicit)?
            }
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::load(&default)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynmacError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| SynmacError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.download_poll_interval_secs == 0 || t.submit_poll_interval_secs == 0 {
            return Err(SynmacError::Config(
                "Poll intervals must be greater than zero".into(),
            ));
        }
        if t.download_poll_interval_secs > t.download_timeout_secs {
            return Err(SynmacError::Config(format!(
                "download_poll_interval_secs ({}) exceeds download_timeout_secs ({})",
                t.download_poll_interval_secs, t.download_timeout_secs
            )));
        }
        if t.submit_poll_interval_secs > t.submit_grace_secs {
            return Err(SynmacError::Config(format!(
                "submit_poll_interval_secs ({}) exceeds submit_grace_secs ({})",
                t.submit_poll_interval_secs, t.submit_grace_secs
            )));
        }
        for key in self.installers.keys() {
            if key.parse::<u64>().is_err() {
                return Err(SynmacError::Config(format!(
                    "[installers] key `{key}` is not a major version number"
                )));
            }
        }
        Ok(())
    }

    /// Directory for the session log.
    pub fn log_dir(&self) -> PathBuf {
        self.paths.log_dir.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join(CONFIG_DIR)
                .join("logs")
        })
    }

    pub fn timing(&self) -> Timing {
        Timing {
            download_timeout: Duration::from_secs(self.timing.download_timeout_secs),
            download_poll_interval: Duration::from_secs(self.timing.download_poll_interval_secs),
            submit_grace: Duration::from_secs(self.timing.submit_grace_secs),
            submit_poll_interval: Duration::from_secs(self.timing.submit_poll_interval_secs),
        }
    }

    /// Configured bundle name override for a target major version.
    pub fn installer_override(&self, major: u64) -> Option<&str> {
        self.installers.get(&major.to_string()).map(String::as_str)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
