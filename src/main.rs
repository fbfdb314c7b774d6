/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Mac Core. Lists installers and updates,
    fetches full installers and starts backgrounded installs,
    emitting one JSON result document per invocation for the
    automation layer that drives it.

  Security / Safety Notes:
    Passwords are accepted only on stdin or via SYNMAC_PASSWORD,
    never as arguments. Download and install require root unless
    the configuration opts out.

  Dependencies:
    clap for CLI parsing, chrono for session stamps, serde_json
    for the result document.

  Operational Scope:
    Invoked per task by the automation layer, or by operators
    directly on a managed macOS host.

  Revision History:
    2026-10-16 COD  Authored Syn-Mac Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

mod catalog;
mod config;
mod context;
mod credentials;
mod dialect;
mod driver;
mod error;
mod fetcher;
mod host;
mod logger;
mod orchestrator;
mod runner;
mod selector;
#[cfg(test)]
mod testing;
mod version;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use zeroize::Zeroizing;

use catalog::ProductKind;
use config::SynmacConfig;
use context::Context;
use credentials::Credentials;
use error::{Result, SynmacError};
use logger::Logger;
use orchestrator::{InstallTarget, Orchestrator};
use runner::SystemRunner;
use version::VersionSpec;

const PASSWORD_ENV: &str = "SYNMAC_PASSWORD";

/// Command-line arguments for Syn-Mac-Core.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Mac-Core",
    version,
    author = "Synavera Systems",
    about = "Deliberate macOS update orchestration"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, global = true, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    /// Report what would happen without side effects.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    check: bool,
    #[command(subcommand)]
    command: Operation,
}

#[derive(Debug, Subcommand)]
enum Operation {
    /// List full macOS installers, newest first.
    ListInstallers(FilterArgs),
    /// List pending incremental updates.
    ListUpdates {
        /// Restrict to one product category (macos, safari, xcode, ...).
        #[arg(long, value_parser = parse_product)]
        product: Option<ProductKind>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Fetch a full installer into the applications directory.
    DownloadInstaller {
        #[arg(long, value_name = "VERSION")]
        version: VersionSpec,
    },
    /// Start an incremental update or a full-OS install in the background.
    Install(InstallArgs),
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// Regex matched against version strings; add `^` to anchor.
    #[arg(long, value_name = "REGEX")]
    version_pattern: Option<String>,
    /// Keep only the newest entry per product (updates) or release (installers).
    #[arg(long, action = ArgAction::SetTrue)]
    latest_only: bool,
}

#[derive(Debug, Args)]
struct InstallArgs {
    /// Label of an incremental update, as shown by list-updates.
    #[arg(long, conflicts_with = "version", required_unless_present = "version")]
    label: Option<String>,
    /// Target macOS version for a full-OS install.
    #[arg(long, value_name = "VERSION")]
    version: Option<VersionSpec>,
    /// Administrator account used to authorise the install.
    #[arg(long)]
    username: Option<String>,
    /// Read the administrator password from the first line of stdin.
    #[arg(long, action = ArgAction::SetTrue, requires = "username")]
    password_stdin: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_failure(&err);
            err.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    host::ensure_darwin()?;
    let config = SynmacConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("core_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info("INIT", "Syn-Mac Core awakening.");
    if cli.check {
        logger.warn("CHECK", "Check mode active; no side effects will be performed");
    }

    let runner = SystemRunner;
    let ctx = Context::new(&runner, &config, &logger);
    let orchestrator = Orchestrator::new(&ctx, cli.check);

    let result = dispatch(&orchestrator, cli.command).await;
    match &result {
        Ok(()) => logger.info("COMPLETE", "Operation finished."),
        Err(err) => logger.error(
            "FAILED",
            format!("[{}] {err} (retryable={})", err.kind(), err.is_retryable()),
        ),
    }
    if let Some(path) = logger.path() {
        logger.debug("LOG", format!("Session log at {}", path.display()));
    }
    logger.finalize()?;
    result
}

async fn dispatch(orchestrator: &Orchestrator<'_>, operation: Operation) -> Result<()> {
    match operation {
        Operation::ListInstallers(filter) => print_report(
            &orchestrator
                .list_installers(filter.version_pattern.as_deref(), filter.latest_only)
                .await?,
        ),
        Operation::ListUpdates { product, filter } => print_report(
            &orchestrator
                .list_updates(product, filter.version_pattern.as_deref(), filter.latest_only)
                .await?,
        ),
        Operation::DownloadInstaller { version } => {
            print_report(&orchestrator.download_installer(&version).await?)
        }
        Operation::Install(args) => {
            let credentials = read_credentials(args.username, args.password_stdin)?;
            let target = match (args.label, args.version) {
                (Some(label), _) => InstallTarget::Label(label),
                (None, Some(version)) => InstallTarget::Version(version),
                (None, None) => {
                    return Err(SynmacError::Config(
                        "install requires --label or --version".into(),
                    ))
                }
            };
            print_report(&orchestrator.install(&target, credentials).await?)
        }
    }
}

/// Assemble credentials from `--username` and the password source.
fn read_credentials(username: Option<String>, password_stdin: bool) -> Result<Option<Credentials>> {
    let Some(username) = username else {
        return Ok(None);
    };
    let password = if password_stdin {
        let mut line = Zeroizing::new(String::new());
        std::io::stdin().lock().read_line(&mut line)?;
        Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string())
    } else {
        match std::env::var(PASSWORD_ENV) {
            Ok(value) => Zeroizing::new(value),
            Err(_) => {
                return Err(SynmacError::Config(format!(
                    "--username requires a password via --password-stdin or {PASSWORD_ENV}"
                )))
            }
        }
    };
    if password.is_empty() {
        return Err(SynmacError::Config("Supplied password is empty".into()));
    }
    Ok(Some(Credentials::new(username, password.as_str())))
}

fn parse_product(raw: &str) -> std::result::Result<ProductKind, String> {
    ProductKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ProductKind::ALL.iter().map(|kind| kind.as_str()).collect();
        format!("unknown product `{raw}`; expected one of {}", known.join(", "))
    })
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(report)
        .map_err(|err| SynmacError::Serialization(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_failure(err: &SynmacError) {
    let document = json!({
        "failed": true,
        "changed": false,
        "msg": err.to_string(),
        "kind": err.kind(),
        "retryable": err.is_retryable(),
    });
    println!("{document:#}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["synmac", "install"]).is_err());
        assert!(Cli::try_parse_from([
            "synmac", "install", "--label", "Safari", "--version", "15"
        ])
        .is_err());
        let cli = Cli::try_parse_from(["synmac", "--check", "install", "--version", "14.7"]).unwrap();
        assert!(cli.check);
        assert!(matches!(cli.command, Operation::Install(InstallArgs { version: Some(_), .. })));
    }

    #[test]
    fn password_is_never_an_argument() {
        assert!(Cli::try_parse_from([
            "synmac", "install", "--label", "x", "--username", "admin", "--password", "pw"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["synmac", "install", "--label", "x", "--password-stdin"]).is_err());
    }

    #[test]
    fn product_and_version_are_validated_at_parse_time() {
        assert!(Cli::try_parse_from(["synmac", "list-updates", "--product", "safari"]).is_ok());
        assert!(Cli::try_parse_from(["synmac", "list-updates", "--product", "itunes"]).is_err());
        assert!(Cli::try_parse_from(["synmac", "download-installer", "--version", "14.x"]).is_err());
    }

    #[test]
    fn missing_username_means_no_credentials() {
        assert!(read_credentials(None, false).unwrap().is_none());
    }
}
