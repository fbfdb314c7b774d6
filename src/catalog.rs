/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::catalog
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Query softwareupdate for incremental updates and full
    installers and normalise its textual listing into records.

  Security / Safety Notes:
    Read-only invocations of softwareupdate; no state changes.

  Dependencies:
    serde for record output, runner boundary for execution.

  Operational Scope:
    Feeds the selector, fetcher and driver. Every call queries
    the platform anew; nothing is cached between calls.

  Revision History:
    2026-10-16 COD  Crafted softwareupdate catalog reader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Field-delimited parsing, never fixed column offsets
    - Malformed records fail the whole query
============================================================*/

use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SynmacError};
use crate::logger::Logger;
use crate::runner::{CommandRunner, CommandSpec};
use crate::version::VersionSpec;

/// Update category derived from the update title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Macos,
    Xcode,
    CommandLineTools,
    Safari,
    Security,
    Firmware,
    PrinterDrivers,
    Other,
}

impl ProductKind {
    pub const ALL: [ProductKind; 8] = [
        ProductKind::Macos,
        ProductKind::Xcode,
        ProductKind::CommandLineTools,
        ProductKind::Safari,
        ProductKind::Security,
        ProductKind::Firmware,
        ProductKind::PrinterDrivers,
        ProductKind::Other,
    ];

    pub fn classify(title: &str) -> Self {
        if title.starts_with("macOS") {
            ProductKind::Macos
        } else if title.starts_with("Xcode ") || title.starts_with("Xcode-") {
            ProductKind::Xcode
        } else if title.starts_with("Command Line Tools") {
            ProductKind::CommandLineTools
        } else if title.starts_with("Safari") {
            ProductKind::Safari
        } else if title.starts_with("Security Update") {
            ProductKind::Security
        } else if title.contains("Firmware Update") {
            ProductKind::Firmware
        } else if title.contains("Printer Drivers") {
            ProductKind::PrinterDrivers
        } else {
            ProductKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Macos => "macos",
            ProductKind::Xcode => "xcode",
            ProductKind::CommandLineTools => "command_line_tools",
            ProductKind::Safari => "safari",
            ProductKind::Security => "security",
            ProductKind::Firmware => "firmware",
            ProductKind::PrinterDrivers => "printer_drivers",
            ProductKind::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

/// One incremental update offered by `softwareupdate --list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub label: String,
    pub title: String,
    pub version: VersionSpec,
    /// Version text as printed, e.g. `13.4.1 (c)` for a security response.
    pub version_raw: String,
    pub product: ProductKind,
    pub size_bytes: Option<u64>,
    pub recommended: bool,
    pub restart_required: bool,
    pub action: Option<String>,
}

/// One full installer offered by `softwareupdate --list-full-installers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallerRecord {
    pub title: String,
    pub version: VersionSpec,
    pub version_raw: String,
    pub build: String,
    pub size_bytes: u64,
    pub deferred: bool,
}

/// Reads the platform update catalog through the runner boundary.
pub struct CatalogReader<'a> {
    runner: &'a dyn CommandRunner,
    softwareupdate: &'a Path,
    logger: &'a Logger,
}

impl<'a> CatalogReader<'a> {
    pub fn new(runner: &'a dyn CommandRunner, softwareupdate: &'a Path, logger: &'a Logger) -> Self {
        Self {
            runner,
            softwareupdate,
            logger,
        }
    }

    pub fn list_updates_command(&self) -> CommandSpec {
        CommandSpec::new(self.softwareupdate).arg("--list")
    }

    pub fn list_installers_command(&self) -> CommandSpec {
        CommandSpec::new(self.softwareupdate).arg("--list-full-installers")
    }

    pub async fn list_updates(&self) -> Result<Vec<UpdateRecord>> {
        let raw = self.query(self.list_updates_command()).await?;
        let records = parse_updates(&raw)?;
        self.logger.debug(
            "CATALOG",
            format!("softwareupdate --list yielded {} updates", records.len()),
        );
        Ok(records)
    }

    pub async fn list_installers(&self) -> Result<Vec<InstallerRecord>> {
        let raw = self.query(self.list_installers_command()).await?;
        let records = parse_installers(&raw)?;
        self.logger.debug(
            "CATALOG",
            format!(
                "softwareupdate --list-full-installers yielded {} installers",
                records.len()
            ),
        );
        Ok(records)
    }

    async fn query(&self, spec: CommandSpec) -> Result<String> {
        let output = self.runner.capture(&spec).await.map_err(|err| match err {
            SynmacError::CommandMissing { command } => SynmacError::CatalogUnavailable {
                details: format!("`{command}` is not available on this host"),
            },
            other => other,
        })?;
        if !output.success() {
            return Err(SynmacError::CatalogUnavailable {
                details: format!(
                    "`{spec}` exited with status {}: {}",
                    output.status,
                    output.combined().trim()
                ),
            });
        }
        Ok(output.combined())
    }
}

/// Parse `softwareupdate --list` output.
///
/// Each update is a `* Label: <label>` line followed by an indented
/// `Title: ..., Version: ..., Size: ..., Recommended: ..., Action: ...,`
/// line. A label without a parseable detail line fails the query.
pub fn parse_updates(raw: &str) -> Result<Vec<UpdateRecord>> {
    let mut records = Vec::new();
    let mut pending: Option<String> = None;

    for line in raw.lines().map(str::trim) {
        if let Some(label) = line.strip_prefix("* Label:") {
            if let Some(orphan) = pending.take() {
                return Err(malformed(&format!("* Label: {orphan}"), "label without details"));
            }
            let label = label.trim();
            if label.is_empty() {
                return Err(malformed(line, "empty label"));
            }
            pending = Some(label.to_string());
        } else if line.starts_with("Title:") {
            let Some(label) = pending.take() else {
                return Err(malformed(line, "details without a preceding label"));
            };
            records.push(update_from_fields(label, line)?);
        }
    }

    if let Some(orphan) = pending {
        return Err(malformed(&format!("* Label: {orphan}"), "label without details"));
    }
    Ok(records)
}

/// Parse `softwareupdate --list-full-installers` output.
pub fn parse_installers(raw: &str) -> Result<Vec<InstallerRecord>> {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("* ").filter(|rest| rest.starts_with("Title:")))
        .map(installer_from_fields)
        .collect()
}

fn update_from_fields(label: String, line: &str) -> Result<UpdateRecord> {
    let fields = FieldLine::parse(line);
    let title = fields.required("Title", line)?.to_string();
    let version_raw = fields.required("Version", line)?.to_string();
    let version = parse_version_field(&version_raw, line)?;
    let size_bytes = match fields.get("Size") {
        Some(size) => Some(parse_size(size).ok_or_else(|| malformed(line, "unreadable size"))?),
        None => None,
    };
    let recommended = parse_flag(fields.get("Recommended").unwrap_or("NO"), line)?;
    let action = fields.get("Action").map(str::to_string);
    let restart_required = action
        .as_deref()
        .is_some_and(|action| action.eq_ignore_ascii_case("restart"));

    Ok(UpdateRecord {
        label,
        product: ProductKind::classify(&title),
        title,
        version,
        version_raw,
        size_bytes,
        recommended,
        restart_required,
        action,
    })
}

fn installer_from_fields(line: &str) -> Result<InstallerRecord> {
    let fields = FieldLine::parse(line);
    let title = fields.required("Title", line)?.to_string();
    let version_raw = fields.required("Version", line)?.to_string();
    let version = parse_version_field(&version_raw, line)?;
    let size_bytes =
        parse_size(fields.required("Size", line)?).ok_or_else(|| malformed(line, "unreadable size"))?;
    let build = fields.required("Build", line)?.to_string();
    let deferred = parse_flag(fields.get("Deferred").unwrap_or("NO"), line)?;

    Ok(InstallerRecord {
        title,
        version,
        version_raw,
        build,
        size_bytes,
        deferred,
    })
}

/// `Key: value` pairs separated by commas. A segment that does not start
/// with a key is glued back onto the previous value, so titles that
/// contain commas survive.
struct FieldLine<'a> {
    fields: Vec<(&'a str, String)>,
}

impl<'a> FieldLine<'a> {
    fn parse(line: &'a str) -> Self {
        let body = line.trim().trim_end_matches(',');
        let mut fields: Vec<(&'a str, String)> = Vec::new();
        for segment in body.split(',') {
            match split_key(segment) {
                Some((key, value)) => fields.push((key, value.trim().to_string())),
                None => {
                    if let Some((_, value)) = fields.last_mut() {
                        value.push(',');
                        value.push_str(segment.trim_end());
                    }
                }
            }
        }
        Self { fields }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, key: &str, line: &str) -> Result<&str> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| malformed(line, &format!("missing `{key}` field")))
    }
}

fn split_key(segment: &str) -> Option<(&str, &str)> {
    let (key, value) = segment.split_once(':')?;
    let key = key.trim();
    let looks_like_key = !key.is_empty()
        && key.len() <= 24
        && key.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
        && key.starts_with(|c: char| c.is_ascii_uppercase());
    looks_like_key.then_some((key, value))
}

fn parse_version_field(raw: &str, line: &str) -> Result<VersionSpec> {
    VersionSpec::parse_leading(raw)
        .ok_or_else(|| malformed(line, &format!("unparseable version `{raw}`")))
}

fn parse_flag(raw: &str, line: &str) -> Result<bool> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "YES" | "TRUE" => Ok(true),
        "NO" | "FALSE" | "" => Ok(false),
        other => Err(malformed(line, &format!("unexpected flag value `{other}`"))),
    }
}

/// Sizes are printed as `2387500KiB`, older tools print `2387500K`.
fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let magnitude = number.replace(',', "").parse::<f64>().ok()?;
    let multiplier = match unit.trim() {
        "" | "B" => 1_f64,
        "K" | "KB" | "KiB" => 1024_f64,
        "M" | "MB" | "MiB" => 1024_f64.powi(2),
        "G" | "GB" | "GiB" => 1024_f64.powi(3),
        _ => return None,
    };
    let bytes = magnitude * multiplier;
    if bytes.is_finite() && bytes >= 0.0 {
        Some(bytes.round() as u64)
    } else {
        None
    }
}

fn malformed(line: &str, reason: &str) -> SynmacError {
    SynmacError::CatalogUnavailable {
        details: format!("{reason} in line `{line}`"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_listing_with_products_and_flags() {
        let records = parse_updates(fixtures::UPDATES).unwrap();
        assert_eq!(records.len(), 4);

        let clt = &records[0];
        assert_eq!(clt.label, "Command Line Tools for Xcode-16.2");
        assert_eq!(clt.product, ProductKind::CommandLineTools);
        assert!(!clt.restart_required);
        assert_eq!(clt.action, None);

        let sonoma = &records[1];
        assert_eq!(sonoma.title, "macOS Sonoma 14.7.2");
        assert_eq!(sonoma.version.to_string(), "14.7.2");
        assert_eq!(sonoma.product, ProductKind::Macos);
        assert_eq!(sonoma.size_bytes, Some(1_717_588 * 1024));
        assert!(sonoma.recommended);
        assert!(sonoma.restart_required);

        assert_eq!(records[2].product, ProductKind::Safari);
    }

    #[test]
    fn no_updates_is_an_empty_listing() {
        let raw = "Software Update Tool\n\nFinding available software\nNo new software available.\n";
        assert!(parse_updates(raw).unwrap().is_empty());
    }

    #[test]
    fn tolerates_reordered_fields_and_commas_in_titles() {
        let raw = "* Label: Printer-Drivers-1\n   Title: HP Printer Drivers, Inkjet, Recommended: NO, Version: 5.1, Size: 10K\n";
        let records = parse_updates(raw).unwrap();
        assert_eq!(records[0].title, "HP Printer Drivers, Inkjet");
        assert_eq!(records[0].product, ProductKind::PrinterDrivers);
        assert_eq!(records[0].size_bytes, Some(10 * 1024));
        assert!(!records[0].recommended);
    }

    #[test]
    fn label_without_details_fails_whole_query() {
        let raw = "* Label: macOS Sonoma 14.7.2-23H311\n* Label: Safari\n\tTitle: Safari, Version: 18.2, Size: 1KiB, Recommended: YES,\n";
        let err = parse_updates(raw).unwrap_err();
        assert!(matches!(err, SynmacError::CatalogUnavailable { .. }));
        assert!(err.to_string().contains("macOS Sonoma 14.7.2-23H311"));
    }

    #[test]
    fn unparseable_version_is_reported_with_raw_line() {
        let raw = "* Label: Broken\n\tTitle: Broken, Version: banana, Size: 1KiB, Recommended: YES,\n";
        let err = parse_updates(raw).unwrap_err();
        assert!(err.to_string().contains("banana"));
    }

    #[test]
    fn parses_installer_listing() {
        let records = parse_installers(fixtures::INSTALLERS).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].title, "macOS Sequoia");
        assert_eq!(records[0].build, "24C101");
        assert_eq!(records[0].size_bytes, 15_118_738 * 1024);
        assert!(!records[0].deferred);
        assert_eq!(records[3].version.major(), 13);
    }

    #[test]
    fn installer_line_missing_build_fails() {
        let raw = "* Title: macOS Sonoma, Version: 14.7.2, Size: 13338659KiB, Deferred: NO\n";
        let err = parse_installers(raw).unwrap_err();
        assert!(err.to_string().contains("Build"));
    }

    #[test]
    fn product_names_round_trip() {
        for kind in ProductKind::ALL {
            assert_eq!(ProductKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProductKind::parse("all"), None);
    }

    #[test]
    fn rapid_security_response_keeps_raw_version() {
        let raw = "Software Update Tool

Finding available software
Software Update found the following new or updated software:
* Label: macOS Ventura 13.4.1 (c)-22F770820d
\tTitle: macOS Ventura 13.4.1 (c), Version: 13.4.1 (c), Size: 176584KiB, Recommended: YES, Action: restart,
* Label: Safari16.5.2VenturaAuto-16.5.2
\tTitle: Safari, Version: 16.5.2, Size: 156789KiB, Recommended: YES,
";
        let records = parse_updates(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, "13.4.1".parse().unwrap());
        assert_eq!(records[0].version_raw, "13.4.1 (c)");
        assert_eq!(records[0].product, ProductKind::Macos);
        assert!(records[0].restart_required);
        assert_eq!(records[1].version_raw, "16.5.2");
    }
}
