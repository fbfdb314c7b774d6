/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse and order dotted macOS version strings and evaluate
    caller-supplied version filter patterns.

  Security / Safety Notes:
    Pure computation; no I/O performed in this module.

  Dependencies:
    regex for filter patterns, serde for record output.

  Operational Scope:
    Used by the catalog parser, selector, fetcher and driver
    whenever versions are compared or filtered.

  Revision History:
    2026-10-16 COD  Introduced VersionSpec and VersionPattern.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Numeric ordering only, never string comparison
    - Invalid patterns fail fast instead of matching all
============================================================*/

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Result, SynmacError};

/// Dotted-integer version. Missing trailing components compare as zero,
/// so `14`, `14.0` and `14.0.0` are equal.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    components: Vec<u64>,
}

impl VersionSpec {
    pub fn major(&self) -> u64 {
        self.component(0)
    }

    /// Parse the leading dotted-numeric run of `raw`, ignoring any
    /// suffix such as the ` (a)` that marks a Rapid Security Response.
    pub fn parse_leading(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        let end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        trimmed[..end].trim_end_matches('.').parse().ok()
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

/// Three-way comparison of two versions.
pub fn compare(a: &VersionSpec, b: &VersionSpec) -> Ordering {
    a.cmp(b)
}

impl FromStr for VersionSpec {
    type Err = SynmacError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || SynmacError::InvalidVersion {
            input: s.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let components = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components })
    }
}

impl Ord for VersionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        (0..width)
            .map(|idx| self.component(idx).cmp(&other.component(idx)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for VersionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionSpec {}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compiled caller filter. Anchoring is whatever the caller wrote:
/// `^14\.` is anchored, `14` matches anywhere.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    source: String,
    regex: Regex,
}

impl VersionPattern {
    /// Compile an optional pattern; `None` or empty means "match all".
    pub fn compile(pattern: Option<&str>) -> Result<Option<Self>> {
        let Some(source) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let regex = Regex::new(source).map_err(|err| SynmacError::InvalidFilter {
            pattern: source.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Some(Self {
            source: source.to_string(),
            regex,
        }))
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Pattern selecting exactly one version string.
pub fn exact_pattern(version: &VersionSpec) -> Result<VersionPattern> {
    let escaped = format!("^{}$", regex::escape(&version.to_string()));
    VersionPattern::compile(Some(&escaped))?.ok_or_else(|| SynmacError::InvalidVersion {
        input: version.to_string(),
    })
}
