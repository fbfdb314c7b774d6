/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::selector
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Apply product, version-pattern and latest-only filters to
    catalog records.

  Security / Safety Notes:
    Pure data transformation; no I/O performed in this module.

  Dependencies:
    version module for patterns and ordering.

  Operational Scope:
    Used by every listing operation and by installer resolution
    before a download.

  Revision History:
    2026-10-16 COD  Authored deterministic record selector.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible output
    - Empty selection is a result, not an error
============================================================*/

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::catalog::{InstallerRecord, ProductKind, UpdateRecord};
use crate::error::Result;
use crate::version::{compare, VersionPattern, VersionSpec};

/// Caller-supplied filter, compiled once per invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub product: Option<ProductKind>,
    pub version_pattern: Option<VersionPattern>,
    pub latest_only: bool,
}

impl FilterCriteria {
    pub fn new(
        product: Option<ProductKind>,
        version_pattern: Option<&str>,
        latest_only: bool,
    ) -> Result<Self> {
        Ok(Self {
            product,
            version_pattern: VersionPattern::compile(version_pattern)?,
            latest_only,
        })
    }

    pub fn exact(version: VersionPattern) -> Self {
        Self {
            product: None,
            version_pattern: Some(version),
            latest_only: false,
        }
    }
}

/// Bucket used by the latest-only reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Product(ProductKind),
    /// Full installers form one product line per major release.
    Release(u64),
}

/// A catalog record the selector can filter.
pub trait Selectable {
    fn product(&self) -> ProductKind;
    fn version(&self) -> &VersionSpec;
    /// Text the version pattern is matched against.
    fn version_text(&self) -> &str;
    fn bucket(&self) -> Bucket;
}

impl Selectable for UpdateRecord {
    fn product(&self) -> ProductKind {
        self.product
    }

    fn version(&self) -> &VersionSpec {
        &self.version
    }

    fn version_text(&self) -> &str {
        &self.version_raw
    }

    fn bucket(&self) -> Bucket {
        Bucket::Product(self.product)
    }
}

impl Selectable for InstallerRecord {
    fn product(&self) -> ProductKind {
        ProductKind::Macos
    }

    fn version(&self) -> &VersionSpec {
        &self.version
    }

    fn version_text(&self) -> &str {
        &self.version_raw
    }

    fn bucket(&self) -> Bucket {
        Bucket::Release(self.version.major())
    }
}

/// Filter records: product equality, then version pattern, then the
/// latest-only reduction. Catalog order is preserved; within a bucket
/// the first-seen record wins ties.
pub fn select<T: Selectable>(records: Vec<T>, criteria: &FilterCriteria) -> Vec<T> {
    let survivors = records
        .into_iter()
        .filter(|record| criteria.product.map_or(true, |p| record.product() == p))
        .filter(|record| {
            criteria
                .version_pattern
                .as_ref()
                .map_or(true, |pattern| pattern.is_match(record.version_text()))
        });

    if !criteria.latest_only {
        return survivors.collect();
    }

    let mut order: Vec<Bucket> = Vec::new();
    let mut best: HashMap<Bucket, T> = HashMap::new();
    for record in survivors {
        let bucket = record.bucket();
        match best.get(&bucket) {
            None => {
                order.push(bucket);
                best.insert(bucket, record);
            }
            Some(current) => {
                if compare(record.version(), current.version()) == Ordering::Greater {
                    best.insert(bucket, record);
                }
            }
        }
    }
    order
        .into_iter()
        .filter_map(|bucket| best.remove(&bucket))
        .collect()
}

/// Newest first; equal versions keep catalog order.
pub fn sort_newest_first<T: Selectable>(records: &mut [T]) {
    records.sort_by(|a, b| compare(b.version(), a.version()));
}
