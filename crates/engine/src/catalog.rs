// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Downstream catalog seam.
//!
//! The catalog store is an external collaborator; the apply engine only ever
//! reaches it through this trait. `mutate` takes the same dotted-path patch
//! shape the plan carries, so patch semantics are identical in preview and
//! in the real write path.

use async_trait::async_trait;
use curator_core::PatchValue;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog record not found: {0}")]
    NotFound(String),
    #[error("catalog rejected write to {target}: {reason}")]
    Rejected { target: String, reason: String },
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current state of a record, or None when it does not exist.
    async fn fetch(&self, target: &str) -> Result<Option<serde_json::Value>, CatalogError>;

    /// Apply a dotted-path patch to a record, creating it when absent.
    /// Returns the record's post-image.
    async fn mutate(
        &self,
        target: &str,
        patch: &BTreeMap<String, PatchValue>,
    ) -> Result<serde_json::Value, CatalogError>;
}

/// In-memory catalog for tests, with per-target failure injection and a
/// mutate call log (used to assert dry runs never write).
#[cfg(any(test, feature = "test-support"))]
pub struct FakeCatalog {
    records: parking_lot::Mutex<BTreeMap<String, serde_json::Value>>,
    fail_targets: parking_lot::Mutex<std::collections::BTreeSet<String>>,
    mutate_log: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            records: parking_lot::Mutex::new(BTreeMap::new()),
            fail_targets: parking_lot::Mutex::new(std::collections::BTreeSet::new()),
            mutate_log: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, id: &str, record: serde_json::Value) {
        self.records.lock().insert(id.to_string(), record);
    }

    pub fn record(&self, id: &str) -> Option<serde_json::Value> {
        self.records.lock().get(id).cloned()
    }

    /// Make every subsequent mutate of `target` fail.
    pub fn fail_on(&self, target: &str) {
        self.fail_targets.lock().insert(target.to_string());
    }

    /// Stop failing mutates of `target`.
    pub fn heal(&self, target: &str) {
        self.fail_targets.lock().remove(target);
    }

    /// Targets passed to mutate, in call order.
    pub fn mutate_calls(&self) -> Vec<String> {
        self.mutate_log.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Catalog for FakeCatalog {
    async fn fetch(&self, target: &str) -> Result<Option<serde_json::Value>, CatalogError> {
        Ok(self.records.lock().get(target).cloned())
    }

    async fn mutate(
        &self,
        target: &str,
        patch: &BTreeMap<String, PatchValue>,
    ) -> Result<serde_json::Value, CatalogError> {
        self.mutate_log.lock().push(target.to_string());
        if self.fail_targets.lock().contains(target) {
            return Err(CatalogError::Rejected {
                target: target.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let mut records = self.records.lock();
        let mut record = records
            .get(target)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        for (path, value) in patch {
            let parsed = curator_core::FieldPath::parse(path).map_err(|err| {
                CatalogError::Rejected {
                    target: target.to_string(),
                    reason: err.to_string(),
                }
            })?;
            record = curator_core::apply_patch(&record, &parsed, value).map_err(|err| {
                CatalogError::Rejected {
                    target: target.to_string(),
                    reason: err.to_string(),
                }
            })?;
        }
        records.insert(target.to_string(), record.clone());
        Ok(record)
    }
}
