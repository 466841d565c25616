// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency keys: deterministic identifiers ensuring each mutation's
//! side effect happens at most once across retries.

use crate::id::JobId;
use crate::plan::Operation;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Durable key marking "operation N of job J already executed".
///
/// `hash(job_id, operation_index, seed)`, stable across retries because
/// the seed itself is derived deterministically when the planner omits it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn derive(job_id: &JobId, operation_index: usize, seed: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(job_id.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(operation_index.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(seed.as_bytes());
        Self(hex_digest(hasher))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive a stable seed for an operation that arrived without one.
///
/// Folds `(job_id, operation_index, op_type, targets, patch-or-after)` so
/// identical retries produce identical keys while any change to the
/// operation's content produces a new one.
pub fn derive_seed(job_id: &JobId, operation_index: usize, op: &Operation) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_id.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(operation_index.to_string().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(op.op_type.as_str().as_bytes());
    for target in &op.targets {
        hasher.update(b"\x1f");
        hasher.update(target.as_bytes());
    }
    // BTreeMap keys iterate sorted, so patch serialization is canonical
    let content = if !op.patch.is_empty() {
        serde_json::to_string(&op.patch).unwrap_or_default()
    } else if let Some(after) = &op.after {
        serde_json::to_string(after).unwrap_or_default()
    } else {
        String::new()
    };
    hasher.update(b"\x1f");
    hasher.update(content.as_bytes());
    hex_digest(hasher)
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Durable record behind an [`IdempotencyKey`]. TTL-bounded in days.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdempotencyRecord {
    pub key: IdempotencyKey,
    pub job_id: JobId,
    pub operation_type: String,
    pub targets: Vec<String>,
    /// Summary of the applied mutation's outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub executed_at_ms: u64,
    pub expires_at_ms: u64,
}

impl IdempotencyRecord {
    pub fn expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms < now_ms
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
