// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed change plans: the validated output of the plan compiler.
//!
//! A [`ChangePlan`] is immutable once validated; one plan per job attempt.

use crate::id::JobId;
use crate::job::{JobType, Scope};
use crate::patch::PatchValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plan schema version stamped onto every compiled plan.
pub const PLAN_VERSION: u32 = 1;

/// How dangerous an operation is. Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl RiskLevel {
    /// Parse a risk string; unknown strings return `None` so the caller can
    /// reject with a structured error rather than defaulting.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

/// Atomic mutation intent kinds. Closed set; unrecognized strings are kept
/// as [`OperationType::Unknown`] and rejected by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Replace values at allowlisted dotted paths on target records.
    PatchFields,
    /// Rename a record's display name.
    Rename,
    /// Merge duplicate records into a canonical survivor.
    Merge,
    /// Create a new record.
    Create,
    /// Remove an alias pointing at a record.
    DeleteAlias,
    /// Move records to a different family.
    Reassign,
    /// No mutation; carries rationale only.
    NoOp,
    /// Unrecognized operation type, preserved for the rejection error.
    Unknown(String),
}

impl OperationType {
    pub fn parse(s: &str) -> Self {
        match s {
            "patch_fields" => OperationType::PatchFields,
            "rename" => OperationType::Rename,
            "merge" => OperationType::Merge,
            "create" => OperationType::Create,
            "delete_alias" => OperationType::DeleteAlias,
            "reassign" => OperationType::Reassign,
            "no_op" => OperationType::NoOp,
            other => OperationType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperationType::PatchFields => "patch_fields",
            OperationType::Rename => "rename",
            OperationType::Merge => "merge",
            OperationType::Create => "create",
            OperationType::DeleteAlias => "delete_alias",
            OperationType::Reassign => "reassign",
            OperationType::NoOp => "no_op",
            OperationType::Unknown(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OperationType::Unknown(_))
    }

    /// Whether operations of this type write to the catalog. `no_op` never
    /// mutates; unknown types are treated as mutating so they can never
    /// bypass validation.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, OperationType::NoOp)
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OperationType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(OperationType::parse(&s))
    }
}

/// One atomic mutation within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op_type: OperationType,
    /// Catalog record identifiers this operation touches.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Dotted-path patch, keyed by path. Values replace wholesale;
    /// the delete sentinel removes the field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub patch: BTreeMap<String, PatchValue>,
    /// Expected pre-image, when the planner asserted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    /// Desired post-image for create/merge-style operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    /// Seed folded into the idempotency key. Must be non-empty for every
    /// mutating operation.
    #[serde(default)]
    pub idempotency_key_seed: String,
    pub rationale: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl Operation {
    pub fn is_mutating(&self) -> bool {
        self.op_type.is_mutating()
    }
}

/// Validated, typed set of operations for one job attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePlan {
    pub job_id: JobId,
    pub job_type: JobType,
    pub scope: Scope,
    /// Planner rationale, free text, for the journal.
    #[serde(default)]
    pub assumptions: Vec<String>,
    pub operations: Vec<Operation>,
    /// Maximum risk across all operations.
    pub max_risk_level: RiskLevel,
    pub version: u32,
}

impl ChangePlan {
    /// Count of distinct targets across all operations.
    pub fn distinct_targets(&self) -> usize {
        let mut targets: Vec<&str> = self
            .operations
            .iter()
            .flat_map(|op| op.targets.iter().map(String::as_str))
            .collect();
        targets.sort_unstable();
        targets.dedup();
        targets.len()
    }

    /// A plan with zero operations is valid and means "no changes needed".
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
