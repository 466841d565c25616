// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures shared across crates (behind the `test-support` feature).

use crate::id::JobId;
use crate::job::{JobType, Scope};
use crate::patch::PatchValue;
use crate::plan::{ChangePlan, Operation, OperationType, RiskLevel, PLAN_VERSION};
use std::collections::BTreeMap;

/// An operation with a small patch and fixed seed, suitable for most tests.
pub fn operation(op_type: OperationType, targets: &[&str]) -> Operation {
    let mut patch = BTreeMap::new();
    patch.insert("name".to_string(), PatchValue::Set(serde_json::json!("curated")));
    Operation {
        op_type,
        targets: targets.iter().map(|t| t.to_string()).collect(),
        patch,
        before: None,
        after: None,
        idempotency_key_seed: "seed-fixed".to_string(),
        rationale: "test operation".to_string(),
        risk_level: RiskLevel::Low,
    }
}

/// A compiled plan wrapping the given operations.
pub fn plan_with_ops(operations: Vec<Operation>) -> ChangePlan {
    let max_risk_level = operations
        .iter()
        .map(|op| op.risk_level)
        .max()
        .unwrap_or_default();
    ChangePlan {
        job_id: JobId::from_string("job-test1"),
        job_type: JobType::FamilyCuration,
        scope: Scope::family("fam-1"),
        assumptions: vec!["records share a family".to_string()],
        operations,
        max_risk_level,
        version: PLAN_VERSION,
    }
}

/// Raw planner output shaped like the untrusted JSON the compiler accepts.
pub fn raw_plan_json(ops: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "assumptions": ["test assumption"],
        "operations": ops,
    })
}

/// One raw patch-fields operation for compiler tests.
pub fn raw_patch_op(target: &str, path: &str, value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "op_type": "patch_fields",
        "targets": [target],
        "patch": { path: value },
        "rationale": "normalize field",
        "risk_level": "low",
    })
}
