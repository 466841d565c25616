// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan compiler: untrusted planner JSON into a typed [`ChangePlan`].
//!
//! The compiler is strict where silence would hide a problem: unrecognized
//! operation types and risk levels are rejected with the offending index,
//! never dropped or defaulted. Missing idempotency seeds are filled in
//! deterministically so identical retries derive identical keys.

use curator_core::{
    derive_seed, ChangePlan, Job, Operation, OperationType, PatchValue, RiskLevel, PLAN_VERSION,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("plan decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("operation {index} has unrecognized type '{op_type}'")]
    UnknownOperationType { index: usize, op_type: String },
    #[error("operation {index} has unrecognized risk level '{risk}'")]
    UnknownRiskLevel { index: usize, risk: String },
}

/// Planner output as received: everything optional, nothing trusted.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    operations: Vec<RawOperation>,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    #[serde(default)]
    op_type: String,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    patch: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    before: Option<serde_json::Value>,
    #[serde(default)]
    after: Option<serde_json::Value>,
    #[serde(default)]
    idempotency_key_seed: Option<String>,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    risk_level: Option<String>,
}

/// Compile raw planner output into a typed plan for `job`.
///
/// A plan with zero operations compiles successfully and means "no changes
/// needed"; that is the planner's way of declining to act.
pub fn compile(raw: &serde_json::Value, job: &Job) -> Result<ChangePlan, CompileError> {
    let raw_plan: RawPlan = serde_json::from_value(raw.clone())?;

    let mut operations = Vec::with_capacity(raw_plan.operations.len());
    for (index, raw_op) in raw_plan.operations.into_iter().enumerate() {
        let op_type = OperationType::parse(&raw_op.op_type);
        if !op_type.is_known() {
            return Err(CompileError::UnknownOperationType {
                index,
                op_type: raw_op.op_type,
            });
        }
        let risk_level = match raw_op.risk_level.as_deref() {
            None | Some("") => RiskLevel::default(),
            Some(raw_risk) => {
                RiskLevel::parse(raw_risk).ok_or_else(|| CompileError::UnknownRiskLevel {
                    index,
                    risk: raw_risk.to_string(),
                })?
            }
        };

        let patch: BTreeMap<String, PatchValue> = raw_op
            .patch
            .into_iter()
            .map(|(path, value)| (path, PatchValue::from_value(value)))
            .collect();

        let mut operation = Operation {
            op_type,
            targets: raw_op.targets,
            patch,
            before: raw_op.before,
            after: raw_op.after,
            idempotency_key_seed: raw_op.idempotency_key_seed.unwrap_or_default(),
            rationale: raw_op.rationale,
            risk_level,
        };
        if operation.idempotency_key_seed.is_empty() {
            operation.idempotency_key_seed = derive_seed(&job.id, index, &operation);
        }
        operations.push(operation);
    }

    let max_risk_level = operations
        .iter()
        .map(|op| op.risk_level)
        .max()
        .unwrap_or_default();

    tracing::debug!(
        job_id = %job.id,
        operations = operations.len(),
        max_risk = %max_risk_level,
        "plan compiled"
    );
    Ok(ChangePlan {
        job_id: job.id.clone(),
        job_type: job.job_type.clone(),
        scope: job.scope.clone(),
        assumptions: raw_plan.assumptions,
        operations,
        max_risk_level,
        version: PLAN_VERSION,
    })
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;
