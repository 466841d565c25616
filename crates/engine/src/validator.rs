// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic plan validation.
//!
//! [`ValidatedPlan`] can only be constructed here, so the apply engine
//! cannot be handed a plan that skipped validation. The guard is the type,
//! not a runtime flag.

use curator_core::{ChangePlan, CuratorConfig, FieldPath, PathAllowlist, RiskLevel};

/// Findings from validating one plan. Errors make the plan unusable;
/// warnings travel with it into the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A plan that passed validation. The only way in is
/// [`Validator::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    plan: ChangePlan,
    warnings: Vec<String>,
}

impl ValidatedPlan {
    pub fn plan(&self) -> &ChangePlan {
        &self.plan
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub struct Validator {
    max_operations: usize,
    max_distinct_targets: usize,
    allowlist: PathAllowlist,
}

impl Validator {
    pub fn new(config: &CuratorConfig) -> Self {
        Self {
            max_operations: config.max_operations,
            max_distinct_targets: config.max_distinct_targets,
            allowlist: config.allowlist.clone(),
        }
    }

    /// Validate a compiled plan.
    ///
    /// An empty plan is valid ("no changes needed"). Critical-risk
    /// operations are refused outright; high-risk ones pass with a warning.
    pub fn validate(&self, plan: ChangePlan) -> Result<ValidatedPlan, ValidationResult> {
        let mut result = ValidationResult::default();

        if plan.operations.len() > self.max_operations {
            result.errors.push(format!(
                "plan has {} operations, limit is {}",
                plan.operations.len(),
                self.max_operations
            ));
        }
        let distinct = plan.distinct_targets();
        if distinct > self.max_distinct_targets {
            result.errors.push(format!(
                "plan touches {} distinct targets, limit is {}",
                distinct, self.max_distinct_targets
            ));
        }

        for (index, op) in plan.operations.iter().enumerate() {
            if !op.op_type.is_known() {
                result.errors.push(format!(
                    "operation {index} has unrecognized type '{}'",
                    op.op_type
                ));
                continue;
            }
            if op.rationale.trim().is_empty() {
                result
                    .warnings
                    .push(format!("operation {index} carries no rationale"));
            }
            if op.is_mutating() {
                if op.targets.is_empty() {
                    result
                        .errors
                        .push(format!("mutating operation {index} has no targets"));
                }
                if op.idempotency_key_seed.is_empty() {
                    result.errors.push(format!(
                        "mutating operation {index} has no idempotency seed"
                    ));
                }
                if op.patch.is_empty() && op.after.is_none() {
                    result.errors.push(format!(
                        "mutating operation {index} carries neither patch nor post-image"
                    ));
                }
            }
            match op.risk_level {
                RiskLevel::Critical => result.errors.push(format!(
                    "operation {index} is critical risk and cannot be auto-applied"
                )),
                RiskLevel::High => result
                    .warnings
                    .push(format!("operation {index} is high risk")),
                _ => {}
            }
            for path in op.patch.keys() {
                match FieldPath::parse(path) {
                    Ok(parsed) => {
                        if !self.allowlist.allows(&parsed) {
                            result.errors.push(format!(
                                "operation {index} patches disallowed path '{path}'"
                            ));
                        }
                    }
                    Err(err) => {
                        result
                            .errors
                            .push(format!("operation {index} patch path '{path}': {err}"));
                    }
                }
            }
        }

        if !result.is_valid() {
            tracing::warn!(
                job_id = %plan.job_id,
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "plan failed validation"
            );
            return Err(result);
        }
        Ok(ValidatedPlan {
            plan,
            warnings: result.warnings,
        })
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
