// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply engine: executes a validated plan against the catalog.
//!
//! Mutation is double-gated: the job's mode must be `apply` AND the
//! process-wide apply switch must be on. Either gate alone forces a dry
//! run, so a bug that flips one flag cannot cause a write by itself.
//!
//! Failure policy: continue on per-operation error, record every outcome,
//! and report the attempt as failed if any operation failed.

use crate::catalog::{Catalog, CatalogError};
use crate::error::EngineError;
use crate::validator::ValidatedPlan;
use curator_core::{
    AttemptId, Clock, CuratorConfig, ExecutionMode, IdempotencyKey, Job, JournalId, Operation,
    OperationOutcome, PatchValue,
};
use curator_store::{CurationStore, IdempotencyGuard, JournalWriter};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Aggregate outcome of one apply (or dry-run preview) pass.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// False when any operation failed.
    pub success: bool,
    /// True when nothing was written (dry-run mode or apply switch off).
    pub dry_run: bool,
    pub operations_applied: u32,
    pub operations_skipped: u32,
    pub operations_failed: u32,
    /// Journal entry for this attempt; absent on dry runs.
    pub journal_id: Option<JournalId>,
    /// Per-operation outcomes, in plan order.
    pub outcomes: Vec<OperationOutcome>,
}

impl ApplyResult {
    pub fn summary(&self) -> String {
        format!(
            "{} applied, {} skipped, {} failed{}",
            self.operations_applied,
            self.operations_skipped,
            self.operations_failed,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }

    /// Error lines from failed operations, for `last_error`.
    pub fn failure_summary(&self) -> String {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.error.as_deref())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct ApplyEngine<K, C: Clock> {
    catalog: Arc<K>,
    guard: IdempotencyGuard<C>,
    journal: JournalWriter<C>,
    clock: C,
    apply_enabled: bool,
}

impl<K: Catalog, C: Clock> ApplyEngine<K, C> {
    pub fn new(
        catalog: Arc<K>,
        store: Arc<CurationStore>,
        clock: C,
        config: &CuratorConfig,
    ) -> Self {
        Self {
            catalog,
            guard: IdempotencyGuard::new(Arc::clone(&store), clock.clone(), config),
            journal: JournalWriter::new(store, clock.clone(), config),
            clock,
            apply_enabled: config.apply_enabled,
        }
    }

    /// Execute a validated plan's operations in order.
    ///
    /// Each mutating operation is checked against the idempotency guard
    /// first; a live marker means a previous attempt already applied it.
    /// Operations apply sequentially, never concurrently; the idempotency
    /// bookkeeping depends on plan order.
    pub async fn apply(
        &self,
        validated: &ValidatedPlan,
        job: &Job,
        attempt_id: &AttemptId,
    ) -> Result<ApplyResult, EngineError> {
        let plan = validated.plan();
        let mutate_allowed = job.mode == ExecutionMode::Apply && self.apply_enabled;
        if job.mode == ExecutionMode::Apply && !self.apply_enabled {
            tracing::warn!(job_id = %plan.job_id, "apply requested but apply switch is off, previewing");
        }

        let mut outcomes: Vec<OperationOutcome> = Vec::with_capacity(plan.operations.len());
        let mut applied = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;

        for (index, op) in plan.operations.iter().enumerate() {
            let mut outcome = OperationOutcome {
                operation_index: index,
                operation_type: op.op_type.as_str().to_string(),
                targets: op.targets.clone(),
                before: None,
                after: None,
                idempotency_key: None,
                rationale: op.rationale.clone(),
                success: true,
                skipped: false,
                error: None,
                executed_at_ms: self.clock.epoch_ms(),
            };

            if !op.is_mutating() {
                outcomes.push(outcome);
                continue;
            }

            let key = IdempotencyKey::derive(&plan.job_id, index, &op.idempotency_key_seed);
            outcome.idempotency_key = Some(key.clone());

            if self.guard.is_executed(&key) {
                skipped += 1;
                outcome.skipped = true;
                outcomes.push(outcome);
                continue;
            }

            match self.apply_operation(op, mutate_allowed).await {
                Ok((before, after)) => {
                    if mutate_allowed {
                        self.guard.mark_executed(
                            key,
                            &plan.job_id,
                            op.op_type.as_str(),
                            op.targets.clone(),
                            None,
                        )?;
                    }
                    applied += 1;
                    outcome.before = before;
                    outcome.after = after;
                    outcomes.push(outcome);
                }
                Err(err) => {
                    // Continue to the remaining operations; one bad
                    // operation does not abort the plan
                    failed += 1;
                    outcome.success = false;
                    outcome.error = Some(err.to_string());
                    tracing::warn!(
                        job_id = %plan.job_id,
                        operation = index,
                        %err,
                        "operation failed"
                    );
                    outcomes.push(outcome);
                }
            }
        }

        let journal_id = if mutate_allowed && !outcomes.is_empty() {
            Some(
                self.journal
                    .append(&plan.job_id, attempt_id, outcomes.clone())?
                    .id,
            )
        } else {
            None
        };

        let result = ApplyResult {
            success: failed == 0,
            dry_run: !mutate_allowed,
            operations_applied: applied,
            operations_skipped: skipped,
            operations_failed: failed,
            journal_id,
            outcomes,
        };
        tracing::info!(
            job_id = %plan.job_id,
            attempt_id = %attempt_id,
            summary = %result.summary(),
            "plan executed"
        );
        Ok(result)
    }

    /// Apply (or preview) one operation across all its targets, returning
    /// before/after images.
    ///
    /// On a mid-operation failure no idempotency marker is written; a retry
    /// re-applies the whole operation, which is safe because patches are
    /// whole-value replacement.
    async fn apply_operation(
        &self,
        op: &Operation,
        mutate_allowed: bool,
    ) -> Result<(Option<serde_json::Value>, Option<serde_json::Value>), CatalogError> {
        let patch = effective_patch(op)?;
        let mut before = serde_json::Map::new();
        let mut after = serde_json::Map::new();

        for target in &op.targets {
            let current = self
                .catalog
                .fetch(target)
                .await?
                .unwrap_or(serde_json::Value::Null);

            let post = if mutate_allowed {
                self.catalog.mutate(target, &patch).await?
            } else {
                preview(target, &current, &patch)?
            };

            before.insert(target.clone(), current);
            after.insert(target.clone(), post);
        }

        Ok((
            Some(serde_json::Value::Object(before)),
            Some(serde_json::Value::Object(after)),
        ))
    }
}

/// The patch an operation actually carries: its dotted-path patch, or the
/// top-level fields of its post-image for create/merge-style operations.
fn effective_patch(op: &Operation) -> Result<BTreeMap<String, PatchValue>, CatalogError> {
    if !op.patch.is_empty() {
        return Ok(op.patch.clone());
    }
    match &op.after {
        Some(serde_json::Value::Object(fields)) => Ok(fields
            .iter()
            .map(|(field, value)| (field.clone(), PatchValue::from_value(value.clone())))
            .collect()),
        _ => Err(CatalogError::Rejected {
            target: op.targets.first().cloned().unwrap_or_default(),
            reason: "operation carries neither patch nor object post-image".to_string(),
        }),
    }
}

/// Compute a dry-run post-image locally with the same patch semantics the
/// catalog applies.
fn preview(
    target: &str,
    current: &serde_json::Value,
    patch: &BTreeMap<String, PatchValue>,
) -> Result<serde_json::Value, CatalogError> {
    let base = if current.is_null() {
        serde_json::json!({})
    } else {
        current.clone()
    };
    let mut record = base;
    for (path, value) in patch {
        let parsed = curator_core::FieldPath::parse(path).map_err(|err| CatalogError::Rejected {
            target: target.to_string(),
            reason: err.to_string(),
        })?;
        record =
            curator_core::apply_patch(&record, &parsed, value).map_err(|err| {
                CatalogError::Rejected {
                    target: target.to_string(),
                    reason: err.to_string(),
                }
            })?;
    }
    Ok(record)
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod tests;
