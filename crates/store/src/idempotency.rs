// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency guard: durable "already executed" markers keyed by
//! [`IdempotencyKey`], checked before every mutating operation.
//!
//! An expired marker reads as not-executed; staleness beyond the TTL means
//! the original side effect is old enough that re-applying is acceptable.

use crate::event::StoreEvent;
use crate::store::{CurationStore, StoreError};
use curator_core::{Clock, CuratorConfig, IdempotencyKey, IdempotencyRecord, JobId};
use std::sync::Arc;

pub struct IdempotencyGuard<C: Clock> {
    store: Arc<CurationStore>,
    clock: C,
    ttl_ms: u64,
}

impl<C: Clock> IdempotencyGuard<C> {
    pub fn new(store: Arc<CurationStore>, clock: C, config: &CuratorConfig) -> Self {
        Self {
            store,
            clock,
            ttl_ms: config.idempotency_ttl_ms(),
        }
    }

    /// True when a live marker exists for this key.
    pub fn is_executed(&self, key: &IdempotencyKey) -> bool {
        let now = self.clock.epoch_ms();
        self.store.read(|state| {
            state
                .idempotency
                .get(key.as_str())
                .is_some_and(|record| !record.expired(now))
        })
    }

    pub fn get(&self, key: &IdempotencyKey) -> Option<IdempotencyRecord> {
        self.store
            .read(|state| state.idempotency.get(key.as_str()).cloned())
    }

    /// Durably mark the operation behind `key` as executed.
    pub fn mark_executed(
        &self,
        key: IdempotencyKey,
        job_id: &JobId,
        operation_type: &str,
        targets: Vec<String>,
        result: Option<String>,
    ) -> Result<(), StoreError> {
        let now = self.clock.epoch_ms();
        let record = IdempotencyRecord {
            key,
            job_id: job_id.clone(),
            operation_type: operation_type.to_string(),
            targets,
            result,
            executed_at_ms: now,
            expires_at_ms: now + self.ttl_ms,
        };
        self.store.transact(|tx| {
            tx.stage(StoreEvent::IdempotencyRecorded { record });
        })
    }

    /// Delete markers past their TTL. Returns the number pruned.
    pub fn prune_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.epoch_ms();
        let pruned = self.store.transact(|tx| {
            let keys: Vec<String> = tx
                .state()
                .idempotency
                .values()
                .filter(|record| record.expired(now))
                .map(|record| record.key.as_str().to_string())
                .collect();
            let count = keys.len();
            if count > 0 {
                tx.stage(StoreEvent::IdempotencyPruned { keys });
            }
            count
        })?;
        if pruned > 0 {
            tracing::info!(pruned, "expired idempotency markers pruned");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
