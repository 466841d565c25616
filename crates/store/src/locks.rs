// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource lock manager.
//!
//! A lock scopes a resource group (typically a product family) to one job
//! at a time, independently of the job's queue lease. Expired locks are
//! taken over in the same transaction that checks them, so takeover is
//! atomic with the staleness check.

use crate::event::StoreEvent;
use crate::store::{CurationStore, StoreError};
use curator_core::{Clock, CuratorConfig, JobId, ResourceLock, WorkerId};
use std::sync::Arc;

pub struct LockManager<C: Clock> {
    store: Arc<CurationStore>,
    clock: C,
    ttl_ms: u64,
}

impl<C: Clock> LockManager<C> {
    pub fn new(store: Arc<CurationStore>, clock: C, config: &CuratorConfig) -> Self {
        // Lock TTL tracks the lease duration so an abandoned lock frees up
        // on the same schedule as an abandoned job
        Self {
            store,
            clock,
            ttl_ms: config.lease_duration_ms(),
        }
    }

    /// Try to take the lock for `(job, worker)`.
    ///
    /// Succeeds when the lock is free, expired, or already held by the same
    /// pair (re-entrant acquire refreshes the TTL). Returns false when a
    /// live lock belongs to someone else.
    pub fn acquire(
        &self,
        resource_key: &str,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let expires_at_ms = now + self.ttl_ms;
        let acquired = self.store.transact(|tx| {
            if let Some(existing) = tx.state().locks.get(resource_key) {
                let same_owner = existing.job_id == *job_id && existing.worker_id == *worker_id;
                if !existing.expired(now) && !same_owner {
                    return false;
                }
                if existing.expired(now) && !same_owner {
                    tracing::warn!(
                        resource_key,
                        previous_job = %existing.job_id,
                        new_job = %job_id,
                        "expired lock taken over"
                    );
                }
            }
            tx.stage(StoreEvent::LockAcquired {
                lock: ResourceLock {
                    resource_key: resource_key.to_string(),
                    job_id: job_id.clone(),
                    worker_id: worker_id.clone(),
                    expires_at_ms,
                },
            });
            true
        })?;
        if !acquired {
            tracing::debug!(resource_key, job_id = %job_id, "lock contended");
        }
        Ok(acquired)
    }

    /// Extend the TTL for the current owner. False when ownership was lost.
    pub fn renew(
        &self,
        resource_key: &str,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        let expires_at_ms = now + self.ttl_ms;
        self.store.transact(|tx| {
            let Some(lock) = tx.state().locks.get(resource_key) else {
                return false;
            };
            if !lock.owned_by(job_id, worker_id, now) {
                return false;
            }
            tx.stage(StoreEvent::LockRenewed {
                resource_key: resource_key.to_string(),
                expires_at_ms,
            });
            true
        })
    }

    /// Release the lock if `(job, worker)` owns it. Releasing a lock you
    /// lost is a no-op, not an error.
    pub fn release(
        &self,
        resource_key: &str,
        job_id: &JobId,
        worker_id: &WorkerId,
    ) -> Result<(), StoreError> {
        self.store.transact(|tx| {
            let Some(lock) = tx.state().locks.get(resource_key) else {
                return;
            };
            if lock.job_id == *job_id && lock.worker_id == *worker_id {
                tx.stage(StoreEvent::LockReleased {
                    resource_key: resource_key.to_string(),
                });
            }
        })
    }

    pub fn get(&self, resource_key: &str) -> Option<ResourceLock> {
        self.store.read(|state| state.locks.get(resource_key).cloned())
    }

    /// Drop all expired locks. Returns the number released.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.epoch_ms();
        let purged = self.store.transact(|tx| {
            let expired: Vec<String> = tx
                .state()
                .locks
                .values()
                .filter(|lock| lock.expired(now))
                .map(|lock| lock.resource_key.clone())
                .collect();
            let count = expired.len();
            for resource_key in expired {
                tx.stage(StoreEvent::LockReleased { resource_key });
            }
            count
        })?;
        if purged > 0 {
            tracing::info!(purged, "expired locks purged");
        }
        Ok(purged)
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
