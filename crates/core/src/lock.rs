// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource locks: time-bounded exclusive ownership of a named resource
//! scope (a family of related records), independent of any one job's lease.

use crate::id::{JobId, WorkerId};
use serde::{Deserialize, Serialize};

/// Exclusive lock scoping a resource group to one job at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLock {
    pub resource_key: String,
    pub job_id: JobId,
    pub worker_id: WorkerId,
    pub expires_at_ms: u64,
}

impl ResourceLock {
    pub fn expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms < now_ms
    }

    /// True when the given (job, worker) pair owns a live lock.
    pub fn owned_by(&self, job_id: &JobId, worker_id: &WorkerId, now_ms: u64) -> bool {
        !self.expired(now_ms) && self.job_id == *job_id && self.worker_id == *worker_id
    }
}
