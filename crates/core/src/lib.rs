// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! curator-core: domain types for the catalog-curation job core.
//!
//! Pure data and pure functions only: no I/O, no ambient state. Everything
//! that touches the durable store lives in `curator-store`; everything that
//! executes work lives in `curator-engine`.

pub mod macros;

pub mod clock;
pub mod config;
pub mod id;
pub mod idempotency;
pub mod job;
pub mod journal;
pub mod lock;
pub mod patch;
pub mod plan;
pub mod retry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, CuratorConfig, APPLY_ENABLED_ENV};
pub use id::{AttemptId, JobId, JournalId, WorkerId};
pub use idempotency::{derive_seed, IdempotencyKey, IdempotencyRecord};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{ExecutionMode, Job, JobStatus, JobType, Scope};
pub use journal::{journal_key, AttemptLog, JournalEntry, OperationOutcome};
pub use lock::ResourceLock;
pub use patch::{apply_patch, get_path, FieldPath, PatchError, PatchValue, PathAllowlist};
pub use plan::{ChangePlan, Operation, OperationType, RiskLevel, PLAN_VERSION};
pub use retry::RetryPolicy;
