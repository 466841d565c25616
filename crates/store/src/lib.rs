// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! curator-store: the durable store for the curation job core.
//!
//! Every mutation is a [`StoreEvent`] appended to a write-ahead log and
//! applied to materialized [`DurableState`]; precondition checks and event
//! commit happen under a single lock, which is what makes queue leases,
//! lock takeovers, and idempotency markers atomic conditional writes.

pub mod event;
pub mod idempotency;
pub mod journal;
pub mod locks;
pub mod queue;
pub mod state;
pub mod store;
pub mod wal;

pub use event::StoreEvent;
pub use idempotency::IdempotencyGuard;
pub use journal::{JournalError, JournalWriter};
pub use locks::LockManager;
pub use queue::{EnqueueRequest, JobQueue, QueueError, QueueStats};
pub use state::DurableState;
pub use store::{CurationStore, StoreError};
pub use wal::{Wal, WalEntry, WalError};
