// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! curator-engine: the execution side of the curation job core.
//!
//! Workers lease jobs from the store, ask the [`Planner`] for a raw plan,
//! compile and validate it, and hand the [`ValidatedPlan`] to the
//! [`ApplyEngine`]. The [`Watchdog`] reclaims work whose owner stopped
//! renewing its lease, and the [`Heartbeat`] is how an owner keeps it.

pub mod apply;
pub mod catalog;
pub mod compiler;
pub mod error;
pub mod heartbeat;
pub mod planner;
pub mod validator;
pub mod watchdog;
pub mod worker;

pub use apply::{ApplyEngine, ApplyResult};
pub use catalog::{Catalog, CatalogError};
pub use compiler::{compile, CompileError};
pub use error::EngineError;
pub use heartbeat::{Beat, Heartbeat, HeartbeatHandle};
pub use planner::{Planner, PlannerError};
pub use validator::{ValidatedPlan, ValidationResult, Validator};
pub use watchdog::{RecoverySummary, Watchdog};
pub use worker::Worker;

#[cfg(any(test, feature = "test-support"))]
pub use catalog::FakeCatalog;
#[cfg(any(test, feature = "test-support"))]
pub use planner::FakePlanner;
