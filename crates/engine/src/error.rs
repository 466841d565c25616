// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Transient infra errors surface here and are retried through the queue's
//! backoff; validation failures travel as [`ValidationResult`] data, not
//! errors; lease loss is a control signal, not an error.
//!
//! [`ValidationResult`]: crate::validator::ValidationResult

use crate::catalog::CatalogError;
use crate::compiler::CompileError;
use crate::planner::PlannerError;
use curator_store::{JournalError, QueueError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}
