// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream planning seam.
//!
//! The planner is an external collaborator (in production, an LLM planning
//! step). Its output is opaque JSON and is treated as untrusted: everything
//! it returns goes through the plan compiler and validator before any of it
//! can touch the catalog.

use async_trait::async_trait;
use curator_core::Job;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner unavailable: {0}")]
    Unavailable(String),
    #[error("planner returned no plan: {0}")]
    Empty(String),
}

/// Produces a raw, unvalidated plan for a job's scope.
#[async_trait]
pub trait Planner: Send + Sync {
    /// `records` holds the current catalog state of the job's scope, keyed
    /// by record id, so the planner sees what the worker sees.
    async fn propose(
        &self,
        job: &Job,
        records: &BTreeMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, PlannerError>;
}

/// Scripted planner for tests: pops one queued response per call.
#[cfg(any(test, feature = "test-support"))]
pub struct FakePlanner {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<serde_json::Value, PlannerError>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakePlanner {
    pub fn new() -> Self {
        Self {
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    /// A planner with a single queued response; further calls fail with
    /// [`PlannerError::Empty`].
    pub fn returning(raw: serde_json::Value) -> Self {
        let planner = Self::new();
        planner.push(Ok(raw));
        planner
    }

    pub fn push(&self, response: Result<serde_json::Value, PlannerError>) {
        self.responses.lock().push_back(response);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakePlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Planner for FakePlanner {
    async fn propose(
        &self,
        _job: &Job,
        _records: &BTreeMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, PlannerError> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PlannerError::Empty("no scripted response".to_string())))
    }
}
