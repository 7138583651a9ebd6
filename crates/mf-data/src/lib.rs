//! # mf-data
//!
//! Collaborator interfaces the sweep engine reads from and writes to, plus an
//! in-memory result store / job queue that implements both.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use mf_types::{JobId, Observation, SimulationJob, StoreError};
use serde::{Deserialize, Serialize};

/// Result alias for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Narrows which stored results are returned as observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationFilter {
    /// Also return results the validator rejected.
    pub include_invalid: bool,
    /// Cap on the number of rows returned.
    pub limit: Option<usize>,
}

impl ObservationFilter {
    pub fn valid_only() -> Self {
        Self::default()
    }

    pub fn with_invalid(mut self) -> Self {
        self.include_invalid = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Read-only access to accumulated simulation results.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch_results(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>>;
}

/// Append-only, batched job queue.
///
/// A batch is accepted or rejected as a whole; on success the queue returns
/// the ids it assigned, in submission order.
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn insert_jobs(&self, jobs: Vec<SimulationJob>) -> StoreResult<Vec<JobId>>;
}
