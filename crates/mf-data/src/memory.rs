//! In-memory result store and job queue.

use async_trait::async_trait;
use mf_types::{
    DataValidator, DatasetStats, JobError, JobId, MfResult, Observation, ResultId,
    SimulationJob, SimulationResult, StoreError,
};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{JobSink, ObservationFilter, ObservationSource, StoreResult};

/// Thread-safe in-memory store backing both collaborator traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<Vec<SimulationResult>>,
    jobs: RwLock<Vec<SimulationJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with results (validated on the way in).
    pub fn with_results(results: Vec<SimulationResult>) -> Self {
        let store = Self::new();
        store.record_results(results);
        store
    }

    /// Validate and store a single result. Returns its id.
    pub fn record_result(&self, mut result: SimulationResult) -> ResultId {
        let validation = DataValidator::validate(&result);
        result.is_valid = validation.is_valid;
        if let Some(reason) = &validation.reason {
            debug!(result_id = %result.id, %reason, "stored result marked invalid");
        }
        let id = result.id;
        self.results.write().push(result);
        id
    }

    pub fn record_results(&self, results: Vec<SimulationResult>) {
        let validated = DataValidator::validate_batch(results);
        let invalid = validated.iter().filter(|r| !r.is_valid).count();
        let mut guard = self.results.write();
        info!(count = validated.len(), invalid, "recording simulation results");
        guard.extend(validated);
    }

    pub fn results(&self) -> Vec<SimulationResult> {
        self.results.read().clone()
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }

    pub fn jobs(&self) -> Vec<SimulationJob> {
        self.jobs.read().clone()
    }

    pub fn job(&self, id: JobId) -> Option<SimulationJob> {
        self.jobs.read().iter().find(|j| j.id == Some(id)).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn dataset_stats(&self) -> DatasetStats {
        DatasetStats::from_jobs(self.jobs.read().iter())
    }

    /// Apply an executor-side lifecycle change to a queued job.
    pub fn update_job<F>(&self, id: JobId, update: F) -> MfResult<()>
    where
        F: FnOnce(&mut SimulationJob) -> Result<(), JobError>,
    {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == Some(id))
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        update(job)?;
        Ok(())
    }
}

#[async_trait]
impl ObservationSource for MemoryStore {
    async fn fetch_results(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>> {
        let results = self.results.read();
        let limit = filter.limit.unwrap_or(usize::MAX);
        let observations: Vec<Observation> = results
            .iter()
            .filter(|r| filter.include_invalid || r.is_valid)
            .take(limit)
            .map(Observation::from)
            .collect();
        debug!(
            returned = observations.len(),
            stored = results.len(),
            "fetched observations"
        );
        Ok(observations)
    }
}

#[async_trait]
impl JobSink for MemoryStore {
    async fn insert_jobs(&self, jobs: Vec<SimulationJob>) -> StoreResult<Vec<JobId>> {
        if let Some(existing) = jobs.iter().find_map(|j| j.id) {
            return Err(StoreError::InsertFailed {
                message: format!("job {existing} is already persisted"),
            });
        }

        let mut queue = self.jobs.write();
        let mut ids = Vec::with_capacity(jobs.len());
        for mut job in jobs {
            let id = Uuid::new_v4();
            job.id = Some(id);
            ids.push(id);
            queue.push(job);
        }
        info!(inserted = ids.len(), queued = queue.len(), "jobs appended to queue");
        Ok(ids)
    }
}
