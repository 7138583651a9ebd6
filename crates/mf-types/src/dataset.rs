//! Dataset records shared by the sweep engine and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::errors::{JobError, SweepError};

/// Job identifier, assigned by the job queue at insert time.
pub type JobId = Uuid;

/// Simulation result identifier.
pub type ResultId = Uuid;

/// One axis of a parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    /// Parameter name (e.g. "radius").
    pub name: String,
    pub start: f64,
    /// Inclusive upper bound.
    pub end: f64,
    pub step: f64,
    /// Display unit (e.g. "nm").
    pub unit: String,
}

impl ParameterRange {
    pub fn new(name: impl Into<String>, start: f64, end: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            step,
            unit: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Check the axis invariants: finite bounds, `step > 0`, `end >= start`.
    pub fn validate(&self) -> Result<(), SweepError> {
        let fail = |message: String| SweepError::InvalidParameterRange {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(fail("parameter name must not be empty".to_string()));
        }
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err(fail(format!(
                "bounds must be finite (start={}, end={}, step={})",
                self.start, self.end, self.step
            )));
        }
        if self.step <= 0.0 {
            return Err(fail(format!("step must be positive, got {}", self.step)));
        }
        if self.end < self.start {
            return Err(fail(format!(
                "end {} is below start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }

    /// Validate an ordered list of axes, including name uniqueness.
    pub fn validate_all(ranges: &[ParameterRange]) -> Result<(), SweepError> {
        let mut seen = HashSet::with_capacity(ranges.len());
        for range in ranges {
            range.validate()?;
            if !seen.insert(range.name.as_str()) {
                return Err(SweepError::InvalidParameterRange {
                    name: range.name.clone(),
                    message: "parameter appears more than once".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One point in parameter space. Read-only once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Combination(BTreeMap<String, f64>);

impl Combination {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.0
    }
}

impl FromIterator<(String, f64)> for Combination {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Combination {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Closed interval on one named axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl AxisRange {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Targeted follow-up sampling over a sub-region of the space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusedSweep {
    pub axis_ranges: Vec<AxisRange>,
    pub samples: usize,
}

/// What a job asks the executor to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobParameters {
    /// A single point from a full sweep.
    Point { values: Combination },
    /// `samples` points inside a scarce region.
    FocusedSweep(FocusedSweep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A queued simulation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationJob {
    /// `None` until the job queue persists the record.
    pub id: Option<JobId>,
    pub parameters: JobParameters,
    status: JobStatus,
    /// Percent complete, 0..=100.
    progress: u8,
    error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SimulationJob {
    /// A fresh pending job with no id.
    pub fn pending(parameters: JobParameters) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            parameters,
            status: JobStatus::Pending,
            progress: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn mark_running(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Running)
    }

    /// Record executor progress. Only valid while running; clamps to 100.
    pub fn update_progress(&mut self, progress: u8) -> Result<(), JobError> {
        self.ensure_mutable()?;
        if self.status != JobStatus::Running {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(error.into());
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::TerminalState {
                status: self.status,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), JobError> {
        self.ensure_mutable()?;
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !allowed {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Output of one completed simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub id: ResultId,
    pub job_id: JobId,
    /// Expected in [0, 1].
    pub transmission: f64,
    /// Radians; must be finite.
    pub phase: f64,
    pub frequency: f64,
    pub parameters: BTreeMap<String, f64>,
    /// Set by the validator, not by the executor.
    #[serde(default)]
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl SimulationResult {
    pub fn new(
        job_id: JobId,
        parameters: BTreeMap<String, f64>,
        transmission: f64,
        phase: f64,
        frequency: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            transmission,
            phase,
            frequency,
            parameters,
            is_valid: false,
            created_at: Utc::now(),
        }
    }
}

/// Read-only projection of a result handed to the density analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub parameters: BTreeMap<String, f64>,
    pub phase: f64,
    pub transmission: f64,
}

impl Observation {
    pub fn coordinate(&self, axis: &str) -> Option<f64> {
        self.parameters.get(axis).copied()
    }
}

impl From<&SimulationResult> for Observation {
    fn from(result: &SimulationResult) -> Self {
        Self {
            parameters: result.parameters.clone(),
            phase: result.phase,
            transmission: result.transmission,
        }
    }
}

/// Job queue progress summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub pending_jobs: usize,
    pub running_jobs: usize,
    /// Completed share of all jobs, in percent.
    pub progress: f64,
}

impl DatasetStats {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a SimulationJob>) -> Self {
        let mut stats = Self::default();
        for job in jobs {
            stats.total_jobs += 1;
            match job.status {
                JobStatus::Pending => stats.pending_jobs += 1,
                JobStatus::Running => stats.running_jobs += 1,
                JobStatus::Completed => stats.completed_jobs += 1,
                JobStatus::Failed => stats.failed_jobs += 1,
            }
        }
        if stats.total_jobs > 0 {
            stats.progress = stats.completed_jobs as f64 / stats.total_jobs as f64 * 100.0;
        }
        stats
    }
}
