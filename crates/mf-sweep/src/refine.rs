//! Active-learning refinement passes and sweep submission.
//!
//! A [`RefinementOrchestrator`] holds only configuration. Each call to
//! [`RefinementOrchestrator::run_pass`] fetches a fresh observation snapshot,
//! ranks scarce cells, and queues focused sweeps for the scarcest ones in a
//! single batch. Nothing carries over between passes; a failed pass creates
//! no jobs and is not retried here.

use mf_data::{JobSink, ObservationFilter, ObservationSource};
use mf_types::{JobId, MfResult, ParameterRange, RefinementError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::FactoryConfig;
use crate::density::{DensityAnalyzer, ScarceRegion, Scarcity};
use crate::generator::SweepPlan;
use crate::jobs::JobFactory;

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutcome {
    /// Fewer observations than the analysis floor; no jobs.
    InsufficientData { observed: usize, required: usize },
    /// No cell is below the refinement threshold; no jobs.
    Sufficient { observed: usize },
    /// Focused sweeps were queued for `regions`.
    Queued {
        job_ids: Vec<JobId>,
        regions: Vec<ScarceRegion>,
    },
}

impl RefinementOutcome {
    pub fn jobs_created(&self) -> usize {
        match self {
            Self::Queued { job_ids, .. } => job_ids.len(),
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::InsufficientData { observed, required } => format!(
                "Insufficient data: {observed} observations, at least {required} required."
            ),
            Self::Sufficient { .. } => "Dataset is sufficient.".to_string(),
            Self::Queued { job_ids, .. } => format!(
                "Queued {} refinement jobs for sparse regions.",
                job_ids.len()
            ),
        }
    }
}

/// Result of a pass as handed back to whatever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs_created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<RefinementOutcome, RefinementError>> for RefinementReport {
    fn from(result: Result<RefinementOutcome, RefinementError>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                jobs_created: Some(outcome.jobs_created()),
                message: Some(outcome.message()),
                error: None,
            },
            Err(err) => Self {
                success: false,
                jobs_created: None,
                message: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Stateless driver of refinement passes.
#[derive(Debug, Clone)]
pub struct RefinementOrchestrator {
    config: FactoryConfig,
    analyzer: DensityAnalyzer,
}

impl RefinementOrchestrator {
    pub fn new(config: FactoryConfig) -> MfResult<Self> {
        config.validate()?;
        let analyzer = DensityAnalyzer::new(config.grid_spec(), config.min_samples_for_analysis)?;
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn filter(&self) -> ObservationFilter {
        ObservationFilter {
            include_invalid: self.config.include_invalid,
            limit: None,
        }
    }

    /// Run one refinement pass against `source` and `sink`.
    pub async fn run_pass<S, K>(
        &self,
        source: &S,
        sink: &K,
    ) -> Result<RefinementOutcome, RefinementError>
    where
        S: ObservationSource + ?Sized,
        K: JobSink + ?Sized,
    {
        info!("starting refinement pass");

        let observations = source
            .fetch_results(&self.filter())
            .await
            .map_err(|e| {
                error!(error = %e, "observation fetch failed, aborting pass");
                RefinementError::ObservationFetch(e)
            })?;

        let regions = match self
            .analyzer
            .assess(&observations, self.config.scarce_threshold)
        {
            Scarcity::InsufficientData { observed, required } => {
                warn!(observed, required, "too few observations, skipping analysis");
                return Ok(RefinementOutcome::InsufficientData { observed, required });
            }
            Scarcity::Assessed {
                regions,
                binned,
                dropped,
            } => {
                info!(
                    observed = observations.len(),
                    binned,
                    dropped,
                    scarce = regions.len(),
                    threshold = self.config.scarce_threshold,
                    "density analysis complete"
                );
                regions
            }
        };

        if regions.is_empty() {
            info!("dataset is dense enough, no refinement needed");
            return Ok(RefinementOutcome::Sufficient {
                observed: observations.len(),
            });
        }

        let targets: Vec<ScarceRegion> = regions.into_iter().take(self.config.top_k).collect();
        let jobs = JobFactory::focused_jobs(&targets, self.config.refinement_batch_size);

        let job_ids = sink.insert_jobs(jobs).await.map_err(|e| {
            error!(error = %e, "failed to queue refinement jobs");
            RefinementError::JobInsert(e)
        })?;

        for region in &targets {
            info!(region = %region.label, count = region.count, "queued focused sweep");
        }
        info!(jobs_created = job_ids.len(), "refinement pass complete");

        Ok(RefinementOutcome::Queued {
            job_ids,
            regions: targets,
        })
    }

    /// [`run_pass`](Self::run_pass) folded into the invocation report.
    pub async fn run_pass_report<S, K>(&self, source: &S, sink: &K) -> RefinementReport
    where
        S: ObservationSource + ?Sized,
        K: JobSink + ?Sized,
    {
        self.run_pass(source, sink).await.into()
    }

    /// Regions below the advisory threshold, for display. Creates no jobs.
    pub async fn advisory_regions<S>(&self, source: &S) -> Result<Vec<ScarceRegion>, RefinementError>
    where
        S: ObservationSource + ?Sized,
    {
        let observations = source
            .fetch_results(&self.filter())
            .await
            .map_err(RefinementError::ObservationFetch)?;
        Ok(self
            .analyzer
            .scarce_regions(&observations, self.config.advisory_threshold))
    }

    /// Generate the full sweep for `ranges` and queue it as one batch.
    ///
    /// Values are rounded to the configured `rounding_precision`. Returns the
    /// number of queued jobs; an empty parameter list queues nothing and
    /// never touches the sink.
    pub async fn submit_sweep<K>(&self, ranges: &[ParameterRange], sink: &K) -> MfResult<usize>
    where
        K: JobSink + ?Sized,
    {
        let plan = SweepPlan::with_precision(ranges, self.config.rounding_precision)?;
        if plan.is_empty() {
            info!("no parameters to sweep");
            return Ok(0);
        }

        info!(
            combinations = plan.len(),
            axes = ?plan.axis_lengths(),
            precision = self.config.rounding_precision,
            "submitting parameter sweep"
        );
        let jobs = JobFactory::jobs_from_combinations(&plan);
        let ids = sink.insert_jobs(jobs).await?;
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mf_data::{MemoryStore, StoreResult};
    use mf_types::{
        JobParameters, JobStatus, MfError, Observation, SimulationJob, SimulationResult,
        StoreError, SweepError,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn result_at(radius: f64, height: f64) -> SimulationResult {
        let mut params = BTreeMap::new();
        params.insert("radius".to_string(), radius);
        params.insert("height".to_string(), height);
        SimulationResult::new(Uuid::new_v4(), params, 0.8, 1.0, 10.0)
    }

    /// 12 points per cell everywhere except the radius bin [260, 300),
    /// which gets `sparse` per cell.
    fn skewed_results(sparse: usize) -> Vec<SimulationResult> {
        let mut out = Vec::new();
        for r in 0..5 {
            for h in 0..5 {
                let n = if r == 4 { sparse } else { 12 };
                for _ in 0..n {
                    out.push(result_at(120.0 + 40.0 * r as f64, 420.0 + 40.0 * h as f64));
                }
            }
        }
        out
    }

    /// Source that always fails.
    struct BrokenSource;

    #[async_trait]
    impl ObservationSource for BrokenSource {
        async fn fetch_results(&self, _filter: &ObservationFilter) -> StoreResult<Vec<Observation>> {
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        }
    }

    /// Sink that counts calls and optionally fails.
    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSink {
        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobSink for CountingSink {
        async fn insert_jobs(&self, jobs: Vec<SimulationJob>) -> StoreResult<Vec<JobId>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::InsertFailed {
                    message: "queue is read-only".to_string(),
                });
            }
            Ok(jobs.iter().map(|_| Uuid::new_v4()).collect())
        }
    }

    fn orchestrator() -> RefinementOrchestrator {
        RefinementOrchestrator::new(FactoryConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn insufficient_data_creates_nothing() {
        let store = MemoryStore::with_results((0..49).map(|_| result_at(150.0, 450.0)).collect());
        let sink = CountingSink::default();

        let outcome = orchestrator().run_pass(&store, &sink).await.unwrap();
        assert_eq!(
            outcome,
            RefinementOutcome::InsufficientData {
                observed: 49,
                required: 50
            }
        );
        assert_eq!(sink.calls(), 0);

        let report = orchestrator().run_pass_report(&store, &sink).await;
        assert!(report.success);
        assert_eq!(report.jobs_created, Some(0));
        assert!(report.message.unwrap().contains("Insufficient data"));
    }

    #[tokio::test]
    async fn dense_dataset_is_sufficient() {
        let store = MemoryStore::with_results(skewed_results(12));
        let sink = CountingSink::default();

        let outcome = orchestrator().run_pass(&store, &sink).await.unwrap();
        assert_eq!(outcome, RefinementOutcome::Sufficient { observed: 300 });
        assert_eq!(outcome.jobs_created(), 0);
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn scarce_regions_get_top_k_focused_jobs() {
        let store = MemoryStore::with_results(skewed_results(2));

        let outcome = orchestrator().run_pass(&store, &store).await.unwrap();
        let RefinementOutcome::Queued { job_ids, regions } = outcome else {
            panic!("expected jobs to be queued");
        };
        assert_eq!(job_ids.len(), 3);
        assert_eq!(regions.len(), 3);
        for region in &regions {
            assert_eq!(region.count, 2);
            assert_eq!(region.axis_ranges[0].low, 260.0);
        }

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 3);
        for job in &jobs {
            assert_eq!(job.status(), JobStatus::Pending);
            assert!(job.id.is_some());
            match &job.parameters {
                JobParameters::FocusedSweep(sweep) => assert_eq!(sweep.samples, 20),
                other => panic!("unexpected job parameters: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn fewer_scarce_regions_than_top_k() {
        let mut results = skewed_results(12);
        // Empty exactly one cell: radius bin 0, height bin 0.
        results.retain(|r| !(r.parameters["radius"] < 140.0 && r.parameters["height"] < 440.0));
        let store = MemoryStore::with_results(results);

        let outcome = orchestrator().run_pass(&store, &store).await.unwrap();
        assert_eq!(outcome.jobs_created(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_before_sink() {
        let sink = CountingSink::default();
        let err = orchestrator().run_pass(&BrokenSource, &sink).await.unwrap_err();
        assert!(matches!(err, RefinementError::ObservationFetch(_)));
        assert_eq!(sink.calls(), 0);

        let report = orchestrator().run_pass_report(&BrokenSource, &sink).await;
        assert!(!report.success);
        assert!(report.jobs_created.is_none());
        assert!(report.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn sink_failure_reports_no_jobs() {
        let store = MemoryStore::with_results(skewed_results(2));
        let sink = CountingSink::failing();

        let report = orchestrator().run_pass_report(&store, &sink).await;
        assert!(!report.success);
        assert_eq!(report.jobs_created, None);
        assert!(report.error.as_deref().unwrap().contains("read-only"));
        assert_eq!(sink.calls(), 1);
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn invalid_results_are_excluded_by_default() {
        let mut results = skewed_results(12);
        for r in results.iter_mut().filter(|r| r.parameters["radius"] > 260.0) {
            r.transmission = 1.5;
        }
        let store = MemoryStore::with_results(results);

        let outcome = orchestrator().run_pass(&store, &CountingSink::default()).await.unwrap();
        assert_eq!(outcome.jobs_created(), 3);

        let lenient = RefinementOrchestrator::new(FactoryConfig {
            include_invalid: true,
            ..FactoryConfig::default()
        })
        .unwrap();
        let outcome = lenient.run_pass(&store, &CountingSink::default()).await.unwrap();
        assert_eq!(outcome.jobs_created(), 0);
    }

    #[tokio::test]
    async fn advisory_uses_looser_threshold() {
        // 7 per cell: below the refinement threshold, above the advisory one.
        let store = MemoryStore::with_results(skewed_results(7));
        let orch = orchestrator();

        assert!(orch.advisory_regions(&store).await.unwrap().is_empty());
        let outcome = orch.run_pass(&store, &CountingSink::default()).await.unwrap();
        assert_eq!(outcome.jobs_created(), 3);
        assert_eq!(store.job_count(), 0);
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = RefinementReport::from(Ok::<_, RefinementError>(RefinementOutcome::Queued {
            job_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            regions: Vec::new(),
        }));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["jobsCreated"], 2);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn submit_sweep_queues_every_combination() {
        let store = MemoryStore::new();
        let ranges = vec![
            ParameterRange::new("radius", 100.0, 120.0, 10.0),
            ParameterRange::new("height", 400.0, 500.0, 100.0),
        ];
        let queued = orchestrator().submit_sweep(&ranges, &store).await.unwrap();
        assert_eq!(queued, 6);
        assert_eq!(store.dataset_stats().pending_jobs, 6);
    }

    #[tokio::test]
    async fn submit_empty_sweep_skips_sink() {
        let sink = CountingSink::default();
        assert_eq!(orchestrator().submit_sweep(&[], &sink).await.unwrap(), 0);
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn submit_invalid_sweep_fails_without_jobs() {
        let sink = CountingSink::default();
        let err = orchestrator()
            .submit_sweep(&[ParameterRange::new("radius", 100.0, 120.0, 0.0)], &sink)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MfError::Sweep(SweepError::InvalidParameterRange { .. })
        ));
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn submit_sweep_uses_configured_precision() {
        let ranges = vec![ParameterRange::new("period", 0.0, 1.0, 1.0 / 3.0)];
        let point_values = |store: &MemoryStore| -> Vec<f64> {
            store
                .jobs()
                .iter()
                .map(|job| match &job.parameters {
                    JobParameters::Point { values } => values.get("period").unwrap(),
                    other => panic!("unexpected job parameters: {other:?}"),
                })
                .collect()
        };

        let fine = MemoryStore::new();
        orchestrator().submit_sweep(&ranges, &fine).await.unwrap();
        assert_eq!(point_values(&fine)[1], 0.3333333333);

        let coarse = MemoryStore::new();
        let config = FactoryConfig {
            rounding_precision: 2,
            ..FactoryConfig::default()
        };
        RefinementOrchestrator::new(config)
            .unwrap()
            .submit_sweep(&ranges, &coarse)
            .await
            .unwrap();
        assert_eq!(point_values(&coarse), vec![0.0, 0.33, 0.67, 1.0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = RefinementOrchestrator::new(FactoryConfig::default().with_top_k(0)).unwrap_err();
        assert!(matches!(err, MfError::Config(_)));
    }
}
