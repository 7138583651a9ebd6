//! Job factory: turns sweep points and scarce regions into pending jobs.

use mf_types::{Combination, FocusedSweep, JobParameters, SimulationJob};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::density::ScarceRegion;
use crate::generator::round_to;

/// Builds `Pending` job records. Never assigns ids; the job queue does that.
pub struct JobFactory;

impl JobFactory {
    /// One point job per combination, in input order.
    pub fn jobs_from_combinations<I>(combinations: I) -> Vec<SimulationJob>
    where
        I: IntoIterator<Item = Combination>,
    {
        combinations
            .into_iter()
            .map(|values| SimulationJob::pending(JobParameters::Point { values }))
            .collect()
    }

    /// A focused sweep of `samples` points covering `region`.
    pub fn focused_job(region: &ScarceRegion, samples: usize) -> SimulationJob {
        SimulationJob::pending(JobParameters::FocusedSweep(FocusedSweep {
            axis_ranges: region.axis_ranges.clone(),
            samples,
        }))
    }

    pub fn focused_jobs(regions: &[ScarceRegion], samples: usize) -> Vec<SimulationJob> {
        regions
            .iter()
            .map(|region| Self::focused_job(region, samples))
            .collect()
    }
}

/// Expand a focused sweep into concrete points.
///
/// Points are uniform inside each axis range and reproducible for a given
/// `seed`. Degenerate (zero-width) ranges pin the axis to `low`.
pub fn sample_focused_points(sweep: &FocusedSweep, seed: u64, precision: u32) -> Vec<Combination> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..sweep.samples)
        .map(|_| {
            sweep
                .axis_ranges
                .iter()
                .map(|range| {
                    let value = if range.high > range.low {
                        rng.gen_range(range.low..range.high)
                    } else {
                        range.low
                    };
                    (range.name.clone(), round_to(value, precision))
                })
                .collect()
        })
        .collect()
}
