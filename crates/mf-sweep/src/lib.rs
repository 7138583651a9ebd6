//! # mf-sweep
//!
//! Parameter sweep generation and active-learning refinement for MetaFab.
//!
//! Provides the cartesian-product sweep generator, the job factory, the
//! density grid analyzer that finds under-sampled regions, and the
//! refinement orchestrator that queues focused sweeps for them.

mod config;
mod density;
mod generator;
mod jobs;
mod refine;

pub use config::{AxisBounds, FactoryConfig};
pub use density::{
    DensityAnalyzer, DensityBin, DensityGrid, GridAxis, GridSpec, ScarceRegion, Scarcity,
    DEFAULT_BINS_PER_AXIS, MAX_GRID_CELLS,
};
pub use generator::{
    generate_combinations, generate_combinations_with_precision, round_to, CombinationIter,
    SweepPlan, DEFAULT_ROUNDING_PRECISION,
};
pub use jobs::{sample_focused_points, JobFactory};
pub use refine::{RefinementOrchestrator, RefinementOutcome, RefinementReport};
