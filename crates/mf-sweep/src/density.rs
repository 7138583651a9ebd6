//! Density grid analysis over observed parameter coordinates.
//!
//! The declared bounding box is split into a fixed number of equal-width
//! bins per axis. Each observation lands in at most one cell; observations
//! outside the box (including values exactly on an axis maximum), missing an
//! axis, or carrying a non-finite coordinate are dropped rather than clamped
//! into an edge cell.

use mf_types::{AnalysisError, AxisRange, Observation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::generator::{round_to, DEFAULT_ROUNDING_PRECISION};

/// Default number of bins per axis.
pub const DEFAULT_BINS_PER_AXIS: usize = 5;

/// Upper bound on the total cell count of a grid.
pub const MAX_GRID_CELLS: usize = 1 << 20;

/// One axis of the analysis grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub min: f64,
    /// Exclusive upper bound of the last bin.
    pub max: f64,
    pub bins: usize,
    #[serde(default)]
    pub unit: String,
}

impl GridAxis {
    fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    fn bin_index(&self, value: f64) -> Option<usize> {
        let idx = ((value - self.min) / (self.max - self.min) * self.bins as f64).floor();
        if idx >= 0.0 && idx < self.bins as f64 {
            Some(idx as usize)
        } else {
            None
        }
    }

    fn bin_range(&self, index: usize) -> AxisRange {
        let low = self.min + index as f64 * self.width();
        let high = if index + 1 == self.bins {
            self.max
        } else {
            self.min + (index + 1) as f64 * self.width()
        };
        AxisRange::new(self.name.clone(), low, high)
    }
}

/// The declared N-dimensional bounding box and its binning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridSpec {
    pub axes: Vec<GridAxis>,
}

impl GridSpec {
    pub fn new() -> Self {
        Self { axes: Vec::new() }
    }

    pub fn add_axis(mut self, name: impl Into<String>, min: f64, max: f64, bins: usize) -> Self {
        self.axes.push(GridAxis {
            name: name.into(),
            min,
            max,
            bins,
            unit: String::new(),
        });
        self
    }

    /// Set the unit of the most recently added axis.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        if let Some(axis) = self.axes.last_mut() {
            axis.unit = unit.into();
        }
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |message: String| AnalysisError::InvalidGrid { message };

        if self.axes.is_empty() {
            return Err(invalid("grid has no axes".to_string()));
        }
        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.name.as_str()) {
                return Err(invalid(format!("axis '{}' declared twice", axis.name)));
            }
            if axis.bins == 0 {
                return Err(invalid(format!("axis '{}' has zero bins", axis.name)));
            }
            if !(axis.min.is_finite() && axis.max.is_finite()) || axis.max <= axis.min {
                return Err(invalid(format!(
                    "axis '{}' has invalid bounds [{}, {})",
                    axis.name, axis.min, axis.max
                )));
            }
        }
        self.axes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.bins))
            .filter(|&cells| cells <= MAX_GRID_CELLS)
            .ok_or_else(|| invalid(format!("grid exceeds {MAX_GRID_CELLS} cells")))?;
        Ok(())
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.axes.iter().map(|a| a.bins).product()
    }

    /// Row-major flat cell index of an observation, if it lies in the box.
    fn cell_of(&self, observation: &Observation) -> Option<usize> {
        let mut flat = 0usize;
        for axis in &self.axes {
            let value = observation.coordinate(&axis.name)?;
            if !value.is_finite() {
                return None;
            }
            flat = flat * axis.bins + axis.bin_index(value)?;
        }
        Some(flat)
    }

    fn unflatten(&self, mut flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.axes.len()];
        for (slot, axis) in index.iter_mut().zip(&self.axes).rev() {
            *slot = flat % axis.bins;
            flat /= axis.bins;
        }
        index
    }
}

/// One grid cell and its observation count. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityBin {
    /// Per-axis bin index.
    pub index: Vec<usize>,
    pub ranges: Vec<AxisRange>,
    pub count: usize,
}

/// An under-sampled cell, ready to be targeted by a focused sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScarceRegion {
    pub axis_ranges: Vec<AxisRange>,
    pub count: usize,
    /// Human-readable target, e.g. `radius: 100-140nm, height: 400-440nm`.
    pub label: String,
}

/// Per-cell counts for one snapshot of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    spec: GridSpec,
    counts: Vec<usize>,
    total: usize,
}

impl DensityGrid {
    /// Count `observations` into the cells of `spec`.
    ///
    /// `spec` must already be validated.
    pub fn build(spec: &GridSpec, observations: &[Observation]) -> Self {
        let mut counts = vec![0usize; spec.cell_count()];
        for obs in observations {
            if let Some(cell) = spec.cell_of(obs) {
                counts[cell] += 1;
            }
        }
        Self {
            spec: spec.clone(),
            counts,
            total: observations.len(),
        }
    }

    /// Observations in the snapshot.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Observations that landed in a cell.
    pub fn binned(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Observations outside the declared box or missing an axis.
    pub fn dropped(&self) -> usize {
        self.total - self.binned()
    }

    pub fn cells(&self) -> Vec<DensityBin> {
        (0..self.counts.len()).map(|flat| self.cell(flat)).collect()
    }

    fn cell(&self, flat: usize) -> DensityBin {
        let index = self.spec.unflatten(flat);
        let ranges = self
            .spec
            .axes
            .iter()
            .zip(&index)
            .map(|(axis, &i)| axis.bin_range(i))
            .collect();
        DensityBin {
            index,
            ranges,
            count: self.counts[flat],
        }
    }

    /// Cells with `count < threshold`, scarcest first. Ties keep row-major
    /// cell order.
    pub fn scarce_regions(&self, threshold: usize) -> Vec<ScarceRegion> {
        let mut scarce: Vec<ScarceRegion> = (0..self.counts.len())
            .filter(|&flat| self.counts[flat] < threshold)
            .map(|flat| {
                let bin = self.cell(flat);
                ScarceRegion {
                    label: self.label(&bin.ranges),
                    axis_ranges: bin.ranges,
                    count: bin.count,
                }
            })
            .collect();
        scarce.sort_by_key(|r| r.count);
        scarce
    }

    fn label(&self, ranges: &[AxisRange]) -> String {
        ranges
            .iter()
            .zip(&self.spec.axes)
            .map(|(r, axis)| {
                format!(
                    "{}: {}-{}{}",
                    r.name,
                    round_to(r.low, DEFAULT_ROUNDING_PRECISION),
                    round_to(r.high, DEFAULT_ROUNDING_PRECISION),
                    axis.unit
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of a scarcity assessment.
#[derive(Debug, Clone, PartialEq)]
pub enum Scarcity {
    /// Too few observations to draw conclusions; nothing was binned.
    InsufficientData { observed: usize, required: usize },
    /// The grid was evaluated; `regions` may be empty.
    Assessed {
        regions: Vec<ScarceRegion>,
        binned: usize,
        dropped: usize,
    },
}

impl Scarcity {
    pub fn regions(&self) -> &[ScarceRegion] {
        match self {
            Self::InsufficientData { .. } => &[],
            Self::Assessed { regions, .. } => regions.as_slice(),
        }
    }
}

/// Stateless analyzer bound to a validated grid and a minimum-sample floor.
#[derive(Debug, Clone)]
pub struct DensityAnalyzer {
    spec: GridSpec,
    min_samples: usize,
}

impl DensityAnalyzer {
    pub fn new(spec: GridSpec, min_samples: usize) -> Result<Self, AnalysisError> {
        spec.validate()?;
        Ok(Self { spec, min_samples })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Count observations per cell regardless of the sample floor.
    pub fn analyze(&self, observations: &[Observation]) -> DensityGrid {
        DensityGrid::build(&self.spec, observations)
    }

    /// Rank cells below `threshold`, or skip when the snapshot is too small.
    pub fn assess(&self, observations: &[Observation], threshold: usize) -> Scarcity {
        if observations.len() < self.min_samples {
            return Scarcity::InsufficientData {
                observed: observations.len(),
                required: self.min_samples,
            };
        }
        let grid = self.analyze(observations);
        Scarcity::Assessed {
            regions: grid.scarce_regions(threshold),
            binned: grid.binned(),
            dropped: grid.dropped(),
        }
    }

    /// Scarce regions, empty when the sample floor is not met.
    pub fn scarce_regions(&self, observations: &[Observation], threshold: usize) -> Vec<ScarceRegion> {
        match self.assess(observations, threshold) {
            Scarcity::InsufficientData { .. } => Vec::new(),
            Scarcity::Assessed { regions, .. } => regions,
        }
    }
}
