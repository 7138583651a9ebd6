//! Factory configuration: thresholds, batch sizes and the analysis box.

use mf_types::{config_error, MfResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::density::{GridSpec, DEFAULT_BINS_PER_AXIS};
use crate::generator::DEFAULT_ROUNDING_PRECISION;

/// Declared bounds of one analysis axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
}

impl AxisBounds {
    pub fn new(name: impl Into<String>, min: f64, max: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            unit: unit.into(),
        }
    }
}

/// Options recognized by the sweep and refinement engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub bin_count_per_axis: usize,

    /// Cells below this count trigger automatic refinement.
    pub scarce_threshold: usize,

    /// Cells below this count are reported for display only.
    pub advisory_threshold: usize,

    /// How many of the scarcest regions get a follow-up job per pass.
    pub top_k: usize,

    /// Sample count of each focused-sweep job.
    pub refinement_batch_size: usize,

    /// Analysis is skipped below this many observations.
    pub min_samples_for_analysis: usize,

    /// Decimal places kept on generated parameter values.
    pub rounding_precision: u32,

    /// Feed results the validator rejected into the analysis as well.
    pub include_invalid: bool,

    /// The declared bounding box of the parameter space.
    pub axes: Vec<AxisBounds>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            bin_count_per_axis: DEFAULT_BINS_PER_AXIS,
            scarce_threshold: 10,
            advisory_threshold: 5,
            top_k: 3,
            refinement_batch_size: 20,
            min_samples_for_analysis: 50,
            rounding_precision: DEFAULT_ROUNDING_PRECISION,
            include_invalid: false,
            axes: vec![
                AxisBounds::new("radius", 100.0, 300.0, "nm"),
                AxisBounds::new("height", 400.0, 600.0, "nm"),
            ],
        }
    }
}

impl FactoryConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> MfResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Overlay `MF_*` environment variables.
    pub fn apply_env(self) -> MfResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup (same keys as
    /// [`apply_env`](Self::apply_env)).
    pub fn apply_overrides<F>(mut self, lookup: F) -> MfResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> MfResult<T> {
            raw.trim()
                .parse()
                .map_err(|_| config_error!("{key} is not a valid number: {raw:?}"))
        }

        let usize_fields: [(&str, &mut usize); 6] = [
            ("MF_BIN_COUNT", &mut self.bin_count_per_axis),
            ("MF_SCARCE_THRESHOLD", &mut self.scarce_threshold),
            ("MF_ADVISORY_THRESHOLD", &mut self.advisory_threshold),
            ("MF_TOP_K", &mut self.top_k),
            ("MF_BATCH_SIZE", &mut self.refinement_batch_size),
            ("MF_MIN_SAMPLES", &mut self.min_samples_for_analysis),
        ];
        for (key, slot) in usize_fields {
            if let Some(raw) = lookup(key) {
                *slot = parse(key, raw)?;
            }
        }
        if let Some(raw) = lookup("MF_ROUNDING_PRECISION") {
            self.rounding_precision = parse("MF_ROUNDING_PRECISION", raw)?;
        }
        Ok(self)
    }

    pub fn with_thresholds(mut self, scarce: usize, advisory: usize) -> Self {
        self.scarce_threshold = scarce;
        self.advisory_threshold = advisory;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_batch_size(mut self, samples: usize) -> Self {
        self.refinement_batch_size = samples;
        self
    }

    pub fn with_min_samples(mut self, n: usize) -> Self {
        self.min_samples_for_analysis = n;
        self
    }

    pub fn with_axes(mut self, axes: Vec<AxisBounds>) -> Self {
        self.axes = axes;
        self
    }

    pub fn validate(&self) -> MfResult<()> {
        if self.bin_count_per_axis == 0 {
            return Err(config_error!("bin_count_per_axis must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(config_error!("top_k must be at least 1"));
        }
        if self.refinement_batch_size == 0 {
            return Err(config_error!("refinement_batch_size must be at least 1"));
        }
        if self.rounding_precision > 15 {
            return Err(config_error!(
                "rounding_precision {} exceeds f64 resolution (max 15)",
                self.rounding_precision
            ));
        }
        self.grid_spec().validate()?;
        Ok(())
    }

    /// Analysis grid: every configured axis split into `bin_count_per_axis`.
    pub fn grid_spec(&self) -> GridSpec {
        self.axes.iter().fold(GridSpec::new(), |spec, axis| {
            spec.add_axis(axis.name.clone(), axis.min, axis.max, self.bin_count_per_axis)
                .with_unit(axis.unit.clone())
        })
    }
}
