//! Cartesian-product sweep generation over discretized parameter ranges.

use mf_types::{Combination, ParameterRange, SweepError};

/// Decimal places kept on every generated value.
pub const DEFAULT_ROUNDING_PRECISION: u32 = 10;

/// Round `value` to `precision` decimal places.
///
/// Values too large to scale are returned unchanged.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[derive(Debug, Clone)]
struct Axis {
    name: String,
    start: f64,
    step: f64,
    len: usize,
}

impl Axis {
    fn from_range(range: &ParameterRange, precision: u32) -> Result<Self, SweepError> {
        // Rounding the step ratio keeps `end` inside the axis when
        // (end - start) / step lands a hair under an integer.
        let steps = round_to((range.end - range.start) / range.step, precision).floor();
        if steps >= usize::MAX as f64 {
            return Err(SweepError::TooLarge { axes: 1 });
        }
        let mut axis = Self {
            name: range.name.clone(),
            start: range.start,
            step: range.step,
            len: steps as usize + 1,
        };
        // The same rounding can also lift the last point past `end`.
        while axis.len > 1 && axis.value(axis.len - 1, precision) > range.end {
            axis.len -= 1;
        }
        Ok(axis)
    }

    fn value(&self, index: usize, precision: u32) -> f64 {
        round_to(self.start + index as f64 * self.step, precision)
    }
}

/// A validated sweep: the axes, their point counts and the total size.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    axes: Vec<Axis>,
    precision: u32,
    total: usize,
}

impl SweepPlan {
    pub fn new(ranges: &[ParameterRange]) -> Result<Self, SweepError> {
        Self::with_precision(ranges, DEFAULT_ROUNDING_PRECISION)
    }

    pub fn with_precision(ranges: &[ParameterRange], precision: u32) -> Result<Self, SweepError> {
        ParameterRange::validate_all(ranges)?;

        let axes = ranges
            .iter()
            .map(|r| Axis::from_range(r, precision))
            .collect::<Result<Vec<_>, _>>()?;

        let total = if axes.is_empty() {
            0
        } else {
            axes.iter()
                .try_fold(1usize, |acc, axis| acc.checked_mul(axis.len))
                .ok_or(SweepError::TooLarge { axes: axes.len() })?
        };

        Ok(Self {
            axes,
            precision,
            total,
        })
    }

    /// Number of combinations the plan will yield.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Point count per axis, in input order.
    pub fn axis_lengths(&self) -> Vec<(&str, usize)> {
        self.axes.iter().map(|a| (a.name.as_str(), a.len)).collect()
    }

    /// Discretized values of one axis.
    pub fn axis_values(&self, name: &str) -> Option<Vec<f64>> {
        let axis = self.axes.iter().find(|a| a.name == name)?;
        Some((0..axis.len).map(|i| axis.value(i, self.precision)).collect())
    }

    /// Lazily walk the product in first-axis-major order.
    pub fn iter(&self) -> CombinationIter<'_> {
        CombinationIter {
            plan: self,
            indices: vec![0; self.axes.len()],
            remaining: self.total,
        }
    }
}

impl<'a> IntoIterator for &'a SweepPlan {
    type Item = Combination;
    type IntoIter = CombinationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer over axis indices; the last axis turns fastest.
#[derive(Debug, Clone)]
pub struct CombinationIter<'a> {
    plan: &'a SweepPlan,
    indices: Vec<usize>,
    remaining: usize,
}

impl Iterator for CombinationIter<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let precision = self.plan.precision;
        let combo = self
            .plan
            .axes
            .iter()
            .zip(&self.indices)
            .map(|(axis, &i)| (axis.name.clone(), axis.value(i, precision)))
            .collect();

        self.remaining -= 1;
        for (axis, index) in self.plan.axes.iter().zip(self.indices.iter_mut()).rev() {
            *index += 1;
            if *index < axis.len {
                break;
            }
            *index = 0;
        }

        Some(combo)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CombinationIter<'_> {}

/// Generate every combination of `ranges` with the default precision.
///
/// An empty parameter list yields no combinations.
pub fn generate_combinations(ranges: &[ParameterRange]) -> Result<Vec<Combination>, SweepError> {
    generate_combinations_with_precision(ranges, DEFAULT_ROUNDING_PRECISION)
}

pub fn generate_combinations_with_precision(
    ranges: &[ParameterRange],
    precision: u32,
) -> Result<Vec<Combination>, SweepError> {
    let plan = SweepPlan::with_precision(ranges, precision)?;
    Ok(plan.iter().collect())
}
