//! Physical sanity checks for simulation results.

use serde::{Deserialize, Serialize};

use crate::dataset::SimulationResult;

/// Outcome of validating one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

/// Checks transmission and phase of simulation results.
pub struct DataValidator;

impl DataValidator {
    /// Transmission must lie in [0, 1]; phase must be finite.
    pub fn validate(result: &SimulationResult) -> Validation {
        let t = result.transmission;
        if !(0.0..=1.0).contains(&t) {
            return Validation::rejected(format!(
                "Invalid transmission value: {t}. Must be between 0 and 1."
            ));
        }

        if !result.phase.is_finite() {
            return Validation::rejected(format!(
                "Invalid phase value: {}. Must be a finite number.",
                result.phase
            ));
        }

        Validation::ok()
    }

    /// Returns the batch with `is_valid` derived for every result.
    pub fn validate_batch(results: Vec<SimulationResult>) -> Vec<SimulationResult> {
        results
            .into_iter()
            .map(|mut result| {
                result.is_valid = Self::validate(&result).is_valid;
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn result(transmission: f64, phase: f64) -> SimulationResult {
        SimulationResult::new(Uuid::new_v4(), BTreeMap::new(), transmission, phase, 1.0)
    }

    #[test]
    fn accepts_physical_result() {
        let v = DataValidator::validate(&result(0.95, 3.14));
        assert!(v.is_valid);
        assert!(v.reason.is_none());
    }

    #[test]
    fn transmission_bounds_are_inclusive() {
        assert!(DataValidator::validate(&result(0.0, 0.0)).is_valid);
        assert!(DataValidator::validate(&result(1.0, 0.0)).is_valid);
    }

    #[test]
    fn rejects_out_of_range_transmission() {
        let v = DataValidator::validate(&result(1.2, 0.0));
        assert!(!v.is_valid);
        assert!(v.reason.unwrap().contains("transmission"));

        assert!(!DataValidator::validate(&result(-0.01, 0.0)).is_valid);
        assert!(!DataValidator::validate(&result(f64::NAN, 0.0)).is_valid);
    }

    #[test]
    fn rejects_non_finite_phase() {
        assert!(!DataValidator::validate(&result(0.5, f64::INFINITY)).is_valid);
        let v = DataValidator::validate(&result(0.5, f64::NAN));
        assert!(v.reason.unwrap().contains("phase"));
    }

    #[test]
    fn batch_sets_validity_flags() {
        let batch = DataValidator::validate_batch(vec![result(0.5, 1.0), result(2.0, 1.0)]);
        assert!(batch[0].is_valid);
        assert!(!batch[1].is_valid);
    }
}
