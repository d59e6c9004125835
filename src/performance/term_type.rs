use serde::{Serialize, Deserialize};

use crate::performance::mean_squared_error::MeanSquaredError;
use crate::performance::normalized_squared_error::NormalizedSquaredError;
use crate::performance::performance_term::PerformanceTerm;
use crate::performance::root_mean_squared_error::RootMeanSquaredError;
use crate::performance::sum_squared_error::SumSquaredError;

/// Selects the objective term a network is trained with.
///
/// - `SumSquaredError`: Σ‖e‖²; the only objective with a Hessian.
/// - `MeanSquaredError`: Σ‖e‖² / (instances × outputs).
/// - `NormalizedSquaredError`: Σ‖e‖² / Σ‖t - mean(t)‖²; fails on constant targets.
/// - `RootMeanSquaredError`: √MSE; no terms, so not usable by Levenberg-Marquardt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTermType {
    #[default]
    SumSquaredError,
    MeanSquaredError,
    NormalizedSquaredError,
    RootMeanSquaredError,
}

impl PerformanceTermType {
    /// The term this variant names.
    pub fn term(self) -> &'static dyn PerformanceTerm {
        match self {
            PerformanceTermType::SumSquaredError => &SumSquaredError,
            PerformanceTermType::MeanSquaredError => &MeanSquaredError,
            PerformanceTermType::NormalizedSquaredError => &NormalizedSquaredError,
            PerformanceTermType::RootMeanSquaredError => &RootMeanSquaredError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_variant() {
        assert_eq!(PerformanceTermType::NormalizedSquaredError.term().name(), "NormalizedSquaredError");
        assert_eq!(
            serde_json::to_string(&PerformanceTermType::RootMeanSquaredError).unwrap(),
            "\"root_mean_squared_error\""
        );
    }
}
