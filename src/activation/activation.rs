use serde::{Serialize, Deserialize};
use std::f64::consts::E;

/// Scalar activation applied per perceptron to its combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    /// 0 for negative combinations, 1 otherwise.
    Threshold,
    /// -1 for negative combinations, 1 otherwise.
    SymmetricThreshold,
    Logistic,
    HyperbolicTangent,
    Linear,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Threshold => if x < 0.0 { 0.0 } else { 1.0 },
            ActivationFunction::SymmetricThreshold => if x < 0.0 { -1.0 } else { 1.0 },
            ActivationFunction::Logistic => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::HyperbolicTangent => x.tanh(),
            ActivationFunction::Linear => x,
        }
    }

    /// Element-wise derivative. The threshold variants are flat almost everywhere.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Threshold | ActivationFunction::SymmetricThreshold => 0.0,
            ActivationFunction::Logistic => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            },
            ActivationFunction::HyperbolicTangent => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Linear => 1.0,
        }
    }

    pub fn second_derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Threshold | ActivationFunction::SymmetricThreshold => 0.0,
            ActivationFunction::Logistic => {
                let fx = self.function(x);
                fx * (1.0 - fx) * (1.0 - 2.0 * fx)
            }
            ActivationFunction::HyperbolicTangent => {
                let t = x.tanh();
                -2.0 * t * (1.0 - t * t)
            }
            ActivationFunction::Linear => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ActivationFunction; 5] = [
        ActivationFunction::Threshold,
        ActivationFunction::SymmetricThreshold,
        ActivationFunction::Logistic,
        ActivationFunction::HyperbolicTangent,
        ActivationFunction::Linear,
    ];

    #[test]
    fn thresholds_are_piecewise_constant() {
        assert_eq!(ActivationFunction::Threshold.function(-0.1), 0.0);
        assert_eq!(ActivationFunction::Threshold.function(0.0), 1.0);
        assert_eq!(ActivationFunction::SymmetricThreshold.function(-3.0), -1.0);
        assert_eq!(ActivationFunction::SymmetricThreshold.function(2.0), 1.0);
    }

    #[test]
    fn derivatives_match_central_differences() {
        let h = 1e-5;
        for activation in ALL {
            for &x in &[-1.7, -0.3, 0.4, 2.2] {
                let d = (activation.function(x + h) - activation.function(x - h)) / (2.0 * h);
                assert!((d - activation.derivative(x)).abs() < 1e-6, "{activation:?} at {x}");

                let dd = (activation.derivative(x + h) - activation.derivative(x - h)) / (2.0 * h);
                assert!((dd - activation.second_derivative(x)).abs() < 1e-6, "{activation:?} at {x}");
            }
        }
    }

    #[test]
    fn logistic_is_centered_at_one_half() {
        assert_eq!(ActivationFunction::Logistic.function(0.0), 0.5);
        assert_eq!(ActivationFunction::Logistic.derivative(0.0), 0.25);
    }
}
