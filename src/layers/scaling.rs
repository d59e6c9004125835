use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::layers::layer::{ElementWiseLayer, Layer};
use crate::math::{Matrix, Statistics};

/// Ranges below this are treated as constant variables and passed through.
pub(crate) const MINIMUM_RANGE: f64 = 1e-99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMethod {
    NoScaling,
    /// Maps `[minimum, maximum]` onto `[-1, 1]`.
    MinimumMaximum,
    /// Maps to zero mean and unit standard deviation.
    MeanStandardDeviation,
}

/// Normalizes raw network inputs with per-variable statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingLayer {
    pub statistics: Vec<Statistics>,
    pub scaling_method: ScalingMethod,
}

impl ScalingLayer {
    /// Layer with default statistics, under which it is the identity.
    pub fn new(inputs_number: usize) -> ScalingLayer {
        ScalingLayer {
            statistics: vec![Statistics::default(); inputs_number],
            scaling_method: ScalingMethod::MinimumMaximum,
        }
    }

    pub fn from_statistics(statistics: Vec<Statistics>, scaling_method: ScalingMethod) -> ScalingLayer {
        ScalingLayer { statistics, scaling_method }
    }

    pub fn set_statistics(&mut self, statistics: Vec<Statistics>) -> Result<()> {
        if statistics.len() != self.statistics.len() {
            return Err(Error::size_mismatch("ScalingLayer::set_statistics", self.statistics.len(), statistics.len()));
        }
        self.statistics = statistics;
        Ok(())
    }

    pub fn prune_input(&mut self, index: usize) -> Result<()> {
        if index >= self.statistics.len() {
            return Err(Error::InvalidConfig(format!("cannot prune scaling variable {index}")));
        }
        self.statistics.remove(index);
        Ok(())
    }

    /// Slope of the affine map for variable `i`; 1 for constant variables.
    fn slope(&self, i: usize) -> f64 {
        let s = &self.statistics[i];
        match self.scaling_method {
            ScalingMethod::NoScaling => 1.0,
            ScalingMethod::MinimumMaximum => {
                if s.range() < MINIMUM_RANGE { 1.0 } else { 2.0 / s.range() }
            }
            ScalingMethod::MeanStandardDeviation => {
                if s.standard_deviation < MINIMUM_RANGE { 1.0 } else { 1.0 / s.standard_deviation }
            }
        }
    }

    fn scale(&self, i: usize, x: f64) -> f64 {
        let s = &self.statistics[i];
        match self.scaling_method {
            ScalingMethod::NoScaling => x,
            ScalingMethod::MinimumMaximum => {
                if s.range() < MINIMUM_RANGE {
                    debug!(variable = i, "range of scaling variable is zero, passing it through");
                    x
                } else {
                    2.0 * (x - s.minimum) / s.range() - 1.0
                }
            }
            ScalingMethod::MeanStandardDeviation => {
                if s.standard_deviation < MINIMUM_RANGE {
                    debug!(variable = i, "standard deviation of scaling variable is zero, passing it through");
                    x
                } else {
                    (x - s.mean) / s.standard_deviation
                }
            }
        }
    }
}

impl Layer for ScalingLayer {
    const NAME: &'static str = "ScalingLayer";

    fn inputs_number(&self) -> usize {
        self.statistics.len()
    }

    fn outputs_number(&self) -> usize {
        self.statistics.len()
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(inputs.iter().enumerate().map(|(i, &x)| self.scale(i, x)).collect())
    }

    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.diagonal_jacobian(inputs)
    }

    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.diagonal_hessian_form(inputs)
    }
}

impl ElementWiseLayer for ScalingLayer {
    fn calculate_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok((0..inputs.len()).map(|i| self.slope(i)).collect())
    }

    fn calculate_second_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(vec![0.0; inputs.len()])
    }
}
