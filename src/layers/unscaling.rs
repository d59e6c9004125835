use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::layer::{ElementWiseLayer, Layer};
use crate::layers::scaling::MINIMUM_RANGE;
use crate::math::{Matrix, Statistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnscalingMethod {
    NoUnscaling,
    /// Maps `[-1, 1]` back onto `[minimum, maximum]`.
    MinimumMaximum,
    /// Maps standardized values back to `mean + x · standard_deviation`.
    MeanStandardDeviation,
}

/// Inverse of the scaling layer, applied to the perceptron outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscalingLayer {
    pub statistics: Vec<Statistics>,
    pub unscaling_method: UnscalingMethod,
}

impl UnscalingLayer {
    pub fn new(outputs_number: usize) -> UnscalingLayer {
        UnscalingLayer {
            statistics: vec![Statistics::default(); outputs_number],
            unscaling_method: UnscalingMethod::MinimumMaximum,
        }
    }

    pub fn from_statistics(statistics: Vec<Statistics>, unscaling_method: UnscalingMethod) -> UnscalingLayer {
        UnscalingLayer { statistics, unscaling_method }
    }

    pub fn set_statistics(&mut self, statistics: Vec<Statistics>) -> Result<()> {
        if statistics.len() != self.statistics.len() {
            return Err(Error::size_mismatch("UnscalingLayer::set_statistics", self.statistics.len(), statistics.len()));
        }
        self.statistics = statistics;
        Ok(())
    }

    pub fn prune_output(&mut self, index: usize) -> Result<()> {
        if index >= self.statistics.len() {
            return Err(Error::InvalidConfig(format!("cannot prune unscaling variable {index}")));
        }
        self.statistics.remove(index);
        Ok(())
    }

    fn slope(&self, i: usize) -> f64 {
        let s = &self.statistics[i];
        match self.unscaling_method {
            UnscalingMethod::NoUnscaling => 1.0,
            UnscalingMethod::MinimumMaximum => {
                if s.range() < MINIMUM_RANGE { 1.0 } else { 0.5 * s.range() }
            }
            UnscalingMethod::MeanStandardDeviation => {
                if s.standard_deviation < MINIMUM_RANGE { 1.0 } else { s.standard_deviation }
            }
        }
    }

    fn unscale(&self, i: usize, x: f64) -> f64 {
        let s = &self.statistics[i];
        match self.unscaling_method {
            UnscalingMethod::NoUnscaling => x,
            UnscalingMethod::MinimumMaximum => {
                if s.range() < MINIMUM_RANGE { x } else { 0.5 * (x + 1.0) * s.range() + s.minimum }
            }
            UnscalingMethod::MeanStandardDeviation => {
                if s.standard_deviation < MINIMUM_RANGE { x } else { s.mean + x * s.standard_deviation }
            }
        }
    }
}

impl Layer for UnscalingLayer {
    const NAME: &'static str = "UnscalingLayer";

    fn inputs_number(&self) -> usize {
        self.statistics.len()
    }

    fn outputs_number(&self) -> usize {
        self.statistics.len()
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(inputs.iter().enumerate().map(|(i, &x)| self.unscale(i, x)).collect())
    }

    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.diagonal_jacobian(inputs)
    }

    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.diagonal_hessian_form(inputs)
    }
}

impl ElementWiseLayer for UnscalingLayer {
    fn calculate_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok((0..inputs.len()).map(|i| self.slope(i)).collect())
    }

    fn calculate_second_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(vec![0.0; inputs.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::scaling::{ScalingLayer, ScalingMethod};

    #[test]
    fn unscaling_inverts_scaling() {
        let statistics = vec![Statistics::new(-3.0, 5.0, 1.0, 2.5), Statistics::new(10.0, 20.0, 12.0, 0.5)];
        let pairs = [
            (ScalingMethod::MinimumMaximum, UnscalingMethod::MinimumMaximum),
            (ScalingMethod::MeanStandardDeviation, UnscalingMethod::MeanStandardDeviation),
        ];
        for (scaling_method, unscaling_method) in pairs {
            let scaling = ScalingLayer::from_statistics(statistics.clone(), scaling_method);
            let unscaling = UnscalingLayer::from_statistics(statistics.clone(), unscaling_method);
            let x = [0.7, 13.0];
            let round_trip = unscaling.calculate_outputs(&scaling.calculate_outputs(&x).unwrap()).unwrap();
            for (a, b) in round_trip.iter().zip(x) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn derivative_is_the_inverse_slope() {
        let layer = UnscalingLayer::from_statistics(
            vec![Statistics::new(0.0, 8.0, 0.0, 1.0)],
            UnscalingMethod::MinimumMaximum,
        );
        assert_eq!(layer.calculate_derivative(&[0.3]).unwrap(), vec![4.0]);
    }
}
