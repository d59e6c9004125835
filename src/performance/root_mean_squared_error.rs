use serde::{Serialize, Deserialize};

use crate::data::DataSet;
use crate::error::Result;
use crate::math::vector;
use crate::network::NeuralNetwork;
use crate::performance::mean_squared_error::MeanSquaredError;
use crate::performance::performance_term::PerformanceTerm;

/// Square root of the mean squared error.
///
/// It is not a sum of squared residuals, so it exposes neither terms nor a
/// Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RootMeanSquaredError;

impl PerformanceTerm for RootMeanSquaredError {
    fn name(&self) -> &'static str {
        "RootMeanSquaredError"
    }

    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        Ok(MeanSquaredError.calculate_performance(network, data_set)?.sqrt())
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        Ok(MeanSquaredError.calculate_generalization_performance(network, data_set)?.sqrt())
    }

    /// `∇MSE / (2·√MSE)`, taken as zero at a perfect fit.
    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        let mean_squared_error = MeanSquaredError.calculate_performance(network, data_set)?;
        let gradient = MeanSquaredError.calculate_gradient(network, data_set)?;
        if mean_squared_error == 0.0 {
            return Ok(vec![0.0; gradient.len()]);
        }
        Ok(vector::scale(&gradient, 0.5 / mean_squared_error.sqrt()))
    }
}
