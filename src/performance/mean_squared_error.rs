use serde::{Serialize, Deserialize};

use crate::data::{DataSet, InstanceUse};
use crate::error::{Error, Result};
use crate::math::{vector, Matrix};
use crate::network::NeuralNetwork;
use crate::performance::back_propagation;
use crate::performance::performance_term::PerformanceTerm;

/// Sum squared error divided by `instances × outputs`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeanSquaredError;

impl MeanSquaredError {
    fn normalization(context: &'static str, instances_number: usize, network: &NeuralNetwork) -> Result<f64> {
        let count = instances_number * network.outputs_number();
        if count == 0 {
            return Err(Error::degenerate(context, "no instances to average over"));
        }
        Ok(count as f64)
    }
}

impl PerformanceTerm for MeanSquaredError {
    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }

    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Training);
        let normalization = Self::normalization("MeanSquaredError::calculate_performance", instances.len(), network)?;
        Ok(back_propagation::sum_squared_error(network, &instances)? / normalization)
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Generalization);
        if instances.len() < 2 {
            return Ok(0.0);
        }
        let normalization =
            Self::normalization("MeanSquaredError::calculate_generalization_performance", instances.len(), network)?;
        Ok(back_propagation::sum_squared_error(network, &instances)? / normalization)
    }

    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Training);
        let normalization = Self::normalization("MeanSquaredError::calculate_gradient", instances.len(), network)?;
        let gradient = back_propagation::sum_squared_error_gradient(network, &instances)?;
        Ok(vector::scale(&gradient, 1.0 / normalization))
    }

    fn calculate_terms(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Training);
        let normalization = Self::normalization("MeanSquaredError::calculate_terms", instances.len(), network)?;
        let terms = back_propagation::squared_error_terms(network, &instances)?;
        Ok(vector::scale(&terms, 1.0 / normalization.sqrt()))
    }

    fn calculate_terms_jacobian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Training);
        let normalization = Self::normalization("MeanSquaredError::calculate_terms_jacobian", instances.len(), network)?;
        let jacobian = back_propagation::squared_error_terms_jacobian(network, &instances)?;
        Ok(jacobian.scale(1.0 / normalization.sqrt()))
    }
}
