use serde::{Serialize, Deserialize};

use crate::data::{DataSet, InstanceUse};
use crate::error::{Error, Result};
use crate::math::{vector, Matrix};
use crate::network::NeuralNetwork;
use crate::performance::back_propagation::{self, Instance};
use crate::performance::performance_term::PerformanceTerm;

const MINIMUM_NORMALIZATION_COEFFICIENT: f64 = 1e-99;

/// Sum squared error divided by the spread of the targets around their mean,
/// `Σᵢ ‖targetsᵢ - mean(targets)‖²`.
///
/// A model that always predicts the target mean scores 1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedSquaredError;

impl NormalizedSquaredError {
    /// Normalization coefficient of `instances`, which fails when the targets
    /// are constant.
    pub fn calculate_normalization_coefficient(instances: &[(Vec<f64>, Vec<f64>)]) -> Result<f64> {
        const CONTEXT: &str = "NormalizedSquaredError::calculate_normalization_coefficient";

        let targets_number = instances.first().map_or(0, |(_, t)| t.len());
        let mut mean = vec![0.0; targets_number];
        for (_, targets) in instances {
            vector::axpy(&mut mean, targets, 1.0);
        }
        if !instances.is_empty() {
            mean = vector::scale(&mean, 1.0 / instances.len() as f64);
        }

        let coefficient: f64 = instances
            .iter()
            .map(|(_, targets)| vector::sum_squared(&vector::subtract(targets, &mean)))
            .sum();
        if coefficient < MINIMUM_NORMALIZATION_COEFFICIENT {
            return Err(Error::degenerate(CONTEXT, "normalization coefficient is zero"));
        }
        Ok(coefficient)
    }

    fn training(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<(Vec<Instance>, f64)> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Training);
        let coefficient = Self::calculate_normalization_coefficient(&instances)?;
        Ok((instances, coefficient))
    }
}

impl PerformanceTerm for NormalizedSquaredError {
    fn name(&self) -> &'static str {
        "NormalizedSquaredError"
    }

    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        let (instances, coefficient) = self.training(network, data_set)?;
        Ok(back_propagation::sum_squared_error(network, &instances)? / coefficient)
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.check(network, data_set)?;
        let instances = data_set.instances(InstanceUse::Generalization);
        if instances.len() < 2 {
            return Ok(0.0);
        }
        let coefficient = Self::calculate_normalization_coefficient(&instances)?;
        Ok(back_propagation::sum_squared_error(network, &instances)? / coefficient)
    }

    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        let (instances, coefficient) = self.training(network, data_set)?;
        let gradient = back_propagation::sum_squared_error_gradient(network, &instances)?;
        Ok(vector::scale(&gradient, 1.0 / coefficient))
    }

    fn calculate_terms(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        let (instances, coefficient) = self.training(network, data_set)?;
        let terms = back_propagation::squared_error_terms(network, &instances)?;
        Ok(vector::scale(&terms, 1.0 / coefficient.sqrt()))
    }

    fn calculate_terms_jacobian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        let (instances, coefficient) = self.training(network, data_set)?;
        let jacobian = back_propagation::squared_error_terms_jacobian(network, &instances)?;
        Ok(jacobian.scale(1.0 / coefficient.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fit_scores_zero() {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network.set_parameters(&[0.0, 1.0]).unwrap();
        let data_set = DataSet::from_inputs_targets(&[vec![-1.0], vec![1.0]], &[vec![-1.0], vec![1.0]]).unwrap();
        assert_eq!(NormalizedSquaredError.calculate_performance(&network, &data_set).unwrap(), 0.0);
    }

    #[test]
    fn predicting_the_mean_scores_one() {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network.set_parameters(&[2.0, 0.0]).unwrap();
        let data_set =
            DataSet::from_inputs_targets(&[vec![0.0], vec![1.0], vec![2.0]], &[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        assert!((NormalizedSquaredError.calculate_performance(&network, &data_set).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_targets_are_degenerate() {
        let network = NeuralNetwork::new(&[1, 1]).unwrap();
        let data_set = DataSet::from_inputs_targets(&[vec![0.0], vec![1.0]], &[vec![3.0], vec![3.0]]).unwrap();
        assert!(matches!(
            NormalizedSquaredError.calculate_gradient(&network, &data_set),
            Err(Error::Degenerate { .. })
        ));
    }
}
