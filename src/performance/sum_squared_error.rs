use serde::{Serialize, Deserialize};

use crate::data::{DataSet, InstanceUse};
use crate::error::Result;
use crate::math::Matrix;
use crate::network::NeuralNetwork;
use crate::performance::back_propagation;
use crate::performance::performance_term::PerformanceTerm;

/// Σᵢ ‖outputs(xᵢ) - targetsᵢ‖² over the training instances.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SumSquaredError;

impl PerformanceTerm for SumSquaredError {
    fn name(&self) -> &'static str {
        "SumSquaredError"
    }

    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.check(network, data_set)?;
        back_propagation::sum_squared_error(network, &data_set.instances(InstanceUse::Training))
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.check(network, data_set)?;
        if data_set.count_generalization_instances_number() < 2 {
            return Ok(0.0);
        }
        back_propagation::sum_squared_error(network, &data_set.instances(InstanceUse::Generalization))
    }

    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        self.check(network, data_set)?;
        back_propagation::sum_squared_error_gradient(network, &data_set.instances(InstanceUse::Training))
    }

    fn calculate_terms(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        self.check(network, data_set)?;
        back_propagation::squared_error_terms(network, &data_set.instances(InstanceUse::Training))
    }

    fn calculate_terms_jacobian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        self.check(network, data_set)?;
        back_propagation::squared_error_terms_jacobian(network, &data_set.instances(InstanceUse::Training))
    }

    fn calculate_hessian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        self.check(network, data_set)?;
        back_propagation::sum_squared_error_hessian(network, &data_set.instances(InstanceUse::Training))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn line() -> (NeuralNetwork, DataSet) {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network.set_parameters(&[0.5, 2.0]).unwrap();
        let data_set = DataSet::from_inputs_targets(&[vec![0.0], vec![1.0]], &[vec![1.0], vec![1.0]]).unwrap();
        (network, data_set)
    }

    #[test]
    fn performance_sums_squared_errors() {
        let (network, data_set) = line();
        // Outputs 0.5 and 2.5 against targets 1 and 1.
        assert!((SumSquaredError.calculate_performance(&network, &data_set).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(SumSquaredError.calculate_terms(&network, &data_set).unwrap(), vec![0.5, 1.5]);
    }

    #[test]
    fn gradient_of_a_linear_model_is_closed_form() {
        let (network, data_set) = line();
        // d/db = 2Σe = 2(-0.5 + 1.5), d/dw = 2Σe·x = 2·1.5
        assert_eq!(SumSquaredError.calculate_gradient(&network, &data_set).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn hessian_of_a_linear_model_is_gauss_newton() {
        let (network, data_set) = line();
        let hessian = SumSquaredError.calculate_hessian(&network, &data_set).unwrap();
        assert_eq!(hessian, Matrix::from_data(vec![vec![4.0, 2.0], vec![2.0, 2.0]]));
    }

    #[test]
    fn performance_at_candidate_leaves_network_alone() {
        let (network, data_set) = line();
        let before = network.arrange_parameters();
        let value = SumSquaredError.calculate_performance_at(&network, &data_set, &[1.0, 0.0]).unwrap();
        assert_eq!(value, 0.0);
        assert_eq!(network.arrange_parameters(), before);
    }

    #[test]
    fn generalization_needs_two_instances() {
        let (network, mut data_set) = line();
        data_set.set_instances_use(vec![InstanceUse::Training, InstanceUse::Generalization]).unwrap();
        assert_eq!(SumSquaredError.calculate_generalization_performance(&network, &data_set).unwrap(), 0.0);
    }

    #[test]
    fn check_rejects_mismatched_data() {
        let network = NeuralNetwork::new(&[2, 1]).unwrap();
        let (_, data_set) = line();
        assert!(matches!(
            SumSquaredError.calculate_performance(&network, &data_set),
            Err(Error::SizeMismatch { context: "PerformanceTerm::check", .. })
        ));
        assert!(matches!(
            SumSquaredError.calculate_gradient(&NeuralNetwork::default(), &data_set),
            Err(Error::MissingComponent { .. })
        ));
    }
}
