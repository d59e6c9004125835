use serde::{Serialize, Deserialize};

use crate::data::DataSet;
use crate::error::Result;
use crate::math::{vector, Matrix};
use crate::network::NeuralNetwork;
use crate::performance::performance_term::PerformanceTerm;

/// `weight · ‖parameters‖`, a regularization term that does not look at the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuralParametersNorm {
    pub weight: f64,
}

impl Default for NeuralParametersNorm {
    fn default() -> Self {
        NeuralParametersNorm { weight: 1.0e-3 }
    }
}

impl NeuralParametersNorm {
    pub fn new(weight: f64) -> Self {
        NeuralParametersNorm { weight }
    }
}

impl PerformanceTerm for NeuralParametersNorm {
    fn name(&self) -> &'static str {
        "NeuralParametersNorm"
    }

    fn check(&self, _network: &NeuralNetwork, _data_set: &DataSet) -> Result<()> {
        Ok(())
    }

    fn calculate_performance(&self, network: &NeuralNetwork, _data_set: &DataSet) -> Result<f64> {
        Ok(self.weight * network.calculate_parameters_norm())
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.calculate_performance(network, data_set)
    }

    /// `weight · θ / ‖θ‖`, zero at the origin.
    fn calculate_gradient(&self, network: &NeuralNetwork, _data_set: &DataSet) -> Result<Vec<f64>> {
        let parameters = network.arrange_parameters();
        let norm = vector::norm(&parameters);
        if norm == 0.0 {
            return Ok(vec![0.0; parameters.len()]);
        }
        Ok(vector::scale(&parameters, self.weight / norm))
    }

    /// `weight · (I/‖θ‖ - θθᵀ/‖θ‖³)`, zero at the origin.
    fn calculate_hessian(&self, network: &NeuralNetwork, _data_set: &DataSet) -> Result<Matrix> {
        let parameters = network.arrange_parameters();
        let n = parameters.len();
        let norm = vector::norm(&parameters);
        if norm == 0.0 {
            return Ok(Matrix::zeros(n, n));
        }
        let mut hessian = Matrix::outer(&parameters, &parameters).scale(-self.weight / norm.powi(3));
        hessian.sum_diagonal(self.weight / norm);
        Ok(hessian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NeuralNetwork {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network.set_parameters(&[3.0, 4.0]).unwrap();
        network
    }

    #[test]
    fn weights_the_parameters_norm() {
        let data_set = DataSet::from_inputs_targets(&[vec![0.0]], &[vec![0.0]]).unwrap();
        let term = NeuralParametersNorm::new(0.5);
        assert_eq!(term.calculate_performance(&network(), &data_set).unwrap(), 2.5);
        let gradient = term.calculate_gradient(&network(), &data_set).unwrap();
        assert!((gradient[0] - 0.3).abs() < 1e-15 && (gradient[1] - 0.4).abs() < 1e-15);
    }

    #[test]
    fn hessian_is_orthogonal_to_the_parameters() {
        let data_set = DataSet::from_inputs_targets(&[vec![0.0]], &[vec![0.0]]).unwrap();
        let hessian = NeuralParametersNorm::new(1.0).calculate_hessian(&network(), &data_set).unwrap();
        let along = hessian.dot_vector(&[3.0, 4.0]);
        assert!(along.iter().all(|v| v.abs() < 1e-12));
        assert!(hessian.is_symmetric(1e-15));
    }
}
