use std::fmt::Debug;

use crate::data::DataSet;
use crate::error::{ensure_size, Error, Result};
use crate::math::Matrix;
use crate::network::NeuralNetwork;

/// An objective over a network and a data set.
///
/// Terms hold only their own configuration; the network and the data set are
/// passed to every call, so a term can be reused across networks.
pub trait PerformanceTerm: Debug {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Fails unless the network has a perceptron stack whose arity matches
    /// the data set's inputs and targets.
    fn check(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<()> {
        if network.multilayer_perceptron().is_none() {
            return Err(Error::missing("PerformanceTerm::check", "multilayer perceptron"));
        }
        ensure_size("PerformanceTerm::check", network.inputs_number(), data_set.count_inputs_number())?;
        ensure_size("PerformanceTerm::check", network.outputs_number(), data_set.count_targets_number())
    }

    /// Value over the training instances.
    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64>;

    /// Value at a candidate parameter vector. The live network is not modified.
    fn calculate_performance_at(&self, network: &NeuralNetwork, data_set: &DataSet, parameters: &[f64]) -> Result<f64> {
        let mut candidate = network.clone();
        candidate.set_parameters(parameters)?;
        self.calculate_performance(&candidate, data_set)
    }

    /// Value over the generalization instances; zero with fewer than two of them.
    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64>;

    /// Gradient w.r.t. the flat parameter vector.
    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>>;

    /// Per-instance residuals whose squared sum is the performance.
    fn calculate_terms(&self, _network: &NeuralNetwork, _data_set: &DataSet) -> Result<Vec<f64>> {
        Err(Error::unsupported("PerformanceTerm::calculate_terms", format!("terms of {}", self.name())))
    }

    /// ∂terms/∂parameters, one row per training instance.
    fn calculate_terms_jacobian(&self, _network: &NeuralNetwork, _data_set: &DataSet) -> Result<Matrix> {
        Err(Error::unsupported("PerformanceTerm::calculate_terms_jacobian", format!("terms Jacobian of {}", self.name())))
    }

    fn calculate_hessian(&self, _network: &NeuralNetwork, _data_set: &DataSet) -> Result<Matrix> {
        Err(Error::unsupported("PerformanceTerm::calculate_hessian", format!("Hessian of {}", self.name())))
    }
}
