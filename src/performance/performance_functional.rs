use serde::{Serialize, Deserialize};

use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::math::{vector, Matrix};
use crate::network::NeuralNetwork;
use crate::performance::neural_parameters_norm::NeuralParametersNorm;
use crate::performance::performance_term::PerformanceTerm;
use crate::performance::term_type::PerformanceTermType;

/// An objective term plus an optional regularization term.
///
/// Generalization performance only measures the objective.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceFunctional {
    pub objective: PerformanceTermType,
    #[serde(default)]
    pub regularization: Option<NeuralParametersNorm>,
}

impl PerformanceFunctional {
    pub fn new(objective: PerformanceTermType) -> Self {
        PerformanceFunctional { objective, regularization: None }
    }

    pub fn with_regularization(mut self, regularization: NeuralParametersNorm) -> Self {
        self.regularization = Some(regularization);
        self
    }
}

impl PerformanceTerm for PerformanceFunctional {
    fn name(&self) -> &'static str {
        "PerformanceFunctional"
    }

    fn check(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<()> {
        self.objective.term().check(network, data_set)
    }

    fn calculate_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        let mut performance = self.objective.term().calculate_performance(network, data_set)?;
        if let Some(regularization) = &self.regularization {
            performance += regularization.calculate_performance(network, data_set)?;
        }
        Ok(performance)
    }

    fn calculate_generalization_performance(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<f64> {
        self.objective.term().calculate_generalization_performance(network, data_set)
    }

    fn calculate_gradient(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        let mut gradient = self.objective.term().calculate_gradient(network, data_set)?;
        if let Some(regularization) = &self.regularization {
            vector::axpy(&mut gradient, &regularization.calculate_gradient(network, data_set)?, 1.0);
        }
        Ok(gradient)
    }

    fn calculate_terms(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Vec<f64>> {
        if self.regularization.is_some() {
            return Err(Error::unsupported("PerformanceFunctional::calculate_terms", "terms with regularization"));
        }
        self.objective.term().calculate_terms(network, data_set)
    }

    fn calculate_terms_jacobian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        if self.regularization.is_some() {
            return Err(Error::unsupported(
                "PerformanceFunctional::calculate_terms_jacobian",
                "terms Jacobian with regularization",
            ));
        }
        self.objective.term().calculate_terms_jacobian(network, data_set)
    }

    fn calculate_hessian(&self, network: &NeuralNetwork, data_set: &DataSet) -> Result<Matrix> {
        let mut hessian = self.objective.term().calculate_hessian(network, data_set)?;
        if let Some(regularization) = &self.regularization {
            hessian.add_scaled(&regularization.calculate_hessian(network, data_set)?, 1.0);
        }
        Ok(hessian)
    }
}
