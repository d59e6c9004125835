use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Result};
use crate::layers::multilayer_perceptron::compose_hessian_form;
use crate::layers::{
    BoundingLayer, ConditionsLayer, Layer, MultilayerPerceptron, ProbabilisticLayer, ScalingLayer, UnscalingLayer,
};
use crate::math::Matrix;

/// Layer kinds in the order a network applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Scaling,
    MultilayerPerceptron,
    Conditions,
    Unscaling,
    Probabilistic,
    Bounding,
}

/// One stage of a network's layer chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NetworkLayer {
    Scaling(ScalingLayer),
    MultilayerPerceptron(MultilayerPerceptron),
    Conditions(ConditionsLayer),
    Unscaling(UnscalingLayer),
    Probabilistic(ProbabilisticLayer),
    Bounding(BoundingLayer),
}

/// Runs `$body` with `$layer` bound to any self-contained layer, and
/// `$conditions_body` for the conditions layer.
macro_rules! dispatch {
    ($self:expr, $layer:ident => $body:expr, $conditions:ident => $conditions_body:expr) => {
        match $self {
            NetworkLayer::Scaling($layer) => $body,
            NetworkLayer::MultilayerPerceptron($layer) => $body,
            NetworkLayer::Unscaling($layer) => $body,
            NetworkLayer::Probabilistic($layer) => $body,
            NetworkLayer::Bounding($layer) => $body,
            NetworkLayer::Conditions($conditions) => $conditions_body,
        }
    };
}

impl NetworkLayer {
    pub fn kind(&self) -> LayerKind {
        match self {
            NetworkLayer::Scaling(_) => LayerKind::Scaling,
            NetworkLayer::MultilayerPerceptron(_) => LayerKind::MultilayerPerceptron,
            NetworkLayer::Conditions(_) => LayerKind::Conditions,
            NetworkLayer::Unscaling(_) => LayerKind::Unscaling,
            NetworkLayer::Probabilistic(_) => LayerKind::Probabilistic,
            NetworkLayer::Bounding(_) => LayerKind::Bounding,
        }
    }

    /// For the conditions layer this is the number of external inputs.
    pub fn inputs_number(&self) -> usize {
        dispatch!(self, l => l.inputs_number(), c => c.inputs_number())
    }

    pub fn outputs_number(&self) -> usize {
        dispatch!(self, l => l.outputs_number(), c => c.outputs_number())
    }

    pub fn validate(&self) -> Result<()> {
        dispatch!(self, l => l.validate(), c => c.validate())
    }

    pub fn count_parameters_number(&self) -> usize {
        dispatch!(self, l => l.count_parameters_number(), _c => 0)
    }

    pub fn arrange_parameters(&self) -> Vec<f64> {
        dispatch!(self, l => l.arrange_parameters(), _c => Vec::new())
    }

    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        dispatch!(
            self,
            l => l.set_parameters(parameters),
            _c => ensure_size("ConditionsLayer::set_parameters", 0, parameters.len())
        )
    }

    /// Outputs of this stage from the network `inputs` and the outputs of the
    /// previous stage (`upstream`).
    pub fn calculate_outputs(&self, inputs: &[f64], upstream: &[f64]) -> Result<Vec<f64>> {
        dispatch!(self, l => l.calculate_outputs(upstream), c => c.calculate_outputs(inputs, upstream))
    }

    /// Same as [`calculate_outputs`](Self::calculate_outputs) with a candidate
    /// parameter vector for this stage.
    pub fn calculate_outputs_at(&self, inputs: &[f64], upstream: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        match self {
            NetworkLayer::MultilayerPerceptron(mlp) => mlp.calculate_outputs_at(upstream, parameters),
            other => {
                ensure_size("NetworkLayer::calculate_outputs_at", 0, parameters.len())?;
                other.calculate_outputs(inputs, upstream)
            }
        }
    }

    /// Jacobian of this stage's outputs w.r.t. the network inputs, given the
    /// previous stage's outputs and their Jacobian w.r.t. the network inputs.
    pub fn compose_jacobian(&self, inputs: &[f64], upstream: &[f64], upstream_jacobian: &Matrix) -> Result<Matrix> {
        dispatch!(
            self,
            l => Ok(&l.calculate_jacobian(upstream)? * upstream_jacobian),
            c => c.calculate_jacobian(inputs, upstream, upstream_jacobian)
        )
    }

    pub fn compose_hessian_form(
        &self,
        inputs: &[f64],
        upstream: &[f64],
        upstream_jacobian: &Matrix,
        upstream_hessian: &[Matrix],
    ) -> Result<Vec<Matrix>> {
        dispatch!(
            self,
            l => Ok(compose_hessian_form(
                upstream_jacobian,
                upstream_hessian,
                &l.calculate_jacobian(upstream)?,
                &l.calculate_hessian_form(upstream)?,
            )),
            c => c.calculate_hessian_form(inputs, upstream, upstream_jacobian, upstream_hessian)
        )
    }

    /// Jacobian w.r.t. the previous stage's outputs only.
    pub fn calculate_upstream_jacobian(&self, inputs: &[f64], upstream: &[f64]) -> Result<Matrix> {
        dispatch!(
            self,
            l => l.calculate_jacobian(upstream),
            c => Ok(Matrix::diagonal(&c.calculate_outputs_derivative(inputs)?))
        )
    }
}
