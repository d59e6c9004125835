use crate::error::{ensure_size, Result};
use crate::math::Matrix;

/// Capabilities shared by every self-contained layer of a network.
///
/// The conditions layer also reads the raw network inputs, so it exposes the
/// same operations with an extra argument instead of implementing this trait.
pub trait Layer {
    /// Name used in error contexts.
    const NAME: &'static str;

    fn inputs_number(&self) -> usize;

    fn outputs_number(&self) -> usize;

    /// Checks the invariants a deserialized layer may have broken.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>>;

    /// Dense matrix of ∂outputs/∂inputs.
    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix>;

    /// One matrix of second partial derivatives w.r.t. the inputs per output.
    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>>;

    fn count_parameters_number(&self) -> usize {
        0
    }

    fn arrange_parameters(&self) -> Vec<f64> {
        Vec::new()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        ensure_size("Layer::set_parameters", self.count_parameters_number(), parameters.len())
    }

    fn check_inputs(&self, inputs: &[f64]) -> Result<()> {
        ensure_size(Self::NAME, self.inputs_number(), inputs.len())
    }
}

/// Layers whose outputs depend on each input separately.
///
/// Their Jacobian is diagonal and their Hessian form is sparse, so both are
/// built from the element-wise derivatives.
pub trait ElementWiseLayer: Layer {
    fn calculate_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>>;

    fn calculate_second_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>>;

    fn diagonal_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        Ok(Matrix::diagonal(&self.calculate_derivative(inputs)?))
    }

    fn diagonal_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        let second = self.calculate_second_derivative(inputs)?;
        let n = second.len();
        Ok(second
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let mut h = Matrix::zeros(n, n);
                h[(i, i)] = d;
                h
            })
            .collect())
    }
}
