use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Error, Result};
use crate::layers::layer::{ElementWiseLayer, Layer};
use crate::math::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundingMethod {
    NoBounding,
    Bounding,
}

/// Clamps each output to `[lower_bounds[i], upper_bounds[i]]`.
///
/// The derivative is 1 strictly inside the bounds and 0 where the output is
/// clamped, so it jumps at the bounds themselves. Gradients through a
/// bounded output are therefore only one-sided there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingLayer {
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub bounding_method: BoundingMethod,
}

impl BoundingLayer {
    /// Layer with infinite bounds.
    pub fn new(size: usize) -> BoundingLayer {
        BoundingLayer {
            lower_bounds: vec![f64::MIN; size],
            upper_bounds: vec![f64::MAX; size],
            bounding_method: BoundingMethod::Bounding,
        }
    }

    pub fn from_bounds(lower_bounds: Vec<f64>, upper_bounds: Vec<f64>) -> Result<BoundingLayer> {
        let layer = BoundingLayer { lower_bounds, upper_bounds, bounding_method: BoundingMethod::Bounding };
        layer.validate()?;
        Ok(layer)
    }

    pub fn prune_output(&mut self, index: usize) -> Result<()> {
        if index >= self.lower_bounds.len() {
            return Err(Error::InvalidConfig(format!("cannot prune bounded variable {index}")));
        }
        self.lower_bounds.remove(index);
        self.upper_bounds.remove(index);
        Ok(())
    }

    fn is_clamped(&self, i: usize, x: f64) -> bool {
        self.bounding_method == BoundingMethod::Bounding
            && (x < self.lower_bounds[i] || x > self.upper_bounds[i])
    }
}

/// Checks that `lower` and `upper` have the same length and that every pair
/// satisfies `lower <= upper`, which also rejects NaN.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub(crate) fn check_bounds(context: &'static str, lower: &[f64], upper: &[f64]) -> Result<()> {
    ensure_size(context, lower.len(), upper.len())?;
    if let Some(i) = (0..lower.len()).find(|&i| !(lower[i] <= upper[i])) {
        return Err(Error::InvalidConfig(format!(
            "bounds [{}, {}] of variable {i} are not ordered",
            lower[i], upper[i]
        )));
    }
    Ok(())
}

impl Layer for BoundingLayer {
    const NAME: &'static str = "BoundingLayer";

    fn inputs_number(&self) -> usize {
        self.lower_bounds.len()
    }

    fn outputs_number(&self) -> usize {
        self.lower_bounds.len()
    }

    fn validate(&self) -> Result<()> {
        check_bounds("BoundingLayer::validate", &self.lower_bounds, &self.upper_bounds)
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(match self.bounding_method {
            BoundingMethod::NoBounding => inputs.to_vec(),
            BoundingMethod::Bounding => inputs
                .iter()
                .enumerate()
                .map(|(i, &x)| x.clamp(self.lower_bounds[i], self.upper_bounds[i]))
                .collect(),
        })
    }

    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.diagonal_jacobian(inputs)
    }

    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.diagonal_hessian_form(inputs)
    }
}

impl ElementWiseLayer for BoundingLayer {
    fn calculate_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(inputs
            .iter()
            .enumerate()
            .map(|(i, &x)| if self.is_clamped(i, x) { 0.0 } else { 1.0 })
            .collect())
    }

    fn calculate_second_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(vec![0.0; inputs.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> BoundingLayer {
        BoundingLayer::from_bounds(vec![-1.0, 0.0], vec![1.0, 10.0]).unwrap()
    }

    #[test]
    fn clamping_is_idempotent() {
        let l = layer();
        let once = l.calculate_outputs(&[3.0, -2.0]).unwrap();
        assert_eq!(once, vec![1.0, 0.0]);
        assert_eq!(l.calculate_outputs(&once).unwrap(), once);
    }

    #[test]
    fn derivative_is_one_inside_and_zero_outside() {
        let l = layer();
        assert_eq!(l.calculate_derivative(&[0.5, 5.0]).unwrap(), vec![1.0, 1.0]);
        assert_eq!(l.calculate_derivative(&[-1.5, 11.0]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(BoundingLayer::from_bounds(vec![1.0], vec![0.0]).is_err());
    }

    #[test]
    fn nan_bounds_are_rejected() {
        assert!(matches!(BoundingLayer::from_bounds(vec![f64::NAN], vec![1.0]), Err(Error::InvalidConfig(_))));
        assert!(matches!(BoundingLayer::from_bounds(vec![0.0], vec![f64::NAN]), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unpaired_bounds_are_rejected() {
        let l = BoundingLayer { lower_bounds: vec![0.0, 0.0], upper_bounds: vec![1.0], bounding_method: BoundingMethod::Bounding };
        assert!(matches!(l.validate(), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn no_bounding_passes_through() {
        let mut l = layer();
        l.bounding_method = BoundingMethod::NoBounding;
        assert_eq!(l.calculate_outputs(&[3.0, -2.0]).unwrap(), vec![3.0, -2.0]);
        assert_eq!(l.calculate_derivative(&[3.0, -2.0]).unwrap(), vec![1.0, 1.0]);
    }
}
