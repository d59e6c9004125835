use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Error, Result};
use crate::math::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionsMethod {
    NoConditions,
    /// `y(x_a) = y_a`.
    OneCondition,
    /// `y(x_a) = y_a` and `y(x_b) = y_b`.
    TwoConditions,
}

/// Enforces boundary or initial conditions on the network outputs.
///
/// With `x` the external input selected by `external_input_index` and `y`
/// the outputs of the upstream layers, the layer outputs
/// `particular(x) + homogeneous(x) · y`. The particular solution satisfies
/// the conditions and the homogeneous solution vanishes where they apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsLayer {
    pub external_inputs_number: usize,
    pub conditions_neurons_number: usize,
    pub conditions_method: ConditionsMethod,
    pub external_input_index: usize,
    /// `x_a`, followed by `x_b` for two conditions.
    pub external_input_values: Vec<f64>,
    /// One row per condition, one column per output.
    pub output_values: Matrix,
}

impl ConditionsLayer {
    pub fn new(external_inputs_number: usize, conditions_neurons_number: usize) -> ConditionsLayer {
        ConditionsLayer {
            external_inputs_number,
            conditions_neurons_number,
            conditions_method: ConditionsMethod::NoConditions,
            external_input_index: 0,
            external_input_values: Vec::new(),
            output_values: Matrix::default(),
        }
    }

    pub fn one_condition(
        external_inputs_number: usize,
        external_input_index: usize,
        x_a: f64,
        y_a: Vec<f64>,
    ) -> Result<ConditionsLayer> {
        let layer = ConditionsLayer {
            external_inputs_number,
            conditions_neurons_number: y_a.len(),
            conditions_method: ConditionsMethod::OneCondition,
            external_input_index,
            external_input_values: vec![x_a],
            output_values: Matrix::from_data(vec![y_a]),
        };
        layer.validate()?;
        Ok(layer)
    }

    pub fn two_conditions(
        external_inputs_number: usize,
        external_input_index: usize,
        (x_a, y_a): (f64, Vec<f64>),
        (x_b, y_b): (f64, Vec<f64>),
    ) -> Result<ConditionsLayer> {
        ensure_size("ConditionsLayer::two_conditions", y_a.len(), y_b.len())?;
        let layer = ConditionsLayer {
            external_inputs_number,
            conditions_neurons_number: y_a.len(),
            conditions_method: ConditionsMethod::TwoConditions,
            external_input_index,
            external_input_values: vec![x_a, x_b],
            output_values: Matrix::from_data(vec![y_a, y_b]),
        };
        layer.validate()?;
        Ok(layer)
    }

    pub fn inputs_number(&self) -> usize {
        self.external_inputs_number
    }

    pub fn outputs_number(&self) -> usize {
        self.conditions_neurons_number
    }

    /// Checks the external input index and that the condition values match
    /// the method and the number of outputs.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<()> {
        const CONTEXT: &str = "ConditionsLayer::validate";
        if self.external_input_index >= self.external_inputs_number {
            return Err(Error::InvalidConfig(format!(
                "external input index {} out of {} inputs",
                self.external_input_index, self.external_inputs_number
            )));
        }
        let conditions = match self.conditions_method {
            ConditionsMethod::NoConditions => return Ok(()),
            ConditionsMethod::OneCondition => 1,
            ConditionsMethod::TwoConditions => 2,
        };
        ensure_size(CONTEXT, conditions, self.external_input_values.len())?;
        ensure_size(CONTEXT, conditions, self.output_values.rows)?;
        ensure_size(CONTEXT, conditions, self.output_values.data.len())?;
        ensure_size(CONTEXT, self.conditions_neurons_number, self.output_values.cols)?;
        for row in &self.output_values.data {
            ensure_size(CONTEXT, self.conditions_neurons_number, row.len())?;
        }
        if conditions == 2 && !((self.external_input_values[1] - self.external_input_values[0]).abs() >= f64::EPSILON) {
            return Err(Error::InvalidConfig("both conditions apply at the same input value".into()));
        }
        Ok(())
    }

    fn check(&self, context: &'static str, inputs: &[f64], outputs: &[f64]) -> Result<()> {
        ensure_size(context, self.external_inputs_number, inputs.len())?;
        ensure_size(context, self.conditions_neurons_number, outputs.len())
    }

    fn external_input(&self, inputs: &[f64]) -> f64 {
        inputs[self.external_input_index]
    }

    pub fn calculate_particular_solution(&self, inputs: &[f64]) -> Vec<f64> {
        let n = self.conditions_neurons_number;
        match self.conditions_method {
            ConditionsMethod::NoConditions => vec![0.0; n],
            ConditionsMethod::OneCondition => self.output_values.row(0).to_vec(),
            ConditionsMethod::TwoConditions => {
                let (x_a, x_b) = (self.external_input_values[0], self.external_input_values[1]);
                let t = (self.external_input(inputs) - x_a) / (x_b - x_a);
                (0..n)
                    .map(|k| {
                        let (y_a, y_b) = (self.output_values[(0, k)], self.output_values[(1, k)]);
                        y_a + (y_b - y_a) * t
                    })
                    .collect()
            }
        }
    }

    pub fn calculate_homogeneous_solution(&self, inputs: &[f64]) -> Vec<f64> {
        let x = match self.conditions_method {
            ConditionsMethod::NoConditions => return vec![1.0; self.conditions_neurons_number],
            _ => self.external_input(inputs),
        };
        let value = match self.conditions_method {
            ConditionsMethod::OneCondition => x - self.external_input_values[0],
            _ => (x - self.external_input_values[0]) * (x - self.external_input_values[1]),
        };
        vec![value; self.conditions_neurons_number]
    }

    /// Derivative of the particular solution w.r.t. the external input.
    pub fn calculate_particular_solution_derivative(&self, _inputs: &[f64]) -> Vec<f64> {
        let n = self.conditions_neurons_number;
        match self.conditions_method {
            ConditionsMethod::NoConditions | ConditionsMethod::OneCondition => vec![0.0; n],
            ConditionsMethod::TwoConditions => {
                let (x_a, x_b) = (self.external_input_values[0], self.external_input_values[1]);
                (0..n)
                    .map(|k| (self.output_values[(1, k)] - self.output_values[(0, k)]) / (x_b - x_a))
                    .collect()
            }
        }
    }

    /// Derivative of the homogeneous solution w.r.t. the external input.
    pub fn calculate_homogeneous_solution_derivative(&self, inputs: &[f64]) -> Vec<f64> {
        let value = match self.conditions_method {
            ConditionsMethod::NoConditions => 0.0,
            ConditionsMethod::OneCondition => 1.0,
            ConditionsMethod::TwoConditions => {
                let x = self.external_input(inputs);
                2.0 * x - self.external_input_values[0] - self.external_input_values[1]
            }
        };
        vec![value; self.conditions_neurons_number]
    }

    fn homogeneous_solution_second_derivative(&self) -> f64 {
        match self.conditions_method {
            ConditionsMethod::TwoConditions => 2.0,
            _ => 0.0,
        }
    }

    /// `particular(inputs) + homogeneous(inputs) · outputs`.
    pub fn calculate_outputs(&self, inputs: &[f64], outputs: &[f64]) -> Result<Vec<f64>> {
        self.check("ConditionsLayer::calculate_outputs", inputs, outputs)?;
        let particular = self.calculate_particular_solution(inputs);
        let homogeneous = self.calculate_homogeneous_solution(inputs);
        Ok((0..outputs.len()).map(|k| particular[k] + homogeneous[k] * outputs[k]).collect())
    }

    /// ∂(layer outputs)/∂(upstream outputs), which is diagonal.
    pub fn calculate_outputs_derivative(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        ensure_size("ConditionsLayer::calculate_outputs_derivative", self.external_inputs_number, inputs.len())?;
        Ok(self.calculate_homogeneous_solution(inputs))
    }

    /// Jacobian w.r.t. the external inputs, given the upstream outputs and
    /// their Jacobian w.r.t. the same external inputs.
    pub fn calculate_jacobian(&self, inputs: &[f64], outputs: &[f64], upstream_jacobian: &Matrix) -> Result<Matrix> {
        self.check("ConditionsLayer::calculate_jacobian", inputs, outputs)?;
        ensure_size("ConditionsLayer::calculate_jacobian", self.conditions_neurons_number, upstream_jacobian.rows)?;
        ensure_size("ConditionsLayer::calculate_jacobian", self.external_inputs_number, upstream_jacobian.cols)?;

        let homogeneous = self.calculate_homogeneous_solution(inputs);
        let particular_derivative = self.calculate_particular_solution_derivative(inputs);
        let homogeneous_derivative = self.calculate_homogeneous_solution_derivative(inputs);

        let mut jacobian = upstream_jacobian.clone();
        for (k, row) in jacobian.data.iter_mut().enumerate() {
            row.iter_mut().for_each(|v| *v *= homogeneous[k]);
            row[self.external_input_index] += particular_derivative[k] + homogeneous_derivative[k] * outputs[k];
        }
        Ok(jacobian)
    }

    pub fn calculate_hessian_form(
        &self,
        inputs: &[f64],
        outputs: &[f64],
        upstream_jacobian: &Matrix,
        upstream_hessian: &[Matrix],
    ) -> Result<Vec<Matrix>> {
        self.check("ConditionsLayer::calculate_hessian_form", inputs, outputs)?;
        ensure_size("ConditionsLayer::calculate_hessian_form", self.conditions_neurons_number, upstream_hessian.len())?;

        let homogeneous = self.calculate_homogeneous_solution(inputs);
        let homogeneous_derivative = self.calculate_homogeneous_solution_derivative(inputs);
        let second = self.homogeneous_solution_second_derivative();
        let index = self.external_input_index;

        Ok((0..outputs.len())
            .map(|k| {
                let mut h = upstream_hessian[k].scale(homogeneous[k]);
                for j in 0..self.external_inputs_number {
                    let cross = homogeneous_derivative[k] * upstream_jacobian[(k, j)];
                    h[(index, j)] += cross;
                    h[(j, index)] += cross;
                }
                h[(index, index)] += second * outputs[k];
                h
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_condition_holds_at_its_input() {
        let layer = ConditionsLayer::one_condition(1, 0, 0.5, vec![2.0, -1.0]).unwrap();
        assert_eq!(layer.calculate_outputs(&[0.5], &[123.0, 7.0]).unwrap(), vec![2.0, -1.0]);
        assert_eq!(layer.calculate_outputs(&[1.5], &[3.0, 1.0]).unwrap(), vec![5.0, 0.0]);
    }

    #[test]
    fn two_conditions_hold_at_both_inputs() {
        let layer = ConditionsLayer::two_conditions(2, 1, (0.0, vec![1.0]), (2.0, vec![3.0])).unwrap();
        assert_eq!(layer.calculate_outputs(&[9.0, 0.0], &[42.0]).unwrap(), vec![1.0]);
        assert_eq!(layer.calculate_outputs(&[9.0, 2.0], &[42.0]).unwrap(), vec![3.0]);
    }

    #[test]
    fn coincident_conditions_are_rejected() {
        assert!(ConditionsLayer::two_conditions(1, 0, (1.0, vec![0.0]), (1.0, vec![1.0])).is_err());
        assert!(ConditionsLayer::one_condition(1, 3, 0.0, vec![0.0]).is_err());
    }

    #[test]
    fn deserialized_layer_with_broken_values_fails_validation() {
        let mut layer = ConditionsLayer::one_condition(2, 1, 0.0, vec![1.0, 2.0]).unwrap();
        layer.external_input_index = 2;
        assert!(matches!(layer.validate(), Err(Error::InvalidConfig(_))));

        let mut layer = ConditionsLayer::one_condition(2, 1, 0.0, vec![1.0, 2.0]).unwrap();
        layer.conditions_method = ConditionsMethod::TwoConditions;
        assert!(matches!(layer.validate(), Err(Error::SizeMismatch { .. })));

        let mut layer = ConditionsLayer::two_conditions(1, 0, (0.0, vec![1.0]), (1.0, vec![2.0])).unwrap();
        layer.external_input_values[1] = f64::NAN;
        assert!(matches!(layer.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn no_conditions_is_the_identity() {
        let layer = ConditionsLayer::new(2, 2);
        assert_eq!(layer.calculate_outputs(&[1.0, 2.0], &[3.0, 4.0]).unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn jacobian_matches_finite_differences_of_a_composed_map() {
        // Upstream map y(x) = (x0 · x1, sin x1), composed with two conditions on x1.
        let layer = ConditionsLayer::two_conditions(2, 1, (0.0, vec![1.0, 0.0]), (1.0, vec![0.5, 2.0])).unwrap();
        let upstream = |x: &[f64]| vec![x[0] * x[1], x[1].sin()];
        let upstream_jacobian = |x: &[f64]| Matrix::from_data(vec![vec![x[1], x[0]], vec![0.0, x[1].cos()]]);
        let upstream_hessian = |x: &[f64]| {
            vec![
                Matrix::from_data(vec![vec![0.0, 1.0], vec![1.0, 0.0]]),
                Matrix::from_data(vec![vec![0.0, 0.0], vec![0.0, -x[1].sin()]]),
            ]
        };
        let composed = |x: &[f64]| layer.calculate_outputs(x, &upstream(x)).unwrap();
        let composed_jacobian =
            |x: &[f64]| layer.calculate_jacobian(x, &upstream(x), &upstream_jacobian(x)).unwrap();

        let x = [0.7, 0.3];
        let jacobian = composed_jacobian(&x);
        let hessian = layer
            .calculate_hessian_form(&x, &upstream(&x), &upstream_jacobian(&x), &upstream_hessian(&x))
            .unwrap();
        let h = 1e-6;
        for j in 0..2 {
            let mut forward = x;
            let mut backward = x;
            forward[j] += h;
            backward[j] -= h;
            let (yf, yb) = (composed(&forward), composed(&backward));
            let (jf, jb) = (composed_jacobian(&forward), composed_jacobian(&backward));
            for k in 0..2 {
                assert!(((yf[k] - yb[k]) / (2.0 * h) - jacobian[(k, j)]).abs() < 1e-7);
                for i in 0..2 {
                    assert!(((jf[(k, i)] - jb[(k, i)]) / (2.0 * h) - hessian[k][(i, j)]).abs() < 1e-6);
                }
            }
        }
    }
}
