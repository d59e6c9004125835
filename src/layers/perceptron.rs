use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::{ensure_size, Error, Result};
use crate::layers::layer::Layer;
use crate::math::Matrix;

/// One layer of perceptrons: `outputs = f(b + W · inputs)`.
///
/// `synaptic_weights` has one row per perceptron and one column per input.
/// Parameters are arranged perceptron by perceptron, bias first:
/// `[b_0, w_00, w_01, …, b_1, w_10, …]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptronLayer {
    pub biases: Vec<f64>,
    pub synaptic_weights: Matrix,
    pub activation_function: ActivationFunction,
}

impl PerceptronLayer {
    /// Builds a layer with parameters drawn uniformly from [-1, 1].
    pub fn new(inputs_number: usize, perceptrons_number: usize, activation: ActivationFunction) -> PerceptronLayer {
        let synaptic_weights = Matrix::random(perceptrons_number, inputs_number);
        let biases = Matrix::random(1, perceptrons_number).data.pop().unwrap_or_default();

        PerceptronLayer {
            biases,
            synaptic_weights,
            activation_function: activation,
        }
    }

    pub fn from_parameters(biases: Vec<f64>, synaptic_weights: Matrix, activation: ActivationFunction) -> Result<PerceptronLayer> {
        ensure_size("PerceptronLayer::from_parameters", synaptic_weights.rows, biases.len())?;
        Ok(PerceptronLayer { biases, synaptic_weights, activation_function: activation })
    }

    pub fn perceptrons_number(&self) -> usize {
        self.biases.len()
    }

    pub fn calculate_combination(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(self
            .biases
            .iter()
            .zip(&self.synaptic_weights.data)
            .map(|(b, w)| b + w.iter().zip(inputs).map(|(w, x)| w * x).sum::<f64>())
            .collect())
    }

    /// Combination evaluated with a candidate parameter vector in this layer's layout.
    pub fn calculate_combination_at(&self, inputs: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        ensure_size("PerceptronLayer::calculate_combination_at", self.count_parameters_number(), parameters.len())?;

        let stride = self.inputs_number() + 1;
        Ok(parameters
            .chunks(stride)
            .map(|p| p[0] + p[1..].iter().zip(inputs).map(|(w, x)| w * x).sum::<f64>())
            .collect())
    }

    pub fn calculate_activation(&self, combination: &[f64]) -> Vec<f64> {
        combination.iter().map(|&c| self.activation_function.function(c)).collect()
    }

    pub fn calculate_activation_derivative(&self, combination: &[f64]) -> Vec<f64> {
        combination.iter().map(|&c| self.activation_function.derivative(c)).collect()
    }

    pub fn calculate_activation_second_derivative(&self, combination: &[f64]) -> Vec<f64> {
        combination.iter().map(|&c| self.activation_function.second_derivative(c)).collect()
    }

    pub fn calculate_outputs_at(&self, inputs: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        let combination = self.calculate_combination_at(inputs, parameters)?;
        Ok(self.calculate_activation(&combination))
    }

    /// ∂combination/∂parameters: perceptron `i` depends only on its own block.
    pub fn calculate_combination_parameters_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.check_inputs(inputs)?;

        let stride = self.inputs_number() + 1;
        let mut jacobian = Matrix::zeros(self.perceptrons_number(), self.count_parameters_number());
        for i in 0..self.perceptrons_number() {
            jacobian[(i, i * stride)] = 1.0;
            for (j, &x) in inputs.iter().enumerate() {
                jacobian[(i, i * stride + 1 + j)] = x;
            }
        }
        Ok(jacobian)
    }

    /// Accumulates `(∂combination/∂parameters)ᵀ · delta` into `gradient` without
    /// forming the block-sparse Jacobian.
    pub fn accumulate_parameters_gradient(&self, inputs: &[f64], delta: &[f64], gradient: &mut [f64]) {
        let stride = self.inputs_number() + 1;
        for (i, &d) in delta.iter().enumerate() {
            gradient[i * stride] += d;
            for (j, &x) in inputs.iter().enumerate() {
                gradient[i * stride + 1 + j] += d * x;
            }
        }
    }

    pub fn initialize_parameters(&mut self, value: f64) {
        self.biases.iter_mut().for_each(|b| *b = value);
        self.synaptic_weights = Matrix::filled(self.synaptic_weights.rows, self.synaptic_weights.cols, value);
    }

    pub fn initialize_random_uniform<R: Rng + ?Sized>(&mut self, minimum: f64, maximum: f64, rng: &mut R) {
        let n = self.perceptrons_number();
        self.biases = Matrix::random_uniform(1, n, minimum, maximum, rng).data.pop().unwrap_or_default();
        self.synaptic_weights = Matrix::random_uniform(n, self.inputs_number(), minimum, maximum, rng);
    }

    pub fn initialize_random_normal<R: Rng + ?Sized>(&mut self, mean: f64, standard_deviation: f64, rng: &mut R) {
        let n = self.perceptrons_number();
        self.biases = Matrix::random_normal(1, n, mean, standard_deviation, rng).data.pop().unwrap_or_default();
        self.synaptic_weights = Matrix::random_normal(n, self.inputs_number(), mean, standard_deviation, rng);
    }

    pub fn prune_input(&mut self, index: usize) -> Result<()> {
        if index >= self.inputs_number() {
            return Err(Error::InvalidConfig(format!(
                "cannot prune input {index} of a layer with {} inputs",
                self.inputs_number()
            )));
        }
        self.synaptic_weights.remove_column(index);
        Ok(())
    }

    pub fn prune_perceptron(&mut self, index: usize) -> Result<()> {
        if index >= self.perceptrons_number() {
            return Err(Error::InvalidConfig(format!(
                "cannot prune perceptron {index} of a layer with {} perceptrons",
                self.perceptrons_number()
            )));
        }
        self.biases.remove(index);
        self.synaptic_weights.remove_row(index);
        Ok(())
    }
}

impl Layer for PerceptronLayer {
    const NAME: &'static str = "PerceptronLayer";

    fn inputs_number(&self) -> usize {
        self.synaptic_weights.cols
    }

    fn outputs_number(&self) -> usize {
        self.perceptrons_number()
    }

    fn validate(&self) -> Result<()> {
        const CONTEXT: &str = "PerceptronLayer::validate";
        let weights = &self.synaptic_weights;
        ensure_size(CONTEXT, weights.rows, self.biases.len())?;
        ensure_size(CONTEXT, weights.rows, weights.data.len())?;
        for row in &weights.data {
            ensure_size(CONTEXT, weights.cols, row.len())?;
        }
        Ok(())
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        let combination = self.calculate_combination(inputs)?;
        Ok(self.calculate_activation(&combination))
    }

    /// `diag(f'(combination)) · W`.
    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        let combination = self.calculate_combination(inputs)?;
        let derivative = self.calculate_activation_derivative(&combination);

        let mut jacobian = self.synaptic_weights.clone();
        for (row, d) in jacobian.data.iter_mut().zip(derivative) {
            row.iter_mut().for_each(|w| *w *= d);
        }
        Ok(jacobian)
    }

    /// `f''(c_i) · w_i ⊗ w_i` per perceptron, since the combination is affine.
    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        let combination = self.calculate_combination(inputs)?;
        let second = self.calculate_activation_second_derivative(&combination);

        Ok(second
            .iter()
            .zip(&self.synaptic_weights.data)
            .map(|(&d, w)| Matrix::outer(w, w).scale(d))
            .collect())
    }

    fn count_parameters_number(&self) -> usize {
        self.perceptrons_number() * (self.inputs_number() + 1)
    }

    fn arrange_parameters(&self) -> Vec<f64> {
        let mut parameters = Vec::with_capacity(self.count_parameters_number());
        for (b, w) in self.biases.iter().zip(&self.synaptic_weights.data) {
            parameters.push(*b);
            parameters.extend_from_slice(w);
        }
        parameters
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        ensure_size("PerceptronLayer::set_parameters", self.count_parameters_number(), parameters.len())?;

        let stride = self.inputs_number() + 1;
        for (i, p) in parameters.chunks(stride).enumerate() {
            self.biases[i] = p[0];
            self.synaptic_weights.set_row(i, &p[1..]);
        }
        Ok(())
    }
}
