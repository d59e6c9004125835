use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::{ensure_size, Error, Result};
use crate::layers::layer::Layer;
use crate::layers::perceptron::PerceptronLayer;
use crate::math::{vector, Matrix};

/// A stack of perceptron layers applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultilayerPerceptron {
    pub layers: Vec<PerceptronLayer>,
}

/// Per-layer activations and activation derivatives cached by a forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstOrderForwardPropagation {
    pub layers_combination: Vec<Vec<f64>>,
    pub layers_activation: Vec<Vec<f64>>,
    pub layers_activation_derivative: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondOrderForwardPropagation {
    pub first_order: FirstOrderForwardPropagation,
    pub layers_activation_second_derivative: Vec<Vec<f64>>,
}

impl FirstOrderForwardPropagation {
    pub fn outputs(&self) -> &[f64] {
        self.layers_activation.last().map_or(&[], |a| a.as_slice())
    }

    /// Inputs seen by layer `i`: the network inputs for the first layer,
    /// otherwise the previous layer's activation.
    pub fn layer_inputs<'a>(&'a self, inputs: &'a [f64], i: usize) -> &'a [f64] {
        if i == 0 { inputs } else { &self.layers_activation[i - 1] }
    }
}

impl MultilayerPerceptron {
    /// Builds a stack from `[inputs, hidden…, outputs]` sizes. Hidden layers use
    /// the hyperbolic tangent and the output layer is linear.
    pub fn new(architecture: &[usize]) -> Result<MultilayerPerceptron> {
        if architecture.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "a multilayer perceptron needs at least two sizes, got {architecture:?}"
            )));
        }
        if architecture.iter().any(|&n| n == 0) {
            return Err(Error::InvalidConfig(format!("layer sizes must be positive, got {architecture:?}")));
        }

        let layers_number = architecture.len() - 1;
        let layers = architecture
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let activation = if i + 1 == layers_number {
                    ActivationFunction::Linear
                } else {
                    ActivationFunction::HyperbolicTangent
                };
                PerceptronLayer::new(w[0], w[1], activation)
            })
            .collect();

        Ok(MultilayerPerceptron { layers })
    }

    pub fn from_layers(layers: Vec<PerceptronLayer>) -> Result<MultilayerPerceptron> {
        let mlp = MultilayerPerceptron { layers };
        mlp.validate()?;
        Ok(mlp)
    }

    pub fn layers_number(&self) -> usize {
        self.layers.len()
    }

    pub fn architecture(&self) -> Vec<usize> {
        let mut architecture = vec![self.inputs_number()];
        architecture.extend(self.layers.iter().map(|l| l.perceptrons_number()));
        architecture
    }

    pub fn layers_activation_function(&self) -> Vec<ActivationFunction> {
        self.layers.iter().map(|l| l.activation_function).collect()
    }

    pub fn set_layers_activation_function(&mut self, activations: &[ActivationFunction]) -> Result<()> {
        ensure_size("MultilayerPerceptron::set_layers_activation_function", self.layers.len(), activations.len())?;
        for (layer, &activation) in self.layers.iter_mut().zip(activations) {
            layer.activation_function = activation;
        }
        Ok(())
    }

    pub fn layers_parameters_numbers(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.count_parameters_number()).collect()
    }

    /// Index of each layer's first parameter in the flat parameter vector.
    pub fn layers_parameters_offsets(&self) -> Vec<usize> {
        self.layers
            .iter()
            .scan(0, |offset, l| {
                let start = *offset;
                *offset += l.count_parameters_number();
                Some(start)
            })
            .collect()
    }

    pub fn calculate_outputs_at(&self, inputs: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        ensure_size("MultilayerPerceptron::calculate_outputs_at", self.count_parameters_number(), parameters.len())?;

        let mut outputs = inputs.to_vec();
        let mut start = 0;
        for layer in &self.layers {
            let end = start + layer.count_parameters_number();
            outputs = layer.calculate_outputs_at(&outputs, &parameters[start..end])?;
            start = end;
        }
        Ok(outputs)
    }

    pub fn first_order_forward_propagation(&self, inputs: &[f64]) -> Result<FirstOrderForwardPropagation> {
        self.check_inputs(inputs)?;

        let n = self.layers.len();
        let mut propagation = FirstOrderForwardPropagation {
            layers_combination: Vec::with_capacity(n),
            layers_activation: Vec::with_capacity(n),
            layers_activation_derivative: Vec::with_capacity(n),
        };

        for (i, layer) in self.layers.iter().enumerate() {
            let combination = layer.calculate_combination(propagation.layer_inputs(inputs, i))?;
            let activation = layer.calculate_activation(&combination);
            let derivative = layer.calculate_activation_derivative(&combination);
            propagation.layers_combination.push(combination);
            propagation.layers_activation.push(activation);
            propagation.layers_activation_derivative.push(derivative);
        }

        Ok(propagation)
    }

    pub fn second_order_forward_propagation(&self, inputs: &[f64]) -> Result<SecondOrderForwardPropagation> {
        let first_order = self.first_order_forward_propagation(inputs)?;
        let layers_activation_second_derivative = self
            .layers
            .iter()
            .zip(&first_order.layers_combination)
            .map(|(layer, c)| layer.calculate_activation_second_derivative(c))
            .collect();
        Ok(SecondOrderForwardPropagation { first_order, layers_activation_second_derivative })
    }

    /// `G[m][l] = ∂combination_m/∂combination_l` for every `m ≥ l`; entries
    /// with `m < l` are empty matrices.
    pub fn calculate_interlayers_combination_combination_jacobian(
        &self,
        propagation: &FirstOrderForwardPropagation,
    ) -> Vec<Vec<Matrix>> {
        let n = self.layers.len();
        let mut jacobian = vec![vec![Matrix::default(); n]; n];

        for l in 0..n {
            jacobian[l][l] = Matrix::identity(self.layers[l].perceptrons_number());
            for m in l + 1..n {
                // c_m = b + W_m · f(c_{m-1}), so G[m][l] = W_m · diag(f'_{m-1}) · G[m-1][l].
                let mut step = self.layers[m].synaptic_weights.clone();
                for row in &mut step.data {
                    for (w, d) in row.iter_mut().zip(&propagation.layers_activation_derivative[m - 1]) {
                        *w *= d;
                    }
                }
                jacobian[m][l] = &step * &jacobian[m - 1][l];
            }
        }

        jacobian
    }

    pub fn initialize_parameters(&mut self, value: f64) {
        self.layers.iter_mut().for_each(|l| l.initialize_parameters(value));
    }

    pub fn initialize_random_uniform<R: Rng + ?Sized>(&mut self, minimum: f64, maximum: f64, rng: &mut R) {
        self.layers.iter_mut().for_each(|l| l.initialize_random_uniform(minimum, maximum, rng));
    }

    pub fn initialize_random_normal<R: Rng + ?Sized>(&mut self, mean: f64, standard_deviation: f64, rng: &mut R) {
        self.layers.iter_mut().for_each(|l| l.initialize_random_normal(mean, standard_deviation, rng));
    }

    pub fn prune_input(&mut self, index: usize) -> Result<()> {
        if self.inputs_number() <= 1 {
            return Err(Error::InvalidConfig("cannot prune the last input".into()));
        }
        self.layers[0].prune_input(index)
    }

    pub fn prune_output(&mut self, index: usize) -> Result<()> {
        if self.outputs_number() <= 1 {
            return Err(Error::InvalidConfig("cannot prune the last output".into()));
        }
        let last = self.layers.len() - 1;
        self.layers[last].prune_perceptron(index)
    }
}

impl Layer for MultilayerPerceptron {
    const NAME: &'static str = "MultilayerPerceptron";

    fn inputs_number(&self) -> usize {
        self.layers.first().map_or(0, |l| l.inputs_number())
    }

    fn outputs_number(&self) -> usize {
        self.layers.last().map_or(0, |l| l.outputs_number())
    }

    fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig("a multilayer perceptron needs at least one layer".into()));
        }
        for layer in &self.layers {
            layer.validate()?;
        }
        for pair in self.layers.windows(2) {
            ensure_size("MultilayerPerceptron::validate", pair[0].outputs_number(), pair[1].inputs_number())?;
        }
        Ok(())
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;

        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            outputs = layer.calculate_outputs(&outputs)?;
        }
        Ok(outputs)
    }

    /// `J_L · … · J_1`, each evaluated at the inputs its layer sees.
    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.check_inputs(inputs)?;

        let mut jacobian = Matrix::identity(self.inputs_number());
        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            jacobian = &layer.calculate_jacobian(&outputs)? * &jacobian;
            outputs = layer.calculate_outputs(&outputs)?;
        }
        Ok(jacobian)
    }

    /// Second-order chain rule through the stack. For `y = g(h(x))`:
    /// `∇²y_k = J_hᵀ · ∇²g_k · J_h + Σ_j ∂g_k/∂h_j · ∇²h_j`.
    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.check_inputs(inputs)?;

        let n = self.inputs_number();
        let mut jacobian = Matrix::identity(n);
        let mut hessian: Vec<Matrix> = vec![Matrix::zeros(n, n); n];
        let mut outputs = inputs.to_vec();

        for layer in &self.layers {
            let layer_jacobian = layer.calculate_jacobian(&outputs)?;
            let layer_hessian = layer.calculate_hessian_form(&outputs)?;

            hessian = compose_hessian_form(&jacobian, &hessian, &layer_jacobian, &layer_hessian);
            jacobian = &layer_jacobian * &jacobian;
            outputs = layer.calculate_outputs(&outputs)?;
        }

        Ok(hessian)
    }

    fn count_parameters_number(&self) -> usize {
        self.layers.iter().map(|l| l.count_parameters_number()).sum()
    }

    fn arrange_parameters(&self) -> Vec<f64> {
        self.layers.iter().flat_map(|l| l.arrange_parameters()).collect()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        ensure_size("MultilayerPerceptron::set_parameters", self.count_parameters_number(), parameters.len())?;

        let mut start = 0;
        for layer in &mut self.layers {
            let end = start + layer.count_parameters_number();
            layer.set_parameters(&parameters[start..end])?;
            start = end;
        }
        Ok(())
    }
}

/// Hessian form of `g ∘ h` from `h`'s Jacobian/Hessian form and `g`'s,
/// the latter evaluated at `h`'s outputs.
pub(crate) fn compose_hessian_form(
    inner_jacobian: &Matrix,
    inner_hessian: &[Matrix],
    outer_jacobian: &Matrix,
    outer_hessian: &[Matrix],
) -> Vec<Matrix> {
    let inner_transpose = inner_jacobian.transpose();
    outer_hessian
        .iter()
        .enumerate()
        .map(|(k, h_k)| {
            let mut composed = &(&inner_transpose * h_k) * inner_jacobian;
            for (j, inner_h) in inner_hessian.iter().enumerate() {
                let weight = outer_jacobian[(k, j)];
                if weight != 0.0 {
                    composed.add_scaled(inner_h, weight);
                }
            }
            composed
        })
        .collect()
}

/// Parameters gradient of one instance from the back-propagated deltas.
pub(crate) fn calculate_point_gradient(
    mlp: &MultilayerPerceptron,
    inputs: &[f64],
    propagation: &FirstOrderForwardPropagation,
    layers_delta: &[Vec<f64>],
) -> Vec<f64> {
    let mut gradient = vec![0.0; mlp.count_parameters_number()];
    for ((i, layer), offset) in mlp.layers.iter().enumerate().zip(mlp.layers_parameters_offsets()) {
        let end = offset + layer.count_parameters_number();
        layer.accumulate_parameters_gradient(
            propagation.layer_inputs(inputs, i),
            &layers_delta[i],
            &mut gradient[offset..end],
        );
    }
    gradient
}

/// Back-propagates `output_gradient` (∂E/∂outputs of the last layer) into
/// per-layer deltas (∂E/∂combination):
/// `delta[l] = (W[l+1]ᵀ · delta[l+1]) ⊙ f'[l]`.
pub(crate) fn calculate_layers_delta(
    mlp: &MultilayerPerceptron,
    propagation: &FirstOrderForwardPropagation,
    output_gradient: &[f64],
) -> Vec<Vec<f64>> {
    let n = mlp.layers.len();
    let mut layers_delta = vec![Vec::new(); n];
    layers_delta[n - 1] = vector::hadamard(&propagation.layers_activation_derivative[n - 1], output_gradient);

    for l in (0..n - 1).rev() {
        let back = mlp.layers[l + 1].synaptic_weights.transpose_dot_vector(&layers_delta[l + 1]);
        layers_delta[l] = vector::hadamard(&propagation.layers_activation_derivative[l], &back);
    }

    layers_delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn mlp(seed: u64) -> MultilayerPerceptron {
        let mut mlp = MultilayerPerceptron::new(&[3, 4, 2]).unwrap();
        mlp.set_layers_activation_function(&[ActivationFunction::Logistic, ActivationFunction::HyperbolicTangent])
            .unwrap();
        mlp.initialize_random_uniform(-1.0, 1.0, &mut StdRng::seed_from_u64(seed));
        mlp
    }

    #[test]
    fn empty_or_disconnected_stacks_fail_validation() {
        assert!(mlp(1).validate().is_ok());
        assert!(matches!(MultilayerPerceptron { layers: Vec::new() }.validate(), Err(Error::InvalidConfig(_))));

        let mut broken = mlp(1);
        broken.layers[1] = PerceptronLayer::new(3, 2, ActivationFunction::Linear);
        assert!(matches!(broken.validate(), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn architecture_defaults_to_tanh_hidden_and_linear_output() {
        let mlp = MultilayerPerceptron::new(&[2, 5, 3, 1]).unwrap();
        assert_eq!(mlp.architecture(), vec![2, 5, 3, 1]);
        assert_eq!(
            mlp.layers_activation_function(),
            vec![
                ActivationFunction::HyperbolicTangent,
                ActivationFunction::HyperbolicTangent,
                ActivationFunction::Linear
            ]
        );
        assert_eq!(mlp.count_parameters_number(), 5 * 3 + 3 * 6 + 4);
        assert_eq!(mlp.layers_parameters_offsets(), vec![0, 15, 33]);
    }

    #[test]
    fn degenerate_architectures_are_rejected() {
        assert!(MultilayerPerceptron::new(&[3]).is_err());
        assert!(MultilayerPerceptron::new(&[3, 0, 1]).is_err());
    }

    #[test]
    fn outputs_at_parameters_match_after_setting_them() {
        let mut m = mlp(1);
        let x = [0.1, 0.2, -0.3];
        let p: Vec<f64> = (0..m.count_parameters_number()).map(|i| (i as f64 * 0.37).sin()).collect();
        let at_parameters = m.calculate_outputs_at(&x, &p).unwrap();
        m.set_parameters(&p).unwrap();
        assert_eq!(m.calculate_outputs(&x).unwrap(), at_parameters);
    }

    #[test]
    fn forward_propagation_caches_layer_outputs() {
        let m = mlp(2);
        let x = [0.5, -0.5, 0.25];
        let propagation = m.first_order_forward_propagation(&x).unwrap();
        assert_eq!(propagation.outputs(), m.calculate_outputs(&x).unwrap().as_slice());
        assert_eq!(propagation.layers_activation.len(), 2);
    }

    #[test]
    fn hessian_form_matches_jacobian_finite_differences() {
        let m = mlp(3);
        let x = [0.3, -0.1, 0.6];
        let hessian = m.calculate_hessian_form(&x).unwrap();
        let h = 1e-6;
        for j in 0..3 {
            let mut forward = x;
            let mut backward = x;
            forward[j] += h;
            backward[j] -= h;
            let jf = m.calculate_jacobian(&forward).unwrap();
            let jb = m.calculate_jacobian(&backward).unwrap();
            for k in 0..2 {
                for i in 0..3 {
                    let numerical = (jf[(k, i)] - jb[(k, i)]) / (2.0 * h);
                    assert!((numerical - hessian[k][(i, j)]).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn interlayers_jacobian_chains_layer_derivatives() {
        let m = mlp(4);
        let propagation = m.first_order_forward_propagation(&[0.1, 0.2, 0.3]).unwrap();
        let g = m.calculate_interlayers_combination_combination_jacobian(&propagation);
        assert_eq!((g[1][0].rows, g[1][0].cols), (2, 4));
        let expected = m.layers[1].synaptic_weights[(1, 2)] * propagation.layers_activation_derivative[0][2];
        assert!((g[1][0][(1, 2)] - expected).abs() < 1e-15);
        assert_eq!(g[0][0], Matrix::identity(4));
    }

    #[test]
    fn pruning_keeps_at_least_one_input_and_output() {
        let mut m = MultilayerPerceptron::new(&[2, 3, 2]).unwrap();
        m.prune_input(0).unwrap();
        m.prune_output(1).unwrap();
        assert_eq!(m.architecture(), vec![1, 3, 1]);
        assert!(m.prune_input(0).is_err());
        assert!(m.prune_output(0).is_err());
    }
}
