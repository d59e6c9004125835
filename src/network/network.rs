use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Error, Result};
use crate::layers::{
    ConditionsMethod, ElementWiseLayer, FirstOrderForwardPropagation, Layer, MultilayerPerceptron, ProbabilisticMethod,
};
use crate::math::{vector, Matrix};
use crate::network::independent_parameters::IndependentParameters;
use crate::network::network_layer::{LayerKind, NetworkLayer};
use crate::network::variables::Variables;

/// A feed-forward network: an ordered chain holding at most one layer of each
/// [`LayerKind`], plus an optional block of independent parameters.
///
/// The flat parameter vector is the concatenation of every layer's parameters
/// in chain order, followed by the scaled independent parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NeuralNetwork {
    layers: Vec<NetworkLayer>,
    #[serde(default)]
    independent_parameters: Option<IndependentParameters>,
    #[serde(default)]
    pub inputs: Variables,
    #[serde(default)]
    pub outputs: Variables,
}

/// Everything a back-propagation pass needs from one forward pass.
#[derive(Debug, Clone)]
pub struct NetworkForwardPropagation {
    /// Inputs of the perceptron stack, after any scaling.
    pub perceptron_inputs: Vec<f64>,
    pub perceptron: FirstOrderForwardPropagation,
    pub outputs: Vec<f64>,
    /// ∂outputs/∂(perceptron stack outputs) through the layers after the stack.
    pub outputs_jacobian: Matrix,
}

impl NeuralNetwork {
    /// Network made of a single perceptron stack with the given architecture.
    pub fn new(architecture: &[usize]) -> Result<NeuralNetwork> {
        let mlp = MultilayerPerceptron::new(architecture)?;
        NeuralNetwork::from_layers(vec![NetworkLayer::MultilayerPerceptron(mlp)])
    }

    /// Builds a network from layers in any order; they are sorted into chain order.
    pub fn from_layers(layers: Vec<NetworkLayer>) -> Result<NeuralNetwork> {
        let mut network = NeuralNetwork::default();
        for layer in layers {
            network.insert_layer(layer)?;
        }
        Ok(network)
    }

    pub fn layers(&self) -> &[NetworkLayer] {
        &self.layers
    }

    pub fn has_layer(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|l| l.kind() == kind)
    }

    pub fn layer(&self, kind: LayerKind) -> Option<&NetworkLayer> {
        self.layers.iter().find(|l| l.kind() == kind)
    }

    /// Mutable access for adjusting parameters or statistics. Changes that
    /// alter a layer's arity must go through [`insert_layer`](Self::insert_layer).
    pub fn layer_mut(&mut self, kind: LayerKind) -> Option<&mut NetworkLayer> {
        self.layers.iter_mut().find(|l| l.kind() == kind)
    }

    /// Inserts `layer` at its position in the chain, replacing any layer of the
    /// same kind. Fails without modifying the network if the chain's arity
    /// would become inconsistent.
    pub fn insert_layer(&mut self, layer: NetworkLayer) -> Result<()> {
        let mut layers = self.layers.clone();
        let kind = layer.kind();
        match layers.iter().position(|l| l.kind() >= kind) {
            Some(i) if layers[i].kind() == kind => layers[i] = layer,
            Some(i) => layers.insert(i, layer),
            None => layers.push(layer),
        }
        check_architecture(&layers)?;

        self.layers = layers;
        self.sync_variables();
        Ok(())
    }

    pub fn remove_layer(&mut self, kind: LayerKind) -> Result<Option<NetworkLayer>> {
        let Some(i) = self.layers.iter().position(|l| l.kind() == kind) else {
            return Ok(None);
        };
        let mut layers = self.layers.clone();
        let removed = layers.remove(i);
        check_architecture(&layers)?;

        self.layers = layers;
        self.sync_variables();
        Ok(Some(removed))
    }

    pub fn multilayer_perceptron(&self) -> Option<&MultilayerPerceptron> {
        self.layers.iter().find_map(|l| match l {
            NetworkLayer::MultilayerPerceptron(mlp) => Some(mlp),
            _ => None,
        })
    }

    pub fn multilayer_perceptron_mut(&mut self) -> Option<&mut MultilayerPerceptron> {
        self.layers.iter_mut().find_map(|l| match l {
            NetworkLayer::MultilayerPerceptron(mlp) => Some(mlp),
            _ => None,
        })
    }

    pub fn independent_parameters(&self) -> Option<&IndependentParameters> {
        self.independent_parameters.as_ref()
    }

    pub fn independent_parameters_mut(&mut self) -> Option<&mut IndependentParameters> {
        self.independent_parameters.as_mut()
    }

    pub fn set_independent_parameters(&mut self, independent_parameters: Option<IndependentParameters>) -> Result<()> {
        if let Some(independent) = &independent_parameters {
            independent.validate()?;
        }
        self.independent_parameters = independent_parameters;
        Ok(())
    }

    /// Input count of the first layer in chain order.
    pub fn inputs_number(&self) -> usize {
        self.layers.first().map_or(0, |l| l.inputs_number())
    }

    pub fn outputs_number(&self) -> usize {
        self.layers.last().map_or(0, |l| l.outputs_number())
    }

    pub fn count_layers_parameters_number(&self) -> usize {
        self.layers.iter().map(|l| l.count_parameters_number()).sum()
    }

    pub fn count_independent_parameters_number(&self) -> usize {
        self.independent_parameters.as_ref().map_or(0, |p| p.count_parameters_number())
    }

    pub fn count_parameters_number(&self) -> usize {
        self.count_layers_parameters_number() + self.count_independent_parameters_number()
    }

    pub fn arrange_parameters(&self) -> Vec<f64> {
        let mut parameters: Vec<f64> = self.layers.iter().flat_map(|l| l.arrange_parameters()).collect();
        if let Some(independent) = &self.independent_parameters {
            parameters.extend(independent.calculate_scaled_parameters());
        }
        parameters
    }

    pub fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        ensure_size("NeuralNetwork::set_parameters", self.count_parameters_number(), parameters.len())?;

        let mut start = 0;
        for layer in &mut self.layers {
            let end = start + layer.count_parameters_number();
            layer.set_parameters(&parameters[start..end])?;
            start = end;
        }
        if let Some(independent) = &mut self.independent_parameters {
            independent.set_scaled_parameters(&parameters[start..])?;
        }
        Ok(())
    }

    pub fn calculate_parameters_norm(&self) -> f64 {
        vector::norm(&self.arrange_parameters())
    }

    pub fn initialize_parameters(&mut self, value: f64) -> Result<()> {
        let parameters = vec![value; self.count_parameters_number()];
        self.set_parameters(&parameters)
    }

    pub fn initialize_random_uniform(&mut self, minimum: f64, maximum: f64) -> Result<()> {
        self.initialize_random_uniform_with(minimum, maximum, &mut rand::thread_rng())
    }

    pub fn initialize_random_uniform_with<R: Rng + ?Sized>(&mut self, minimum: f64, maximum: f64, rng: &mut R) -> Result<()> {
        let parameters = Matrix::random_uniform(1, self.count_parameters_number(), minimum, maximum, rng);
        self.set_parameters(&parameters.data.concat())
    }

    pub fn initialize_random_normal_with<R: Rng + ?Sized>(&mut self, mean: f64, standard_deviation: f64, rng: &mut R) -> Result<()> {
        let parameters = Matrix::random_normal(1, self.count_parameters_number(), mean, standard_deviation, rng);
        self.set_parameters(&parameters.data.concat())
    }

    /// Adds independent uniform noise in `[-perturbation, perturbation]` to every parameter.
    pub fn perturbate_parameters_with<R: Rng + ?Sized>(&mut self, perturbation: f64, rng: &mut R) -> Result<()> {
        let noise = Matrix::random_uniform(1, self.count_parameters_number(), -perturbation, perturbation, rng);
        let parameters = vector::add(&self.arrange_parameters(), &noise.data.concat());
        self.set_parameters(&parameters)
    }

    fn check_inputs(&self, context: &'static str, inputs: &[f64]) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::missing(context, "layer chain"));
        }
        ensure_size(context, self.inputs_number(), inputs.len())
    }

    /// Applies every present layer in chain order.
    pub fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs("NeuralNetwork::calculate_outputs", inputs)?;

        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            outputs = layer.calculate_outputs(inputs, &outputs)?;
        }
        Ok(outputs)
    }

    /// Outputs for a candidate parameter vector, leaving the network untouched.
    pub fn calculate_outputs_at(&self, inputs: &[f64], parameters: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs("NeuralNetwork::calculate_outputs_at", inputs)?;
        ensure_size("NeuralNetwork::calculate_outputs_at", self.count_parameters_number(), parameters.len())?;

        let mut outputs = inputs.to_vec();
        let mut start = 0;
        for layer in &self.layers {
            let end = start + layer.count_parameters_number();
            outputs = layer.calculate_outputs_at(inputs, &outputs, &parameters[start..end])?;
            start = end;
        }
        Ok(outputs)
    }

    /// ∂outputs/∂inputs, composed layer by layer with the chain rule.
    pub fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.check_inputs("NeuralNetwork::calculate_jacobian", inputs)?;

        let mut jacobian = Matrix::identity(inputs.len());
        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            jacobian = layer.compose_jacobian(inputs, &outputs, &jacobian)?;
            outputs = layer.calculate_outputs(inputs, &outputs)?;
        }
        Ok(jacobian)
    }

    /// One matrix of second derivatives w.r.t. the inputs per output.
    pub fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.check_inputs("NeuralNetwork::calculate_hessian_form", inputs)?;

        let n = inputs.len();
        let mut jacobian = Matrix::identity(n);
        let mut hessian = vec![Matrix::zeros(n, n); n];
        let mut outputs = inputs.to_vec();
        for layer in &self.layers {
            hessian = layer.compose_hessian_form(inputs, &outputs, &jacobian, &hessian)?;
            jacobian = layer.compose_jacobian(inputs, &outputs, &jacobian)?;
            outputs = layer.calculate_outputs(inputs, &outputs)?;
        }
        Ok(hessian)
    }

    /// Forward pass caching what back-propagation through the perceptron
    /// stack needs.
    pub fn first_order_forward_propagation(&self, inputs: &[f64]) -> Result<NetworkForwardPropagation> {
        const CONTEXT: &str = "NeuralNetwork::first_order_forward_propagation";
        self.check_inputs(CONTEXT, inputs)?;

        let position = self
            .layers
            .iter()
            .position(|l| l.kind() == LayerKind::MultilayerPerceptron)
            .ok_or_else(|| Error::missing(CONTEXT, "multilayer perceptron"))?;

        let mut perceptron_inputs = inputs.to_vec();
        for layer in &self.layers[..position] {
            perceptron_inputs = layer.calculate_outputs(inputs, &perceptron_inputs)?;
        }

        let NetworkLayer::MultilayerPerceptron(mlp) = &self.layers[position] else {
            return Err(Error::missing(CONTEXT, "multilayer perceptron"));
        };
        let perceptron = mlp.first_order_forward_propagation(&perceptron_inputs)?;

        let mut outputs = perceptron.outputs().to_vec();
        let mut outputs_jacobian = Matrix::identity(outputs.len());
        for layer in &self.layers[position + 1..] {
            outputs_jacobian = &layer.calculate_upstream_jacobian(inputs, &outputs)? * &outputs_jacobian;
            outputs = layer.calculate_outputs(inputs, &outputs)?;
        }

        Ok(NetworkForwardPropagation { perceptron_inputs, perceptron, outputs, outputs_jacobian })
    }

    /// Element-wise first and second derivatives of the layers after the
    /// perceptron stack, evaluated at the stack's outputs. Only defined when
    /// each of those layers acts on every output separately.
    pub fn calculate_output_layers_derivatives(&self, perceptron_outputs: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
        const CONTEXT: &str = "NeuralNetwork::calculate_output_layers_derivatives";

        let position = self
            .layers
            .iter()
            .position(|l| l.kind() == LayerKind::MultilayerPerceptron)
            .ok_or_else(|| Error::missing(CONTEXT, "multilayer perceptron"))?;

        let n = perceptron_outputs.len();
        let mut outputs = perceptron_outputs.to_vec();
        let mut first = vec![1.0; n];
        let mut second = vec![0.0; n];

        for layer in &self.layers[position + 1..] {
            let (d, dd, next) = match layer {
                NetworkLayer::Unscaling(l) => element_wise_derivatives(l, &outputs)?,
                NetworkLayer::Bounding(l) => element_wise_derivatives(l, &outputs)?,
                NetworkLayer::Probabilistic(l) if l.probabilistic_method == ProbabilisticMethod::NoProbabilistic => {
                    (vec![1.0; n], vec![0.0; n], outputs.clone())
                }
                NetworkLayer::Conditions(c) if c.conditions_method == ConditionsMethod::NoConditions => {
                    (vec![1.0; n], vec![0.0; n], outputs.clone())
                }
                other => return Err(Error::unsupported(CONTEXT, format!("second derivatives through {:?}", other.kind()))),
            };
            // (u ∘ g)'' = u''(g)·g'² + u'(g)·g''
            for k in 0..n {
                second[k] = dd[k] * first[k] * first[k] + d[k] * second[k];
                first[k] *= d[k];
            }
            outputs = next;
        }

        Ok((first, second))
    }

    /// Removes input `index` from the scaling layer, the perceptron stack and
    /// the input information.
    pub fn prune_input(&mut self, index: usize) -> Result<()> {
        self.check_prunable("NeuralNetwork::prune_input")?;

        let mut layers = self.layers.clone();
        for layer in &mut layers {
            match layer {
                NetworkLayer::Scaling(l) => l.prune_input(index)?,
                NetworkLayer::MultilayerPerceptron(l) => l.prune_input(index)?,
                _ => {}
            }
        }
        check_architecture(&layers)?;

        self.layers = layers;
        self.inputs.remove(index);
        Ok(())
    }

    /// Removes output `index` from the perceptron stack and every layer after it.
    pub fn prune_output(&mut self, index: usize) -> Result<()> {
        self.check_prunable("NeuralNetwork::prune_output")?;

        let mut layers = self.layers.clone();
        for layer in &mut layers {
            match layer {
                NetworkLayer::MultilayerPerceptron(l) => l.prune_output(index)?,
                NetworkLayer::Unscaling(l) => l.prune_output(index)?,
                NetworkLayer::Probabilistic(l) => l.prune_output(index)?,
                NetworkLayer::Bounding(l) => l.prune_output(index)?,
                _ => {}
            }
        }
        check_architecture(&layers)?;

        self.layers = layers;
        self.outputs.remove(index);
        Ok(())
    }

    fn check_prunable(&self, context: &'static str) -> Result<()> {
        if self.multilayer_perceptron().is_none() {
            return Err(Error::missing(context, "multilayer perceptron"));
        }
        if self.has_layer(LayerKind::Conditions) {
            return Err(Error::InvalidConfig(format!(
                "{context}: pruning a network with a conditions layer is not supported"
            )));
        }
        Ok(())
    }

    /// Writes the flat parameter vector as whitespace-separated numbers.
    pub fn save_parameters(&self, path: &str) -> Result<()> {
        let text = self
            .arrange_parameters()
            .iter()
            .map(|p| format!("{p:e}"))
            .collect::<Vec<_>>()
            .join(" ");
        std::fs::write(path, text + "\n")?;
        Ok(())
    }

    /// Reads a file written by [`save_parameters`](Self::save_parameters).
    pub fn load_parameters(&mut self, path: &str) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let parameters = parse_parameters(&text)?;
        if parameters.len() != self.count_parameters_number() {
            return Err(Error::ParameterFile(format!(
                "expected {} parameters, found {}",
                self.count_parameters_number(),
                parameters.len()
            )));
        }
        self.set_parameters(&parameters)
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<NeuralNetwork> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut network: NeuralNetwork = serde_json::from_reader(reader)?;
        network.sync_variables();
        network.validate()?;
        Ok(network)
    }

    /// Re-checks every invariant the mutating API maintains, for networks
    /// that were deserialized rather than built.
    pub fn validate(&self) -> Result<()> {
        const CONTEXT: &str = "NeuralNetwork::validate";
        check_architecture(&self.layers)?;
        let kinds: Vec<LayerKind> = self.layers.iter().map(|l| l.kind()).collect();
        if !kinds.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(Error::InvalidConfig(format!("layers {kinds:?} are not in chain order")));
        }
        ensure_size(CONTEXT, self.inputs_number(), self.inputs.len())?;
        ensure_size(CONTEXT, self.outputs_number(), self.outputs.len())?;
        if let Some(independent) = &self.independent_parameters {
            independent.validate()?;
        }
        Ok(())
    }

    fn sync_variables(&mut self) {
        if self.inputs.len() != self.inputs_number() {
            self.inputs = Variables::new(self.inputs_number());
        }
        if self.outputs.len() != self.outputs_number() {
            self.outputs = Variables::new(self.outputs_number());
        }
    }
}

/// First and second derivatives and outputs of an element-wise layer at `x`.
fn element_wise_derivatives<L: ElementWiseLayer>(layer: &L, x: &[f64]) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    Ok((layer.calculate_derivative(x)?, layer.calculate_second_derivative(x)?, layer.calculate_outputs(x)?))
}

pub(crate) fn parse_parameters(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| Error::ParameterFile(format!("'{token}' is not a number: {e}")))
        })
        .collect()
}

/// Every layer must accept what the previous one produces. The conditions
/// layer also reads the network inputs directly.
fn check_architecture(layers: &[NetworkLayer]) -> Result<()> {
    const CONTEXT: &str = "NeuralNetwork::check_architecture";

    let Some(first) = layers.first() else {
        return Ok(());
    };
    let network_inputs = first.inputs_number();
    let mut upstream = network_inputs;

    for layer in layers {
        layer.validate()?;
        match layer {
            NetworkLayer::Conditions(c) => {
                ensure_size(CONTEXT, network_inputs, c.inputs_number())?;
                ensure_size(CONTEXT, upstream, c.outputs_number())?;
            }
            other => ensure_size(CONTEXT, upstream, other.inputs_number())?,
        }
        upstream = layer.outputs_number();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{
        BoundingLayer, ConditionsLayer, PerceptronLayer, ProbabilisticLayer, ProbabilisticMethod, ScalingLayer,
        ScalingMethod, UnscalingLayer, UnscalingMethod,
    };
    use crate::math::Statistics;
    use rand::{rngs::StdRng, SeedableRng};

    fn full_network() -> NeuralNetwork {
        let mut network = NeuralNetwork::from_layers(vec![
            NetworkLayer::Bounding(BoundingLayer::from_bounds(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap()),
            NetworkLayer::MultilayerPerceptron(MultilayerPerceptron::new(&[2, 3, 2]).unwrap()),
            NetworkLayer::Scaling(ScalingLayer::from_statistics(
                vec![Statistics::new(0.0, 4.0, 2.0, 1.0), Statistics::new(-2.0, 2.0, 0.0, 1.0)],
                ScalingMethod::MinimumMaximum,
            )),
            NetworkLayer::Unscaling(UnscalingLayer::from_statistics(
                vec![Statistics::new(0.0, 1.0, 0.5, 0.2); 2],
                UnscalingMethod::MeanStandardDeviation,
            )),
        ])
        .unwrap();
        network.initialize_random_uniform_with(-1.0, 1.0, &mut StdRng::seed_from_u64(11)).unwrap();
        network
    }

    #[test]
    fn layers_are_kept_in_chain_order() {
        let kinds: Vec<LayerKind> = full_network().layers().iter().map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::Scaling, LayerKind::MultilayerPerceptron, LayerKind::Unscaling, LayerKind::Bounding]
        );
    }

    #[test]
    fn inconsistent_layer_is_rejected_without_changes() {
        let mut network = full_network();
        let before = network.clone();
        let err = network.insert_layer(NetworkLayer::Scaling(ScalingLayer::new(3)));
        assert!(matches!(err, Err(Error::SizeMismatch { .. })));
        assert_eq!(network, before);
    }

    #[test]
    fn inserting_the_same_kind_replaces_it() {
        let mut network = full_network();
        network
            .insert_layer(NetworkLayer::Probabilistic(ProbabilisticLayer::new(2, ProbabilisticMethod::Softmax)))
            .unwrap();
        network
            .insert_layer(NetworkLayer::Probabilistic(ProbabilisticLayer::new(2, ProbabilisticMethod::Binary)))
            .unwrap();
        assert_eq!(network.layers().len(), 5);
        assert!(matches!(
            network.layer(LayerKind::Probabilistic),
            Some(NetworkLayer::Probabilistic(ProbabilisticLayer { probabilistic_method: ProbabilisticMethod::Binary, .. }))
        ));
    }

    #[test]
    fn inputs_number_resolves_first_present_layer() {
        let network = NeuralNetwork::from_layers(vec![NetworkLayer::Unscaling(UnscalingLayer::new(4))]).unwrap();
        assert_eq!(network.inputs_number(), 4);
        assert_eq!(NeuralNetwork::default().inputs_number(), 0);
    }

    #[test]
    fn set_parameters_rejects_wrong_length() {
        let mut network = full_network();
        let n = network.count_parameters_number();
        assert!(matches!(
            network.set_parameters(&vec![0.0; n + 1]),
            Err(Error::SizeMismatch { context: "NeuralNetwork::set_parameters", .. })
        ));
    }

    #[test]
    fn parameters_include_scaled_independent_parameters() {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        let mut independent = IndependentParameters::new(vec![5.0]);
        independent.set_statistics(vec![Statistics::new(0.0, 10.0, 0.0, 1.0)]).unwrap();
        network.set_independent_parameters(Some(independent)).unwrap();

        assert_eq!(network.count_parameters_number(), 3);
        assert_eq!(network.arrange_parameters()[2], 0.0);

        network.set_parameters(&[0.0, 1.0, 1.0]).unwrap();
        assert_eq!(network.independent_parameters().unwrap().parameters, vec![10.0]);
    }

    #[test]
    fn outputs_at_parameters_do_not_mutate() {
        let network = full_network();
        let x = [1.0, 0.5];
        let p = vec![0.1; network.count_parameters_number()];
        let at_parameters = network.calculate_outputs_at(&x, &p).unwrap();

        let mut moved = network.clone();
        moved.set_parameters(&p).unwrap();
        assert_eq!(moved.calculate_outputs(&x).unwrap(), at_parameters);
        assert_ne!(network.calculate_outputs(&x).unwrap(), at_parameters);
    }

    #[test]
    fn wrong_input_size_is_an_error() {
        assert!(matches!(
            full_network().calculate_outputs(&[1.0]),
            Err(Error::SizeMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let network = full_network();
        let x = [1.3, -0.4];
        let jacobian = network.calculate_jacobian(&x).unwrap();
        let h = 1e-6;
        for j in 0..2 {
            let mut forward = x;
            let mut backward = x;
            forward[j] += h;
            backward[j] -= h;
            let yf = network.calculate_outputs(&forward).unwrap();
            let yb = network.calculate_outputs(&backward).unwrap();
            for k in 0..2 {
                assert!(((yf[k] - yb[k]) / (2.0 * h) - jacobian[(k, j)]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn conditions_layer_reads_raw_inputs() {
        let mut network = NeuralNetwork::new(&[1, 2, 1]).unwrap();
        network
            .insert_layer(NetworkLayer::Conditions(ConditionsLayer::one_condition(1, 0, 0.0, vec![3.0]).unwrap()))
            .unwrap();
        network.initialize_random_uniform_with(-1.0, 1.0, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(network.calculate_outputs(&[0.0]).unwrap(), vec![3.0]);
    }

    #[test]
    fn pruning_with_conditions_layer_fails_loudly() {
        let mut network = NeuralNetwork::new(&[2, 2, 2]).unwrap();
        network
            .insert_layer(NetworkLayer::Conditions(ConditionsLayer::new(2, 2)))
            .unwrap();
        assert!(matches!(network.prune_input(0), Err(Error::InvalidConfig(_))));
        assert!(matches!(network.prune_output(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn pruning_propagates_to_sharing_layers() {
        let mut network = full_network();
        network.prune_input(1).unwrap();
        network.prune_output(0).unwrap();
        assert_eq!((network.inputs_number(), network.outputs_number()), (1, 1));
        assert_eq!(network.inputs.len(), 1);
        assert_eq!(network.outputs.len(), 1);
        assert!(network.calculate_outputs(&[0.3]).is_ok());
    }

    #[test]
    fn forward_propagation_reports_output_layers_jacobian() {
        let network = full_network();
        let propagation = network.first_order_forward_propagation(&[1.0, 1.0]).unwrap();
        assert_eq!(propagation.outputs, network.calculate_outputs(&[1.0, 1.0]).unwrap());
        // Unscaling by standard deviation 0.2, inside the bounds.
        assert!((propagation.outputs_jacobian[(0, 0)] - 0.2).abs() < 1e-15);
        assert_eq!(propagation.outputs_jacobian[(0, 1)], 0.0);
    }

    #[test]
    fn parameter_file_round_trips() {
        let network = full_network();
        let path = std::env::temp_dir().join(format!("ferrite-train-params-{}.txt", std::process::id()));
        let path = path.to_str().unwrap();
        network.save_parameters(path).unwrap();

        let mut loaded = full_network();
        loaded.initialize_parameters(0.0).unwrap();
        loaded.load_parameters(path).unwrap();
        assert_eq!(loaded.arrange_parameters(), network.arrange_parameters());

        let mut smaller = NeuralNetwork::new(&[2, 1]).unwrap();
        assert!(matches!(smaller.load_parameters(path), Err(Error::ParameterFile(_))));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_parameter_text_is_rejected() {
        assert!(matches!(parse_parameters("1.0 abc"), Err(Error::ParameterFile(_))));
        assert_eq!(parse_parameters(" 1e-3\n2 ").unwrap(), vec![1e-3, 2.0]);
    }

    fn load_from(name: &str, json: &str) -> Result<NeuralNetwork> {
        let path = std::env::temp_dir().join(format!("ferrite-train-{name}-{}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();
        let loaded = NeuralNetwork::load_json(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        loaded
    }

    #[test]
    fn loading_rechecks_layer_invariants() {
        let mut value = serde_json::to_value(full_network()).unwrap();
        assert!(load_from("valid", &value.to_string()).is_ok());

        value["layers"][3]["lower_bounds"] = serde_json::json!([6.0, -5.0]);
        assert!(matches!(load_from("inverted", &value.to_string()), Err(Error::InvalidConfig(_))));

        value["layers"][3]["lower_bounds"] = serde_json::json!([-5.0]);
        assert!(matches!(load_from("unpaired", &value.to_string()), Err(Error::SizeMismatch { .. })));

        let empty = r#"{"layers":[{"type":"MultilayerPerceptron","layers":[]}]}"#;
        assert!(matches!(load_from("empty", empty), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn loading_rejects_layers_out_of_chain_order() {
        let mut value = serde_json::to_value(full_network()).unwrap();
        let layers = value["layers"].as_array_mut().unwrap();
        layers.swap(0, 1);
        assert!(matches!(load_from("order", &value.to_string()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn loading_rejects_an_out_of_range_condition_input() {
        let mut network = NeuralNetwork::new(&[1, 2, 1]).unwrap();
        network
            .insert_layer(NetworkLayer::Conditions(ConditionsLayer::one_condition(1, 0, 0.0, vec![3.0]).unwrap()))
            .unwrap();
        let mut value = serde_json::to_value(&network).unwrap();
        value["layers"][1]["external_input_index"] = serde_json::json!(4);
        assert!(matches!(load_from("conditions", &value.to_string()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn json_round_trip_preserves_the_network() {
        let mut network = full_network();
        network.multilayer_perceptron_mut().unwrap().layers[0] =
            PerceptronLayer::new(2, 3, ActivationFunction::Logistic);
        let json = serde_json::to_string(&network).unwrap();
        let restored: NeuralNetwork = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, network);
    }
}
