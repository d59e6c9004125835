use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::{
    BoundingLayer, MultilayerPerceptron, PerceptronLayer, ProbabilisticLayer, ProbabilisticMethod, ScalingLayer,
    ScalingMethod, UnscalingLayer, UnscalingMethod,
};
use crate::math::Statistics;
use crate::network::network::NeuralNetwork;
use crate::network::network_layer::NetworkLayer;
use crate::network::variables::Variables;
use crate::performance::PerformanceTermType;

/// One perceptron layer: its width and the activation applied after the
/// combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub neurons: usize,
    pub activation: ActivationFunction,
}

/// Optional statistics-driven layers around the perceptron stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ScalingSpec {
    MinimumMaximum { statistics: Vec<Statistics> },
    MeanStandardDeviation { statistics: Vec<Statistics> },
}

/// A serializable description of a network architecture plus the
/// performance term to train it with.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of the
/// trained parameters, so configurations can be stored before training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable label, reported in build errors.
    pub name: String,
    pub inputs_number: usize,
    /// Perceptron layers, input side first.
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub scaling: Option<ScalingSpec>,
    #[serde(default)]
    pub unscaling: Option<ScalingSpec>,
    #[serde(default)]
    pub probabilistic: Option<ProbabilisticMethod>,
    /// Lower and upper output bounds.
    #[serde(default)]
    pub bounds: Option<(Vec<f64>, Vec<f64>)>,
    #[serde(default)]
    pub input_names: Vec<String>,
    #[serde(default)]
    pub output_names: Vec<String>,
    pub performance_term: PerformanceTermType,
}

impl NetworkSpec {
    /// Builds a network with randomly initialized parameters.
    pub fn build(&self) -> Result<NeuralNetwork> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(format!("network spec '{}' has no layers", self.name)));
        }

        let mut perceptrons = Vec::with_capacity(self.layers.len());
        let mut inputs = self.inputs_number;
        for layer in &self.layers {
            if inputs == 0 || layer.neurons == 0 {
                return Err(Error::InvalidConfig(format!("network spec '{}' has an empty layer", self.name)));
            }
            perceptrons.push(PerceptronLayer::new(inputs, layer.neurons, layer.activation));
            inputs = layer.neurons;
        }

        let mut layers = vec![NetworkLayer::MultilayerPerceptron(MultilayerPerceptron::from_layers(perceptrons)?)];
        match &self.scaling {
            Some(ScalingSpec::MinimumMaximum { statistics }) => layers.push(NetworkLayer::Scaling(
                ScalingLayer::from_statistics(statistics.clone(), ScalingMethod::MinimumMaximum),
            )),
            Some(ScalingSpec::MeanStandardDeviation { statistics }) => layers.push(NetworkLayer::Scaling(
                ScalingLayer::from_statistics(statistics.clone(), ScalingMethod::MeanStandardDeviation),
            )),
            None => {}
        }
        match &self.unscaling {
            Some(ScalingSpec::MinimumMaximum { statistics }) => layers.push(NetworkLayer::Unscaling(
                UnscalingLayer::from_statistics(statistics.clone(), UnscalingMethod::MinimumMaximum),
            )),
            Some(ScalingSpec::MeanStandardDeviation { statistics }) => layers.push(NetworkLayer::Unscaling(
                UnscalingLayer::from_statistics(statistics.clone(), UnscalingMethod::MeanStandardDeviation),
            )),
            None => {}
        }
        if let Some(method) = self.probabilistic {
            layers.push(NetworkLayer::Probabilistic(ProbabilisticLayer::new(inputs, method)));
        }
        if let Some((lower, upper)) = &self.bounds {
            layers.push(NetworkLayer::Bounding(BoundingLayer::from_bounds(lower.clone(), upper.clone())?));
        }

        let mut network = NeuralNetwork::from_layers(layers)?;
        if !self.input_names.is_empty() {
            network.inputs = Variables::from_names(self.input_names.iter().cloned());
        }
        if !self.output_names.is_empty() {
            network.outputs = Variables::from_names(self.output_names.iter().cloned());
        }
        Ok(network)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::network_layer::LayerKind;

    fn spec() -> NetworkSpec {
        NetworkSpec {
            name: "sine".into(),
            inputs_number: 1,
            layers: vec![
                LayerSpec { neurons: 4, activation: ActivationFunction::HyperbolicTangent },
                LayerSpec { neurons: 1, activation: ActivationFunction::Linear },
            ],
            scaling: Some(ScalingSpec::MinimumMaximum { statistics: vec![Statistics::new(0.0, 6.0, 3.0, 1.7)] }),
            unscaling: None,
            probabilistic: None,
            bounds: Some((vec![-1.0], vec![1.0])),
            input_names: vec!["x".into()],
            output_names: vec![],
            performance_term: PerformanceTermType::SumSquaredError,
        }
    }

    #[test]
    fn build_assembles_requested_layers() {
        let network = spec().build().unwrap();
        let kinds: Vec<LayerKind> = network.layers().iter().map(|l| l.kind()).collect();
        assert_eq!(kinds, vec![LayerKind::Scaling, LayerKind::MultilayerPerceptron, LayerKind::Bounding]);
        assert_eq!(network.count_parameters_number(), 4 * 2 + 5);
        assert_eq!(network.inputs.names(), vec!["x"]);
        assert_eq!(network.outputs.len(), 1);
    }

    #[test]
    fn mismatched_statistics_fail_to_build() {
        let mut spec = spec();
        spec.scaling = Some(ScalingSpec::MeanStandardDeviation { statistics: vec![Statistics::default(); 2] });
        assert!(matches!(spec.build(), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn spec_survives_json() {
        let json = serde_json::to_string(&spec()).unwrap();
        let restored: NetworkSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, spec());
    }
}
