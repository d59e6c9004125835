pub mod bounding;
pub mod conditions;
pub mod layer;
pub mod multilayer_perceptron;
pub mod perceptron;
pub mod probabilistic;
pub mod scaling;
pub mod unscaling;

pub use bounding::{BoundingLayer, BoundingMethod};
pub use conditions::{ConditionsLayer, ConditionsMethod};
pub use layer::{ElementWiseLayer, Layer};
pub use multilayer_perceptron::{FirstOrderForwardPropagation, MultilayerPerceptron, SecondOrderForwardPropagation};
pub use perceptron::PerceptronLayer;
pub use probabilistic::{ProbabilisticLayer, ProbabilisticMethod};
pub use scaling::{ScalingLayer, ScalingMethod};
pub use unscaling::{UnscalingLayer, UnscalingMethod};
