pub mod independent_parameters;
pub mod network;
pub mod network_layer;
pub mod spec;
pub mod variables;

pub use independent_parameters::IndependentParameters;
pub use network::{NetworkForwardPropagation, NeuralNetwork};
pub use network_layer::{LayerKind, NetworkLayer};
pub use spec::{LayerSpec, NetworkSpec, ScalingSpec};
pub use variables::{VariableInformation, Variables};
