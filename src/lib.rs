//! Layered feed-forward neural networks, performance terms evaluated by
//! back-propagation, and iterative training algorithms.
//!
//! A [`NeuralNetwork`] chains optional scaling, conditions, unscaling,
//! probabilistic and bounding layers around a [`MultilayerPerceptron`]. A
//! [`PerformanceTerm`] scores it over a [`DataSet`], and a
//! [`TrainingAlgorithm`] moves its parameters until a stopping criterion
//! fires.

pub mod activation;
pub mod data;
pub mod error;
pub mod layers;
pub mod math;
pub mod network;
pub mod numerical_differentiation;
pub mod performance;
pub mod training;

// Convenience re-exports
pub use activation::ActivationFunction;
pub use data::{DataSet, InstanceUse, VariableUse};
pub use error::{Error, Result};
pub use layers::MultilayerPerceptron;
pub use math::{Matrix, Statistics};
pub use network::{NetworkLayer, NetworkSpec, NeuralNetwork, ScalingSpec};
pub use numerical_differentiation::NumericalDifferentiation;
pub use performance::{
    MeanSquaredError, NormalizedSquaredError, PerformanceFunctional, PerformanceTerm, PerformanceTermType,
    RootMeanSquaredError, SumSquaredError,
};
pub use training::{
    ConjugateGradient, GradientDescent, LevenbergMarquardt, RandomSearch, StoppingCriteria, TrainingAlgorithm,
    TrainingResults, TrainingStrategy,
};
