pub(crate) mod back_propagation;
pub mod mean_squared_error;
pub mod neural_parameters_norm;
pub mod normalized_squared_error;
pub mod performance_functional;
pub mod performance_term;
pub mod root_mean_squared_error;
pub mod sum_squared_error;
pub mod term_type;

pub use mean_squared_error::MeanSquaredError;
pub use neural_parameters_norm::NeuralParametersNorm;
pub use normalized_squared_error::NormalizedSquaredError;
pub use performance_functional::PerformanceFunctional;
pub use performance_term::PerformanceTerm;
pub use root_mean_squared_error::RootMeanSquaredError;
pub use sum_squared_error::SumSquaredError;
pub use term_type::PerformanceTermType;
