pub mod conjugate_gradient;
pub mod gradient_descent;
pub mod levenberg_marquardt;
pub mod random_search;
pub mod training_algorithm;
pub mod training_rate_algorithm;
pub mod training_results;
pub mod training_strategy;

pub use conjugate_gradient::{ConjugateGradient, TrainingDirectionMethod};
pub use gradient_descent::GradientDescent;
pub use levenberg_marquardt::LevenbergMarquardt;
pub use random_search::RandomSearch;
pub use training_algorithm::{IterationState, StoppingCondition, StoppingCriteria, TrainingAlgorithm};
pub use training_rate_algorithm::{DirectionalPoint, TrainingRateAlgorithm, TrainingRateMethod};
pub use training_results::{ResultsReserve, TrainingResults};
pub use training_strategy::TrainingStrategy;
