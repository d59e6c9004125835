use std::fmt::{self, Debug};

use serde::{Serialize, Deserialize};
use tracing::{error, info, warn};

use crate::data::DataSet;
use crate::error::Result;
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;
use crate::training::training_results::TrainingResults;

/// An iterative optimizer of a network's parameters.
pub trait TrainingAlgorithm: Debug {
    fn name(&self) -> &'static str;

    /// Trains `network` in place against `term` and returns the run's record.
    ///
    /// The loop always stops, at the latest when the iteration count reaches
    /// the configured maximum.
    fn perform_training(
        &self,
        network: &mut NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
    ) -> Result<TrainingResults>;
}

/// Why a training run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppingCondition {
    MinimumParametersIncrementNorm,
    MinimumPerformanceIncrease,
    PerformanceGoal,
    GradientNormGoal,
    MaximumGeneralizationPerformanceDecreases,
    MaximumIterationsNumber,
    MaximumTime,
    ErrorParametersNorm,
    ErrorGradientNorm,
    ErrorTrainingRate,
}

impl fmt::Display for StoppingCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StoppingCondition::MinimumParametersIncrementNorm => "minimum parameters increment norm reached",
            StoppingCondition::MinimumPerformanceIncrease => "minimum performance increase reached",
            StoppingCondition::PerformanceGoal => "performance goal reached",
            StoppingCondition::GradientNormGoal => "gradient norm goal reached",
            StoppingCondition::MaximumGeneralizationPerformanceDecreases => {
                "maximum generalization performance decreases reached"
            }
            StoppingCondition::MaximumIterationsNumber => "maximum number of iterations reached",
            StoppingCondition::MaximumTime => "maximum training time reached",
            StoppingCondition::ErrorParametersNorm => "parameters norm exceeded its error threshold",
            StoppingCondition::ErrorGradientNorm => "gradient norm exceeded its error threshold",
            StoppingCondition::ErrorTrainingRate => "training rate exceeded its error threshold",
        };
        f.write_str(text)
    }
}

/// Limits shared by every training algorithm.
///
/// A criterion that an algorithm does not measure (e.g. the gradient norm in
/// random search) never fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoppingCriteria {
    /// Stop when a step moves the parameters by at most this much.
    pub minimum_parameters_increment_norm: f64,
    /// Stop when a step improves the performance by at most this much.
    pub minimum_performance_increase: f64,
    pub performance_goal: f64,
    pub gradient_norm_goal: f64,
    /// Stop after this many consecutive increases of the generalization
    /// performance. `None` only tracks them.
    pub maximum_generalization_performance_decreases: Option<usize>,
    pub maximum_iterations_number: usize,
    /// Seconds.
    pub maximum_time: f64,
    pub warning_parameters_norm: f64,
    pub warning_gradient_norm: f64,
    pub warning_training_rate: f64,
    pub error_parameters_norm: f64,
    pub error_gradient_norm: f64,
    pub error_training_rate: f64,
    /// Iterations between progress events; 0 disables them.
    pub display_period: usize,
}

impl Default for StoppingCriteria {
    fn default() -> Self {
        StoppingCriteria {
            minimum_parameters_increment_norm: 0.0,
            minimum_performance_increase: 0.0,
            performance_goal: f64::MIN,
            gradient_norm_goal: 0.0,
            maximum_generalization_performance_decreases: None,
            maximum_iterations_number: 1000,
            maximum_time: 1000.0,
            warning_parameters_norm: 1.0e6,
            warning_gradient_norm: 1.0e6,
            warning_training_rate: 1.0e6,
            error_parameters_norm: 1.0e10,
            error_gradient_norm: 1.0e10,
            error_training_rate: 1.0e10,
            display_period: 100,
        }
    }
}

/// Everything known at the evaluation point of one iteration.
///
/// Step measures (`parameters_increment_norm`, `performance_increase`,
/// `training_rate`) describe the step that led here and are `None` on the
/// first iteration or when the algorithm does not measure them.
#[derive(Debug, Clone)]
pub struct IterationState<'a> {
    pub iteration: usize,
    pub elapsed_time: f64,
    pub parameters: &'a [f64],
    pub parameters_norm: f64,
    pub performance: f64,
    pub generalization_performance: f64,
    pub generalization_failures: usize,
    pub gradient: Option<&'a [f64]>,
    pub gradient_norm: Option<f64>,
    pub training_direction: Option<&'a [f64]>,
    pub training_rate: Option<f64>,
    pub parameters_increment_norm: Option<f64>,
    pub performance_increase: Option<f64>,
    pub damping_parameter: Option<f64>,
}

impl StoppingCriteria {
    /// First criterion met by `state`, in priority order.
    pub fn check(&self, state: &IterationState) -> Option<StoppingCondition> {
        if state.parameters_increment_norm.is_some_and(|n| n <= self.minimum_parameters_increment_norm) {
            return Some(StoppingCondition::MinimumParametersIncrementNorm);
        }
        if state.performance_increase.is_some_and(|d| d <= self.minimum_performance_increase) {
            return Some(StoppingCondition::MinimumPerformanceIncrease);
        }
        if state.performance <= self.performance_goal {
            return Some(StoppingCondition::PerformanceGoal);
        }
        if state.gradient_norm.is_some_and(|n| n <= self.gradient_norm_goal) {
            return Some(StoppingCondition::GradientNormGoal);
        }
        if self
            .maximum_generalization_performance_decreases
            .is_some_and(|maximum| state.generalization_failures >= maximum)
        {
            return Some(StoppingCondition::MaximumGeneralizationPerformanceDecreases);
        }
        if state.iteration >= self.maximum_iterations_number {
            return Some(StoppingCondition::MaximumIterationsNumber);
        }
        if state.elapsed_time >= self.maximum_time {
            return Some(StoppingCondition::MaximumTime);
        }
        if state.parameters_norm >= self.error_parameters_norm {
            error!(parameters_norm = state.parameters_norm, "parameters norm exceeds the error threshold");
            return Some(StoppingCondition::ErrorParametersNorm);
        }
        if state.gradient_norm.is_some_and(|n| n >= self.error_gradient_norm) {
            error!(gradient_norm = state.gradient_norm, "gradient norm exceeds the error threshold");
            return Some(StoppingCondition::ErrorGradientNorm);
        }
        if state.training_rate.is_some_and(|r| r >= self.error_training_rate) {
            error!(training_rate = state.training_rate, "training rate exceeds the error threshold");
            return Some(StoppingCondition::ErrorTrainingRate);
        }
        None
    }

    /// Emits a warning for every warning threshold `state` crosses.
    pub fn warn(&self, state: &IterationState) {
        if state.parameters_norm >= self.warning_parameters_norm {
            warn!(iteration = state.iteration, parameters_norm = state.parameters_norm, "large parameters norm");
        }
        if let Some(gradient_norm) = state.gradient_norm.filter(|&n| n >= self.warning_gradient_norm) {
            warn!(iteration = state.iteration, gradient_norm, "large gradient norm");
        }
        if let Some(training_rate) = state.training_rate.filter(|&r| r >= self.warning_training_rate) {
            warn!(iteration = state.iteration, training_rate, "large training rate");
        }
    }

    /// Progress event every `display_period` iterations.
    pub fn display(&self, algorithm: &str, state: &IterationState) {
        if self.display_period > 0 && state.iteration % self.display_period == 0 {
            info!(
                algorithm,
                iteration = state.iteration,
                performance = state.performance,
                generalization_performance = state.generalization_performance,
                gradient_norm = state.gradient_norm,
                training_rate = state.training_rate,
                "training progress"
            );
        }
    }
}

/// Counts consecutive increases of the generalization performance.
#[derive(Debug, Clone, Default)]
pub(crate) struct GeneralizationTracker {
    previous: Option<f64>,
    failures: usize,
}

impl GeneralizationTracker {
    /// An unchanged value neither extends nor resets the run.
    pub(crate) fn update(&mut self, generalization_performance: f64) -> usize {
        if let Some(previous) = self.previous {
            if generalization_performance > previous {
                self.failures += 1;
            } else if generalization_performance < previous {
                self.failures = 0;
            }
        }
        self.previous = Some(generalization_performance);
        self.failures
    }
}

/// Logs and records the final state of a run.
pub(crate) fn finish(
    algorithm: &str,
    mut results: TrainingResults,
    state: &IterationState,
    condition: StoppingCondition,
) -> TrainingResults {
    info!(
        algorithm,
        iteration = state.iteration,
        performance = state.performance,
        generalization_performance = state.generalization_performance,
        elapsed_time = state.elapsed_time,
        "training stopped: {condition}"
    );
    results.finish(state, condition);
    results
}
