use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::training::training_algorithm::{IterationState, StoppingCondition};

/// Which per-iteration histories a run keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsReserve {
    pub parameters_history: bool,
    pub parameters_norm_history: bool,
    pub performance_history: bool,
    pub generalization_performance_history: bool,
    pub gradient_history: bool,
    pub gradient_norm_history: bool,
    pub training_direction_history: bool,
    pub training_rate_history: bool,
    pub elapsed_time_history: bool,
    pub damping_parameter_history: bool,
}

impl Default for ResultsReserve {
    fn default() -> Self {
        ResultsReserve {
            parameters_history: false,
            parameters_norm_history: false,
            performance_history: true,
            generalization_performance_history: true,
            gradient_history: false,
            gradient_norm_history: false,
            training_direction_history: false,
            training_rate_history: false,
            elapsed_time_history: false,
            damping_parameter_history: false,
        }
    }
}

impl ResultsReserve {
    /// Keeps every history.
    pub fn all() -> Self {
        ResultsReserve {
            parameters_history: true,
            parameters_norm_history: true,
            performance_history: true,
            generalization_performance_history: true,
            gradient_history: true,
            gradient_norm_history: true,
            training_direction_history: true,
            training_rate_history: true,
            elapsed_time_history: true,
            damping_parameter_history: true,
        }
    }
}

/// Record of a training run, owned by the caller.
///
/// Histories hold one entry per evaluated iteration when reserved, or stay
/// empty. Measures an algorithm does not produce are never recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingResults {
    pub parameters_history: Vec<Vec<f64>>,
    pub parameters_norm_history: Vec<f64>,
    pub performance_history: Vec<f64>,
    pub generalization_performance_history: Vec<f64>,
    pub gradient_history: Vec<Vec<f64>>,
    pub gradient_norm_history: Vec<f64>,
    pub training_direction_history: Vec<Vec<f64>>,
    pub training_rate_history: Vec<f64>,
    /// Seconds since the run started.
    pub elapsed_time_history: Vec<f64>,
    pub damping_parameter_history: Vec<f64>,

    pub final_parameters: Vec<f64>,
    pub final_parameters_norm: f64,
    pub final_performance: f64,
    pub final_generalization_performance: f64,
    pub final_gradient_norm: Option<f64>,
    pub iterations_number: usize,
    pub elapsed_time: f64,
    pub stopping_condition: Option<StoppingCondition>,
}

impl TrainingResults {
    pub(crate) fn record(&mut self, reserve: &ResultsReserve, state: &IterationState) {
        if reserve.parameters_history {
            self.parameters_history.push(state.parameters.to_vec());
        }
        if reserve.parameters_norm_history {
            self.parameters_norm_history.push(state.parameters_norm);
        }
        if reserve.performance_history {
            self.performance_history.push(state.performance);
        }
        if reserve.generalization_performance_history {
            self.generalization_performance_history.push(state.generalization_performance);
        }
        if reserve.gradient_history {
            if let Some(gradient) = state.gradient {
                self.gradient_history.push(gradient.to_vec());
            }
        }
        if reserve.gradient_norm_history {
            if let Some(gradient_norm) = state.gradient_norm {
                self.gradient_norm_history.push(gradient_norm);
            }
        }
        if reserve.training_direction_history {
            if let Some(direction) = state.training_direction {
                self.training_direction_history.push(direction.to_vec());
            }
        }
        if reserve.training_rate_history {
            if let Some(training_rate) = state.training_rate {
                self.training_rate_history.push(training_rate);
            }
        }
        if reserve.elapsed_time_history {
            self.elapsed_time_history.push(state.elapsed_time);
        }
        if reserve.damping_parameter_history {
            if let Some(damping) = state.damping_parameter {
                self.damping_parameter_history.push(damping);
            }
        }
    }

    pub(crate) fn finish(&mut self, state: &IterationState, condition: StoppingCondition) {
        self.final_parameters = state.parameters.to_vec();
        self.final_parameters_norm = state.parameters_norm;
        self.final_performance = state.performance;
        self.final_generalization_performance = state.generalization_performance;
        self.final_gradient_norm = state.gradient_norm;
        self.iterations_number = state.iteration;
        self.elapsed_time = state.elapsed_time;
        self.stopping_condition = Some(condition);
    }

    /// Serializes the results to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
