use std::time::Instant;

use serde::{Serialize, Deserialize};
use tracing::{debug, instrument};

use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::math::{vector, Matrix};
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;
use crate::training::training_algorithm::{
    finish, GeneralizationTracker, IterationState, StoppingCriteria, TrainingAlgorithm,
};
use crate::training::training_results::{ResultsReserve, TrainingResults};

/// Damped Gauss-Newton over the performance terms.
///
/// Requires a term that provides terms and their Jacobian (sum squared,
/// mean squared or normalized squared error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevenbergMarquardt {
    pub stopping_criteria: StoppingCriteria,
    pub reserve: ResultsReserve,
    pub damping_parameter: f64,
    /// Divides the damping after an accepted step, multiplies it after a
    /// rejected one.
    pub damping_parameter_factor: f64,
    pub minimum_damping_parameter: f64,
    pub maximum_damping_parameter: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        LevenbergMarquardt {
            stopping_criteria: StoppingCriteria::default(),
            reserve: ResultsReserve::default(),
            damping_parameter: 1.0e-3,
            damping_parameter_factor: 10.0,
            minimum_damping_parameter: 1.0e-6,
            maximum_damping_parameter: 1.0e6,
        }
    }
}

/// Accepted (or null) step of one iteration.
struct Step {
    parameters: Vec<f64>,
    performance: f64,
    increment_norm: f64,
}

impl LevenbergMarquardt {
    fn validate(&self) -> Result<()> {
        if self.damping_parameter_factor <= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "damping parameter factor must exceed 1, got {}",
                self.damping_parameter_factor
            )));
        }
        if self.minimum_damping_parameter <= 0.0 || self.minimum_damping_parameter > self.maximum_damping_parameter {
            return Err(Error::InvalidConfig(format!(
                "damping parameter bounds [{}, {}] are invalid",
                self.minimum_damping_parameter, self.maximum_damping_parameter
            )));
        }
        Ok(())
    }

    /// Raises the damping until `(H + λI)·Δ = -g` gives a better point.
    /// Leaves the parameters in place when even the maximum damping fails.
    #[allow(clippy::too_many_arguments)]
    fn calculate_step(
        &self,
        network: &NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
        parameters: &[f64],
        performance: f64,
        hessian_approximation: &Matrix,
        gradient: &[f64],
        damping: &mut f64,
    ) -> Result<Step> {
        let negative_gradient = vector::scale(gradient, -1.0);
        loop {
            let mut system = hessian_approximation.clone();
            system.sum_diagonal(*damping);
            match system.solve(&negative_gradient) {
                Ok(increment) => {
                    let candidate = vector::add(parameters, &increment);
                    let candidate_performance = term.calculate_performance_at(network, data_set, &candidate)?;
                    if candidate_performance < performance {
                        *damping = (*damping / self.damping_parameter_factor).max(self.minimum_damping_parameter);
                        return Ok(Step {
                            parameters: candidate,
                            performance: candidate_performance,
                            increment_norm: vector::norm(&increment),
                        });
                    }
                }
                Err(Error::Degenerate { .. }) => debug!(damping = *damping, "damped system is singular"),
                Err(error) => return Err(error),
            }

            if *damping >= self.maximum_damping_parameter {
                debug!(damping = *damping, "no improving step at the maximum damping");
                return Ok(Step { parameters: parameters.to_vec(), performance, increment_norm: 0.0 });
            }
            *damping = (*damping * self.damping_parameter_factor).min(self.maximum_damping_parameter);
        }
    }
}

impl TrainingAlgorithm for LevenbergMarquardt {
    fn name(&self) -> &'static str {
        "LevenbergMarquardt"
    }

    #[instrument(level = "debug", skip_all, err)]
    fn perform_training(
        &self,
        network: &mut NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
    ) -> Result<TrainingResults> {
        self.validate()?;
        let criteria = &self.stopping_criteria;
        let start = Instant::now();
        let mut results = TrainingResults::default();
        let mut tracker = GeneralizationTracker::default();

        let mut parameters = network.arrange_parameters();
        let mut performance = term.calculate_performance(network, data_set)?;
        let mut damping = self
            .damping_parameter
            .clamp(self.minimum_damping_parameter, self.maximum_damping_parameter);
        let mut parameters_increment_norm: Option<f64> = None;
        let mut performance_increase: Option<f64> = None;
        let mut iteration = 0;

        loop {
            let terms = term.calculate_terms(network, data_set)?;
            let terms_jacobian = term.calculate_terms_jacobian(network, data_set)?;
            let gradient = vector::scale(&terms_jacobian.transpose_dot_vector(&terms), 2.0);
            let gradient_norm = vector::norm(&gradient);
            let generalization_performance = term.calculate_generalization_performance(network, data_set)?;
            let generalization_failures = tracker.update(generalization_performance);

            let state = IterationState {
                iteration,
                elapsed_time: start.elapsed().as_secs_f64(),
                parameters: &parameters,
                parameters_norm: vector::norm(&parameters),
                performance,
                generalization_performance,
                generalization_failures,
                gradient: Some(&gradient),
                gradient_norm: Some(gradient_norm),
                training_direction: None,
                training_rate: None,
                parameters_increment_norm,
                performance_increase,
                damping_parameter: Some(damping),
            };
            criteria.warn(&state);
            results.record(&self.reserve, &state);
            if let Some(condition) = criteria.check(&state) {
                return Ok(finish(self.name(), results, &state, condition));
            }
            criteria.display(self.name(), &state);

            let hessian_approximation = (&terms_jacobian.transpose() * &terms_jacobian).scale(2.0);
            let step = self.calculate_step(
                network,
                data_set,
                term,
                &parameters,
                performance,
                &hessian_approximation,
                &gradient,
                &mut damping,
            )?;
            debug!(iteration, damping, increment_norm = step.increment_norm, "damped step");

            network.set_parameters(&step.parameters)?;
            parameters = network.arrange_parameters();
            parameters_increment_norm = Some(step.increment_norm);
            performance_increase = Some(performance - step.performance);
            performance = step.performance;
            iteration += 1;
        }
    }
}
