use std::time::Instant;

use serde::{Serialize, Deserialize};
use tracing::{debug, instrument};

use crate::data::DataSet;
use crate::error::Result;
use crate::math::vector;
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;
use crate::training::training_algorithm::{
    finish, GeneralizationTracker, IterationState, StoppingCriteria, TrainingAlgorithm,
};
use crate::training::training_rate_algorithm::TrainingRateAlgorithm;
use crate::training::training_results::{ResultsReserve, TrainingResults};

/// Formula for the conjugation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrainingDirectionMethod {
    FletcherReeves,
    /// Clamped at zero, which restarts along the steepest descent.
    #[default]
    PolakRibiere,
}

impl TrainingDirectionMethod {
    fn calculate_parameter(self, old_gradient: &[f64], gradient: &[f64]) -> f64 {
        let denominator = vector::dot(old_gradient, old_gradient);
        if denominator == 0.0 {
            return 0.0;
        }
        match self {
            TrainingDirectionMethod::FletcherReeves => vector::dot(gradient, gradient) / denominator,
            TrainingDirectionMethod::PolakRibiere => {
                let numerator = vector::dot(gradient, &vector::subtract(gradient, old_gradient));
                (numerator / denominator).max(0.0)
            }
        }
    }
}

/// Unit vector along `direction`; the line search steps along it.
fn normalized(direction: &[f64]) -> Vec<f64> {
    let norm = vector::norm(direction);
    if norm == 0.0 {
        vec![0.0; direction.len()]
    } else {
        vector::scale(direction, 1.0 / norm)
    }
}

/// Nonlinear conjugate gradient with a line search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConjugateGradient {
    pub stopping_criteria: StoppingCriteria,
    pub reserve: ResultsReserve,
    pub training_rate_algorithm: TrainingRateAlgorithm,
    pub training_direction_method: TrainingDirectionMethod,
    pub first_training_rate: f64,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        ConjugateGradient {
            stopping_criteria: StoppingCriteria::default(),
            reserve: ResultsReserve::default(),
            training_rate_algorithm: TrainingRateAlgorithm::default(),
            training_direction_method: TrainingDirectionMethod::default(),
            first_training_rate: 0.01,
        }
    }
}

impl ConjugateGradient {
    pub fn new(training_direction_method: TrainingDirectionMethod) -> Self {
        ConjugateGradient { training_direction_method, ..Default::default() }
    }

    /// Conjugate direction from the previous one, or `-gradient` on a restart
    /// or when the conjugate direction does not descend.
    fn calculate_conjugate_direction(
        &self,
        previous: Option<(&[f64], &[f64])>,
        gradient: &[f64],
        restart: bool,
    ) -> Vec<f64> {
        let steepest = vector::scale(gradient, -1.0);
        let Some((old_gradient, old_direction)) = previous.filter(|_| !restart) else {
            return steepest;
        };
        let beta = self.training_direction_method.calculate_parameter(old_gradient, gradient);
        let direction = vector::add_scaled(&steepest, old_direction, beta);
        if vector::dot(gradient, &direction) >= 0.0 {
            debug!(beta, "conjugate direction is not a descent direction, restarting");
            return steepest;
        }
        direction
    }
}

impl TrainingAlgorithm for ConjugateGradient {
    fn name(&self) -> &'static str {
        "ConjugateGradient"
    }

    #[instrument(level = "debug", skip_all, err)]
    fn perform_training(
        &self,
        network: &mut NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
    ) -> Result<TrainingResults> {
        let criteria = &self.stopping_criteria;
        let start = Instant::now();
        let mut results = TrainingResults::default();
        let mut tracker = GeneralizationTracker::default();

        let mut parameters = network.arrange_parameters();
        let parameters_number = parameters.len().max(1);
        let mut performance = term.calculate_performance(network, data_set)?;
        let mut previous: Option<(Vec<f64>, Vec<f64>)> = None;
        let mut training_rate: Option<f64> = None;
        let mut parameters_increment_norm: Option<f64> = None;
        let mut performance_increase: Option<f64> = None;
        let mut iteration = 0;

        loop {
            let gradient = term.calculate_gradient(network, data_set)?;
            let gradient_norm = vector::norm(&gradient);
            let generalization_performance = term.calculate_generalization_performance(network, data_set)?;
            let generalization_failures = tracker.update(generalization_performance);

            let restart = iteration % parameters_number == 0;
            let conjugate = self.calculate_conjugate_direction(
                previous.as_ref().map(|(g, d)| (g.as_slice(), d.as_slice())),
                &gradient,
                restart,
            );
            let direction = normalized(&conjugate);

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
                training_direction: Some(&direction),
                training_rate,
                parameters_increment_norm,
                performance_increase,
                damping_parameter: None,
            };
            criteria.warn(&state);
            results.record(&self.reserve, &state);
            if let Some(condition) = criteria.check(&state) {
                return Ok(finish(self.name(), results, &state, condition));
            }
            criteria.display(self.name(), &state);

            let initial_rate = training_rate.filter(|&r| r > 0.0).unwrap_or(self.first_training_rate);
            let point = self.training_rate_algorithm.calculate_directional_point(
                network,
                data_set,
                term,
                performance,
                &direction,
                initial_rate,
            )?;

            let increment = vector::scale(&direction, point.training_rate);
            network.set_parameters(&vector::add_scaled(&parameters, &direction, point.training_rate))?;
            parameters = network.arrange_parameters();
            let new_performance = term.calculate_performance(network, data_set)?;

            previous = Some((gradient, conjugate));
            training_rate = Some(point.training_rate);
            parameters_increment_norm = Some(vector::norm(&increment));
            performance_increase = Some(performance - new_performance);
            performance = new_performance;
            iteration += 1;
        }
    }
}
