use std::time::Instant;

use serde::{Serialize, Deserialize};
use tracing::instrument;

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

/// Steepest descent with a line search along the normalized negative gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientDescent {
    pub stopping_criteria: StoppingCriteria,
    pub reserve: ResultsReserve,
    pub training_rate_algorithm: TrainingRateAlgorithm,
    /// Trial step of the first line search; later searches start from the
    /// previous step.
    pub first_training_rate: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        GradientDescent {
            stopping_criteria: StoppingCriteria::default(),
            reserve: ResultsReserve::default(),
            training_rate_algorithm: TrainingRateAlgorithm::default(),
            first_training_rate: 0.01,
        }
    }
}

/// Unit vector along `-gradient`, or zeros at a stationary point.
pub(crate) fn descent_direction(gradient: &[f64]) -> Vec<f64> {
    let norm = vector::norm(gradient);
    if norm == 0.0 {
        vec![0.0; gradient.len()]
    } else {
        vector::scale(gradient, -1.0 / norm)
    }
}

impl TrainingAlgorithm for GradientDescent {
    fn name(&self) -> &'static str {
        "GradientDescent"
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
        let mut performance = term.calculate_performance(network, data_set)?;
        let mut training_rate: Option<f64> = None;
        let mut parameters_increment_norm: Option<f64> = None;
        let mut performance_increase: Option<f64> = None;
        let mut iteration = 0;

        loop {
            let gradient = term.calculate_gradient(network, data_set)?;
            let gradient_norm = vector::norm(&gradient);
            let generalization_performance = term.calculate_generalization_performance(network, data_set)?;
            let generalization_failures = tracker.update(generalization_performance);
            let direction = descent_direction(&gradient);

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

            training_rate = Some(point.training_rate);
            parameters_increment_norm = Some(vector::norm(&increment));
            performance_increase = Some(performance - new_performance);
            performance = new_performance;
            iteration += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::performance::SumSquaredError;
    use crate::training::StoppingCondition;
    use rand::{rngs::StdRng, SeedableRng};

    fn linear_problem() -> (NeuralNetwork, DataSet) {
        let mut network = NeuralNetwork::new(&[1, 1]).unwrap();
        network.set_parameters(&[0.0, 0.0]).unwrap();
        let inputs: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64 / 4.0]).collect();
        let targets: Vec<Vec<f64>> = inputs.iter().map(|x| vec![2.0 * x[0] - 1.0]).collect();
        (network, DataSet::from_inputs_targets(&inputs, &targets).unwrap())
    }

    #[test]
    fn fits_a_line() {
        let (mut network, data_set) = linear_problem();
        let algorithm = GradientDescent {
            stopping_criteria: StoppingCriteria { performance_goal: 1e-8, ..Default::default() },
            training_rate_algorithm: TrainingRateAlgorithm { training_rate_tolerance: 1e-9, ..Default::default() },
            ..Default::default()
        };
        let results = algorithm.perform_training(&mut network, &data_set, &SumSquaredError).unwrap();
        assert_eq!(results.stopping_condition, Some(StoppingCondition::PerformanceGoal), "{results:?}");
        assert!(results.final_performance <= 1e-8);
        assert_eq!(network.arrange_parameters(), results.final_parameters);
        let outputs = network.calculate_outputs(&[0.5]).unwrap();
        assert!(outputs[0].abs() < 1e-3);
    }

    #[test]
    fn performance_never_increases() {
        let mut network = NeuralNetwork::new(&[1, 3, 1]).unwrap();
        network.initialize_random_uniform_with(-1.0, 1.0, &mut StdRng::seed_from_u64(17)).unwrap();
        let inputs: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64 / 7.0]).collect();
        let targets: Vec<Vec<f64>> = inputs.iter().map(|x| vec![(3.0 * x[0]).sin()]).collect();
        let data_set = DataSet::from_inputs_targets(&inputs, &targets).unwrap();

        let algorithm = GradientDescent {
            stopping_criteria: StoppingCriteria { maximum_iterations_number: 30, ..Default::default() },
            ..Default::default()
        };
        let results = algorithm.perform_training(&mut network, &data_set, &SumSquaredError).unwrap();
        assert!(results.iterations_number <= 30);
        for pair in results.performance_history.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn zero_iterations_reports_the_initial_point() {
        let (mut network, data_set) = linear_problem();
        let algorithm = GradientDescent {
            stopping_criteria: StoppingCriteria { maximum_iterations_number: 0, ..Default::default() },
            ..Default::default()
        };
        let results = algorithm.perform_training(&mut network, &data_set, &SumSquaredError).unwrap();
        assert_eq!(results.stopping_condition, Some(StoppingCondition::MaximumIterationsNumber));
        assert_eq!(results.iterations_number, 0);
        assert_eq!(results.final_parameters, vec![0.0, 0.0]);
    }
}
