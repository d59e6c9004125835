use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Serialize, Deserialize};
use tracing::{debug, instrument};

use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::math::vector;
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;
use crate::training::training_algorithm::{
    finish, GeneralizationTracker, IterationState, StoppingCriteria, TrainingAlgorithm,
};
use crate::training::training_results::{ResultsReserve, TrainingResults};

/// Derivative-free search: steps of decaying length along random unit
/// directions, keeping only candidates that improve the performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSearch {
    pub stopping_criteria: StoppingCriteria,
    pub reserve: ResultsReserve,
    pub first_training_rate: f64,
    /// Multiplies the training rate every `training_rate_reduction_period`
    /// iterations.
    pub training_rate_reduction_factor: f64,
    pub training_rate_reduction_period: usize,
    /// Fixed seed for reproducible runs; entropy otherwise.
    pub seed: Option<u64>,
}

impl Default for RandomSearch {
    fn default() -> Self {
        RandomSearch {
            stopping_criteria: StoppingCriteria::default(),
            reserve: ResultsReserve::default(),
            first_training_rate: 0.01,
            training_rate_reduction_factor: 0.9,
            training_rate_reduction_period: 10,
            seed: None,
        }
    }
}

impl RandomSearch {
    fn validate(&self) -> Result<()> {
        if self.first_training_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "first training rate must be positive, got {}",
                self.first_training_rate
            )));
        }
        if self.training_rate_reduction_factor <= 0.0 || self.training_rate_reduction_factor > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "training rate reduction factor must lie in (0, 1], got {}",
                self.training_rate_reduction_factor
            )));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl TrainingAlgorithm for RandomSearch {
    fn name(&self) -> &'static str {
        "RandomSearch"
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
        let mut rng = self.rng();

        let mut parameters = network.arrange_parameters();
        let mut performance = term.calculate_performance(network, data_set)?;
        let mut generalization_performance = term.calculate_generalization_performance(network, data_set)?;
        let mut training_rate = self.first_training_rate;
        let mut iteration = 0;

        loop {
            let generalization_failures = tracker.update(generalization_performance);
            if iteration != 0
                && self.training_rate_reduction_period != 0
                && iteration % self.training_rate_reduction_period == 0
            {
                training_rate *= self.training_rate_reduction_factor;
            }
            let direction = vector::random_direction(parameters.len(), &mut rng);

            let state = IterationState {
                iteration,
                elapsed_time: start.elapsed().as_secs_f64(),
                parameters: &parameters,
                parameters_norm: vector::norm(&parameters),
                performance,
                generalization_performance,
                generalization_failures,
                gradient: None,
                gradient_norm: None,
                training_direction: Some(&direction),
                training_rate: Some(training_rate),
                parameters_increment_norm: None,
                performance_increase: None,
                damping_parameter: None,
            };
            criteria.warn(&state);
            results.record(&self.reserve, &state);
            if let Some(condition) = criteria.check(&state) {
                return Ok(finish(self.name(), results, &state, condition));
            }
            criteria.display(self.name(), &state);

            let candidate = vector::add_scaled(&parameters, &direction, training_rate);
            let candidate_performance = term.calculate_performance_at(network, data_set, &candidate)?;
            if candidate_performance < performance {
                network.set_parameters(&candidate)?;
                parameters = network.arrange_parameters();
                performance = candidate_performance;
                generalization_performance = term.calculate_generalization_performance(network, data_set)?;
            } else {
                debug!(iteration, candidate_performance, "random step rejected");
            }
            iteration += 1;
        }
    }
}
