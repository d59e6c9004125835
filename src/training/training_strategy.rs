use serde::{Serialize, Deserialize};

use crate::data::DataSet;
use crate::error::Result;
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;
use crate::training::conjugate_gradient::ConjugateGradient;
use crate::training::gradient_descent::GradientDescent;
use crate::training::levenberg_marquardt::LevenbergMarquardt;
use crate::training::random_search::RandomSearch;
use crate::training::training_algorithm::TrainingAlgorithm;
use crate::training::training_results::TrainingResults;

/// A training algorithm chosen by configuration.
///
/// Serialized with an `algorithm` tag next to the algorithm's own settings:
///
/// ```json
/// { "algorithm": "GradientDescent", "first_training_rate": 0.05 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum TrainingStrategy {
    RandomSearch(RandomSearch),
    GradientDescent(GradientDescent),
    ConjugateGradient(ConjugateGradient),
    LevenbergMarquardt(LevenbergMarquardt),
}

impl Default for TrainingStrategy {
    fn default() -> Self {
        TrainingStrategy::LevenbergMarquardt(LevenbergMarquardt::default())
    }
}

impl TrainingStrategy {
    pub fn algorithm(&self) -> &dyn TrainingAlgorithm {
        match self {
            TrainingStrategy::RandomSearch(a) => a,
            TrainingStrategy::GradientDescent(a) => a,
            TrainingStrategy::ConjugateGradient(a) => a,
            TrainingStrategy::LevenbergMarquardt(a) => a,
        }
    }

    pub fn perform_training(
        &self,
        network: &mut NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
    ) -> Result<TrainingResults> {
        self.algorithm().perform_training(network, data_set, term)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<TrainingStrategy> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
