use serde::{Serialize, Deserialize};

use crate::math::vector;

/// Descriptive statistics of one variable, as consumed by the scaling layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub standard_deviation: f64,
}

impl Default for Statistics {
    /// Statistics under which min-max and mean/std scaling are both the identity.
    fn default() -> Self {
        Statistics { minimum: -1.0, maximum: 1.0, mean: 0.0, standard_deviation: 1.0 }
    }
}

impl Statistics {
    pub fn new(minimum: f64, maximum: f64, mean: f64, standard_deviation: f64) -> Self {
        Statistics { minimum, maximum, mean, standard_deviation }
    }

    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Statistics::default();
        }
        Statistics {
            minimum: values.iter().copied().fold(f64::INFINITY, f64::min),
            maximum: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: vector::mean(values),
            standard_deviation: vector::standard_deviation(values),
        }
    }

    pub fn range(&self) -> f64 {
        self.maximum - self.minimum
    }
}
