use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::data::DataSet;
use crate::error::{Error, Result};
use crate::math::vector;
use crate::network::NeuralNetwork;
use crate::performance::PerformanceTerm;

const GOLDEN_STEP: f64 = 0.381966;
const MAXIMUM_REDUCTION_ITERATIONS: usize = 1000;

/// How the step length along a training direction is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrainingRateMethod {
    /// Always the first training rate.
    Fixed,
    GoldenSection,
    #[default]
    BrentMethod,
}

/// A (training rate, performance) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalPoint {
    pub training_rate: f64,
    pub performance: f64,
}

/// Three points along a direction with `a < b < c` and `f(b)` below both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub a: DirectionalPoint,
    pub b: DirectionalPoint,
    pub c: DirectionalPoint,
}

impl Triplet {
    fn length(&self) -> f64 {
        self.c.training_rate - self.a.training_rate
    }

    /// Narrows the bracket around `b` with the new point `x`.
    fn update(&mut self, x: DirectionalPoint) {
        if x.performance < self.b.performance {
            if x.training_rate < self.b.training_rate {
                self.c = self.b;
            } else {
                self.a = self.b;
            }
            self.b = x;
        } else if x.training_rate < self.b.training_rate {
            self.a = x;
        } else {
            self.c = x;
        }
    }

    fn golden_section_point(&self) -> f64 {
        let (a, b, c) = (self.a.training_rate, self.b.training_rate, self.c.training_rate);
        if b - a > c - b {
            b - GOLDEN_STEP * (b - a)
        } else {
            b + GOLDEN_STEP * (c - b)
        }
    }

    /// Minimum of the parabola through the three points, when it lies
    /// strictly inside the bracket.
    fn parabola_minimum(&self) -> Option<f64> {
        let (a, b, c) = (self.a.training_rate, self.b.training_rate, self.c.training_rate);
        let (fa, fb, fc) = (self.a.performance, self.b.performance, self.c.performance);

        let numerator = (b - a).powi(2) * (fb - fc) - (b - c).powi(2) * (fb - fa);
        let denominator = (b - a) * (fb - fc) - (b - c) * (fb - fa);
        if denominator.abs() < f64::EPSILON {
            return None;
        }
        let x = b - 0.5 * numerator / denominator;
        (x > a && x < c && x != b).then_some(x)
    }
}

/// Line search used by the gradient-based algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingRateAlgorithm {
    pub training_rate_method: TrainingRateMethod,
    pub bracketing_factor: f64,
    /// Bracket length at which the search stops.
    pub training_rate_tolerance: f64,
    /// Expansion of the bracket stops at this rate.
    pub error_training_rate: f64,
}

impl Default for TrainingRateAlgorithm {
    fn default() -> Self {
        TrainingRateAlgorithm {
            training_rate_method: TrainingRateMethod::default(),
            bracketing_factor: 1.5,
            training_rate_tolerance: 1.0e-3,
            error_training_rate: 1.0e10,
        }
    }
}

/// Performance of the network moved `rate` along `direction`.
struct DirectionalFunction<'a> {
    network: &'a NeuralNetwork,
    data_set: &'a DataSet,
    term: &'a dyn PerformanceTerm,
    parameters: Vec<f64>,
    direction: &'a [f64],
}

impl DirectionalFunction<'_> {
    fn evaluate(&self, training_rate: f64) -> Result<DirectionalPoint> {
        let candidate = vector::add_scaled(&self.parameters, self.direction, training_rate);
        Ok(DirectionalPoint {
            training_rate,
            performance: self.term.calculate_performance_at(self.network, self.data_set, &candidate)?,
        })
    }
}

impl TrainingRateAlgorithm {
    pub fn new(training_rate_method: TrainingRateMethod) -> Self {
        TrainingRateAlgorithm { training_rate_method, ..Default::default() }
    }

    fn validate(&self) -> Result<()> {
        if self.bracketing_factor <= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "bracketing factor must exceed 1, got {}",
                self.bracketing_factor
            )));
        }
        if self.training_rate_tolerance <= 0.0 {
            return Err(Error::InvalidConfig("training rate tolerance must be positive".into()));
        }
        Ok(())
    }

    /// Finds a triplet bracketing a minimum along `direction`, starting from a
    /// trial step of `initial_training_rate`.
    ///
    /// Returns `Ok(None)` when no step length below machine epsilon improves
    /// on `performance`.
    fn calculate_bracketing_triplet(
        &self,
        function: &DirectionalFunction,
        performance: f64,
        initial_training_rate: f64,
    ) -> Result<Option<Triplet>> {
        let a = DirectionalPoint { training_rate: 0.0, performance };
        let mut b = function.evaluate(initial_training_rate)?;

        if b.performance >= a.performance {
            // Shrink until an interior point beats the origin.
            let mut c = b;
            for _ in 0..MAXIMUM_REDUCTION_ITERATIONS {
                b = function.evaluate(c.training_rate / self.bracketing_factor)?;
                if b.performance < a.performance {
                    return Ok(Some(Triplet { a, b, c }));
                }
                if b.training_rate < f64::EPSILON {
                    break;
                }
                c = b;
            }
            return Ok(None);
        }

        // Expand until the performance turns up again.
        let mut a = a;
        let mut c = function.evaluate(b.training_rate * self.bracketing_factor)?;
        while c.performance <= b.performance {
            if c.training_rate >= self.error_training_rate {
                debug!(training_rate = c.training_rate, "bracket expansion hit the error training rate");
                return Ok(Some(Triplet { a: c, b: c, c }));
            }
            a = b;
            b = c;
            c = function.evaluate(b.training_rate * self.bracketing_factor)?;
        }
        Ok(Some(Triplet { a, b, c }))
    }

    /// Training rate and resulting performance along `direction`.
    ///
    /// Except for [`TrainingRateMethod::Fixed`], the returned performance never
    /// exceeds `performance`; a zero rate means no improving step was found.
    pub fn calculate_directional_point(
        &self,
        network: &NeuralNetwork,
        data_set: &DataSet,
        term: &dyn PerformanceTerm,
        performance: f64,
        direction: &[f64],
        initial_training_rate: f64,
    ) -> Result<DirectionalPoint> {
        self.validate()?;
        let function = DirectionalFunction {
            network,
            data_set,
            term,
            parameters: network.arrange_parameters(),
            direction,
        };

        if self.training_rate_method == TrainingRateMethod::Fixed {
            return function.evaluate(initial_training_rate);
        }

        let Some(mut triplet) = self.calculate_bracketing_triplet(&function, performance, initial_training_rate)? else {
            debug!("no descent along the training direction");
            return Ok(DirectionalPoint { training_rate: 0.0, performance });
        };

        let mut iterations = 0;
        while triplet.length() > self.training_rate_tolerance && iterations < MAXIMUM_REDUCTION_ITERATIONS {
            let x = match self.training_rate_method {
                TrainingRateMethod::BrentMethod => {
                    triplet.parabola_minimum().unwrap_or_else(|| triplet.golden_section_point())
                }
                _ => triplet.golden_section_point(),
            };
            triplet.update(function.evaluate(x)?);
            iterations += 1;
        }

        debug!(
            training_rate = triplet.b.training_rate,
            performance = triplet.b.performance,
            iterations,
            "line search finished"
        );
        Ok(triplet.b)
    }
}
