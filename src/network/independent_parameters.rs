use serde::{Serialize, Deserialize};

use crate::error::{ensure_size, Result};
use crate::layers::bounding::check_bounds;
use crate::layers::{BoundingMethod, ScalingMethod};
use crate::math::Statistics;
use crate::network::variables::Variables;

const MINIMUM_RANGE: f64 = 1e-99;

/// Free scalars optimized together with the layer parameters but not tied to
/// any network input.
///
/// The values are stored unscaled. The optimizer sees them scaled with
/// `scaling_method`, and scaled values written back are unscaled and then
/// clamped into the bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndependentParameters {
    pub parameters: Vec<f64>,
    #[serde(default)]
    pub information: Variables,
    pub statistics: Vec<Statistics>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub scaling_method: ScalingMethod,
    pub bounding_method: BoundingMethod,
}

impl IndependentParameters {
    pub fn new(parameters: Vec<f64>) -> IndependentParameters {
        let n = parameters.len();
        IndependentParameters {
            parameters,
            information: Variables::new(n),
            statistics: vec![Statistics::default(); n],
            lower_bounds: vec![f64::MIN; n],
            upper_bounds: vec![f64::MAX; n],
            scaling_method: ScalingMethod::MinimumMaximum,
            bounding_method: BoundingMethod::NoBounding,
        }
    }

    pub fn count_parameters_number(&self) -> usize {
        self.parameters.len()
    }

    pub fn set_statistics(&mut self, statistics: Vec<Statistics>) -> Result<()> {
        ensure_size("IndependentParameters::set_statistics", self.parameters.len(), statistics.len())?;
        self.statistics = statistics;
        Ok(())
    }

    pub fn set_bounds(&mut self, lower_bounds: Vec<f64>, upper_bounds: Vec<f64>) -> Result<()> {
        ensure_size("IndependentParameters::set_bounds", self.parameters.len(), lower_bounds.len())?;
        check_bounds("IndependentParameters::set_bounds", &lower_bounds, &upper_bounds)?;
        self.lower_bounds = lower_bounds;
        self.upper_bounds = upper_bounds;
        self.bounding_method = BoundingMethod::Bounding;
        Ok(())
    }

    /// Checks that statistics and bounds cover every parameter and that the
    /// bounds are ordered.
    pub fn validate(&self) -> Result<()> {
        const CONTEXT: &str = "IndependentParameters::validate";
        let n = self.parameters.len();
        ensure_size(CONTEXT, n, self.statistics.len())?;
        ensure_size(CONTEXT, n, self.lower_bounds.len())?;
        check_bounds(CONTEXT, &self.lower_bounds, &self.upper_bounds)
    }

    pub fn calculate_scaled_parameters(&self) -> Vec<f64> {
        self.parameters
            .iter()
            .zip(&self.statistics)
            .map(|(&p, s)| match self.scaling_method {
                ScalingMethod::NoScaling => p,
                ScalingMethod::MinimumMaximum if s.range() >= MINIMUM_RANGE => 2.0 * (p - s.minimum) / s.range() - 1.0,
                ScalingMethod::MeanStandardDeviation if s.standard_deviation >= MINIMUM_RANGE => {
                    (p - s.mean) / s.standard_deviation
                }
                _ => p,
            })
            .collect()
    }

    pub fn unscale_parameters(&self, scaled: &[f64]) -> Vec<f64> {
        scaled
            .iter()
            .zip(&self.statistics)
            .map(|(&p, s)| match self.scaling_method {
                ScalingMethod::NoScaling => p,
                ScalingMethod::MinimumMaximum if s.range() >= MINIMUM_RANGE => 0.5 * (p + 1.0) * s.range() + s.minimum,
                ScalingMethod::MeanStandardDeviation if s.standard_deviation >= MINIMUM_RANGE => {
                    s.mean + p * s.standard_deviation
                }
                _ => p,
            })
            .collect()
    }

    pub fn set_scaled_parameters(&mut self, scaled: &[f64]) -> Result<()> {
        ensure_size("IndependentParameters::set_scaled_parameters", self.parameters.len(), scaled.len())?;
        let mut parameters = self.unscale_parameters(scaled);
        if self.bounding_method == BoundingMethod::Bounding {
            for ((p, &lower), &upper) in parameters.iter_mut().zip(&self.lower_bounds).zip(&self.upper_bounds) {
                *p = p.clamp(lower, upper);
            }
        }
        self.parameters = parameters;
        Ok(())
    }
}
