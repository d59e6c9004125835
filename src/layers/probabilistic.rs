use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::layer::Layer;
use crate::math::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbabilisticMethod {
    NoProbabilistic,
    /// 1 when the output is at least 0.5, 0 otherwise.
    Binary,
    /// Clamps each output into [0, 1].
    Probability,
    /// One-hot vector of the largest output.
    Competitive,
    Softmax,
}

/// Turns the network outputs into a probability-like vector.
///
/// `Binary` and `Competitive` are piecewise constant, so their Jacobian is
/// zero wherever it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticLayer {
    pub probabilistic_neurons_number: usize,
    pub probabilistic_method: ProbabilisticMethod,
}

impl ProbabilisticLayer {
    pub fn new(probabilistic_neurons_number: usize, probabilistic_method: ProbabilisticMethod) -> ProbabilisticLayer {
        ProbabilisticLayer { probabilistic_neurons_number, probabilistic_method }
    }

    pub fn prune_output(&mut self, index: usize) -> Result<()> {
        if index >= self.probabilistic_neurons_number {
            return Err(Error::InvalidConfig(format!("cannot prune probabilistic neuron {index}")));
        }
        self.probabilistic_neurons_number -= 1;
        Ok(())
    }

    fn softmax(inputs: &[f64]) -> Vec<f64> {
        let max = inputs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exponentials: Vec<f64> = inputs.iter().map(|x| (x - max).exp()).collect();
        let sum: f64 = exponentials.iter().sum();
        exponentials.iter().map(|e| e / sum).collect()
    }
}

impl Layer for ProbabilisticLayer {
    const NAME: &'static str = "ProbabilisticLayer";

    fn inputs_number(&self) -> usize {
        self.probabilistic_neurons_number
    }

    fn outputs_number(&self) -> usize {
        self.probabilistic_neurons_number
    }

    fn calculate_outputs(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        self.check_inputs(inputs)?;
        Ok(match self.probabilistic_method {
            ProbabilisticMethod::NoProbabilistic => inputs.to_vec(),
            ProbabilisticMethod::Binary => inputs.iter().map(|&x| if x < 0.5 { 0.0 } else { 1.0 }).collect(),
            ProbabilisticMethod::Probability => inputs.iter().map(|&x| x.clamp(0.0, 1.0)).collect(),
            ProbabilisticMethod::Competitive => {
                let winner = inputs
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i);
                (0..inputs.len()).map(|i| if Some(i) == winner { 1.0 } else { 0.0 }).collect()
            }
            ProbabilisticMethod::Softmax => Self::softmax(inputs),
        })
    }

    fn calculate_jacobian(&self, inputs: &[f64]) -> Result<Matrix> {
        self.check_inputs(inputs)?;
        let n = inputs.len();
        Ok(match self.probabilistic_method {
            ProbabilisticMethod::NoProbabilistic => Matrix::identity(n),
            ProbabilisticMethod::Binary | ProbabilisticMethod::Competitive => Matrix::zeros(n, n),
            ProbabilisticMethod::Probability => Matrix::diagonal(
                &inputs.iter().map(|&x| if (0.0..=1.0).contains(&x) { 1.0 } else { 0.0 }).collect::<Vec<_>>(),
            ),
            ProbabilisticMethod::Softmax => {
                let s = Self::softmax(inputs);
                let mut jacobian = Matrix::zeros(n, n);
                for i in 0..n {
                    for j in 0..n {
                        let delta = if i == j { 1.0 } else { 0.0 };
                        jacobian[(i, j)] = s[i] * (delta - s[j]);
                    }
                }
                jacobian
            }
        })
    }

    fn calculate_hessian_form(&self, inputs: &[f64]) -> Result<Vec<Matrix>> {
        self.check_inputs(inputs)?;
        let n = inputs.len();
        if self.probabilistic_method != ProbabilisticMethod::Softmax {
            return Ok(vec![Matrix::zeros(n, n); n]);
        }

        let s = Self::softmax(inputs);
        let kronecker = |a: usize, b: usize| if a == b { 1.0 } else { 0.0 };
        Ok((0..n)
            .map(|i| {
                let mut h = Matrix::zeros(n, n);
                for j in 0..n {
                    for k in 0..n {
                        h[(j, k)] = s[i]
                            * ((kronecker(i, j) - s[j]) * (kronecker(i, k) - s[k])
                                - s[j] * (kronecker(j, k) - s[k]));
                    }
                }
                h
            })
            .collect())
    }
}
