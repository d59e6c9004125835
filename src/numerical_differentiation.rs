//! Finite-difference derivatives of plain closures, used to cross-check the
//! analytic back-propagation.

use serde::{Serialize, Deserialize};

use crate::math::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumericalDifferentiationMethod {
    ForwardDifferences,
    #[default]
    CentralDifferences,
}

/// Finite differences with steps scaled to the magnitude of each coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NumericalDifferentiation {
    pub method: NumericalDifferentiationMethod,
}

impl NumericalDifferentiation {
    pub fn new(method: NumericalDifferentiationMethod) -> Self {
        NumericalDifferentiation { method }
    }

    /// Step balancing truncation against round-off for the current method.
    fn calculate_step(&self, x: f64) -> f64 {
        let eta = match self.method {
            NumericalDifferentiationMethod::ForwardDifferences => f64::EPSILON.sqrt(),
            NumericalDifferentiationMethod::CentralDifferences => f64::EPSILON.cbrt(),
        };
        eta * (1.0 + x.abs())
    }

    /// Second-derivative step; coarser than the first-derivative one.
    fn calculate_second_step(&self, x: f64) -> f64 {
        let eta = match self.method {
            NumericalDifferentiationMethod::ForwardDifferences => f64::EPSILON.cbrt(),
            NumericalDifferentiationMethod::CentralDifferences => f64::EPSILON.powf(0.25),
        };
        eta * (1.0 + x.abs())
    }

    pub fn calculate_derivative<F>(&self, f: F, x: f64) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let h = self.calculate_step(x);
        match self.method {
            NumericalDifferentiationMethod::ForwardDifferences => (f(x + h) - f(x)) / h,
            NumericalDifferentiationMethod::CentralDifferences => (f(x + h) - f(x - h)) / (2.0 * h),
        }
    }

    pub fn calculate_second_derivative<F>(&self, f: F, x: f64) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let h = self.calculate_second_step(x);
        match self.method {
            NumericalDifferentiationMethod::ForwardDifferences => (f(x + 2.0 * h) - 2.0 * f(x + h) + f(x)) / (h * h),
            NumericalDifferentiationMethod::CentralDifferences => (f(x + h) - 2.0 * f(x) + f(x - h)) / (h * h),
        }
    }

    pub fn calculate_gradient<F>(&self, f: F, x: &[f64]) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64,
    {
        let row = self.calculate_jacobian(|p| vec![f(p)], x);
        row.row(0).to_vec()
    }

    /// Jacobian of a vector function, one row per output.
    pub fn calculate_jacobian<F>(&self, f: F, x: &[f64]) -> Matrix
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let base = match self.method {
            NumericalDifferentiationMethod::ForwardDifferences => Some(f(x)),
            NumericalDifferentiationMethod::CentralDifferences => None,
        };
        let mut shifted = x.to_vec();
        let mut columns = Vec::with_capacity(x.len());

        for j in 0..x.len() {
            let h = self.calculate_step(x[j]);
            shifted[j] = x[j] + h;
            let forward = f(&shifted);
            let column: Vec<f64> = match &base {
                Some(base) => forward.iter().zip(base).map(|(a, b)| (a - b) / h).collect(),
                None => {
                    shifted[j] = x[j] - h;
                    let backward = f(&shifted);
                    forward.iter().zip(&backward).map(|(a, b)| (a - b) / (2.0 * h)).collect()
                }
            };
            shifted[j] = x[j];
            columns.push(column);
        }

        let rows = columns.first().map_or(0, Vec::len);
        let mut jacobian = Matrix::zeros(rows, x.len());
        for (j, column) in columns.iter().enumerate() {
            for (i, value) in column.iter().enumerate() {
                jacobian[(i, j)] = *value;
            }
        }
        jacobian
    }

    pub fn calculate_hessian<F>(&self, f: F, x: &[f64]) -> Matrix
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = x.len();
        let mut hessian = Matrix::zeros(n, n);
        let mut shifted = x.to_vec();
        let mut at = |shifts: &[(usize, f64)]| {
            for &(k, shift) in shifts {
                shifted[k] += shift;
            }
            let value = f(&shifted);
            shifted.copy_from_slice(x);
            value
        };

        for i in 0..n {
            let hi = self.calculate_second_step(x[i]);
            for j in i..n {
                let hj = self.calculate_second_step(x[j]);
                let value = match self.method {
                    NumericalDifferentiationMethod::ForwardDifferences => {
                        (at(&[(i, hi), (j, hj)]) - at(&[(i, hi)]) - at(&[(j, hj)]) + at(&[])) / (hi * hj)
                    }
                    NumericalDifferentiationMethod::CentralDifferences => {
                        (at(&[(i, hi), (j, hj)]) - at(&[(i, hi), (j, -hj)]) - at(&[(i, -hi), (j, hj)])
                            + at(&[(i, -hi), (j, -hj)]))
                            / (4.0 * hi * hj)
                    }
                };
                hessian[(i, j)] = value;
                hessian[(j, i)] = value;
            }
        }
        hessian
    }
}
