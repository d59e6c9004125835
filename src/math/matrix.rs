use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul, Index, IndexMut};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix{
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix{
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix { rows, cols, data: vec![vec![value; cols]; rows] }
    }

    pub fn identity(size: usize) -> Matrix {
        let mut res = Matrix::zeros(size, size);
        for i in 0..size {
            res.data[i][i] = 1.0;
        }
        res
    }

    /// Square matrix with `diagonal` on its main diagonal.
    pub fn diagonal(diagonal: &[f64]) -> Matrix {
        let mut res = Matrix::zeros(diagonal.len(), diagonal.len());
        for (i, &d) in diagonal.iter().enumerate() {
            res.data[i][i] = d;
        }
        res
    }

    /// Uniform samples in [-1, 1].
    pub fn random(rows: usize, cols: usize) -> Matrix {
        Matrix::random_uniform(rows, cols, -1.0, 1.0, &mut rand::thread_rng())
    }

    pub fn random_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, minimum: f64, maximum: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);

        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = minimum + rng.gen::<f64>() * (maximum - minimum);
            }

        }

        res
    }

    /// Samples from N(mean, standard_deviation).
    pub fn random_normal<R: Rng + ?Sized>(rows: usize, cols: usize, mean: f64, standard_deviation: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = mean + sample_standard_normal(rng) * standard_deviation;
            }
        }
        res
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map_or(0, |row| row.len()),
            data
        }
    }

    /// Single-column matrix.
    pub fn column_vector(values: &[f64]) -> Matrix {
        Matrix::from_data(values.iter().map(|&v| vec![v]).collect())
    }

    /// `a ⊗ b`: rows indexed by `a`, columns by `b`.
    pub fn outer(a: &[f64], b: &[f64]) -> Matrix {
        Matrix::from_data_shaped(
            a.len(),
            b.len(),
            a.iter().map(|&x| b.iter().map(|&y| x * y).collect()).collect(),
        )
    }

    fn from_data_shaped(rows: usize, cols: usize, data: Vec<Vec<f64>>) -> Matrix {
        Matrix { rows, cols, data }
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.data.iter().map(|row| row[j]).collect()
    }

    pub fn set_row(&mut self, i: usize, values: &[f64]) {
        self.data[i].copy_from_slice(values);
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix::from_data_shaped(
            self.rows,
            self.cols,
            self.data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect()
        )
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    /// `M · v`.
    pub fn dot_vector(&self, vector: &[f64]) -> Vec<f64> {
        assert_eq!(self.cols, vector.len(), "Matrices are of incorrect sizes");
        self.data
            .iter()
            .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// `vᵀ · M`, equivalently `Mᵀ · v`.
    pub fn transpose_dot_vector(&self, vector: &[f64]) -> Vec<f64> {
        assert_eq!(self.rows, vector.len(), "Matrices are of incorrect sizes");
        let mut res = vec![0.0; self.cols];
        for (row, &v) in self.data.iter().zip(vector) {
            if v == 0.0 {
                continue;
            }
            for (r, &m) in res.iter_mut().zip(row) {
                *r += v * m;
            }
        }
        res
    }

    /// Adds `factor · other` in place.
    pub fn add_scaled(&mut self, other: &Matrix, factor: f64) {
        assert!(self.rows == other.rows && self.cols == other.cols, "Matrices are of incorrect sizes");
        for (row, other_row) in self.data.iter_mut().zip(&other.data) {
            for (x, &y) in row.iter_mut().zip(other_row) {
                *x += factor * y;
            }
        }
    }

    pub fn sum_diagonal(&mut self, value: f64) {
        for i in 0..self.rows.min(self.cols) {
            self.data[i][i] += value;
        }
    }

    pub fn remove_row(&mut self, i: usize) {
        self.data.remove(i);
        self.rows -= 1;
    }

    pub fn remove_column(&mut self, j: usize) {
        for row in &mut self.data {
            row.remove(j);
        }
        self.cols -= 1;
    }

    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        self.is_square() && (0..self.rows).all(|i| {
            (0..i).all(|j| (self.data[i][j] - self.data[j][i]).abs() <= tolerance)
        })
    }

    /// Solves `self · x = b` by Gaussian elimination with partial pivoting.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        if !self.is_square() {
            return Err(Error::size_mismatch("Matrix::solve", self.rows, self.cols));
        }
        if b.len() != self.rows {
            return Err(Error::size_mismatch("Matrix::solve", self.rows, b.len()));
        }

        let n = self.rows;
        let mut a = self.data.clone();
        let mut x = b.to_vec();

        for k in 0..n {
            let pivot = (k..n)
                .max_by(|&i, &j| a[i][k].abs().total_cmp(&a[j][k].abs()))
                .unwrap_or(k);
            if a[pivot][k].abs() < 1e-300 {
                return Err(Error::degenerate("Matrix::solve", "matrix is singular"));
            }
            a.swap(k, pivot);
            x.swap(k, pivot);

            for i in k + 1..n {
                let factor = a[i][k] / a[k][k];
                if factor == 0.0 {
                    continue;
                }
                for j in k..n {
                    a[i][j] -= factor * a[k][j];
                }
                x[i] -= factor * x[k];
            }
        }

        for k in (0..n).rev() {
            let tail: f64 = (k + 1..n).map(|j| a[k][j] * x[j]).sum();
            x[k] = (x[k] - tail) / a[k][k];
        }

        Ok(x)
    }
}

/// Samples a single value from N(0, 1) using the Box-Muller transform.
/// Both u1 and u2 must be uniform on (0, 1].
pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Draw two independent uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i][j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i][j]
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, self.cols);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[i][j] = self.data[i][j] + rhs.data[i][j];
            }
        }

        res
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, self.cols);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[i][j] = self.data[i][j] - rhs.data[i][j];
            }
        }

        res
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res =  Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for k in 0..self.cols {
                let a = self.data[i][k];
                if a == 0.0 {
                    continue;
                }
                for j in 0..res.cols {
                    res.data[i][j] += a * rhs.data[k][j];
                }
            }
        }

        res
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn product_with_identity_is_a_no_op() {
        let m = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(&Matrix::identity(2) * &m, m);
        assert_eq!(&m * &Matrix::identity(3), m);
    }

    #[test]
    fn transpose_dot_vector_matches_explicit_transpose() {
        let m = Matrix::from_data(vec![vec![1.0, -2.0], vec![0.5, 3.0], vec![2.0, 1.0]]);
        let v = [1.0, 2.0, -1.0];
        assert_eq!(m.transpose_dot_vector(&v), m.transpose().dot_vector(&v));
    }

    #[test]
    fn outer_product_has_rank_one_shape() {
        let m = Matrix::outer(&[1.0, 2.0], &[3.0, 4.0, 5.0]);
        assert_eq!((m.rows, m.cols), (2, 3));
        assert_eq!(m[(1, 2)], 10.0);
    }

    #[test]
    fn solve_recovers_known_solution() {
        let a = Matrix::from_data(vec![
            vec![0.0, 2.0, 1.0],
            vec![1.0, 1.0, 0.0],
            vec![3.0, 0.0, 1.0],
        ]);
        let x = [1.0, -2.0, 0.5];
        let b = a.dot_vector(&x);
        let solved = a.solve(&b).unwrap();
        for (s, e) in solved.iter().zip(x) {
            assert!((s - e).abs() < 1e-12);
        }
    }

    #[test]
    fn solve_rejects_singular_matrix() {
        let a = Matrix::from_data(vec![vec![1.0, 2.0], vec![2.0, 4.0]]);
        assert!(matches!(a.solve(&[1.0, 2.0]), Err(Error::Degenerate { .. })));
    }

    #[test]
    fn remove_row_and_column_update_shape() {
        let mut m = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        m.remove_column(1);
        m.remove_row(0);
        assert_eq!(m, Matrix::from_data(vec![vec![4.0, 6.0]]));
    }

    #[test]
    fn random_uniform_respects_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = Matrix::random_uniform(5, 5, -0.5, 0.25, &mut rng);
        assert!(m.data.iter().flatten().all(|&x| (-0.5..=0.25).contains(&x)));
    }
}
