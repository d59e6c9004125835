//! Dense vector helpers over `&[f64]`.

use rand::Rng;

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

pub fn sum_squared(a: &[f64]) -> f64 {
    dot(a, a)
}

pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

pub fn scale(a: &[f64], factor: f64) -> Vec<f64> {
    a.iter().map(|x| x * factor).collect()
}

/// `a + factor · b`.
pub fn add_scaled(a: &[f64], b: &[f64], factor: f64) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    a.iter().zip(b).map(|(x, y)| x + factor * y).collect()
}

/// `a += factor · b` in place.
pub fn axpy(a: &mut [f64], b: &[f64], factor: f64) {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    for (x, y) in a.iter_mut().zip(b) {
        *x += factor * y;
    }
}

pub fn hadamard(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "vectors are of incorrect sizes");
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

pub fn mean(a: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().sum::<f64>() / a.len() as f64
}

/// Sample standard deviation (n - 1 denominator); zero for fewer than two values.
pub fn standard_deviation(a: &[f64]) -> f64 {
    if a.len() < 2 {
        return 0.0;
    }
    let m = mean(a);
    let ss: f64 = a.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (a.len() - 1) as f64).sqrt()
}

/// Unit vector with components drawn uniformly from [-1, 1].
pub fn random_direction<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Vec<f64> {
    loop {
        let v: Vec<f64> = (0..size).map(|_| rng.gen_range(-1.0..=1.0)).collect();
        let n = norm(&v);
        if n > 1e-12 || size == 0 {
            return if size == 0 { v } else { scale(&v, 1.0 / n) };
        }
    }
}

pub fn is_finite(a: &[f64]) -> bool {
    a.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn standard_deviation_uses_sample_denominator() {
        assert!((standard_deviation(&[1.0, 2.0, 3.0, 4.0]) - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(standard_deviation(&[5.0]), 0.0);
    }

    #[test]
    fn random_direction_is_unit_length() {
        let mut rng = StdRng::seed_from_u64(3);
        for size in 1..6 {
            assert!((norm(&random_direction(size, &mut rng)) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn add_scaled_matches_axpy() {
        let mut a = vec![1.0, 2.0];
        let b = [0.5, -1.0];
        let expected = add_scaled(&a, &b, 2.0);
        axpy(&mut a, &b, 2.0);
        assert_eq!(a, expected);
    }
}
