//! Shared numerical helpers for the estimator, decomposer, and backtester.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::RiskError;
use crate::RiskResult;

/// Diagonal jitter retries before a Cholesky failure becomes fatal.
const MAX_CHOLESKY_TRIES: u32 = 8;

// ---------------------------------------------------------------------------
// Standard normal wrappers
// ---------------------------------------------------------------------------

pub(crate) fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).expect("standard normal parameters are valid")
}

/// Quantile of the standard normal (negative in the left tail).
pub(crate) fn norm_inv(p: f64) -> f64 {
    standard_normal().inverse_cdf(p)
}

/// Standard normal density.
pub(crate) fn norm_pdf(x: f64) -> f64 {
    standard_normal().pdf(x)
}

/// Standard normal CDF.
pub(crate) fn norm_cdf(x: f64) -> f64 {
    standard_normal().cdf(x)
}

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator)
pub(crate) fn sample_variance(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
    sum_sq / (n - 1) as f64
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values, mean(values)).sqrt()
}

/// Per-column means of a row-major T x N matrix.
pub(crate) fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }
    let n = rows[0].len();
    let t = rows.len() as f64;
    let mut means = vec![0.0; n];
    for row in rows {
        for (m, x) in means.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    for m in &mut means {
        *m /= t;
    }
    means
}

/// Sample covariance matrix (n-1 denominator) of a row-major T x N matrix.
pub(crate) fn sample_covariance(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let t = rows.len();
    if t == 0 {
        return Vec::new();
    }
    let n = rows[0].len();
    let means = column_means(rows);
    let mut cov = vec![vec![0.0; n]; n];
    if t < 2 {
        return cov;
    }
    for row in rows {
        for i in 0..n {
            let di = row[i] - means[i];
            for j in i..n {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    let denom = (t - 1) as f64;
    for i in 0..n {
        for j in i..n {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

// ---------------------------------------------------------------------------
// Linear algebra
// ---------------------------------------------------------------------------

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Matrix-vector multiply: result[i] = sum_j mat[i][j] * v[j].
pub(crate) fn matrix_vector_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| dot(row, v)).collect()
}

/// Lower-triangular Cholesky factor, or None when the matrix is not
/// positive definite.
fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Cholesky with escalating diagonal jitter: starts at 1e-12, grows by a
/// factor of 10 per retry, and gives up after `MAX_CHOLESKY_TRIES` retries.
pub(crate) fn cholesky_with_jitter(matrix: &[Vec<f64>]) -> RiskResult<Vec<Vec<f64>>> {
    let mut m = matrix.to_vec();
    let mut jitter = 1e-12;
    let mut tries = 0u32;
    loop {
        if let Some(l) = cholesky(&m) {
            return Ok(l);
        }
        tries += 1;
        if tries > MAX_CHOLESKY_TRIES {
            return Err(RiskError::Numerical(format!(
                "covariance matrix is not positive definite after {MAX_CHOLESKY_TRIES} jitter attempts"
            )));
        }
        for (i, row) in m.iter_mut().enumerate() {
            row[i] += jitter;
        }
        jitter *= 10.0;
    }
}

// ---------------------------------------------------------------------------
// Quantiles
// ---------------------------------------------------------------------------

pub(crate) fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

/// Quantile of a **sorted** slice via linear interpolation at rank
/// q * (n - 1), with q in [0, 1].
pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Empirical VaR and ES of an outcome distribution (returns or P&L) at
/// left-tail probability `alpha`, both as positive loss magnitudes. The
/// ES tail is every value at or below the alpha quantile; an empty tail
/// falls back to the single worst observation.
pub(crate) fn empirical_var_es(values: &[f64], alpha: f64) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sort_ascending(&mut sorted);
    let q = quantile_sorted(&sorted, alpha);
    let tail: Vec<f64> = sorted.iter().copied().take_while(|v| *v <= q).collect();
    let es = if tail.is_empty() {
        -sorted[0]
    } else {
        -mean(&tail)
    };
    (-q, es)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_norm_inv_known_values() {
        assert!((norm_inv(0.05) - (-1.6449)).abs() < 1e-3);
        assert!((norm_inv(0.5)).abs() < 1e-12);
        assert!((norm_inv(0.95) - 1.6449).abs() < 1e-3);
    }

    #[test]
    fn test_norm_cdf_symmetry() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((norm_cdf(1.0) + norm_cdf(-1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_and_std() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&xs), 2.5);
        // sample variance = (2.25 + 0.25 + 0.25 + 2.25) / 3
        assert!((sample_std(&xs) - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_small_case() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let cov = sample_covariance(&rows);
        assert!((cov[0][0] - 1.0).abs() < 1e-12);
        assert!((cov[0][1] - 2.0).abs() < 1e-12);
        assert!((cov[1][0] - cov[0][1]).abs() < 1e-12);
        assert!((cov[1][1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        // rank 0.25 * 4 = 1.0 -> exactly the second element
        assert_eq!(quantile_sorted(&sorted, 0.25), 2.0);
        // rank 0.1 * 4 = 0.4 -> between 1.0 and 2.0
        assert!((quantile_sorted(&sorted, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_identity() {
        let eye = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let l = cholesky_with_jitter(&eye).unwrap();
        assert_eq!(l, eye);
    }

    #[test]
    fn test_cholesky_known_factor() {
        let m = vec![vec![4.0, 2.0], vec![2.0, 5.0]];
        let l = cholesky_with_jitter(&m).unwrap();
        assert!((l[0][0] - 2.0).abs() < 1e-12);
        assert!((l[1][0] - 1.0).abs() < 1e-12);
        assert!((l[1][1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_jitter_recovers_singular_matrix() {
        // Rank-deficient: second asset perfectly correlated with the first.
        let m = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let l = cholesky_with_jitter(&m).unwrap();
        // Reconstruction should stay close to the original matrix.
        let rebuilt = l[1][0] * l[1][0] + l[1][1] * l[1][1];
        assert!((rebuilt - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cholesky_fatal_on_negative_definite() {
        let m = vec![vec![-1.0, 0.0], vec![0.0, -1.0]];
        assert!(cholesky_with_jitter(&m).is_err());
    }

    #[test]
    fn test_matrix_vector_multiply() {
        let m = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(matrix_vector_multiply(&m, &[1.0, 1.0]), vec![3.0, 7.0]);
    }
}
