//! Kupiec proportion-of-failures test: a likelihood-ratio check of the
//! observed breach frequency against the expected tail probability.

use crate::stats;

/// Returns `(LR statistic, p-value)` for `x` breaches in `n` tests with
/// expected tail probability `alpha`.
///
/// Both the observed rate and `alpha` are clipped away from 0 and 1 to
/// avoid log singularities. The p-value uses the chi-square(1) survival
/// function expressed through the standard normal CDF:
/// P(Chi2_1 >= lr) = 2 * (1 - Phi(sqrt(lr))).
pub fn kupiec_pof(n: usize, x: usize, alpha: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }

    let eps = 1e-12;
    let phat = (x as f64 / n as f64).clamp(eps, 1.0 - eps);
    let a = alpha.clamp(eps, 1.0 - eps);

    let nf = n as f64;
    let xf = x as f64;
    let ll_null = (nf - xf) * (1.0 - a).ln() + xf * a.ln();
    let ll_alt = (nf - xf) * (1.0 - phat).ln() + xf * phat.ln();
    let lr = -2.0 * (ll_null - ll_alt);

    let z = lr.max(0.0).sqrt();
    let p = 2.0 * (1.0 - stats::norm_cdf(z));

    (lr, p)
}
