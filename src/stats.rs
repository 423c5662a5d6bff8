//! Posterior summary statistics computed from per-chain draws.
//!
//! All functions take a `chains x draws` matrix for a single scalar parameter and follow the
//! conventions of Stan's `summary` output: linear-interpolated quantiles, an effective sample
//! size from FFT autocovariances with Geyer's initial monotone sequence, and split R-hat.

use ndarray::prelude::*;
use ndarray_stats::interpolate::Linear;
use ndarray_stats::QuantileExt;
use noisy_float::types::n64;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Column names of a summary row, in order.
pub const SUMMARY_COLUMNS: [&str; 10] = [
    "mean", "se_mean", "sd", "2.5%", "25%", "50%", "75%", "97.5%", "n_eff", "Rhat",
];

const QUANTILES: [f64; 5] = [0.025, 0.25, 0.5, 0.75, 0.975];

/// Summary of one scalar parameter, one value per [`SUMMARY_COLUMNS`] entry.
pub fn summarize(draws: ArrayView2<f64>) -> [f64; 10] {
    let mut flat: Array1<f64> = draws.iter().copied().collect();
    let mean = flat.mean().unwrap_or(f64::NAN);
    let sd = if flat.len() > 1 { flat.std(1.0) } else { f64::NAN };
    let n_eff = effective_sample_size(draws);
    let se_mean = sd / n_eff.sqrt();
    let q = QUANTILES.map(|p| quantile(&mut flat, p));
    [
        mean,
        se_mean,
        sd,
        q[0],
        q[1],
        q[2],
        q[3],
        q[4],
        n_eff,
        split_rhat(draws),
    ]
}

/// Quantile `p` with linear interpolation between order statistics, ignoring `NaN`s.
/// `NaN` if nothing is left.
pub fn quantile(x: &mut Array1<f64>, p: f64) -> f64 {
    x.quantile_axis_skipnan_mut(Axis(0), n64(p), &Linear)
        .map(|q| q.into_scalar())
        .unwrap_or(f64::NAN)
}

/// Autocovariance at every lag `0..n` of a single chain, normalised by `n`.
pub fn autocovariance(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let m = x.mean().unwrap_or(0.0);
    let len = (2 * n).next_power_of_two();
    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .map(|&v| Complex::new(v - m, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(len)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(len).process(&mut buf);
    for z in buf.iter_mut() {
        *z = Complex::new(z.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(len).process(&mut buf);

    buf.iter()
        .take(n)
        .map(|z| z.re / len as f64 / n as f64)
        .collect()
}

/// Effective sample size across all chains. `NaN` for fewer than four draws per chain or
/// for constant draws.
pub fn effective_sample_size(draws: ArrayView2<f64>) -> f64 {
    let (m, n) = draws.dim();
    if m == 0 || n < 4 {
        return f64::NAN;
    }

    let acov: Vec<Array1<f64>> = draws.outer_iter().map(autocovariance).collect();
    let chain_means: Array1<f64> = draws
        .outer_iter()
        .map(|c| c.mean().unwrap_or(f64::NAN))
        .collect();
    let nf = n as f64;
    let mean_var = acov.iter().map(|a| a[0] * nf / (nf - 1.0)).sum::<f64>() / m as f64;
    let mut var_plus = mean_var * (nf - 1.0) / nf;
    if m > 1 {
        var_plus += chain_means.var(1.0);
    }
    if !(var_plus > 0.0) {
        return f64::NAN;
    }

    let acov_at = |t: usize| acov.iter().map(|a| a[t]).sum::<f64>() / m as f64;
    let rho_at = |t: usize| 1.0 - (mean_var - acov_at(t)) / var_plus;

    let mut rho = vec![0.0; n];
    let mut rho_even = 1.0;
    let mut rho_odd = rho_at(1);
    rho[0] = rho_even;
    rho[1] = rho_odd;

    let mut s = 1;
    while s < n - 4 && rho_even + rho_odd > 0.0 {
        rho_even = rho_at(s + 1);
        rho_odd = rho_at(s + 2);
        if rho_even + rho_odd >= 0.0 {
            rho[s + 1] = rho_even;
            rho[s + 2] = rho_odd;
        }
        s += 2;
    }
    let max_s = s;
    if rho_even > 0.0 {
        rho[max_s + 1] = rho_even;
    }

    // Geyer's initial monotone sequence.
    let mut s = 1;
    while s + 3 <= max_s {
        if rho[s + 1] + rho[s + 2] > rho[s - 1] + rho[s] {
            rho[s + 1] = (rho[s - 1] + rho[s]) / 2.0;
            rho[s + 2] = rho[s + 1];
        }
        s += 2;
    }

    let total = (m * n) as f64;
    let tau = -1.0 + 2.0 * rho[..max_s].iter().sum::<f64>() + rho[max_s + 1];
    total / tau.max(1.0 / total.log10())
}

/// Split R-hat: every chain is cut in half (dropping the middle draw of odd-length chains)
/// and the potential scale reduction is computed over the `2m` halves.
pub fn split_rhat(draws: ArrayView2<f64>) -> f64 {
    let (m, n) = draws.dim();
    let half = n / 2;
    if m == 0 || half < 2 {
        return f64::NAN;
    }
    let halves: Vec<ArrayView1<f64>> = draws
        .outer_iter()
        .flat_map(|c| {
            let first = c.slice_move(s![..half]);
            let second = c.slice_move(s![n - half..]);
            [first, second]
        })
        .collect();

    let means: Array1<f64> = halves.iter().map(|h| h.mean().unwrap_or(f64::NAN)).collect();
    let within = halves
        .iter()
        .map(|h| h.var(1.0))
        .sum::<f64>()
        / halves.len() as f64;
    let between = means.var(1.0);
    let nf = half as f64;
    let var_plus = within * (nf - 1.0) / nf + between;
    (var_plus / within).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::Rng;
    use rand_distr::StandardNormal;

    use crate::distributions::seeded_rng;

    #[test]
    fn test_quantiles_linear() {
        let mut x = array![5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(quantile(&mut x, 0.5), 3.0);
        assert_eq!(quantile(&mut x, 0.0), 1.0);
        assert_eq!(quantile(&mut x, 1.0), 5.0);
        assert_abs_diff_eq!(quantile(&mut x, 0.25), 2.0);
        assert_abs_diff_eq!(quantile(&mut x, 0.975), 4.9, epsilon = 1e-12);
        let mut with_nan = array![1.0, f64::NAN, 3.0];
        assert_eq!(quantile(&mut with_nan, 0.5), 2.0);
        assert!(quantile(&mut Array1::zeros(0), 0.5).is_nan());
    }

    #[test]
    fn test_summarize_mean_sd() {
        let draws = array![[2.0, 4.0, 4.0, 4.0], [5.0, 5.0, 7.0, 9.0]];
        let row = summarize(draws.view());
        assert_eq!(row[0], 5.0);
        assert_abs_diff_eq!(row[2], (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_eq!(row[5], 4.5);
        let single = summarize(array![[1.0]].view());
        assert_eq!(single[0], 1.0);
        assert!(single[2].is_nan());
    }

    #[test]
    fn test_autocovariance_matches_direct() {
        let x = array![1.0, 3.0, 2.0, 5.0, 4.0, 0.0, 2.0];
        let acov = autocovariance(x.view());
        let m = x.mean().unwrap();
        let n = x.len();
        for t in 0..n {
            let direct: f64 = (0..n - t).map(|i| (x[i] - m) * (x[i + t] - m)).sum::<f64>() / n as f64;
            assert_abs_diff_eq!(acov[t], direct, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_iid_draws_have_high_ess_and_unit_rhat() {
        let mut rng = seeded_rng(42);
        let draws = Array2::from_shape_simple_fn((4, 1000), || rng.sample::<f64, _>(StandardNormal));
        let ess = effective_sample_size(draws.view());
        assert!(ess > 2500.0 && ess < 6000.0, "ess = {ess}");
        let rhat = split_rhat(draws.view());
        assert_abs_diff_eq!(rhat, 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_separated_chains_have_large_rhat() {
        let mut rng = seeded_rng(1);
        let draws = Array2::from_shape_fn((2, 500), |(c, _)| {
            c as f64 * 10.0 + rng.sample::<f64, _>(StandardNormal)
        });
        assert!(split_rhat(draws.view()) > 3.0);
    }

    #[test]
    fn test_short_or_constant_chains() {
        assert!(effective_sample_size(Array2::zeros((2, 3)).view()).is_nan());
        assert!(effective_sample_size(Array2::ones((2, 100)).view()).is_nan());
        assert!(split_rhat(Array2::zeros((1, 3)).view()).is_nan());
    }

    #[test]
    fn test_summarize_layout() {
        let mut rng = seeded_rng(5);
        let draws = Array2::from_shape_simple_fn((2, 400), || 3.0 + 2.0 * rng.sample::<f64, _>(StandardNormal));
        let row = summarize(draws.view());
        assert_abs_diff_eq!(row[0], 3.0, epsilon = 0.3);
        assert_abs_diff_eq!(row[2], 2.0, epsilon = 0.3);
        assert!(row[3] < row[4] && row[4] < row[5] && row[5] < row[6] && row[6] < row[7]);
        assert_abs_diff_eq!(row[1], row[2] / row[8].sqrt(), epsilon = 1e-12);
    }
}
