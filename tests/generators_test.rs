//! Properties of the synthetic-data generators.
//!
//! 1. Donut points sit at distance `R` from the center before noise, and the draw is
//!    reproducible.
//! 2. Mixture component sizes always add up to `N`; center-biased weights fall with distance.
//! 3. One-way normal datasets have matching lengths and `theta` follows `Normal(mu, tau)`.

use mcmc_casestudies::distributions::seeded_rng;
use mcmc_casestudies::donut::{self, DonutParams};
use mcmc_casestudies::gmm::{
    center_biased_weights, mixture_biased, uniform_component_sizes, weighted_component_sizes,
    BiasedMixtureParams,
};
use mcmc_casestudies::one_way_normal::{self, OneWayNormalParams, ONE_WAY_NORMAL_SEEDS};
use ndarray::{arr1, Array1, Array2};
use rand_distr::{Distribution, Normal};
use std::cmp::Ordering;

/// `f64` with a total order, so samples can be fed to `kolmogorov_smirnov::test`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TotalF64(f64);

impl Eq for TotalF64 {}

impl PartialOrd for TotalF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn donut_surface_points_lie_on_sphere(n in 1usize..40, d in 1usize..6, seed in any::<u64>()) {
            let data = donut::generate_data(&DonutParams::new(n, d, seed)).unwrap();
            let surface = data.surface_points();
            for row in surface.rows() {
                let diff = &row - &data.center;
                prop_assert!((diff.dot(&diff).sqrt() - data.radius).abs() < 1e-9 * data.radius.max(1.0));
            }
            prop_assert_eq!(data.points.dim(), (n, d));
        }

        #[test]
        fn uniform_sizes_sum_to_n(k in 1usize..20, n in 0usize..5_000) {
            let sizes = uniform_component_sizes(k, n);
            prop_assert_eq!(sizes.len(), k);
            prop_assert_eq!(sizes.iter().sum::<usize>(), n);
            for &s in &sizes[..k - 1] {
                prop_assert_eq!(s, n / k);
            }
            prop_assert_eq!(sizes[k - 1], n - (k - 1) * (n / k));
        }

        #[test]
        fn biased_weights_fall_with_distance(
            coords in proptest::collection::vec((-30.0f64..30.0, -30.0f64..30.0), 1..8),
            n in 0usize..2_000,
        ) {
            let k = coords.len();
            let means = Array2::from_shape_fn((k, 2), |(i, j)| if j == 0 { coords[i].0 } else { coords[i].1 });
            let center = arr1(&[0.5, 0.25]);
            let weights = center_biased_weights(&means, &center).unwrap();
            prop_assert!((weights.sum() - 1.0).abs() < 1e-12);

            let dist: Vec<f64> = means
                .rows()
                .into_iter()
                .map(|m| ((m[0] - 0.5).powi(2) + (m[1] - 0.25).powi(2)).sqrt())
                .collect();
            for i in 0..k {
                for j in 0..k {
                    if dist[i] < dist[j] {
                        prop_assert!(weights[i] > weights[j]);
                    }
                }
            }

            let sizes = weighted_component_sizes(&weights, n).unwrap();
            prop_assert_eq!(sizes.iter().sum::<usize>(), n);
        }
    }

    #[test]
    fn donut_reseed_makes_points_independent_of_drawn_shape() {
        let drawn = donut::generate_data(&DonutParams::new(50, 3, donut::DONUT_SEEDS[1])).unwrap();
        let given = donut::generate_data(
            &DonutParams::new(50, 3, donut::DONUT_SEEDS[1])
                .with_center(drawn.center.to_vec())
                .with_radius(drawn.radius)
                .with_noise(drawn.noise),
        )
        .unwrap();
        assert_eq!(drawn.points, given.points);
        assert_eq!(drawn.directions, given.directions);
    }

    #[test]
    fn donut_datasets_reproducible() {
        let a = donut::generate_datasets(30, 2, &donut::DONUT_SEEDS).unwrap();
        let b = donut::generate_datasets(30, 2, &donut::DONUT_SEEDS).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0].points, a[1].points);
    }

    #[test]
    fn biased_mixture_sizes_follow_distance() {
        let means = ndarray::arr2(&[[6.0, 5.0], [5.0, 9.0], [17.0, 5.0]]);
        let data = mixture_biased(&BiasedMixtureParams::new(3, 1_000).with_means(means)).unwrap();
        assert_eq!(data.sizes.iter().sum::<usize>(), 1_000);
        assert!(data.sizes[0] > data.sizes[1]);
        assert!(data.weights[1] > data.weights[2]);
        // tau_k = distance / K
        assert_abs_diff_eq!(data.covariances[0][[0, 0]], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.covariances[2][[1, 1]], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn one_way_normal_lengths_and_reproducibility() {
        for &seed in &ONE_WAY_NORMAL_SEEDS {
            let params = OneWayNormalParams {
                groups: 37,
                ..Default::default()
            }
            .set_seed(seed);
            let a = one_way_normal::generate_data(&params).unwrap();
            let b = one_way_normal::generate_data(&params).unwrap();
            assert_eq!(a.theta.len(), 37);
            assert_eq!(a.y.len(), 37);
            assert_eq!(a.theta, b.theta);
            assert_eq!(a.y, b.y);
        }
    }

    fn reference_sample(mean: f64, sd: f64, n: usize, seed: u64) -> Vec<TotalF64> {
        let normal = Normal::new(mean, sd).unwrap();
        let mut rng = seeded_rng(seed);
        (0..n).map(|_| TotalF64(normal.sample(&mut rng))).collect()
    }

    #[test]
    fn one_way_normal_theta_ks() {
        const N: usize = 2_000;
        let params = OneWayNormalParams {
            groups: N,
            ..Default::default()
        };
        let data = one_way_normal::generate_data(&params).unwrap();
        let theta: Vec<TotalF64> = data.theta.iter().copied().map(TotalF64).collect();

        let same = reference_sample(params.mu, params.tau, N, 7);
        let res = kolmogorov_smirnov::test(&theta, &same, 0.999);
        assert!(
            !res.is_rejected,
            "KS test rejected Normal(mu, tau): statistic {}",
            res.statistic
        );

        let shifted = reference_sample(params.mu + params.tau, params.tau, N, 7);
        let res = kolmogorov_smirnov::test(&theta, &shifted, 0.999);
        assert!(res.is_rejected, "KS test accepted a shifted normal");
    }

    #[test]
    fn one_way_normal_residuals_have_sigma_spread() {
        let data = one_way_normal::generate_data(&OneWayNormalParams {
            groups: 10_000,
            ..Default::default()
        })
        .unwrap();
        let resid: Array1<f64> = &data.y - &data.theta;
        assert_abs_diff_eq!(resid.mean().unwrap(), 0.0, epsilon = 0.4);
        assert_abs_diff_eq!(resid.std(1.0), data.sigma, epsilon = 0.4);
    }
}
