/*!
The "donut" case study: points scattered around the surface of a hypersphere.

Each point is `C + R * u + e` where `u` is uniform on the unit sphere in `D` dimensions and
`e` is isotropic Gaussian noise with standard deviation `r` (the "inner" radius, expected to
be much smaller than `R`).

# Seeding

Generation happens in two phases that share the same seed:

1. If any of center, radius or noise is missing, a stream seeded with `seed` draws the missing
   ones (in that order): each center coordinate uniform in `[-50, 50)` truncated toward zero,
   the radius uniform in `[5, 50)` truncated toward zero, the noise uniform in `[0.1, 2)`.
2. The stream is then reseeded with the same seed and the points are drawn: first all
   directions, then one normal draw per coordinate.

Because of the reseed, the directions do not depend on whether the shape parameters were
supplied or drawn.

# Examples

```rust
use mcmc_casestudies::donut::{generate_data, DonutParams};

let data = generate_data(&DonutParams::new(200, 3, 137247)).unwrap();
assert_eq!(data.points.dim(), (200, 3));
assert!(data.radius >= 5.0 && data.radius < 50.0);
```
*/

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distributions::{seeded_rng, sphere_directions};
use crate::error::{Error, Result};
use crate::model::ModelData;

/// Reference seeds of the donut case study.
pub const DONUT_SEEDS: [u64; 3] = [137247, 472483, 701983];

/// Margin added on each side by [`find_limits`] unless another one is requested.
pub const DEFAULT_LIMIT_MARGIN: f64 = 5.0;

/// Parameters fully determining a donut dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonutParams {
    pub n_samples: usize,
    pub n_dim: usize,
    pub seed: u64,
    /// Center `C`; drawn if `None`.
    pub center: Option<Vec<f64>>,
    /// Big radius `R`; drawn if `None`.
    pub radius: Option<f64>,
    /// Noise radius `r`; drawn if `None`.
    pub noise: Option<f64>,
}

impl DonutParams {
    pub fn new(n_samples: usize, n_dim: usize, seed: u64) -> Self {
        Self {
            n_samples,
            n_dim,
            seed,
            center: None,
            radius: None,
            noise: None,
        }
    }

    pub fn with_center(mut self, center: Vec<f64>) -> Self {
        self.center = Some(center);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_dim == 0 {
            return Err(Error::invalid("n_dim", "dimensionality must be at least 1"));
        }
        if self.n_samples == 0 {
            return Err(Error::invalid("n_samples", "at least one point is required"));
        }
        if let Some(center) = &self.center {
            if center.len() != self.n_dim {
                return Err(Error::ShapeMismatch(format!(
                    "center has {} coordinates, expected {}",
                    center.len(),
                    self.n_dim
                )));
            }
        }
        if matches!(self.radius, Some(r) if !(r > 0.0)) {
            return Err(Error::invalid("radius", "must be positive"));
        }
        if matches!(self.noise, Some(r) if !(r > 0.0)) {
            return Err(Error::invalid("noise", "must be positive"));
        }
        Ok(())
    }
}

/// A generated donut together with the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonutDataset {
    /// Observed points, one per row.
    pub points: Array2<f64>,
    /// Unit directions `u`, one per row.
    pub directions: Array2<f64>,
    pub center: Array1<f64>,
    pub radius: f64,
    pub noise: f64,
}

impl DonutDataset {
    /// Noise-free points `C + R * u`; each lies at distance `radius` from `center`.
    pub fn surface_points(&self) -> Array2<f64> {
        &self.directions * self.radius + &self.center
    }

    pub fn n_samples(&self) -> usize {
        self.points.nrows()
    }

    pub fn n_dim(&self) -> usize {
        self.points.ncols()
    }

    /// Data block of the donut model: `N`, `D` and `y`.
    pub fn model_data(&self) -> ModelData {
        ModelData::new()
            .int("N", self.n_samples() as i64)
            .int("D", self.n_dim() as i64)
            .matrix("y", &self.points)
    }
}

/// Generates one donut dataset. See the module docs for the exact draw order.
pub fn generate_data(params: &DonutParams) -> Result<DonutDataset> {
    params.validate()?;
    let (n, d) = (params.n_samples, params.n_dim);

    let mut rng = seeded_rng(params.seed);
    let center = match &params.center {
        Some(c) => Array1::from(c.clone()),
        None => Array1::from_shape_simple_fn(d, || rng.gen_range(-50.0..50.0_f64).trunc()),
    };
    let radius = match params.radius {
        Some(r) => r,
        None => rng.gen_range(5.0..50.0_f64).trunc(),
    };
    let noise = match params.noise {
        Some(r) => r,
        None => rng.gen_range(0.1..2.0_f64),
    };

    let mut rng = seeded_rng(params.seed);
    let directions = sphere_directions(&mut rng, n, d);
    let jitter = Normal::new(0.0, noise).map_err(|e| Error::invalid("noise", e.to_string()))?;
    let mut points = &directions * radius + &center;
    points.mapv_inplace(|x| x + jitter.sample(&mut rng));

    debug!(n, d, radius, noise, seed = params.seed, "generated donut dataset");
    Ok(DonutDataset {
        points,
        directions,
        center,
        radius,
        noise,
    })
}

/// Generates one dataset per seed with randomly drawn shape parameters.
pub fn generate_datasets(n_samples: usize, n_dim: usize, seeds: &[u64]) -> Result<Vec<DonutDataset>> {
    seeds
        .par_iter()
        .map(|&seed| generate_data(&DonutParams::new(n_samples, n_dim, seed)))
        .collect()
}

/**
Per-dimension integration bounds for KL-divergence estimation.

Most of the probability mass lies within the observed range, so instead of integrating over
the whole space the bounds are the per-dimension minimum minus `margin` and maximum plus
`margin`.
*/
pub fn find_limits(points: &Array2<f64>, margin: f64) -> Result<(Array1<f64>, Array1<f64>)> {
    if points.nrows() == 0 {
        return Err(Error::invalid("points", "cannot find limits of an empty set"));
    }
    let lower = points.fold_axis(Axis(0), f64::INFINITY, |&acc, &x| acc.min(x)) - margin;
    let upper = points.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &x| acc.max(x)) + margin;
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn test_surface_points_at_radius() {
        for &(n, d, seed) in &[(50, 1, 1), (200, 2, 137247), (100, 7, 701983)] {
            let data = generate_data(&DonutParams::new(n, d, seed)).unwrap();
            let surface = data.surface_points();
            for row in surface.rows() {
                let diff = &row - &data.center;
                assert_abs_diff_eq!(diff.dot(&diff).sqrt(), data.radius, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_reproducible() {
        let params = DonutParams::new(100, 3, 472483);
        assert_eq!(generate_data(&params).unwrap(), generate_data(&params).unwrap());
    }

    #[test]
    fn test_drawn_shape_parameters_in_range() {
        for seed in 0..20 {
            let data = generate_data(&DonutParams::new(5, 4, seed)).unwrap();
            assert!(data.center.iter().all(|&c| c.fract() == 0.0 && (-50.0..50.0).contains(&c)));
            assert_eq!(data.radius.fract(), 0.0);
            assert!((5.0..50.0).contains(&data.radius));
            assert!((0.1..2.0).contains(&data.noise));
        }
    }

    #[test]
    fn test_directions_independent_of_supplied_shape() {
        let drawn = generate_data(&DonutParams::new(30, 2, 9)).unwrap();
        let given = generate_data(
            &DonutParams::new(30, 2, 9)
                .with_center(vec![1.0, 2.0])
                .with_radius(10.0)
                .with_noise(0.5),
        )
        .unwrap();
        assert_eq!(drawn.directions, given.directions);
        assert_eq!(given.center, Array1::from(vec![1.0, 2.0]));
        assert_eq!(given.radius, 10.0);
    }

    #[test]
    fn test_partial_shape_keeps_draw_order() {
        // Supplying the center means the radius is the first draw of phase one.
        let data = generate_data(&DonutParams::new(10, 3, 5).with_center(vec![0.0; 3])).unwrap();
        let mut rng = seeded_rng(5);
        let expected_radius = rng.gen_range(5.0..50.0_f64).trunc();
        assert_eq!(data.radius, expected_radius);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            generate_data(&DonutParams::new(10, 0, 1)),
            Err(Error::InvalidParameter { name: "n_dim", .. })
        ));
        assert!(matches!(
            generate_data(&DonutParams::new(10, 2, 1).with_center(vec![0.0])),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(generate_data(&DonutParams::new(10, 2, 1).with_noise(0.0)).is_err());
        assert!(generate_data(&DonutParams::new(10, 2, 1).with_radius(-1.0)).is_err());
    }

    #[test]
    fn test_generate_datasets_keeps_seed_order() {
        let all = generate_datasets(20, 2, &DONUT_SEEDS).unwrap();
        assert_eq!(all.len(), 3);
        for (data, &seed) in all.iter().zip(DONUT_SEEDS.iter()) {
            assert_eq!(data, &generate_data(&DonutParams::new(20, 2, seed)).unwrap());
        }
    }

    #[test]
    fn test_find_limits() {
        let x = arr2(&[[0.0, 1.0], [2.0, -3.0], [1.0, 0.5]]);
        let (lo, hi) = find_limits(&x, DEFAULT_LIMIT_MARGIN).unwrap();
        assert_eq!(lo, Array1::from(vec![-5.0, -8.0]));
        assert_eq!(hi, Array1::from(vec![7.0, 6.0]));
        assert!(find_limits(&Array2::zeros((0, 2)), 1.0).is_err());
    }

    #[test]
    fn test_model_data_fields() {
        let data = generate_data(&DonutParams::new(4, 2, 3)).unwrap();
        let md = data.model_data();
        assert_eq!(md.names().collect::<Vec<_>>(), vec!["N", "D", "y"]);
    }
}
