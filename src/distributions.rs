/*!
Seeded random streams and the two continuous distributions the case-study generators
are built from: uniform directions on the unit hypersphere and the multivariate normal.

Every generator in this crate owns its random stream. Streams are created with
[`seeded_rng`] so that the same seed always reproduces the same dataset, independent of
platform and of any other generator running in the same process.

# Examples

```rust
use mcmc_casestudies::distributions::{seeded_rng, sphere_directions, MultivariateNormal};
use ndarray::{arr1, arr2};
use rand_distr::Distribution;

let mut rng = seeded_rng(42);
let u = sphere_directions(&mut rng, 10, 3);
assert_eq!(u.dim(), (10, 3));

let mvn = MultivariateNormal::new(arr1(&[0.0, 1.0]), arr2(&[[1.0, 0.0], [0.0, 0.01]])).unwrap();
let x = mvn.sample(&mut rng);
assert_eq!(x.len(), 2);
```
*/

use nalgebra::{Cholesky, DMatrix};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Error, Result};

/// The random stream type used by every generator.
pub type CaseRng = ChaCha8Rng;

/// Returns a fresh stream seeded with `seed`.
pub fn seeded_rng(seed: u64) -> CaseRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/**
Draws `n` points uniformly from the surface of the unit sphere in `d` dimensions.

Each point is built from `d` independent standard-normal coordinates divided by their
Euclidean norm (Muller 1959, Marsaglia 1972). The normal draws are consumed point by point,
coordinate by coordinate, so the result for a given stream state is fully determined.
*/
pub fn sphere_directions<R: Rng + ?Sized>(rng: &mut R, n: usize, d: usize) -> Array2<f64> {
    let mut v = Array2::from_shape_simple_fn((n, d), || rng.sample::<f64, _>(StandardNormal));
    for mut row in v.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|x| x / norm);
        }
    }
    v
}

/**
A multivariate normal distribution parameterized by a mean vector and a covariance matrix.

The covariance is factorized once at construction (lower Cholesky factor `L`); a draw is
`mean + L z` where `z` holds `d` standard-normal draws.

# Examples

```rust
use mcmc_casestudies::distributions::{seeded_rng, MultivariateNormal};
use ndarray::{arr1, arr2};

let mvn = MultivariateNormal::new(arr1(&[5.0, 5.0]), arr2(&[[0.5, 0.0], [0.0, 0.5]])).unwrap();
let xs = mvn.sample_n(&mut seeded_rng(1), 100);
assert_eq!(xs.dim(), (100, 2));
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateNormal {
    mean: Array1<f64>,
    cov: Array2<f64>,
    chol: Array2<f64>,
}

impl MultivariateNormal {
    /// Creates the distribution, failing if `cov` is not a positive-definite
    /// `d x d` matrix matching the length of `mean`.
    pub fn new(mean: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
        let d = mean.len();
        if cov.dim() != (d, d) {
            return Err(Error::ShapeMismatch(format!(
                "covariance has shape {:?}, expected ({d}, {d})",
                cov.dim()
            )));
        }
        let chol = cholesky(&cov)?;
        Ok(Self { mean, cov, chol })
    }

    /// Isotropic covariance `variance * I`.
    pub fn isotropic(mean: Array1<f64>, variance: f64) -> Result<Self> {
        let d = mean.len();
        Self::new(mean, Array2::eye(d) * variance)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    /// Draws `n` points, one per row.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Array2<f64> {
        let d = self.mean.len();
        let mut out = Array2::<f64>::zeros((n, d));
        for mut row in out.rows_mut() {
            row.assign(&self.sample(rng));
        }
        out
    }
}

impl Distribution<Array1<f64>> for MultivariateNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64> {
        let z = Array1::from_shape_simple_fn(self.mean.len(), || {
            rng.sample::<f64, _>(StandardNormal)
        });
        &self.mean + &self.chol.dot(&z)
    }
}

/// Lower Cholesky factor of a symmetric positive-definite matrix.
fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    if a.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid("cov", "covariance matrix has non-finite entries"));
    }
    let (n, m) = a.dim();
    let chol = Cholesky::new(DMatrix::from_fn(n, m, |i, j| a[[i, j]]))
        .ok_or_else(|| Error::invalid("cov", "covariance matrix is not positive definite"))?;
    let l = chol.l();
    Ok(Array2::from_shape_fn((n, m), |(i, j)| l[(i, j)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Axis};

    #[test]
    fn test_sphere_directions_unit_norm() {
        let mut rng = seeded_rng(7);
        let u = sphere_directions(&mut rng, 500, 5);
        for row in u.rows() {
            assert_abs_diff_eq!(row.dot(&row).sqrt(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sphere_directions_one_dimension_is_sign() {
        let mut rng = seeded_rng(3);
        let u = sphere_directions(&mut rng, 100, 1);
        assert!(u.iter().all(|&x| x == 1.0 || x == -1.0));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = sphere_directions(&mut seeded_rng(11), 20, 4);
        let b = sphere_directions(&mut seeded_rng(11), 20, 4);
        let c = sphere_directions(&mut seeded_rng(12), 20, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cholesky_reconstructs() {
        let a = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let l = cholesky(&a).unwrap();
        assert_abs_diff_eq!(l.dot(&l.t()), a, epsilon = 1e-12);
        assert_eq!(l[[0, 1]], 0.0);
        assert_abs_diff_eq!(l[[0, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_singular_and_nan() {
        let singular = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        assert!(matches!(
            cholesky(&singular),
            Err(Error::InvalidParameter { name: "cov", .. })
        ));
        let nan = arr2(&[[f64::NAN, 0.0], [0.0, 1.0]]);
        assert!(cholesky(&nan).is_err());
        assert_eq!(cholesky(&Array2::zeros((0, 0))).unwrap().dim(), (0, 0));
    }

    #[test]
    fn test_rejects_bad_covariance() {
        let not_pd = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(matches!(
            MultivariateNormal::new(arr1(&[0.0, 0.0]), not_pd),
            Err(Error::InvalidParameter { name: "cov", .. })
        ));
        let wrong_shape = arr2(&[[1.0]]);
        assert!(matches!(
            MultivariateNormal::new(arr1(&[0.0, 0.0]), wrong_shape),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_mvn_moments() {
        let mean = arr1(&[1.0, -2.0]);
        let cov = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let mvn = MultivariateNormal::new(mean.clone(), cov).unwrap();
        let xs = mvn.sample_n(&mut seeded_rng(42), 50_000);
        let m = xs.mean_axis(Axis(0)).unwrap();
        assert_abs_diff_eq!(m, mean, epsilon = 0.05);
        let centered = &xs - &m;
        let emp_cov = centered.t().dot(&centered) / (xs.nrows() as f64 - 1.0);
        assert_abs_diff_eq!(emp_cov, arr2(&[[4.0, 2.0], [2.0, 3.0]]), epsilon = 0.1);
    }
}
