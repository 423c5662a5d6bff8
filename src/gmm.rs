/*!
Gaussian-mixture case study: datasets drawn from `K` normal components.

Points are allocated to components by a weighting policy and drawn component by component,
so the output is grouped by component in index order. Two policies exist:

* **uniform**: every component gets `floor(N / K)` points;
* **center-biased**: the weight of component `k` is proportional to the inverse distance of
  its mean from a reference center.

In both cases the last component absorbs the rounding remainder, so the component sizes
always sum to exactly `N`.

# Examples

```rust
use mcmc_casestudies::gmm::{mixture, uniform_component_sizes, MixtureParams};

assert_eq!(uniform_component_sizes(3, 10), vec![3, 3, 4]);

let data = mixture(&MixtureParams::new(3, 10)).unwrap();
assert_eq!(data.points.nrows(), 10);
assert_eq!(data.sizes, vec![3, 3, 4]);
```
*/

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distributions::{seeded_rng, CaseRng, MultivariateNormal};
use crate::error::{Error, Result};
use crate::model::ModelData;

/// Reference seeds of the mixture case study.
pub const GMM_SEEDS: [u64; 3] = [183043, 236724, 394782];

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_LIMIT: f64 = 20.0;
pub const DEFAULT_VARIANCE: f64 = 0.01;
pub const DEFAULT_CENTER: [f64; 2] = [5.0, 5.0];
pub const DEFAULT_SD: f64 = 0.1;

/// Equal allocation: `floor(n / k)` points per component, remainder to the last one.
pub fn uniform_component_sizes(k: usize, n: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let mut sizes = vec![n / k; k];
    sizes[k - 1] = n - (k - 1) * (n / k);
    sizes
}

/// Allocation by weight: `floor(w_k * n)` points per component, remainder to the last one.
pub fn weighted_component_sizes(weights: &Array1<f64>, n: usize) -> Result<Vec<usize>> {
    let k = weights.len();
    if k == 0 {
        return Ok(Vec::new());
    }
    let mut sizes: Vec<usize> = weights.iter().map(|w| (w * n as f64).floor() as usize).collect();
    let head: usize = sizes[..k - 1].iter().sum();
    sizes[k - 1] = n
        .checked_sub(head)
        .ok_or_else(|| Error::invalid("weights", "weights allocate more than n points"))?;
    Ok(sizes)
}

/// Weights inversely proportional to each mean's distance from `center`, normalised to one.
pub fn center_biased_weights(means: &Array2<f64>, center: &Array1<f64>) -> Result<Array1<f64>> {
    let distances = distances_from(means, center)?;
    if distances.iter().any(|&d| d == 0.0) {
        return Err(Error::invalid("means", "a component mean coincides with the center"));
    }
    let w = distances.mapv(|d| 1.0 / d);
    let total = w.sum();
    Ok(w / total)
}

fn distances_from(means: &Array2<f64>, center: &Array1<f64>) -> Result<Array1<f64>> {
    if means.ncols() != center.len() {
        return Err(Error::ShapeMismatch(format!(
            "means have {} coordinates, center has {}",
            means.ncols(),
            center.len()
        )));
    }
    Ok(means.map_axis(Axis(1), |m| {
        let diff = &m - center;
        diff.dot(&diff).sqrt()
    }))
}

/// `k` bivariate means, all x-coordinates drawn first, then all y-coordinates, each as
/// `offset + scale * U[0, 1)`.
fn draw_means(rng: &mut CaseRng, k: usize, scale: f64, offset: f64) -> Array2<f64> {
    let xs: Vec<f64> = (0..k).map(|_| rng.gen::<f64>() * scale + offset).collect();
    let ys: Vec<f64> = (0..k).map(|_| rng.gen::<f64>() * scale + offset).collect();
    Array2::from_shape_fn((k, 2), |(i, j)| if j == 0 { xs[i] } else { ys[i] })
}

fn check_components(k: usize, means_rows: Option<usize>) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid("n_components", "at least one component is required"));
    }
    match means_rows {
        Some(rows) if rows != k => Err(Error::ShapeMismatch(format!(
            "{rows} means given for {k} components"
        ))),
        _ => Ok(()),
    }
}

/// A multivariate mixture together with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureDataset {
    /// Points grouped by component, one per row.
    pub points: Array2<f64>,
    /// Component index of every point.
    pub labels: Vec<usize>,
    pub means: Array2<f64>,
    pub weights: Array1<f64>,
    pub sizes: Vec<usize>,
    pub covariances: Vec<Array2<f64>>,
}

fn draw_components(
    rng: &mut CaseRng,
    components: &[MultivariateNormal],
    sizes: &[usize],
) -> (Array2<f64>, Vec<usize>) {
    let d = components.first().map(|c| c.mean().len()).unwrap_or(0);
    let n: usize = sizes.iter().sum();
    let mut points = Array2::<f64>::zeros((n, d));
    let mut labels = Vec::with_capacity(n);
    let mut start = 0;
    for (k, (component, &size)) in components.iter().zip(sizes).enumerate() {
        let block = component.sample_n(rng, size);
        points
            .slice_mut(ndarray::s![start..start + size, ..])
            .assign(&block);
        labels.extend(std::iter::repeat(k).take(size));
        start += size;
    }
    (points, labels)
}

/// Parameters of an equally weighted bivariate mixture with a shared covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    pub n_components: usize,
    pub n_samples: usize,
    /// `K x d` means; drawn uniformly in `[-limit, limit)` (bivariate) if `None`.
    pub means: Option<Array2<f64>>,
    pub limit: f64,
    pub cov: Array2<f64>,
    pub seed: u64,
}

impl MixtureParams {
    pub fn new(n_components: usize, n_samples: usize) -> Self {
        Self {
            n_components,
            n_samples,
            means: None,
            limit: DEFAULT_LIMIT,
            cov: Array2::eye(2) * DEFAULT_VARIANCE,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_means(mut self, means: Array2<f64>) -> Self {
        self.means = Some(means);
        self
    }

    pub fn with_cov(mut self, cov: Array2<f64>) -> Self {
        self.cov = cov;
        self
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = limit;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Equally weighted mixture; every component shares `params.cov`.
pub fn mixture(params: &MixtureParams) -> Result<MixtureDataset> {
    let k = params.n_components;
    check_components(k, params.means.as_ref().map(|m| m.nrows()))?;

    let mut rng = seeded_rng(params.seed);
    let means = match &params.means {
        Some(m) => m.clone(),
        None => draw_means(&mut rng, k, 2.0 * params.limit, -params.limit),
    };
    let weights = Array1::from_elem(k, 1.0 / k as f64);
    let sizes = uniform_component_sizes(k, params.n_samples);

    let components = means
        .rows()
        .into_iter()
        .map(|m| MultivariateNormal::new(m.to_owned(), params.cov.clone()))
        .collect::<Result<Vec<_>>>()?;
    let (points, labels) = draw_components(&mut rng, &components, &sizes);

    debug!(k, n = params.n_samples, seed = params.seed, "generated uniform mixture");
    Ok(MixtureDataset {
        points,
        labels,
        means,
        weights,
        sizes,
        covariances: vec![params.cov.clone(); k],
    })
}

/// Parameters of a mixture biased towards `center`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasedMixtureParams {
    pub n_components: usize,
    pub n_samples: usize,
    /// `K x d` means; drawn uniformly in `[0, limit)` (bivariate) if `None`.
    pub means: Option<Array2<f64>>,
    pub limit: f64,
    pub center: Array1<f64>,
    pub seed: u64,
}

impl BiasedMixtureParams {
    pub fn new(n_components: usize, n_samples: usize) -> Self {
        Self {
            n_components,
            n_samples,
            means: None,
            limit: DEFAULT_LIMIT,
            center: Array1::from(DEFAULT_CENTER.to_vec()),
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_means(mut self, means: Array2<f64>) -> Self {
        self.means = Some(means);
        self
    }

    pub fn with_center(mut self, center: Array1<f64>) -> Self {
        self.center = center;
        self
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = limit;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/**
Mixture whose components are less likely and wider the farther they are from the center.

Component `k` has weight `w_k ∝ 1 / ||m_k - c||` and covariance `tau_k * I` with
`tau_k = ||m_k - c|| / K`.
*/
pub fn mixture_biased(params: &BiasedMixtureParams) -> Result<MixtureDataset> {
    let k = params.n_components;
    check_components(k, params.means.as_ref().map(|m| m.nrows()))?;

    let mut rng = seeded_rng(params.seed);
    let means = match &params.means {
        Some(m) => m.clone(),
        None => draw_means(&mut rng, k, params.limit, 0.0),
    };
    let weights = center_biased_weights(&means, &params.center)?;
    let sizes = weighted_component_sizes(&weights, params.n_samples)?;

    let d = means.ncols();
    let tau = distances_from(&means, &params.center)? / k as f64;
    let covariances: Vec<Array2<f64>> = tau.iter().map(|&t| Array2::eye(d) * t).collect();
    let components = means
        .rows()
        .into_iter()
        .zip(&covariances)
        .map(|(m, cov)| MultivariateNormal::new(m.to_owned(), cov.clone()))
        .collect::<Result<Vec<_>>>()?;
    let (points, labels) = draw_components(&mut rng, &components, &sizes);

    debug!(k, n = params.n_samples, seed = params.seed, "generated center-biased mixture");
    Ok(MixtureDataset {
        points,
        labels,
        means,
        weights,
        sizes,
        covariances,
    })
}

/// Parameters of an equally weighted univariate mixture with a shared standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnivariateParams {
    pub n_components: usize,
    pub n_samples: usize,
    /// Drawn uniformly in `[-limit, limit)` if `None`.
    pub means: Option<Array1<f64>>,
    pub limit: f64,
    pub sd: f64,
    pub seed: u64,
}

impl UnivariateParams {
    pub fn new(n_components: usize, n_samples: usize) -> Self {
        Self {
            n_components,
            n_samples,
            means: None,
            limit: DEFAULT_LIMIT,
            sd: DEFAULT_SD,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_means(mut self, means: Array1<f64>) -> Self {
        self.means = Some(means);
        self
    }

    pub fn with_sd(mut self, sd: f64) -> Self {
        self.sd = sd;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A univariate mixture together with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnivariateMixture {
    pub y: Array1<f64>,
    pub labels: Vec<usize>,
    pub means: Array1<f64>,
    pub weights: Array1<f64>,
    pub sizes: Vec<usize>,
    pub sd: f64,
}

impl UnivariateMixture {
    /// Data block of the 1-D mixture model. `alpha` defaults to a vector of ones.
    pub fn model_data(&self, alpha: Option<&Array1<f64>>) -> ModelData {
        let k = self.means.len();
        let ones = Array1::ones(k);
        ModelData::new()
            .int("N", self.y.len() as i64)
            .int("K", k as i64)
            .vector("y", &self.y)
            .vector("alpha", alpha.unwrap_or(&ones))
    }
}

/// Equally weighted univariate mixture. Means are drawn after the sizes are fixed.
pub fn univariate(params: &UnivariateParams) -> Result<UnivariateMixture> {
    let k = params.n_components;
    check_components(k, params.means.as_ref().map(|m| m.len()))?;
    if !(params.sd > 0.0) {
        return Err(Error::invalid("sd", "must be positive"));
    }
    let noise = Normal::new(0.0, params.sd).map_err(|e| Error::invalid("sd", e.to_string()))?;

    let mut rng = seeded_rng(params.seed);
    let sizes = uniform_component_sizes(k, params.n_samples);
    let means = match &params.means {
        Some(m) => m.clone(),
        None => (0..k)
            .map(|_| rng.gen::<f64>() * 2.0 * params.limit - params.limit)
            .collect(),
    };

    let mut y = Vec::with_capacity(params.n_samples);
    let mut labels = Vec::with_capacity(params.n_samples);
    for (idx, (&mean, &size)) in means.iter().zip(&sizes).enumerate() {
        y.extend((0..size).map(|_| mean + noise.sample(&mut rng)));
        labels.extend(std::iter::repeat(idx).take(size));
    }

    Ok(UnivariateMixture {
        y: Array1::from(y),
        labels,
        means,
        weights: Array1::from_elem(k, 1.0 / k as f64),
        sizes,
        sd: params.sd,
    })
}

/// One equally weighted bivariate mixture per seed, with randomly drawn means.
pub fn generate_datasets(n_components: usize, n_samples: usize, seeds: &[u64]) -> Result<Vec<MixtureDataset>> {
    seeds
        .par_iter()
        .map(|&seed| mixture(&MixtureParams::new(n_components, n_samples).set_seed(seed)))
        .collect()
}
