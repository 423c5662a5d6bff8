//! One-way normal (hierarchical two-level normal) case study.
//!
//! `I` group means are drawn as `theta_i ~ Normal(mu, tau)` and one observation per group as
//! `y_i ~ Normal(theta_i, sigma)`. The latent `theta` is returned alongside `y` so recovered
//! posterior means can be compared with the truth.

use ndarray::Array1;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distributions::seeded_rng;
use crate::error::{Error, Result};
use crate::model::ModelData;

/// Reference seeds of the one-way normal case study.
pub const ONE_WAY_NORMAL_SEEDS: [u64; 3] = [183043, 236724, 394782];

pub const GROUPS: usize = 800;
pub const MU: f64 = 8.0;
pub const TAU: f64 = 3.0;
pub const SIGMA: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneWayNormalParams {
    /// Number of groups `I`.
    pub groups: usize,
    pub mu: f64,
    /// Between-group standard deviation.
    pub tau: f64,
    /// Observation standard deviation.
    pub sigma: f64,
    pub seed: u64,
}

impl Default for OneWayNormalParams {
    fn default() -> Self {
        Self {
            groups: GROUPS,
            mu: MU,
            tau: TAU,
            sigma: SIGMA,
            seed: ONE_WAY_NORMAL_SEEDS[0],
        }
    }
}

impl OneWayNormalParams {
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneWayNormalDataset {
    pub y: Array1<f64>,
    pub theta: Array1<f64>,
    pub sigma: f64,
}

impl OneWayNormalDataset {
    /// Data block shared by the centered and non-centered models: `I`, `y` and a per-group
    /// `sigma`.
    pub fn model_data(&self) -> ModelData {
        ModelData::new()
            .int("I", self.y.len() as i64)
            .vector("y", &self.y)
            .vector("sigma", &Array1::from_elem(self.y.len(), self.sigma))
    }
}

/// Draws all `theta` first, then one `y` per group, from a stream seeded with `params.seed`.
pub fn generate_data(params: &OneWayNormalParams) -> Result<OneWayNormalDataset> {
    if params.groups == 0 {
        return Err(Error::invalid("groups", "at least one group is required"));
    }
    if !(params.sigma > 0.0) {
        return Err(Error::invalid("sigma", "must be positive"));
    }
    let between =
        Normal::new(params.mu, params.tau).map_err(|e| Error::invalid("tau", e.to_string()))?;
    let within = Normal::new(0.0, params.sigma).map_err(|e| Error::invalid("sigma", e.to_string()))?;

    let mut rng = seeded_rng(params.seed);
    let theta: Array1<f64> = (0..params.groups).map(|_| between.sample(&mut rng)).collect();
    let y = theta.mapv(|t| t + within.sample(&mut rng));

    debug!(groups = params.groups, seed = params.seed, "generated one-way normal dataset");
    Ok(OneWayNormalDataset {
        y,
        theta,
        sigma: params.sigma,
    })
}

/// One dataset per seed, all other parameters taken from `params`.
pub fn generate_datasets(params: &OneWayNormalParams, seeds: &[u64]) -> Result<Vec<OneWayNormalDataset>> {
    seeds
        .par_iter()
        .map(|&seed| generate_data(&params.clone().set_seed(seed)))
        .collect()
}
