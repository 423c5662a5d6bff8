//! Model descriptors and the capability interface of an external sampler.
//!
//! A case study hands a fixed Stan program to a [`SamplerBackend`], which compiles it into a
//! [`CompiledModel`]. The compiled model is fitted against a [`ModelData`] block and returns
//! a [`FitResult`]. Compilation is expensive, so compiled models can be cached on disk with
//! [`load_or_compile`].
//!
//! No backend ships with this crate; the generators, metrics and summarizers only depend on
//! the traits below.

use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::{Error, Result};
use crate::fit::FitResult;
use crate::io::dump::{read_json, write_json};

/// A named probabilistic program, passed verbatim to the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: &'static str,
    /// File name under which the compiled model is cached by default.
    pub cache_file: &'static str,
    pub code: &'static str,
}

pub const DONUT: ModelDescriptor = ModelDescriptor {
    name: "donut",
    cache_file: "sm_donut.json",
    code: r#"
data {
 int<lower=0> N;    // Number of datapoints
 int<lower=0> D;    // Number of dimensions
 vector[D] y[N];    // Observed data
}

parameters {
 real<lower=0> R;    // Big radius
 real<lower=0> r;    // Small radius
 vector[D] C;        // Center
 vector[D] v[N];     // Unnormalized directions
}

transformed parameters {
 vector[D] mu[N];
 for (n in 1:N)
   mu[n] = v[n] / sqrt(dot_self(v[n]));
}

model {
 R ~ normal(0, 10);
 r ~ normal(0, 10);
 C ~ normal(0, 10);

 for (n in 1:N)
   v[n] ~ normal(0, 1);

 for (n in 1:N)
   y[n] ~ normal(C + mu[n] * R, r);
}
"#,
};

pub const GMM_1D: ModelDescriptor = ModelDescriptor {
    name: "gmm_1d",
    cache_file: "gmm_1d.json",
    code: r#"
data {
 int<lower = 0> N;   // number of points
 int<lower = 0> K;   // number of components
 vector[N] y;        // observed data
 vector[K] alpha;    // Dirichlet concentration
}

parameters {
 ordered[K] mu;
 real<lower=0> sigma[K];
 simplex[K] w;
}

model {
 real ps[K];

 sigma ~ inv_gamma(1, 1);
 mu ~ normal(0, 10);
 w ~ dirichlet(alpha);

 for (n in 1:N) {
   for (k in 1:K) {
     ps[k] = log(w[k]) + normal_lpdf(y[n] | mu[k], sigma[k]);
   }
   target += log_sum_exp(ps);
 }
}
"#,
};

pub const ONE_WAY_NORMAL_CENTERED: ModelDescriptor = ModelDescriptor {
    name: "one_way_normal_centered",
    cache_file: "1wayN_centered.json",
    code: r#"
data {
 int<lower=0> I;          // Number of groups
 real y[I];               // Observed data
 real<lower=0> sigma[I];  // Observation noise
}

parameters {
 real mu;
 real<lower=0> tau;
 real theta[I];
}

model {
 mu ~ normal(0, 5);
 tau ~ cauchy(0, 2.5);
 theta ~ normal(mu, tau);

 y ~ normal(theta, sigma);
}
"#,
};

pub const ONE_WAY_NORMAL_NON_CENTERED: ModelDescriptor = ModelDescriptor {
    name: "one_way_normal_non_centered",
    cache_file: "1wayN_noncentered.json",
    code: r#"
data {
 int<lower=0> I;          // Number of groups
 real y[I];               // Observed data
 real<lower=0> sigma[I];  // Observation noise
}

parameters {
 real mu;
 real<lower=0> tau;
 real var_theta[I];
}

transformed parameters {
 real theta[I];
 for (i in 1:I)
   theta[i] = tau * var_theta[i] + mu;
}

model {
 mu ~ normal(0, 5);
 tau ~ cauchy(0, 2.5);
 var_theta ~ normal(0, 1);

 y ~ normal(theta, sigma);
}
"#,
};

pub const LOGISTIC_REGRESSION: ModelDescriptor = ModelDescriptor {
    name: "logistic_regression",
    cache_file: "logistic_regression.json",
    code: r#"
data {
 int<lower=0> N;                // Number of observations
 int<lower=1> D;                // Number of features
 matrix[N, D] X;                // Features
 int<lower=0, upper=1> y[N];    // Class labels
}

parameters {
 vector[D] w;
 real b;
}

model {
 w ~ normal(0, 10);
 b ~ normal(0, 10);

 y ~ bernoulli_logit(X * w + b);
}
"#,
};

/// Every descriptor shipped with the crate.
pub const ALL_MODELS: [ModelDescriptor; 5] = [
    DONUT,
    GMM_1D,
    ONE_WAY_NORMAL_CENTERED,
    ONE_WAY_NORMAL_NON_CENTERED,
    LOGISTIC_REGRESSION,
];

/// A single entry of a model's data block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Int(i64),
    Real(f64),
    IntArray(Vec<i64>),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

/// The data block handed to a compiled model, in declaration order.
///
/// Serializes to a JSON object (`{"N": 100, "y": [...]}`), the format Stan-like engines read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelData {
    entries: Vec<(String, DataValue)>,
}

impl ModelData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value with the same name in place.
    pub fn insert(mut self, name: &str, value: DataValue) -> Self {
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
        self
    }

    pub fn int(self, name: &str, value: i64) -> Self {
        self.insert(name, DataValue::Int(value))
    }

    pub fn real(self, name: &str, value: f64) -> Self {
        self.insert(name, DataValue::Real(value))
    }

    pub fn int_array(self, name: &str, values: Vec<i64>) -> Self {
        self.insert(name, DataValue::IntArray(values))
    }

    pub fn vector(self, name: &str, values: &Array1<f64>) -> Self {
        self.insert(name, DataValue::Vector(values.to_vec()))
    }

    pub fn matrix(self, name: &str, values: &Array2<f64>) -> Self {
        let rows = values.rows().into_iter().map(|r| r.to_vec()).collect();
        self.insert(name, DataValue::Matrix(rows))
    }

    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for ModelData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

/// Sampler settings passed to [`CompiledModel::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Total iterations per chain, warmup included.
    pub iter: usize,
    pub warmup: usize,
    pub chains: usize,
    pub seed: Option<u64>,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            iter: 2000,
            warmup: 1000,
            chains: 4,
            seed: None,
        }
    }
}

impl SamplingSettings {
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Post-warmup draws per chain.
    pub fn n_draws(&self) -> usize {
        self.iter.saturating_sub(self.warmup)
    }
}

/// A sampler that turns program text into something that can be fitted.
pub trait SamplerBackend {
    type Model: CompiledModel;

    fn compile(&self, model: &ModelDescriptor) -> Result<Self::Model>;
}

/// A compiled program.
pub trait CompiledModel {
    type Fit: FitResult;

    fn fit(&self, data: &ModelData, settings: &SamplingSettings) -> Result<Self::Fit>;
}

/// Fits `model` and returns the fit together with the elapsed wall time in seconds.
pub fn fit_timed<M: CompiledModel>(
    model: &M,
    data: &ModelData,
    settings: &SamplingSettings,
) -> Result<(M::Fit, f64)> {
    let start = Instant::now();
    let fit = model.fit(data, settings)?;
    Ok((fit, start.elapsed().as_secs_f64()))
}

/// Returns the cached compiled model at `cache_path`, compiling and caching it if absent.
pub fn load_or_compile<B>(backend: &B, model: &ModelDescriptor, cache_path: &Path) -> Result<B::Model>
where
    B: SamplerBackend,
    B::Model: Serialize + DeserializeOwned,
{
    if cache_path.exists() {
        info!(model = model.name, path = %cache_path.display(), "Loading compiled model");
        return read_json(cache_path);
    }
    recompile(backend, model, cache_path)
}

/// Compiles `model` and overwrites the cache at `cache_path`.
pub fn recompile<B>(backend: &B, model: &ModelDescriptor, cache_path: &Path) -> Result<B::Model>
where
    B: SamplerBackend,
    B::Model: Serialize,
{
    info!(model = model.name, "Compiling model...");
    let compiled = backend.compile(model)?;
    info!(path = %cache_path.display(), "Saving the model to file...");
    if let Some(parent) = cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    write_json(cache_path, &compiled)?;
    info!("Done");
    Ok(compiled)
}
