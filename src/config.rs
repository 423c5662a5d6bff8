//! Experiment configuration.
//!
//! Every case study has its own parameter record whose `Default` carries the reference
//! constants. [`ExperimentConfig`] bundles them so a whole run can be described in one
//! TOML file:
//!
//! ```toml
//! output_dir = "results"
//!
//! [donut]
//! n_samples = 200
//! n_dim = 2
//! seeds = [137247, 472483, 701983]
//!
//! [one_way_normal]
//! groups = 800
//! mu = 8.0
//! tau = 3.0
//! sigma = 10.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::donut::DONUT_SEEDS;
use crate::gmm::GMM_SEEDS;
use crate::model::SamplingSettings;
use crate::one_way_normal::OneWayNormalParams;

/// Top-level configuration for a batch of case-study runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Directory under which datasets, summaries and artifacts are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub donut: DonutConfig,

    #[serde(default)]
    pub gmm: GmmConfig,

    #[serde(default)]
    pub one_way_normal: OneWayNormalConfig,

    #[serde(default)]
    pub sampling: SamplingSettings,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            donut: DonutConfig::default(),
            gmm: GmmConfig::default(),
            one_way_normal: OneWayNormalConfig::default(),
            sampling: SamplingSettings::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonutConfig {
    pub n_samples: usize,
    pub n_dim: usize,
    #[serde(default = "default_donut_seeds")]
    pub seeds: Vec<u64>,
}

impl Default for DonutConfig {
    fn default() -> Self {
        Self {
            n_samples: 100,
            n_dim: 2,
            seeds: default_donut_seeds(),
        }
    }
}

fn default_donut_seeds() -> Vec<u64> {
    DONUT_SEEDS.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmmConfig {
    pub n_components: usize,
    pub n_samples: usize,
    #[serde(default = "default_gmm_seeds")]
    pub seeds: Vec<u64>,
    /// Use center-biased weights instead of equal weights.
    #[serde(default)]
    pub biased: bool,
}

impl Default for GmmConfig {
    fn default() -> Self {
        Self {
            n_components: 3,
            n_samples: 300,
            seeds: default_gmm_seeds(),
            biased: false,
        }
    }
}

fn default_gmm_seeds() -> Vec<u64> {
    GMM_SEEDS.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneWayNormalConfig {
    pub groups: usize,
    pub mu: f64,
    pub tau: f64,
    pub sigma: f64,
    pub seeds: Vec<u64>,
}

impl Default for OneWayNormalConfig {
    fn default() -> Self {
        let p = OneWayNormalParams::default();
        Self {
            groups: p.groups,
            mu: p.mu,
            tau: p.tau,
            sigma: p.sigma,
            seeds: crate::one_way_normal::ONE_WAY_NORMAL_SEEDS.to_vec(),
        }
    }
}

impl ExperimentConfig {
    /// Loads a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a TOML file can get wrong but serde cannot reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.donut.n_dim == 0 {
            return Err(ConfigError::Invalid("donut.n_dim must be at least 1".into()));
        }
        if self.gmm.n_components == 0 {
            return Err(ConfigError::Invalid(
                "gmm.n_components must be at least 1".into(),
            ));
        }
        if self.one_way_normal.groups == 0 {
            return Err(ConfigError::Invalid(
                "one_way_normal.groups must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
