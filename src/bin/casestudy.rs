//! casestudy CLI - generate case-study datasets and write out model programs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mcmc_casestudies::config::{ExperimentConfig, GmmConfig};
use mcmc_casestudies::donut::{self, DonutParams};
use mcmc_casestudies::gmm::{self, BiasedMixtureParams, MixtureDataset, MixtureParams};
use mcmc_casestudies::io::csv::{save_columns_csv, save_dataset_csv};
use mcmc_casestudies::model::ALL_MODELS;
use mcmc_casestudies::one_way_normal::{self, OneWayNormalDataset, OneWayNormalParams};

#[derive(Parser)]
#[command(name = "casestudy")]
#[command(version)]
#[command(about = "Synthetic datasets and model programs for Bayesian inference case studies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Points scattered around a hypersphere. Unset options come from the configuration.
    Donut {
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        #[arg(short, long)]
        dim: Option<usize>,

        /// Defaults to the first configured donut seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output CSV file; prints a summary only if absent
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Bivariate Gaussian mixture. Unset options come from the configuration.
    Gmm {
        #[arg(short = 'k', long)]
        components: Option<usize>,

        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Defaults to the first configured mixture seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Weight components by their distance to the reference center; also set by
        /// `gmm.biased` in the configuration
        #[arg(long)]
        biased: bool,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Hierarchical normal data with one observation per group
    OneWayNormal {
        /// Number of groups; taken from the configuration if absent
        #[arg(short, long)]
        groups: Option<usize>,

        /// Defaults to the first configured one-way normal seed
        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate every case study for every configured seed
    Batch {
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Write the model programs as `<name>.stan`
    Models {
        #[arg(short, long, default_value = "models")]
        out_dir: PathBuf,
    },
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    match path {
        Some(path) => ExperimentConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => Ok(ExperimentConfig::default()),
    }
}

fn one_way_normal_params(config: &ExperimentConfig) -> OneWayNormalParams {
    let c = &config.one_way_normal;
    OneWayNormalParams {
        groups: c.groups,
        mu: c.mu,
        tau: c.tau,
        sigma: c.sigma,
        ..Default::default()
    }
}

fn donut_params(
    config: &ExperimentConfig,
    samples: Option<usize>,
    dim: Option<usize>,
    seed: Option<u64>,
) -> DonutParams {
    let c = &config.donut;
    let seed = seed.or(c.seeds.first().copied()).unwrap_or(donut::DONUT_SEEDS[0]);
    DonutParams::new(samples.unwrap_or(c.n_samples), dim.unwrap_or(c.n_dim), seed)
}

fn gmm_config(
    config: &ExperimentConfig,
    components: Option<usize>,
    samples: Option<usize>,
    biased: bool,
) -> GmmConfig {
    let c = &config.gmm;
    GmmConfig {
        n_components: components.unwrap_or(c.n_components),
        n_samples: samples.unwrap_or(c.n_samples),
        biased: biased || c.biased,
        seeds: c.seeds.clone(),
    }
}

fn generate_mixture(c: &GmmConfig, seed: u64) -> Result<MixtureDataset> {
    let data = if c.biased {
        gmm::mixture_biased(&BiasedMixtureParams::new(c.n_components, c.n_samples).set_seed(seed))?
    } else {
        gmm::mixture(&MixtureParams::new(c.n_components, c.n_samples).set_seed(seed))?
    };
    Ok(data)
}

fn write_mixture(data: &MixtureDataset, path: &Path) -> Result<()> {
    let labels: Array1<f64> = data.labels.iter().map(|&l| l as f64).collect();
    let names: Vec<String> = (0..data.points.ncols())
        .map(|i| format!("dim_{}", i))
        .chain(std::iter::once("label".to_string()))
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut columns: Vec<_> = data.points.columns().into_iter().collect();
    columns.push(labels.view());
    save_columns_csv(&names, &columns, path)?;
    Ok(())
}

fn write_one_way_normal(data: &OneWayNormalDataset, path: &Path) -> Result<()> {
    save_columns_csv(&["y", "theta"], &[data.y.view(), data.theta.view()], path)?;
    Ok(())
}

fn print_points_summary(points: &Array2<f64>) {
    let means = points.mean_axis(ndarray::Axis(0));
    println!("Generated {} points in {} dimensions", points.nrows(), points.ncols());
    if let Some(means) = means {
        println!("Mean: {:.3}", means);
    }
}

fn run_batch(config: &ExperimentConfig, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;
    let n_jobs = config.donut.seeds.len() + config.gmm.seeds.len() + config.one_way_normal.seeds.len();

    let pb = ProgressBar::new(n_jobs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    pb.set_prefix("Datasets");

    let donuts = donut::generate_datasets(config.donut.n_samples, config.donut.n_dim, &config.donut.seeds)?;
    for (data, seed) in donuts.iter().zip(&config.donut.seeds) {
        pb.set_message(format!("donut {seed}"));
        save_dataset_csv(&data.points, &out_dir.join(format!("donut_{seed}.csv")))?;
        pb.inc(1);
    }

    for &seed in &config.gmm.seeds {
        pb.set_message(format!("gmm {seed}"));
        let data = generate_mixture(&config.gmm, seed)?;
        write_mixture(&data, &out_dir.join(format!("gmm_{seed}.csv")))?;
        pb.inc(1);
    }

    let owns = one_way_normal::generate_datasets(&one_way_normal_params(config), &config.one_way_normal.seeds)?;
    for (data, seed) in owns.iter().zip(&config.one_way_normal.seeds) {
        pb.set_message(format!("one-way normal {seed}"));
        write_one_way_normal(data, &out_dir.join(format!("one_way_normal_{seed}.csv")))?;
        pb.inc(1);
    }

    pb.finish_with_message("done");
    info!(dir = %out_dir.display(), datasets = n_jobs, "Batch complete");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Donut {
            samples,
            dim,
            seed,
            out,
        } => {
            let data = donut::generate_data(&donut_params(&config, samples, dim, seed))?;
            info!(
                "Donut: center {:.1}, radius {}, noise {:.3}",
                data.center, data.radius, data.noise
            );
            match out {
                Some(path) => {
                    save_dataset_csv(&data.points, &path)?;
                    info!("Saved to {}", path.display());
                }
                None => print_points_summary(&data.points),
            }
        }

        Commands::Gmm {
            components,
            samples,
            seed,
            biased,
            out,
        } => {
            let c = gmm_config(&config, components, samples, biased);
            let seed = seed.or(c.seeds.first().copied()).unwrap_or(gmm::GMM_SEEDS[0]);
            let data = generate_mixture(&c, seed)?;
            info!("Component sizes: {:?}", data.sizes);
            match out {
                Some(path) => {
                    write_mixture(&data, &path)?;
                    info!("Saved to {}", path.display());
                }
                None => print_points_summary(&data.points),
            }
        }

        Commands::OneWayNormal { groups, seed, out } => {
            let seed = seed
                .or(config.one_way_normal.seeds.first().copied())
                .unwrap_or(one_way_normal::ONE_WAY_NORMAL_SEEDS[0]);
            let mut params = one_way_normal_params(&config).set_seed(seed);
            if let Some(groups) = groups {
                params.groups = groups;
            }
            let data = one_way_normal::generate_data(&params)?;
            match out {
                Some(path) => {
                    write_one_way_normal(&data, &path)?;
                    info!("Saved to {}", path.display());
                }
                None => {
                    println!("Generated {} groups", data.y.len());
                    println!("Mean of y:     {:.3}", data.y.mean().unwrap_or(f64::NAN));
                    println!("Mean of theta: {:.3}", data.theta.mean().unwrap_or(f64::NAN));
                }
            }
        }

        Commands::Batch { out_dir } => {
            let out_dir = out_dir.unwrap_or_else(|| config.output_dir.clone());
            run_batch(&config, &out_dir)?;
        }

        Commands::Models { out_dir } => {
            fs::create_dir_all(&out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;
            for model in ALL_MODELS {
                let path = out_dir.join(format!("{}.stan", model.name));
                fs::write(&path, model.code.trim_start())
                    .with_context(|| format!("Failed to write {:?}", path))?;
                info!("Wrote {}", path.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> ExperimentConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casestudy.toml");
        fs::write(&path, toml).unwrap();
        ExperimentConfig::from_file(&path).unwrap()
    }

    #[test]
    fn test_donut_options_fall_back_to_config() {
        let config = config_from("[donut]\nn_samples = 40\nn_dim = 3\nseeds = [11, 12]\n");
        let p = donut_params(&config, None, None, None);
        assert_eq!((p.n_samples, p.n_dim, p.seed), (40, 3, 11));
        let p = donut_params(&config, Some(5), None, Some(99));
        assert_eq!((p.n_samples, p.n_dim, p.seed), (5, 3, 99));
    }

    #[test]
    fn test_gmm_options_fall_back_to_config() {
        let config = config_from("[gmm]\nn_components = 4\nn_samples = 80\nbiased = true\n");
        let c = gmm_config(&config, None, None, false);
        assert_eq!((c.n_components, c.n_samples, c.biased), (4, 80, true));
        let data = generate_mixture(&c, c.seeds[0]).unwrap();
        assert_eq!(data.sizes.iter().sum::<usize>(), 80);
        assert_eq!(data.sizes.len(), 4);

        let c = gmm_config(&ExperimentConfig::default(), Some(2), Some(10), true);
        assert_eq!((c.n_components, c.n_samples, c.biased), (2, 10, true));
    }
}
