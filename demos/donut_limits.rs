//! Generates the three reference donuts, prints their shape parameters and the integration
//! bounds used for KL-divergence estimation, and saves each dataset to CSV.

use mcmc_casestudies::donut::{find_limits, generate_datasets, DEFAULT_LIMIT_MARGIN, DONUT_SEEDS};
use mcmc_casestudies::io::csv::save_dataset_csv;
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    const N_SAMPLES: usize = 500;
    const N_DIM: usize = 2;

    let datasets = generate_datasets(N_SAMPLES, N_DIM, &DONUT_SEEDS)?;
    for (data, seed) in datasets.iter().zip(DONUT_SEEDS) {
        let (lower, upper) = find_limits(&data.points, DEFAULT_LIMIT_MARGIN)?;
        println!(
            "seed {seed}: center {:.1}, R = {}, r = {:.3}",
            data.center, data.radius, data.noise
        );
        println!("  integrate over [{:.2}] x [{:.2}]", lower, upper);

        let path = format!("donut_{seed}.csv");
        save_dataset_csv(&data.points, Path::new(&path))?;
        println!("  saved to {path}");
    }
    Ok(())
}
