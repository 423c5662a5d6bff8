//! Summarizes CmdStan output: `cargo run --example cmdstan_summary -- output_1.csv output_2.csv`.
//!
//! Prints the NUTS summary table for every parameter, appends it to `summary.csv` and dumps
//! the run artifacts under `results/`.

use mcmc_casestudies::fit::DrawsFit;
use mcmc_casestudies::io::csv::write_nuts_csv;
use mcmc_casestudies::io::dump::dump_nuts_run;
use mcmc_casestudies::report::print_nuts_summary;
use std::error::Error;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn Error>> {
    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        return Err("usage: cmdstan_summary <output.csv>...".into());
    }

    let fit = DrawsFit::from_cmdstan_csv(&paths, 0)?;
    println!("Loaded {} chains of {} draws", fit.n_chains(), fit.n_draws());
    // NaN in the table and CSV when CmdStan did not report a sampling time
    let time = fit.sampling_time().unwrap_or(f64::NAN);

    let params: Vec<&str> = fit.param_names().iter().map(String::as_str).collect();
    print_nuts_summary(&fit, &params, time)?;
    write_nuts_csv("cmdstan", &fit, &params, time, Path::new("summary.csv"), true)?;

    let artifacts = dump_nuts_run(
        Path::new("results"),
        "cmdstan",
        &fit,
        None,
        Some(fit.warmup()),
        fit.sampling_time(),
        true,
    )?;
    println!("Artifacts written to {}", artifacts.fit.display());
    Ok(())
}
