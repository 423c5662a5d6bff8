//! Console summaries of a fit.

use crate::error::Result;
use crate::fit::FitResult;

const RULE_WIDTH: usize = 104;

/// Total number of divergent post-warmup transitions over all chains.
pub fn count_divergences<F: FitResult + ?Sized>(fit: &F) -> usize {
    fit.sampler_params(false)
        .iter()
        .map(|chain| chain.divergences())
        .sum()
}

/// Fixed-width table of the summary of `params`, annotated with the divergence count and
/// the sampling time in seconds.
pub fn nuts_summary_table<F: FitResult + ?Sized>(fit: &F, params: &[&str], time: f64) -> Result<String> {
    let divergences = count_divergences(fit);
    table(fit, params, |line| {
        line.push_str(&format!(" {:^9} {:^7.2}", divergences, time));
    }, &["div.", "time"])
}

/// Same as [`nuts_summary_table`] for variational fits, which have no divergences.
pub fn vi_summary_table<F: FitResult + ?Sized>(fit: &F, params: &[&str], time: f64) -> Result<String> {
    table(fit, params, |line| {
        line.push_str(&format!(" {:^7.2}", time));
    }, &["time"])
}

pub fn print_nuts_summary<F: FitResult + ?Sized>(fit: &F, params: &[&str], time: f64) -> Result<()> {
    println!("{}", nuts_summary_table(fit, params, time)?);
    Ok(())
}

pub fn print_vi_summary<F: FitResult + ?Sized>(fit: &F, params: &[&str], time: f64) -> Result<()> {
    println!("{}", vi_summary_table(fit, params, time)?);
    Ok(())
}

fn table<F, T>(fit: &F, params: &[&str], trailer: T, trailer_names: &[&str]) -> Result<String>
where
    F: FitResult + ?Sized,
    T: Fn(&mut String),
{
    let summary = fit.summary(params)?;
    let mut lines = Vec::with_capacity(summary.rows.len() + 2);

    let mut header = format!("{:^9} ", "param");
    header.push_str(
        &summary
            .colnames
            .iter()
            .map(|c| format!("{:^7}", c))
            .collect::<Vec<_>>()
            .join(" "),
    );
    for name in trailer_names {
        header.push_str(&format!(" {:^9}", name));
    }
    lines.push(header);
    lines.push("-".repeat(RULE_WIDTH));

    for row in &summary.rows {
        let mut line = format!("{:^9} ", row.name);
        line.push_str(
            &row.values
                .iter()
                .map(|v| format!("{:^7.2}", v))
                .collect::<Vec<_>>()
                .join(" "),
        );
        trailer(&mut line);
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
