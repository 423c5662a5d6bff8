//! The read-only view of a sampler's output used by the summarizers.
//!
//! Summarizers only ever need three things from a fit: the per-chain sampler diagnostics
//! (`divergent__`, `treedepth__`, ...), a table of summary statistics for a set of
//! parameters, and the raw post-warmup draws. [`FitResult`] exposes exactly that.
//! [`DrawsFit`] is a concrete implementation backed by in-memory draws, which can also be
//! loaded from CmdStan output CSV files.

use ndarray::{Array1, Array3, Axis};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::csv::read_cmdstan_csv;
use crate::stats::{summarize, SUMMARY_COLUMNS};

/// Name of the per-iteration divergence flag.
pub const DIVERGENT: &str = "divergent__";

/// Sampler diagnostics of one chain, one column per diagnostic (`accept_stat__`,
/// `divergent__`, ...), one entry per iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl ChainDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.columns.insert(name.to_string(), values);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Number of iterations flagged as divergent; `0` if the column is absent.
    pub fn divergences(&self) -> usize {
        self.get(DIVERGENT)
            .map(|d| d.iter().filter(|&&v| v != 0.0).count())
            .unwrap_or(0)
    }

    /// Drops the first `n` iterations of every column.
    fn skip(&self, n: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().skip(n).copied().collect()))
            .collect();
        Self { columns }
    }
}

/// One row of a [`Summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub name: String,
    pub values: Vec<f64>,
}

/// Summary statistics for a set of parameters, Stan style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub colnames: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn row(&self, name: &str) -> Result<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn value(&self, name: &str, column: &str) -> Result<f64> {
        let col = self
            .colnames
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::UnknownParameter(format!("{name}/{column}")))?;
        let row = self.row(name)?;
        row.values.get(col).copied().ok_or_else(|| {
            Error::ShapeMismatch(format!(
                "row `{name}` has {} values for {} columns",
                row.values.len(),
                self.colnames.len()
            ))
        })
    }

    /// Largest finite R-hat over all rows, if the summary has an `Rhat` column. Rows too
    /// short to hold one are skipped.
    pub fn max_rhat(&self) -> Option<f64> {
        let col = self.colnames.iter().position(|c| c == "Rhat")?;
        let rhat: Array1<f64> = self
            .rows
            .iter()
            .filter_map(|r| r.values.get(col).copied())
            .filter(|v| v.is_finite())
            .collect();
        rhat.max().ok().copied()
    }
}

/// Post-warmup draws per parameter column, chains concatenated in order.
pub type Extraction = BTreeMap<String, Vec<f64>>;

/// The result of fitting a compiled model.
pub trait FitResult {
    /// Per-chain sampler diagnostics, with or without the warmup iterations.
    fn sampler_params(&self, inc_warmup: bool) -> Vec<ChainDiagnostics>;

    /// Summary rows for `params`. A name without an index (`theta`) selects every element
    /// of that parameter (`theta[1]`, `theta[2]`, ...).
    fn summary(&self, params: &[&str]) -> Result<Summary>;

    /// Raw post-warmup draws.
    fn extract(&self) -> Extraction;
}

/**
A fit backed by stored draws.

Draws are laid out **chain x iteration x parameter**, warmup iterations first. Deserializing
runs the same checks as [`DrawsFit::new`].
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DrawsFitParts")]
pub struct DrawsFit {
    param_names: Vec<String>,
    draws: Array3<f64>,
    diagnostics: Vec<ChainDiagnostics>,
    warmup: usize,
    sampling_time: Option<f64>,
}

#[derive(Deserialize)]
struct DrawsFitParts {
    param_names: Vec<String>,
    draws: Array3<f64>,
    diagnostics: Vec<ChainDiagnostics>,
    warmup: usize,
    #[serde(default)]
    sampling_time: Option<f64>,
}

impl TryFrom<DrawsFitParts> for DrawsFit {
    type Error = Error;

    fn try_from(parts: DrawsFitParts) -> Result<Self> {
        let mut fit = Self::new(parts.param_names, parts.draws, parts.diagnostics, parts.warmup)?;
        fit.sampling_time = parts.sampling_time;
        Ok(fit)
    }
}

impl DrawsFit {
    pub fn new(
        param_names: Vec<String>,
        draws: Array3<f64>,
        diagnostics: Vec<ChainDiagnostics>,
        warmup: usize,
    ) -> Result<Self> {
        let (n_chains, n_iter, n_params) = draws.dim();
        if n_params != param_names.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} parameter names for {} parameter columns",
                param_names.len(),
                n_params
            )));
        }
        if diagnostics.len() != n_chains {
            return Err(Error::ShapeMismatch(format!(
                "diagnostics for {} chains, draws for {}",
                diagnostics.len(),
                n_chains
            )));
        }
        if let Some((name, len)) = diagnostics
            .iter()
            .flat_map(|d| d.columns.iter())
            .map(|(k, v)| (k, v.len()))
            .find(|&(_, len)| len != n_iter)
        {
            return Err(Error::ShapeMismatch(format!(
                "diagnostic `{name}` has {len} iterations, expected {n_iter}"
            )));
        }
        if warmup > n_iter {
            return Err(Error::invalid("warmup", "longer than the chains"));
        }
        Ok(Self {
            param_names,
            draws,
            diagnostics,
            warmup,
            sampling_time: None,
        })
    }

    /// Loads one CmdStan output CSV per chain. The first `warmup` rows of every file are
    /// treated as warmup (pass `0` when warmup draws were not saved). The sampling time is
    /// the sum of the chains' reported times, if every chain reports one.
    pub fn from_cmdstan_csv<P: AsRef<Path>>(paths: &[P], warmup: usize) -> Result<Self> {
        let mut param_names: Option<Vec<String>> = None;
        let mut chains = Vec::with_capacity(paths.len());
        let mut diagnostics = Vec::with_capacity(paths.len());
        let mut sampling_time = Some(0.0);

        for path in paths {
            let output = read_cmdstan_csv(path.as_ref())?;
            sampling_time = sampling_time.zip(output.sampling_time).map(|(a, b)| a + b);
            let (diag_idx, param_idx): (Vec<usize>, Vec<usize>) =
                (0..output.header.len()).partition(|&i| output.header[i].ends_with("__"));

            let names: Vec<String> = param_idx
                .iter()
                .map(|&i| stan_param_name(&output.header[i]))
                .collect();
            match &param_names {
                Some(existing) if existing != &names => {
                    return Err(Error::ShapeMismatch(format!(
                        "{} has different columns than the first chain",
                        path.as_ref().display()
                    )))
                }
                Some(_) => {}
                None => param_names = Some(names),
            }

            let mut diag = ChainDiagnostics::new();
            for &i in &diag_idx {
                diag = diag.with_column(
                    &output.header[i],
                    output.rows.iter().map(|r| r[i]).collect(),
                );
            }
            diagnostics.push(diag);
            chains.push(
                output
                    .rows
                    .iter()
                    .map(|r| param_idx.iter().map(|&i| r[i]).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            );
        }

        let param_names = param_names.unwrap_or_default();
        let n_iter = chains.first().map(Vec::len).unwrap_or(0);
        if chains.iter().any(|c| c.len() != n_iter) {
            return Err(Error::ShapeMismatch("chains have different lengths".into()));
        }
        let flat: Vec<f64> = chains.into_iter().flatten().flatten().collect();
        let draws = Array3::from_shape_vec((paths.len(), n_iter, param_names.len()), flat)
            .map_err(|e| Error::ShapeMismatch(e.to_string()))?;
        let mut fit = Self::new(param_names, draws, diagnostics, warmup)?;
        fit.sampling_time = sampling_time.filter(|_| !paths.is_empty());
        Ok(fit)
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn n_chains(&self) -> usize {
        self.draws.dim().0
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Sampling time in seconds as reported by the sampler; `None` for in-memory draws.
    pub fn sampling_time(&self) -> Option<f64> {
        self.sampling_time
    }

    /// Post-warmup draws per chain.
    pub fn n_draws(&self) -> usize {
        self.draws.dim().1 - self.warmup
    }

    fn resolve(&self, param: &str) -> Result<Vec<usize>> {
        if let Some(i) = self.param_names.iter().position(|n| n == param) {
            return Ok(vec![i]);
        }
        let prefix = format!("{param}[");
        let idx: Vec<usize> = (0..self.param_names.len())
            .filter(|&i| self.param_names[i].starts_with(&prefix))
            .collect();
        if idx.is_empty() {
            Err(Error::UnknownParameter(param.to_string()))
        } else {
            Ok(idx)
        }
    }
}

impl FitResult for DrawsFit {
    fn sampler_params(&self, inc_warmup: bool) -> Vec<ChainDiagnostics> {
        let skip = if inc_warmup { 0 } else { self.warmup };
        self.diagnostics.iter().map(|d| d.skip(skip)).collect()
    }

    fn summary(&self, params: &[&str]) -> Result<Summary> {
        let post = self
            .draws
            .slice(ndarray::s![.., self.warmup.., ..]);
        let mut rows = Vec::new();
        for param in params {
            for i in self.resolve(param)? {
                rows.push(SummaryRow {
                    name: self.param_names[i].clone(),
                    values: summarize(post.index_axis(Axis(2), i)).to_vec(),
                });
            }
        }
        Ok(Summary {
            colnames: SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    fn extract(&self) -> Extraction {
        let post = self
            .draws
            .slice(ndarray::s![.., self.warmup.., ..]);
        self.param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), post.index_axis(Axis(2), i).iter().copied().collect()))
            .collect()
    }
}

/// Converts CmdStan CSV column names (`theta.3`, `C.1.2`) to Stan indexing (`theta[3]`,
/// `C[1,2]`).
fn stan_param_name(column: &str) -> String {
    match column.split_once('.') {
        Some((base, idx)) if idx.split('.').all(|p| p.parse::<usize>().is_ok()) => {
            format!("{base}[{}]", idx.replace('.', ","))
        }
        _ => column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn small_fit() -> DrawsFit {
        // 2 chains, 6 iterations (2 warmup), params mu and theta[1], theta[2]
        let draws = Array3::from_shape_fn((2, 6, 3), |(c, t, p)| (c * 100 + t * 10 + p) as f64);
        let diag = |flags: [f64; 6]| ChainDiagnostics::new().with_column(DIVERGENT, flags.to_vec());
        DrawsFit::new(
            vec!["mu".into(), "theta[1]".into(), "theta[2]".into()],
            draws,
            vec![diag([1.0, 1.0, 0.0, 0.0, 1.0, 0.0]), diag([0.0, 0.0, 1.0, 0.0, 0.0, 0.0])],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_sampler_params_drop_warmup() {
        let fit = small_fit();
        let post = fit.sampler_params(false);
        assert_eq!(post[0].get(DIVERGENT).unwrap(), &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(post[0].divergences() + post[1].divergences(), 2);
        let all = fit.sampler_params(true);
        assert_eq!(all[0].divergences(), 3);
    }

    #[test]
    fn test_summary_expands_vector_params() {
        let fit = small_fit();
        let s = fit.summary(&["theta", "mu"]).unwrap();
        let names: Vec<_> = s.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["theta[1]", "theta[2]", "mu"]);
        // mu draws after warmup: 20,30,40,50 and 120,130,140,150
        assert_eq!(s.value("mu", "mean").unwrap(), 85.0);
        assert_eq!(s.colnames.len(), 10);
        assert!(matches!(fit.summary(&["sigma"]), Err(Error::UnknownParameter(_))));
        assert!(matches!(s.value("mu", "nope"), Err(Error::UnknownParameter(_))));
    }

    #[test]
    fn test_extract_concatenates_chains() {
        let e = small_fit().extract();
        assert_eq!(e["mu"], vec![20.0, 30.0, 40.0, 50.0, 120.0, 130.0, 140.0, 150.0]);
        assert_eq!(e.len(), 3);
    }

    #[test]
    fn test_new_checks_shapes() {
        let draws = Array3::zeros((1, 4, 2));
        assert!(DrawsFit::new(vec!["a".into()], draws.clone(), vec![ChainDiagnostics::new()], 0).is_err());
        assert!(DrawsFit::new(vec!["a".into(), "b".into()], draws.clone(), vec![], 0).is_err());
        assert!(DrawsFit::new(
            vec!["a".into(), "b".into()],
            draws.clone(),
            vec![ChainDiagnostics::new().with_column(DIVERGENT, vec![0.0; 3])],
            0
        )
        .is_err());
        assert!(DrawsFit::new(vec!["a".into(), "b".into()], draws, vec![ChainDiagnostics::new()], 5).is_err());
    }

    #[test]
    fn test_stan_param_name() {
        assert_eq!(stan_param_name("theta.3"), "theta[3]");
        assert_eq!(stan_param_name("C.1.2"), "C[1,2]");
        assert_eq!(stan_param_name("mu"), "mu");
        assert_eq!(stan_param_name("odd.name"), "odd.name");
    }

    #[test]
    fn test_from_cmdstan_csv() {
        let mut files = Vec::new();
        for chain in 0..2 {
            let mut f = NamedTempFile::new().unwrap();
            writeln!(f, "# model = one_way_normal").unwrap();
            writeln!(f, "lp__,accept_stat__,divergent__,mu,theta.1").unwrap();
            writeln!(f, "# Adaptation terminated").unwrap();
            for t in 0..5 {
                writeln!(f, "-1.0,0.9,{},{},{}", (t == chain) as u8, t + chain, t * 2).unwrap();
            }
            writeln!(f, "#  Elapsed Time: 0.1 seconds").unwrap();
            files.push(f);
        }
        let paths: Vec<_> = files.iter().map(|f| f.path()).collect();
        let fit = DrawsFit::from_cmdstan_csv(&paths, 1).unwrap();
        assert_eq!(fit.param_names(), &["mu".to_string(), "theta[1]".to_string()]);
        assert_eq!(fit.n_chains(), 2);
        assert_eq!(fit.n_draws(), 4);
        let post = fit.sampler_params(false);
        assert_eq!(post[0].divergences(), 0);
        assert_eq!(post[1].divergences(), 1);
        assert_eq!(fit.extract()["mu"], vec![1.0, 2.0, 3.0, 4.0, 2.0, 3.0, 4.0, 5.0]);
        // one "Elapsed Time" line without a (Sampling) tag per chain
        assert_eq!(fit.sampling_time(), None);
    }

    #[test]
    fn test_from_cmdstan_csv_sums_sampling_time() {
        let mut files = Vec::new();
        for secs in [0.25, 0.5] {
            let mut f = NamedTempFile::new().unwrap();
            writeln!(f, "lp__,mu\n-1.0,0.0\n-1.0,1.0").unwrap();
            writeln!(f, "#  Elapsed Time: 0.1 seconds (Warm-up)").unwrap();
            writeln!(f, "#                {secs} seconds (Sampling)").unwrap();
            files.push(f);
        }
        let paths: Vec<_> = files.iter().map(|f| f.path()).collect();
        let fit = DrawsFit::from_cmdstan_csv(&paths, 0).unwrap();
        assert_eq!(fit.sampling_time(), Some(0.75));
        assert_eq!(small_fit().sampling_time(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let fit = small_fit();
        let json = serde_json::to_string(&fit).unwrap();
        let back: DrawsFit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fit);

        let bad = json.replace(r#""warmup":2"#, r#""warmup":9"#);
        assert_ne!(bad, json);
        let err = serde_json::from_str::<DrawsFit>(&bad).unwrap_err();
        assert!(err.to_string().contains("warmup"), "{err}");

        let renamed = json.replace(r#""mu","#, "");
        assert!(serde_json::from_str::<DrawsFit>(&renamed).is_err());
    }

    #[test]
    fn test_short_rows_do_not_panic() {
        let s = Summary {
            colnames: vec!["mean".into(), "Rhat".into()],
            rows: vec![
                SummaryRow { name: "a".into(), values: vec![0.0] },
                SummaryRow { name: "b".into(), values: vec![0.0, 1.05] },
            ],
        };
        assert_eq!(s.max_rhat(), Some(1.05));
        assert!(matches!(s.value("a", "Rhat"), Err(Error::ShapeMismatch(_))));
        assert_eq!(s.value("a", "mean").unwrap(), 0.0);
    }

    #[test]
    fn test_max_rhat_ignores_nan() {
        let s = Summary {
            colnames: vec!["mean".into(), "Rhat".into()],
            rows: vec![
                SummaryRow { name: "a".into(), values: vec![0.0, 1.01] },
                SummaryRow { name: "b".into(), values: vec![0.0, f64::NAN] },
                SummaryRow { name: "c".into(), values: vec![0.0, 1.2] },
            ],
        };
        assert_eq!(s.max_rhat(), Some(1.2));
    }
}
