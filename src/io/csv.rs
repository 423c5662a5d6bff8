/*!
# CSV input and output

* [`write_nuts_csv`] records a fit's summary table, one row per parameter, preceded by a
  metadata row carrying the divergence count, the sampling time, the method and a free-form
  configuration label.
* [`save_dataset_csv`] and [`save_columns_csv`] write generated datasets.
* [`read_cmdstan_csv`] reads one chain of CmdStan sampler output.
*/

use ndarray::{Array2, ArrayView1};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

use ::csv::{ReaderBuilder, Writer};

use crate::error::{Error, Result};
use crate::fit::FitResult;
use crate::report::count_divergences;

/// Label written in the `method` column by [`write_nuts_csv`].
pub const NUTS_METHOD: &str = "Stan NUTS";

/**
Writes the summary of `params` together with the divergence count and sampling time.

The columns are `param`, the summary columns of the fit, `divergences`, `time`, `method`
and `config`. The first data row only fills `divergences`, `time`, `method` and `config`;
each following row only fills `param` and the summary columns.

With `append == false` the file is truncated. With `append == true` the rows are added at
the end and the header is written only when the file is new or empty.

# Examples

```rust,no_run
# use mcmc_casestudies::fit::DrawsFit;
# use mcmc_casestudies::io::csv::write_nuts_csv;
# use std::path::Path;
# fn run(fit: &DrawsFit) -> mcmc_casestudies::Result<()> {
write_nuts_csv("iter=2000, chains=4", fit, &["mu", "tau"], 12.5, Path::new("results.csv"), true)?;
# Ok(())
# }
```
*/
pub fn write_nuts_csv<F: FitResult + ?Sized>(
    config: &str,
    fit: &F,
    params: &[&str],
    time: f64,
    path: &Path,
    append: bool,
) -> Result<()> {
    let summary = fit.summary(params)?;
    let divergences = count_divergences(fit);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    let needs_header = file.metadata().map_err(|e| Error::io(path, e))?.len() == 0;
    let mut wtr = Writer::from_writer(file);

    let n_cols = summary.colnames.len();
    if needs_header {
        let mut header = vec!["param".to_string()];
        header.extend(summary.colnames.iter().cloned());
        header.extend(["divergences", "time", "method", "config"].map(String::from));
        wtr.write_record(&header)?;
    } else {
        debug!(path = %path.display(), "appending without header");
    }

    let mut meta = vec![String::new(); n_cols + 1];
    meta.extend([
        divergences.to_string(),
        time.to_string(),
        NUTS_METHOD.to_string(),
        config.to_string(),
    ]);
    wtr.write_record(&meta)?;

    for row in &summary.rows {
        let mut record = vec![row.name.clone()];
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.extend(std::iter::repeat(String::new()).take(4));
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Saves points (one per row) with a `dim_0, dim_1, ...` header.
pub fn save_dataset_csv(points: &Array2<f64>, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(path).map_err(|e| Error::io(path, e))?);
    let header: Vec<String> = (0..points.ncols()).map(|i| format!("dim_{}", i)).collect();
    wtr.write_record(&header)?;
    for row in points.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Saves equally long named columns side by side.
pub fn save_columns_csv(names: &[&str], columns: &[ArrayView1<f64>], path: &Path) -> Result<()> {
    if names.len() != columns.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} names for {} columns",
            names.len(),
            columns.len()
        )));
    }
    let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
    if columns.iter().any(|c| c.len() != n_rows) {
        return Err(Error::ShapeMismatch("columns have different lengths".into()));
    }

    let mut wtr = Writer::from_writer(File::create(path).map_err(|e| Error::io(path, e))?);
    wtr.write_record(names)?;
    for i in 0..n_rows {
        wtr.write_record(columns.iter().map(|c| c[i].to_string()))?;
    }
    wtr.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// One chain of CmdStan output: the column names, the numeric rows and the sampling time
/// reported in the trailing `# Elapsed Time` comment, if present.
#[derive(Debug, Clone, PartialEq)]
pub struct CmdStanOutput {
    pub header: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub sampling_time: Option<f64>,
}

/// Reads a CmdStan output CSV. Comment lines are skipped except for the elapsed-time block.
pub fn read_cmdstan_csv(path: &Path) -> Result<CmdStanOutput> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let sampling_time = content.lines().find_map(sampling_seconds);
    let mut rdr = ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(::csv::Trim::All)
        .from_reader(content.as_bytes());

    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|e| Error::Parse {
                    path: path.to_owned(),
                    reason: format!("draw {line}: `{field}`: {e}"),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(CmdStanOutput {
        header,
        rows,
        sampling_time,
    })
}

/// Seconds from a `#  Elapsed Time: ... seconds (Warm-up)` block line tagged `(Sampling)`.
fn sampling_seconds(line: &str) -> Option<f64> {
    let rest = line.strip_prefix('#')?;
    let rest = rest.trim_start().trim_start_matches("Elapsed Time:");
    let (value, tag) = rest.split_once("seconds")?;
    if tag.trim() != "(Sampling)" {
        return None;
    }
    value.trim().parse().ok()
}
