//! Run artifacts: the fit itself, a small statistics record and the raw extraction, each
//! written as JSON under a results directory and keyed by a run name.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::fit::FitResult;
use crate::report::count_divergences;

/// Bookkeeping of one sampler run. Missing values, and a non-finite time, are stored as
/// `"-"`; `null` reads back as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    #[serde(serialize_with = "dash_if_none", deserialize_with = "none_if_dash")]
    pub iters: Option<usize>,
    #[serde(serialize_with = "dash_if_none", deserialize_with = "none_if_dash")]
    pub warmup: Option<usize>,
    #[serde(serialize_with = "dash_if_not_finite", deserialize_with = "none_if_dash")]
    pub time: Option<f64>,
    #[serde(serialize_with = "dash_if_none", deserialize_with = "none_if_dash")]
    pub divergences: Option<usize>,
}

fn dash_if_none<T: Serialize, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str("-"),
    }
}

fn dash_if_not_finite<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    dash_if_none(&value.filter(|v| v.is_finite()), serializer)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DashOr<T> {
    Value(T),
    Text(String),
}

fn none_if_dash<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    match Option::<DashOr<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(DashOr::Value(v)) => Ok(Some(v)),
        Some(DashOr::Text(s)) if s == "-" => Ok(None),
        Some(DashOr::Text(s)) => Err(de::Error::custom(format!("expected a number or \"-\", got {s:?}"))),
    }
}

/// Files written by [`dump_nuts_run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub fit: PathBuf,
    pub statistics: PathBuf,
    pub extracted: PathBuf,
}

impl RunArtifacts {
    pub fn new(results_dir: &Path, run_name: &str) -> Self {
        Self {
            fit: results_dir.join(format!("{run_name}_fit.json")),
            statistics: results_dir.join(format!("{run_name}_statistics.json")),
            extracted: results_dir.join(format!("{run_name}_extracted.json")),
        }
    }
}

/**
Persists a NUTS run as `<run_name>_fit.json`, `<run_name>_statistics.json` and
`<run_name>_extracted.json` under `results_dir`, creating the directory if needed.

When `with_divergences` is false the divergence count is recorded as missing.
*/
pub fn dump_nuts_run<F: FitResult + Serialize>(
    results_dir: &Path,
    run_name: &str,
    fit: &F,
    iters: Option<usize>,
    warmup: Option<usize>,
    time: Option<f64>,
    with_divergences: bool,
) -> Result<RunArtifacts> {
    std::fs::create_dir_all(results_dir).map_err(|e| Error::io(results_dir, e))?;
    let artifacts = RunArtifacts::new(results_dir, run_name);

    write_json(&artifacts.fit, fit)?;
    let statistics = RunStatistics {
        iters,
        warmup,
        time,
        divergences: with_divergences.then(|| count_divergences(fit)),
    };
    write_json(&artifacts.statistics, &statistics)?;
    write_json(&artifacts.extracted, &fit.extract())?;

    info!(run = run_name, dir = %results_dir.display(), "dumped run artifacts");
    Ok(artifacts)
}

/// Writes `value` as JSON, flushing before returning so a short write is reported.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
