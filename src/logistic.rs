/*!
# Bayesian logistic regression

Evaluation helpers for a logistic-regression posterior: a linear score `x·w + b` is
thresholded at zero (the same as thresholding the logistic transform at 0.5) and compared
with the true binary labels.

Precision, recall and F1 are reported as `0.0` when their denominator is zero, e.g. when the
model predicts no positives at all.

# Examples

```rust
use mcmc_casestudies::logistic::compute_metrics;
use ndarray::{arr1, arr2};

let x = arr2(&[[1.0], [-1.0]]);
let y = arr2(&[[1.0], [0.0]]);
let m = compute_metrics(arr1(&[1.0]).view(), 0.0, x.view(), &y).unwrap();
assert_eq!(m.accuracy, 1.0);
assert_eq!(m.f1, 1.0);
```
*/

use ndarray::{Array1, ArrayBase, ArrayView1, ArrayView2, Data, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ModelData;

/// Reference seeds of the logistic regression case study.
pub const LOGISTIC_SEEDS: [u64; 3] = [171690, 349459, 697364];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl From<ConfusionMatrix> for ClassificationMetrics {
    fn from(c: ConfusionMatrix) -> Self {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(c.tp, c.tp + c.fp);
        let recall = ratio(c.tp, c.tp + c.fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            accuracy: ratio(c.tp + c.tn, c.total()),
            precision,
            recall,
            f1,
            confusion: c,
        }
    }
}

/// Predicted labels `1` where `x·w + b >= 0`, `0` elsewhere.
pub fn predict(w: ArrayView1<f64>, b: f64, x: ArrayView2<f64>) -> Result<Array1<u8>> {
    if x.ncols() != w.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} features in X, {} weights",
            x.ncols(),
            w.len()
        )));
    }
    Ok((x.dot(&w) + b).mapv(|score| u8::from(score >= 0.0)))
}

fn binary_label(name: &'static str, y: f64) -> Result<bool> {
    if y == 1.0 {
        Ok(true)
    } else if y == 0.0 {
        Ok(false)
    } else {
        Err(Error::invalid(name, format!("labels must be 0 or 1, got {y}")))
    }
}

/// Confusion matrix of predicted against true labels. Labels must be `0` or `1`.
pub fn confusion_matrix<S, D>(predicted: &[u8], actual: &ArrayBase<S, D>) -> Result<ConfusionMatrix>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if predicted.len() != actual.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} predictions, {} labels",
            predicted.len(),
            actual.len()
        )));
    }
    let mut c = ConfusionMatrix::default();
    for (&p, &y) in predicted.iter().zip(actual.iter()) {
        match (p == 1, binary_label("y_test", y)?) {
            (true, true) => c.tp += 1,
            (true, false) => c.fp += 1,
            (false, false) => c.tn += 1,
            (false, true) => c.fn_ += 1,
        }
    }
    Ok(c)
}

/**
Accuracy, precision, recall and F1 of the linear classifier `(w, b)` on a test set.

`y_test` may be a vector or a single-column matrix; only its element count has to match the
number of rows of `x_test`.
*/
pub fn compute_metrics<S, D>(
    w: ArrayView1<f64>,
    b: f64,
    x_test: ArrayView2<f64>,
    y_test: &ArrayBase<S, D>,
) -> Result<ClassificationMetrics>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let predicted = predict(w, b, x_test)?.to_vec();
    let confusion = confusion_matrix(&predicted, y_test)?;
    Ok(confusion.into())
}

/// Data block `{N, D, X, y}` of the logistic regression model. Labels must be `0` or `1`.
pub fn model_data(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<ModelData> {
    if x.nrows() != y.len() {
        return Err(Error::ShapeMismatch(format!(
            "{} rows in X, {} labels",
            x.nrows(),
            y.len()
        )));
    }
    let labels = y
        .iter()
        .map(|&v| binary_label("y", v).map(i64::from))
        .collect::<Result<Vec<i64>>>()?;
    Ok(ModelData::new()
        .int("N", x.nrows() as i64)
        .int("D", x.ncols() as i64)
        .matrix("X", &x.to_owned())
        .int_array("y", labels))
}
