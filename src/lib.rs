/*!
# mcmc-casestudies

Synthetic-data generators, model descriptors and result summarizers for four Bayesian
inference case studies: logistic regression, the "donut" hypersphere, Gaussian mixtures and
the one-way normal hierarchical model.

Generators take a parameter record and a seed and always reproduce the same dataset. The
sampler itself is external and plugs in through [`model::SamplerBackend`]; anything that
implements [`fit::FitResult`] can be summarized, written to CSV or dumped as JSON.

```rust
use mcmc_casestudies::donut::{generate_data, DonutParams};

let data = generate_data(&DonutParams::new(100, 3, 137247)).unwrap();
assert_eq!(data.points.dim(), (100, 3));
```
*/

pub mod config;
pub mod distributions;
pub mod donut;
pub mod error;
pub mod fit;
pub mod gmm;
pub mod io;
pub mod logistic;
pub mod model;
pub mod one_way_normal;
pub mod report;
pub mod stats;

pub use error::{Error, Result};
