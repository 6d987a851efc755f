/*!
Surrogate modeling layer of the `baybox` Bayesian optimization engine.

This library provides the probabilistic models the engine fits to evaluation
data and queries for posterior predictive distributions:

* [ParametricModel] — a user predictor `g(x, theta)` with priors on `theta`,
  including the [LinearModel] feature-lift specialization,
* [GpModel] — a Gaussian process with per-output anisotropic length-scales,
  each output fitted independently,
* [Semiparametric] — a parametric trend used as the GP mean.

[Model::posterior] turns training data and inferred parameters into a
[Predictive], the per-output marginal `(mean, variance)` surface consumed by
acquisition functions. [likelihood::joint_loglik] assembles the joint
log-likelihood (data term plus prior terms) maximized or sampled by the
engine's inference layer.

Linear algebra relies on [ndarray](https://github.com/rust-ndarray/ndarray)
and the pure-Rust Cholesky/triangular routines of `linfa-linalg`; covariance
factorization applies jitter escalation before reporting a matrix as
ill-conditioned.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod errors;
mod gp;
mod kernel;
pub mod likelihood;
mod model;
mod parametric;
mod priors;

pub use errors::*;
pub use gp::{GpModel, GpOutputPosterior, MeanFn, JITTER_MAX, JITTER_START};
pub use kernel::Kernel;
pub use model::{Model, ModelParams, Predictive, Semiparametric};
pub use parametric::{FeatureLift, LinearModel, ParametricModel, PredictorFn};
pub use priors::Prior;
