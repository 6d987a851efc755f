/*!
Bayesian optimization engine for expensive, possibly noisy, possibly
constrained black-box objectives `f: R^n -> R^m`, with the following
features:

* Surrogate models from [baybox_surrogate]: parametric, Gaussian process and
  semiparametric (parametric trend + GP residual)
* Parameter inference by constrained multistart MLE or by Bayesian NUTS
  sampling, with the acquisition marginalized over posterior samples
* Expected Improvement acquisition, analytic for linear fitness and sampled
  under nonlinear fitness or output constraints
* Box-bounded domains with discrete (integer) coordinates and general
  feasibility predicates
* Multi-point proposals through sequential fantasy batching
* Reproducible runs through a single seed threading every random draw

The loop is implemented as an [argmin::core::Solver] (see [BoSolver]) driven
by `argmin::core::Executor`; [solve], [recommend] and [BoBuilder] wrap the
plumbing. Multistart replicates and MCMC chains run on the rayon pool;
everything else is sequential.

```no_run
use baybox_bo::{BoBuilder, BoProblem, Dataset, Domain, Fitness};
use baybox_surrogate::{GpModel, Kernel, Model, Prior};
use ndarray::{array, Array1, ArrayView1};

let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![-(x[0] * x[0])]) };

let problem = BoProblem {
    fitness: Fitness::Linear(array![1.]),
    y_max: array![f64::INFINITY],
    domain: Domain::new(array![-5.], array![5.]).unwrap(),
    model: Model::Gp(GpModel::new(
        Kernel::SquaredExponential,
        vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
    )),
    noise_priors: vec![Prior::LogNormal { location: -4., scale: 1. }],
    data: Dataset::new(array![[3.0]], array![[-9.0]]).unwrap(),
};

let res = BoBuilder::optimize(fobj)
    .configure(|config| config.max_iters(10).seed(42))
    .min_within(problem)
    .run()
    .expect("maximized");
println!("best x = {} with y = {}", res.x_opt, res.y_opt);
```
*/
#![warn(rustdoc::broken_intra_doc_links)]

mod bayes;
mod criteria;
mod data;
mod domain;
mod errors;
mod fit;
mod optimizers;
mod problem;
mod sampling;
mod solver;
mod types;
mod utils;

pub use bayes::*;
pub use criteria::*;
pub use data::*;
pub use domain::*;
pub use errors::*;
pub use fit::*;
pub use optimizers::*;
pub use problem::*;
pub use sampling::*;
pub use solver::*;
pub use types::*;
pub use utils::{norm_cdf, norm_pdf, softplus, softplus_inv};
