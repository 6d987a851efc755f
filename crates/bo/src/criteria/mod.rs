//! Acquisition criteria guiding candidate selection over the posterior
//! predictive of the fitted surrogate.

mod ei;

pub use ei::*;

use crate::types::Fitness;
use baybox_surrogate::Predictive;
use ndarray::{Array1, ArrayView1};
use rand_xoshiro::Xoshiro256Plus;

/// Context carried into acquisition evaluations.
#[derive(Clone, Debug)]
pub struct AcqData {
    /// Fitness over model outputs
    pub fitness: Fitness,
    /// Upper output constraints (`+inf` disables one output)
    pub y_max: Array1<f64>,
    /// Best admissible fitness observed so far
    pub best_fitness: f64,
}

/// An acquisition criterion over the (possibly sampled) posterior predictive.
///
/// With several posterior samples (Bayesian inference mode) the advertised
/// value is the average of the per-sample criterion.
pub trait Acquisition: Send + Sync {
    /// Criterion name used in diagnostics
    fn name(&self) -> &'static str;

    /// Criterion value at `x`, marginalized over the posterior samples.
    fn value(
        &self,
        x: &ArrayView1<f64>,
        posteriors: &[Predictive],
        data: &AcqData,
        rng: &mut Xoshiro256Plus,
    ) -> f64;

    /// Whether the criterion consumes a fitness (checked at initialization
    /// against fitness-free problems).
    fn requires_fitness(&self) -> bool {
        true
    }
}
