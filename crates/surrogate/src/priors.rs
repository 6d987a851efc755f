//! Prior distributions over model parameters, length-scales and noise variances.
//!
//! Every prior supports sampling, log-density evaluation and exposes the
//! bounds of its support, from which box constraints are derived for
//! maximum-likelihood fitting. Randomness always comes from a caller-provided
//! generator, never from process-wide state.

use ndarray_rand::rand::Rng;
use ndarray_rand::rand::distributions::Distribution as RandDistribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Exp, LogNormal, Normal, Uniform};

/// A univariate prior distribution.
///
/// Vectors of priors (e.g. on per-dimension length-scales) apply element-wise.
///
/// **Panics** if distribution parameters are invalid (non-positive scale,
/// `low >= high`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Prior {
    /// Gaussian prior with given mean and standard deviation
    Normal {
        /// Mean of the distribution
        mean: f64,
        /// Standard deviation of the distribution
        std: f64,
    },
    /// Log-normal prior: `ln(v)` is Gaussian with given location and scale
    LogNormal {
        /// Location (mean of `ln(v)`)
        location: f64,
        /// Scale (standard deviation of `ln(v)`)
        scale: f64,
    },
    /// Uniform prior on `[low, high]`
    Uniform {
        /// Lower bound of the support
        low: f64,
        /// Upper bound of the support
        high: f64,
    },
    /// Exponential prior with given rate
    Exponential {
        /// Rate of the distribution
        rate: f64,
    },
    /// Degenerate prior pinning the value (parameter is not inferred)
    Fixed(f64),
}

impl Prior {
    /// Draw one value from the prior using the given generator.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Prior::Normal { mean, std } => {
                Normal::new(*mean, *std).unwrap().sample(rng)
            }
            Prior::LogNormal { location, scale } => {
                LogNormal::new(*location, *scale).unwrap().sample(rng)
            }
            Prior::Uniform { low, high } => Uniform::new(*low, *high).unwrap().sample(rng),
            Prior::Exponential { rate } => Exp::new(*rate).unwrap().sample(rng),
            Prior::Fixed(v) => *v,
        }
    }

    /// Log-density of the prior at `v` (`-inf` outside the support).
    pub fn logpdf(&self, v: f64) -> f64 {
        match self {
            Prior::Normal { mean, std } => Normal::new(*mean, *std).unwrap().ln_pdf(v),
            Prior::LogNormal { location, scale } => {
                if v <= 0. {
                    f64::NEG_INFINITY
                } else {
                    LogNormal::new(*location, *scale).unwrap().ln_pdf(v)
                }
            }
            Prior::Uniform { low, high } => {
                if v < *low || v > *high {
                    f64::NEG_INFINITY
                } else {
                    Uniform::new(*low, *high).unwrap().ln_pdf(v)
                }
            }
            Prior::Exponential { rate } => {
                if v < 0. {
                    f64::NEG_INFINITY
                } else {
                    Exp::new(*rate).unwrap().ln_pdf(v)
                }
            }
            // constant wrt inference, density collapses to a point mass
            Prior::Fixed(_) => 0.0,
        }
    }

    /// Bounds `(min, max)` of the support, used to derive box constraints.
    pub fn support(&self) -> (f64, f64) {
        match self {
            Prior::Normal { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Prior::LogNormal { .. } => (0., f64::INFINITY),
            Prior::Uniform { low, high } => (*low, *high),
            Prior::Exponential { .. } => (0., f64::INFINITY),
            Prior::Fixed(v) => (*v, *v),
        }
    }

    /// Mean of the prior, used as a deterministic starting value.
    pub fn mean(&self) -> f64 {
        match self {
            Prior::Normal { mean, .. } => *mean,
            Prior::LogNormal { location, scale } => (location + 0.5 * scale * scale).exp(),
            Prior::Uniform { low, high } => 0.5 * (low + high),
            Prior::Exponential { rate } => 1. / rate,
            Prior::Fixed(v) => *v,
        }
    }
}
