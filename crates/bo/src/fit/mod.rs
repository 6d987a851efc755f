//! Parameter inference over surrogate models: maximum-likelihood fitting and
//! Bayesian (NUTS) sampling, both producing a [FitParams] parameter state the
//! acquisition layer turns into posterior predictives.

mod bayes;
mod mle;
mod param_space;

pub use bayes::*;
pub use mle::*;
pub(crate) use param_space::ParamSpace;

use crate::data::Dataset;
use crate::errors::Result;
use baybox_surrogate::{Model, ModelParams, Predictive, Prior};
use rand_xoshiro::Xoshiro256Plus;

/// Parameter state produced by inference: a single estimate in MLE mode, a
/// pool of posterior samples in Bayesian mode.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum FitParams {
    /// Maximum-likelihood estimate
    Mle(ModelParams),
    /// Posterior samples, chain-major order
    Bayes(Vec<ModelParams>),
}

impl FitParams {
    /// Number of parameter samples carried (1 in MLE mode).
    pub fn sample_count(&self) -> usize {
        match self {
            FitParams::Mle(_) => 1,
            FitParams::Bayes(samples) => samples.len(),
        }
    }

    /// Posterior predictives of `model` over `data`, one per parameter sample.
    pub fn posteriors(&self, model: &Model, data: &Dataset) -> Result<Vec<Predictive>> {
        match self {
            FitParams::Mle(params) => Ok(vec![model.posterior(data.x(), data.y(), params)?]),
            FitParams::Bayes(samples) => samples
                .iter()
                .map(|params| Ok(model.posterior(data.x(), data.y(), params)?))
                .collect(),
        }
    }
}

/// A capability interface for parameter-inference policies.
pub trait ModelFitter: Send + Sync {
    /// Recompute the parameter state of `model` from scratch over `data`.
    fn fit(
        &self,
        model: &Model,
        data: &Dataset,
        noise_priors: &[Prior],
        rng: &mut Xoshiro256Plus,
    ) -> Result<FitParams>;
}
