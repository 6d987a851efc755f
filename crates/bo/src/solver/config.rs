//! Bayesian optimization loop configuration.

use crate::criteria::EI_DEFAULT_N_DRAWS;
use crate::errors::{BoError, Result};
use crate::fit::{MleFitter, NutsFitter};
use crate::optimizers::{Algorithm, StartKind};
use crate::sampling::NutsConfig;
use serde::{Deserialize, Serialize};

/// Default iteration budget of the loop
pub const BO_DEFAULT_MAX_ITERS: u64 = 1;
/// Default number of multistart replicates for acquisition maximization
pub const BO_ACQ_N_START: usize = 20;
/// Default bound on acquisition evaluations of one replicate
pub const BO_ACQ_MAX_EVAL: usize = 2000;

/// Parameter-inference policy of the loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FitterConfig {
    /// Maximum-likelihood estimation
    Mle(MleFitter),
    /// Bayesian inference by NUTS sampling
    Bayes(NutsFitter),
}

impl FitterConfig {
    /// Instantiate the configured inference policy.
    pub(crate) fn build(&self) -> Box<dyn crate::fit::ModelFitter> {
        match self {
            FitterConfig::Mle(f) => Box::new(f.clone()),
            FitterConfig::Bayes(f) => Box::new(f.clone()),
        }
    }
}

/// Acquisition settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcqConfig {
    /// Monte-Carlo sample count of the sampled acquisition estimate
    pub n_draws: usize,
}

/// Acquisition maximization settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaximizerConfig {
    /// Inner optimization backend
    pub algo: Algorithm,
    /// Number of multistart replicates
    pub n_start: usize,
    /// Bound on acquisition evaluations of one replicate
    pub max_eval: usize,
    /// How replicate starting points are generated
    pub starts: StartKind,
}

impl Default for MaximizerConfig {
    fn default() -> Self {
        MaximizerConfig {
            algo: Algorithm::Cobyla,
            n_start: BO_ACQ_N_START,
            max_eval: BO_ACQ_MAX_EVAL,
            starts: StartKind::default(),
        }
    }
}

/// Bayesian optimization configuration: every optional setting is an explicit
/// record field with an enumerated default; no global mutable configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoConfig {
    /// Iteration budget of the default termination condition
    pub(crate) max_iters: u64,
    /// Points proposed per iteration through sequential fantasy batching
    pub(crate) q_points: usize,
    /// Parameter-inference policy
    pub(crate) fitter: FitterConfig,
    /// Acquisition settings
    pub(crate) acq: AcqConfig,
    /// Acquisition maximization settings
    pub(crate) maximizer: MaximizerConfig,
    /// Seed of the reproducible random generator (entropy when absent)
    pub(crate) seed: Option<u64>,
    /// Verbose per-iteration logging
    pub(crate) info: bool,
    /// Best-fitness fallback when no stored point is admissible
    pub(crate) fitness_default: Option<f64>,
    /// Treat objective evaluation failures as rejected points instead of
    /// surfacing them
    pub(crate) reject_failed_eval: bool,
}

impl Default for BoConfig {
    fn default() -> Self {
        BoConfig {
            max_iters: BO_DEFAULT_MAX_ITERS,
            q_points: 1,
            fitter: FitterConfig::Mle(MleFitter::default()),
            acq: AcqConfig {
                n_draws: EI_DEFAULT_N_DRAWS,
            },
            maximizer: MaximizerConfig::default(),
            seed: None,
            info: false,
            fitness_default: None,
            reject_failed_eval: false,
        }
    }
}

impl BoConfig {
    /// Sets the iteration budget of the default termination condition.
    pub fn max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Sets the number of points proposed per iteration (sequential fantasy
    /// batching when greater than 1).
    pub fn q_points(mut self, q_points: usize) -> Self {
        self.q_points = q_points;
        self
    }

    /// Selects maximum-likelihood parameter inference.
    pub fn mle_fitter(mut self, fitter: MleFitter) -> Self {
        self.fitter = FitterConfig::Mle(fitter);
        self
    }

    /// Selects Bayesian parameter inference with the given sampler settings.
    pub fn bayes_fitter(mut self, nuts: NutsConfig) -> Self {
        self.fitter = FitterConfig::Bayes(NutsFitter::new(nuts));
        self
    }

    /// Sets the Monte-Carlo sample count of the sampled acquisition estimate.
    pub fn acq_draws(mut self, n_draws: usize) -> Self {
        self.acq.n_draws = n_draws;
        self
    }

    /// Sets the backend used to maximize the acquisition.
    pub fn acq_optimizer(mut self, algo: Algorithm) -> Self {
        self.maximizer.algo = algo;
        self
    }

    /// Sets the number of multistart replicates of acquisition maximization.
    pub fn acq_n_start(mut self, n_start: usize) -> Self {
        self.maximizer.n_start = n_start;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables verbose per-iteration logging.
    pub fn info(mut self, info: bool) -> Self {
        self.info = info;
        self
    }

    /// Sets the best-fitness fallback used when no stored point meets the
    /// output constraints.
    pub fn fitness_default(mut self, value: f64) -> Self {
        self.fitness_default = Some(value);
        self
    }

    /// Treats objective evaluation failures as rejected points.
    pub fn reject_failed_eval(mut self, reject: bool) -> Self {
        self.reject_failed_eval = reject;
        self
    }

    /// Structural validation of the configuration.
    pub fn check(&self) -> Result<()> {
        if self.q_points == 0 {
            return Err(BoError::InvalidConfig("q_points must be at least 1".to_string()));
        }
        if self.acq.n_draws == 0 {
            return Err(BoError::InvalidConfig("acq_draws must be at least 1".to_string()));
        }
        if self.maximizer.n_start == 0 {
            return Err(BoError::InvalidConfig(
                "acquisition maximization needs at least one start".to_string(),
            ));
        }
        match &self.fitter {
            FitterConfig::Mle(mle) => {
                if mle.n_start == 0 {
                    return Err(BoError::InvalidConfig(
                        "MLE needs at least one start".to_string(),
                    ));
                }
            }
            FitterConfig::Bayes(nuts) => {
                let c = &nuts.config;
                if c.n_chains == 0 || c.n_samples == 0 || c.thin == 0 {
                    return Err(BoError::InvalidConfig(
                        "NUTS needs at least one chain, one sample and thin >= 1".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BoConfig::default().check().is_ok());
    }

    #[test]
    fn test_zero_q_points_rejected() {
        let cfg = BoConfig::default().q_points(0);
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let cfg = BoConfig::default()
            .max_iters(10)
            .seed(42)
            .q_points(3)
            .acq_draws(100)
            .info(true);
        assert!(cfg.check().is_ok());
        assert_eq!(cfg.max_iters, 10);
        assert_eq!(cfg.q_points, 3);
        assert_eq!(cfg.seed, Some(42));
    }
}
