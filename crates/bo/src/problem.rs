//! The optimization problem record handed to [crate::solve] /
//! [crate::recommend]: fitness, output constraints, domain, surrogate model,
//! noise priors and the initial dataset. The black-box objective itself is
//! passed separately so problems stay cloneable.

use crate::data::Dataset;
use crate::domain::Domain;
use crate::errors::{BoError, Result};
use crate::types::Fitness;
use baybox_surrogate::{Model, Prior};
use ndarray::Array1;

/// A Bayesian optimization problem over `f: R^n -> R^m`.
#[derive(Clone, Debug)]
pub struct BoProblem {
    /// Fitness over model outputs, maximized by the engine
    pub fitness: Fitness,
    /// Per-output upper constraints (`+inf` disables one output)
    pub y_max: Array1<f64>,
    /// Input domain
    pub domain: Domain,
    /// Surrogate model of the objective
    pub model: Model,
    /// Priors over the per-output observation noise variance
    pub noise_priors: Vec<Prior>,
    /// Initial dataset (at least one interior point)
    pub data: Dataset,
}

impl BoProblem {
    /// Structural validation, raised eagerly at loop initialization.
    pub fn validate(&self) -> Result<()> {
        let n_inputs = self.data.n_inputs();
        let n_outputs = self.data.n_outputs();
        if self.domain.dim() != n_inputs {
            return Err(BoError::InvalidDomain(format!(
                "domain dimension {} does not match dataset inputs {}",
                self.domain.dim(),
                n_inputs
            )));
        }
        self.model.validate(n_inputs, n_outputs)?;
        if self.y_max.len() != n_outputs {
            return Err(BoError::InvalidModel(format!(
                "{} output constraints for {} outputs",
                self.y_max.len(),
                n_outputs
            )));
        }
        if self.noise_priors.len() != n_outputs {
            return Err(BoError::InvalidModel(format!(
                "{} noise priors for {} outputs",
                self.noise_priors.len(),
                n_outputs
            )));
        }
        if let Fitness::Linear(c) = &self.fitness {
            if c.len() != n_outputs {
                return Err(BoError::InvalidModel(format!(
                    "linear fitness has {} coefficients for {} outputs",
                    c.len(),
                    n_outputs
                )));
            }
        }
        Ok(())
    }
}
