//! Gaussian process surrogate model and its posterior predictive
//! construction. Each output dimension is fitted independently (no
//! cross-output covariance).

use crate::errors::{Result, SurrogateError};
use crate::kernel::Kernel;
use crate::priors::Prior;
use linfa_linalg::cholesky::*;
use linfa_linalg::triangular::*;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::fmt;
use std::sync::Arc;

/// A mean function returning one value per output dimension.
pub type MeanFn = Arc<dyn Fn(&ArrayView1<f64>) -> Array1<f64> + Send + Sync>;

/// Initial additive jitter applied when a covariance matrix fails to factor
pub const JITTER_START: f64 = 1e-10;
/// Jitter ceiling; factorization failing at this level is an error
pub const JITTER_MAX: f64 = 1e-4;

/// A Gaussian process surrogate with optional mean function and a kernel
/// parameterized by per-output, per-dimension length-scales with priors.
#[derive(Clone)]
pub struct GpModel {
    mean: Option<MeanFn>,
    kernel: Kernel,
    /// One vector of priors per output, one prior per input dimension
    lengthscale_priors: Vec<Vec<Prior>>,
}

impl fmt::Debug for GpModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GpModel(kernel={}, n_outputs={}, mean={})",
            self.kernel,
            self.lengthscale_priors.len(),
            if self.mean.is_some() { "custom" } else { "zero" }
        )
    }
}

impl GpModel {
    /// Constructor given a kernel and length-scale priors laid out as
    /// `lengthscale_priors[output][input_dimension]`.
    pub fn new(kernel: Kernel, lengthscale_priors: Vec<Vec<Prior>>) -> Self {
        GpModel {
            mean: None,
            kernel,
            lengthscale_priors,
        }
    }

    /// Sets the mean function of the process (defaults to zero).
    pub fn with_mean(mut self, mean: MeanFn) -> Self {
        self.mean = Some(mean);
        self
    }

    /// Kernel shared by all outputs.
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Mean function, if any.
    pub fn mean(&self) -> Option<&MeanFn> {
        self.mean.as_ref()
    }

    /// Length-scale priors per output.
    pub fn lengthscale_priors(&self) -> &[Vec<Prior>] {
        &self.lengthscale_priors
    }

    /// Number of output dimensions.
    pub fn n_outputs(&self) -> usize {
        self.lengthscale_priors.len()
    }

    /// Number of input dimensions the length-scale priors are laid out for.
    pub fn n_inputs(&self) -> usize {
        self.lengthscale_priors.first().map(|p| p.len()).unwrap_or(0)
    }

    /// Checks the prior layout is rectangular and matches the input dimension.
    pub(crate) fn validate(&self, n_inputs: usize) -> Result<()> {
        if self.lengthscale_priors.is_empty() {
            return Err(SurrogateError::InvalidModel(
                "GP model needs length-scale priors for at least one output".to_string(),
            ));
        }
        for (j, priors) in self.lengthscale_priors.iter().enumerate() {
            if priors.len() != n_inputs {
                return Err(SurrogateError::InvalidModel(format!(
                    "length-scale priors of output {} cover {} dimensions, expected {}",
                    j,
                    priors.len(),
                    n_inputs
                )));
            }
        }
        Ok(())
    }
}

/// Cholesky factorization with jitter escalation: on failure an `eps * I`
/// term is added, with `eps` doubling from [JITTER_START] up to [JITTER_MAX].
pub(crate) fn cholesky_with_jitter(k: &Array2<f64>) -> Result<Array2<f64>> {
    if let Ok(chol) = k.cholesky() {
        return Ok(chol);
    }
    let mut eps = JITTER_START;
    while eps <= JITTER_MAX {
        let mut jittered = k.to_owned();
        for i in 0..jittered.nrows() {
            jittered[[i, i]] += eps;
        }
        if let Ok(chol) = jittered.cholesky() {
            debug!("covariance factored with jitter {eps:e}");
            return Ok(chol);
        }
        eps *= 2.;
    }
    Err(SurrogateError::IllConditioned(format!(
        "covariance not positive-definite after jitter {JITTER_MAX:e}"
    )))
}

/// Posterior predictive of one GP output dimension, conditioned on training
/// inputs and the residuals of that output.
#[derive(Clone, Debug)]
pub struct GpOutputPosterior {
    xt: Array2<f64>,
    kernel: Kernel,
    lengthscales: Array1<f64>,
    noise_var: f64,
    /// Lower Cholesky factor of `K = k(X, X) + noise_var * I`
    l_chol: Array2<f64>,
    /// `K^-1 (y - mean(X))`
    alpha: Array1<f64>,
}

impl GpOutputPosterior {
    /// Condition the process on `(xt, residual)` where `residual` is the
    /// output column minus the mean function values at `xt`.
    pub fn fit(
        kernel: Kernel,
        lengthscales: Array1<f64>,
        noise_var: f64,
        xt: ArrayView2<f64>,
        residual: ArrayView1<f64>,
    ) -> Result<Self> {
        let mut k = kernel.matrix(&xt, &lengthscales);
        for i in 0..k.nrows() {
            k[[i, i]] += noise_var;
        }
        let l_chol = cholesky_with_jitter(&k)?;
        let rhs = residual.to_owned().insert_axis(Axis(1));
        let w = l_chol
            .solve_triangular(&rhs, UPLO::Lower)
            .map_err(|e| SurrogateError::IllConditioned(e.to_string()))?;
        let alpha = l_chol
            .t()
            .solve_triangular(&w, UPLO::Upper)
            .map_err(|e| SurrogateError::IllConditioned(e.to_string()))?
            .remove_axis(Axis(1));
        Ok(GpOutputPosterior {
            xt: xt.to_owned(),
            kernel,
            lengthscales,
            noise_var,
            l_chol,
            alpha,
        })
    }

    /// Predictive mean and variance at `x`, given the mean function value
    /// `mean0` at `x`. The variance is clamped at zero.
    pub fn predict(&self, x: &ArrayView1<f64>, mean0: f64) -> (f64, f64) {
        let kx = self.kernel.cross(x, &self.xt, &self.lengthscales);
        let mean = mean0 + kx.dot(&self.alpha);
        let rhs = kx.to_owned().insert_axis(Axis(1));
        // L w = k_x; var = k(x,x) - w.w
        let w = self
            .l_chol
            .solve_triangular(&rhs, UPLO::Lower)
            .expect("triangular system with factored covariance")
            .remove_axis(Axis(1));
        let var = self.kernel.value(x, x, &self.lengthscales) - w.dot(&w);
        // machine precision may drive the variance slightly negative
        (mean, var.max(0.))
    }

    /// Observation noise variance of this output.
    pub fn noise_var(&self) -> f64 {
        self.noise_var
    }

    /// Training inputs the posterior is conditioned on.
    pub fn training_inputs(&self) -> ArrayView2<f64> {
        self.xt.view()
    }
}
