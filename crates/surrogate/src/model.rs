//! Surrogate model variants and their posterior predictive construction.
//!
//! The closed set of variants mirrors the engine contract: parametric
//! (predictor + priors), nonparametric (GP) and semiparametric (parametric
//! trend used as the GP mean). Open extension happens through
//! [Model::posterior] and [crate::likelihood::joint_loglik], the capability
//! surface the inference and acquisition layers consume.

use crate::errors::{Result, SurrogateError};
use crate::gp::{GpModel, GpOutputPosterior, MeanFn};
use crate::parametric::{ParametricModel, PredictorFn};
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::sync::Arc;

/// A surrogate model over `f: R^n -> R^m`.
#[derive(Clone, Debug)]
pub enum Model {
    /// Parametric predictor with parameter priors
    Parametric(ParametricModel),
    /// Gaussian process, outputs fitted independently
    Gp(GpModel),
    /// Parametric trend combined with a GP residual
    Semiparametric(Semiparametric),
}

/// A semiparametric model: the parametric part acts as the GP mean.
///
/// The GP part must not carry an independent mean; this is checked at
/// construction.
#[derive(Clone, Debug)]
pub struct Semiparametric {
    mean: ParametricModel,
    gp: GpModel,
}

impl Semiparametric {
    /// Constructor; fails with `InvalidModel` when the GP part already has a
    /// mean function.
    pub fn new(mean: ParametricModel, gp: GpModel) -> Result<Self> {
        if gp.mean().is_some() {
            return Err(SurrogateError::InvalidModel(
                "semiparametric model requires a GP part without mean function".to_string(),
            ));
        }
        if mean.n_outputs() != gp.n_outputs() {
            return Err(SurrogateError::InvalidModel(format!(
                "parametric mean has {} outputs, GP part has {}",
                mean.n_outputs(),
                gp.n_outputs()
            )));
        }
        Ok(Semiparametric { mean, gp })
    }

    /// Parametric trend part.
    pub fn mean(&self) -> &ParametricModel {
        &self.mean
    }

    /// GP residual part.
    pub fn gp(&self) -> &GpModel {
        &self.gp
    }
}

/// Inferred parameter values of a [Model], any component may be absent
/// depending on the variant.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelParams {
    /// Parametric parameters `theta`
    pub theta: Option<Array1<f64>>,
    /// Per-output length-scales of the GP kernel
    pub lengthscales: Option<Vec<Array1<f64>>>,
    /// Per-output Gaussian observation noise variance
    pub noise_var: Array1<f64>,
}

impl Model {
    /// Number of output dimensions the model covers.
    pub fn n_outputs(&self) -> usize {
        match self {
            Model::Parametric(p) => p.n_outputs(),
            Model::Gp(gp) => gp.n_outputs(),
            Model::Semiparametric(sp) => sp.gp().n_outputs(),
        }
    }

    /// Parametric part, if the variant has one.
    pub fn parametric(&self) -> Option<&ParametricModel> {
        match self {
            Model::Parametric(p) => Some(p),
            Model::Semiparametric(sp) => Some(sp.mean()),
            Model::Gp(_) => None,
        }
    }

    /// GP part, if the variant has one.
    pub fn gp_part(&self) -> Option<&GpModel> {
        match self {
            Model::Gp(gp) => Some(gp),
            Model::Semiparametric(sp) => Some(sp.gp()),
            Model::Parametric(_) => None,
        }
    }

    /// Structural validation against the problem dimensions.
    pub fn validate(&self, n_inputs: usize, n_outputs: usize) -> Result<()> {
        if self.n_outputs() != n_outputs {
            return Err(SurrogateError::InvalidModel(format!(
                "model covers {} outputs, problem has {}",
                self.n_outputs(),
                n_outputs
            )));
        }
        if let Some(gp) = self.gp_part() {
            gp.validate(n_inputs)?;
        }
        Ok(())
    }

    /// Checks an inferred parameter set structurally matches this model.
    pub fn validate_params(&self, params: &ModelParams) -> Result<()> {
        if self.parametric().is_some() && params.theta.is_none() {
            return Err(SurrogateError::InvalidModel(
                "model has a parametric part but no theta was inferred".to_string(),
            ));
        }
        if let Some(gp) = self.gp_part() {
            match &params.lengthscales {
                None => {
                    return Err(SurrogateError::InvalidModel(
                        "model has a GP part but no length-scales were inferred".to_string(),
                    ));
                }
                Some(ls) => {
                    if ls.len() != gp.n_outputs() {
                        return Err(SurrogateError::InvalidModel(format!(
                            "{} length-scale vectors inferred for {} outputs",
                            ls.len(),
                            gp.n_outputs()
                        )));
                    }
                }
            }
        }
        if params.noise_var.len() != self.n_outputs() {
            return Err(SurrogateError::InvalidModel(format!(
                "{} noise variances for {} outputs",
                params.noise_var.len(),
                self.n_outputs()
            )));
        }
        Ok(())
    }

    /// Build the posterior predictive from training data `(xt, yt)` (rows are
    /// points) and inferred parameters.
    pub fn posterior(
        &self,
        xt: ArrayView2<f64>,
        yt: ArrayView2<f64>,
        params: &ModelParams,
    ) -> Result<Predictive> {
        self.validate_params(params)?;
        match self {
            Model::Parametric(p) => Ok(Predictive::Parametric {
                predictor: p.predictor(),
                theta: params.theta.clone().unwrap(),
                noise_var: params.noise_var.clone(),
            }),
            Model::Gp(gp) => {
                let mean = gp.mean().cloned();
                gp_posterior(gp, mean, xt, yt, params)
            }
            Model::Semiparametric(sp) => {
                let theta = params.theta.clone().unwrap();
                let predictor = sp.mean().predictor();
                let mean: MeanFn = Arc::new(move |x| (predictor)(x, &theta.view()));
                gp_posterior(sp.gp(), Some(mean), xt, yt, params)
            }
        }
    }
}

fn gp_posterior(
    gp: &GpModel,
    mean: Option<MeanFn>,
    xt: ArrayView2<f64>,
    yt: ArrayView2<f64>,
    params: &ModelParams,
) -> Result<Predictive> {
    let lengthscales = params.lengthscales.as_ref().unwrap();
    let mean0: Vec<Array1<f64>> = match &mean {
        Some(m) => xt.rows().into_iter().map(|row| (m)(&row)).collect(),
        None => vec![],
    };
    let mut outputs = Vec::with_capacity(gp.n_outputs());
    for j in 0..gp.n_outputs() {
        let y_col = yt.column(j);
        let residual = if mean.is_some() {
            Array1::from_iter(
                y_col
                    .iter()
                    .enumerate()
                    .map(|(i, y)| y - mean0[i][j]),
            )
        } else {
            y_col.to_owned()
        };
        outputs.push(GpOutputPosterior::fit(
            gp.kernel(),
            lengthscales[j].clone(),
            params.noise_var[j],
            xt,
            residual.view(),
        )?);
    }
    Ok(Predictive::Gp { mean, outputs })
}

/// Posterior predictive of a fitted model: per-output marginal mean and
/// variance at any point, with no cross-output correlation.
#[derive(Clone)]
pub enum Predictive {
    /// Parametric predictive: mean `g(x, theta)`, variance `noise_var`
    Parametric {
        /// Predictor of the underlying model
        predictor: PredictorFn,
        /// Inferred parameters
        theta: Array1<f64>,
        /// Per-output noise variance
        noise_var: Array1<f64>,
    },
    /// GP (or semiparametric) predictive
    Gp {
        /// Mean function shared by the outputs (zero when absent)
        mean: Option<MeanFn>,
        /// Conditioned per-output posteriors
        outputs: Vec<GpOutputPosterior>,
    },
}

impl Predictive {
    /// Marginal predictive `(mean, variance)` per output at `x`.
    pub fn predict(&self, x: &ArrayView1<f64>) -> (Array1<f64>, Array1<f64>) {
        match self {
            Predictive::Parametric {
                predictor,
                theta,
                noise_var,
            } => ((predictor)(x, &theta.view()), noise_var.clone()),
            Predictive::Gp { mean, outputs } => {
                let mean0 = mean.as_ref().map(|m| (m)(x));
                let mut mu = Array1::zeros(outputs.len());
                let mut var = Array1::zeros(outputs.len());
                for (j, out) in outputs.iter().enumerate() {
                    let m0 = mean0.as_ref().map(|m| m[j]).unwrap_or(0.);
                    let (m, v) = out.predict(x, m0);
                    mu[j] = m;
                    var[j] = v;
                }
                (mu, var)
            }
        }
    }

    /// Number of output dimensions.
    pub fn n_outputs(&self) -> usize {
        match self {
            Predictive::Parametric { noise_var, .. } => noise_var.len(),
            Predictive::Gp { outputs, .. } => outputs.len(),
        }
    }
}
