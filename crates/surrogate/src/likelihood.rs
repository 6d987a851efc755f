//! Joint log-likelihood assembly over data, model parameters and observation
//! noise:
//!
//!   l(theta, lambda, noise) = log p(Y | X, params) + sum log pi_theta
//!                             + sum log pi_lambda + sum log pi_noise
//!
//! Non-finite intermediate values collapse to `-inf` so invalid parameter
//! samples are rejected by maximizers and samplers alike.

use crate::gp::cholesky_with_jitter;
use crate::model::{Model, ModelParams};
use crate::priors::Prior;
use ndarray::{Array1, ArrayView2};

const LN_2PI: f64 = 1.8378770664093453;

/// Joint log-likelihood of `(xt, yt)` (rows are points) under `model` with
/// parameters `params`, including the prior terms of the model and of the
/// per-output noise variances.
pub fn joint_loglik(
    model: &Model,
    xt: ArrayView2<f64>,
    yt: ArrayView2<f64>,
    params: &ModelParams,
    noise_priors: &[Prior],
) -> f64 {
    if params.noise_var.iter().any(|v| !v.is_finite() || *v <= 0.) {
        return f64::NEG_INFINITY;
    }

    let data_term = match model {
        Model::Parametric(p) => {
            let theta = match &params.theta {
                Some(t) => t,
                None => return f64::NEG_INFINITY,
            };
            let mut ll = 0.;
            for (i, x) in xt.rows().into_iter().enumerate() {
                let g = p.eval(&x, &theta.view());
                for j in 0..p.n_outputs() {
                    ll += ln_normal_pdf(yt[[i, j]], g[j], params.noise_var[j]);
                }
            }
            ll
        }
        Model::Gp(gp) => gp_data_term(
            gp.kernel(),
            gp.mean().map(|m| {
                xt.rows()
                    .into_iter()
                    .map(|row| (m)(&row))
                    .collect::<Vec<_>>()
            }),
            xt,
            yt,
            params,
        ),
        Model::Semiparametric(sp) => {
            let theta = match &params.theta {
                Some(t) => t,
                None => return f64::NEG_INFINITY,
            };
            let mean0 = xt
                .rows()
                .into_iter()
                .map(|row| sp.mean().eval(&row, &theta.view()))
                .collect::<Vec<_>>();
            gp_data_term(sp.gp().kernel(), Some(mean0), xt, yt, params)
        }
    };

    let mut ll = data_term;
    if let (Some(p), Some(theta)) = (model.parametric(), &params.theta) {
        for (prior, t) in p.theta_priors().iter().zip(theta.iter()) {
            ll += prior.logpdf(*t);
        }
    }
    if let (Some(gp), Some(lengthscales)) = (model.gp_part(), &params.lengthscales) {
        for (priors, ls) in gp.lengthscale_priors().iter().zip(lengthscales.iter()) {
            for (prior, l) in priors.iter().zip(ls.iter()) {
                ll += prior.logpdf(*l);
            }
        }
    }
    for (prior, v) in noise_priors.iter().zip(params.noise_var.iter()) {
        ll += prior.logpdf(*v);
    }

    if ll.is_nan() { f64::NEG_INFINITY } else { ll }
}

/// Per-output GP marginal log-likelihood through the Cholesky factor of
/// `K_j = k(X, X) + noise_j * I`.
fn gp_data_term(
    kernel: crate::kernel::Kernel,
    mean0: Option<Vec<Array1<f64>>>,
    xt: ArrayView2<f64>,
    yt: ArrayView2<f64>,
    params: &ModelParams,
) -> f64 {
    use linfa_linalg::cholesky::*;
    use linfa_linalg::triangular::*;
    use ndarray::Axis;

    let lengthscales = match &params.lengthscales {
        Some(ls) => ls,
        None => return f64::NEG_INFINITY,
    };
    let n = xt.nrows() as f64;
    let mut ll = 0.;
    for j in 0..yt.ncols() {
        let ls = &lengthscales[j];
        if ls.iter().any(|l| !l.is_finite() || *l <= 0.) {
            return f64::NEG_INFINITY;
        }
        let mut k = kernel.matrix(&xt, ls);
        for i in 0..k.nrows() {
            k[[i, i]] += params.noise_var[j];
        }
        let l_chol = match cholesky_with_jitter(&k) {
            Ok(c) => c,
            Err(_) => return f64::NEG_INFINITY,
        };
        let residual = match &mean0 {
            Some(m) => Array1::from_iter(
                yt.column(j)
                    .iter()
                    .enumerate()
                    .map(|(i, y)| y - m[i][j]),
            ),
            None => yt.column(j).to_owned(),
        };
        let rhs = residual.to_owned().insert_axis(Axis(1));
        let w = match l_chol.solve_triangular(&rhs, UPLO::Lower) {
            Ok(w) => w.remove_axis(Axis(1)),
            Err(_) => return f64::NEG_INFINITY,
        };
        let logdet = l_chol.diag().mapv(f64::ln).sum() * 2.;
        ll += -0.5 * (w.dot(&w) + logdet + n * LN_2PI);
    }
    ll
}

fn ln_normal_pdf(y: f64, mean: f64, var: f64) -> f64 {
    let d = y - mean;
    -0.5 * (d * d / var + var.ln() + LN_2PI)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use crate::model::Model;
    use crate::parametric::{ParametricModel, PredictorFn};
    use crate::GpModel;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::Arc;

    fn parametric_line() -> Model {
        let predictor: PredictorFn = Arc::new(|x, theta| array![theta[0] * x[0]]);
        Model::Parametric(ParametricModel::new(
            predictor,
            vec![Prior::Normal { mean: 0., std: 10. }],
            1,
        ))
    }

    #[test]
    fn test_parametric_loglik_peaks_at_truth() {
        let model = parametric_line();
        let xt = array![[1.0], [2.0], [3.0]];
        let yt = array![[2.0], [4.0], [6.0]];
        let noise_priors = [Prior::LogNormal { location: 0., scale: 1. }];
        let at = |slope: f64| {
            let params = ModelParams {
                theta: Some(array![slope]),
                lengthscales: None,
                noise_var: array![0.01],
            };
            joint_loglik(&model, xt.view(), yt.view(), &params, &noise_priors)
        };
        assert!(at(2.0) > at(1.5));
        assert!(at(2.0) > at(2.5));
    }

    #[test]
    fn test_invalid_noise_rejected() {
        let model = parametric_line();
        let xt = array![[1.0]];
        let yt = array![[2.0]];
        let params = ModelParams {
            theta: Some(array![2.0]),
            lengthscales: None,
            noise_var: array![-1.0],
        };
        assert_eq!(
            joint_loglik(&model, xt.view(), yt.view(), &params, &[]),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_gp_loglik_finite_and_prior_sensitive() {
        let model = Model::Gp(GpModel::new(
            Kernel::SquaredExponential,
            vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
        ));
        let xt = array![[0.0], [1.0], [2.0]];
        let yt = array![[0.0], [1.0], [0.5]];
        let params = ModelParams {
            theta: None,
            lengthscales: Some(vec![array![1.0]]),
            noise_var: array![0.1],
        };
        let noise_priors = [Prior::LogNormal { location: 0., scale: 1. }];
        let ll = joint_loglik(&model, xt.view(), yt.view(), &params, &noise_priors);
        assert!(ll.is_finite());

        // dropping the noise prior changes the total by exactly its logpdf
        let ll_no_prior = joint_loglik(&model, xt.view(), yt.view(), &params, &[]);
        assert_abs_diff_eq!(
            ll - ll_no_prior,
            noise_priors[0].logpdf(0.1),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_gp_loglik_gaussian_single_point() {
        // single observation, unit kernel: marginal is N(0, 1 + noise)
        let model = Model::Gp(GpModel::new(
            Kernel::SquaredExponential,
            vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
        ));
        let xt = array![[0.0]];
        let yt = array![[0.7]];
        let params = ModelParams {
            theta: None,
            lengthscales: Some(vec![array![1.0]]),
            noise_var: array![0.5],
        };
        let ll = joint_loglik(&model, xt.view(), yt.view(), &params, &[]);
        let var: f64 = 1.5;
        let expected = -0.5 * (0.7 * 0.7 / var + var.ln() + LN_2PI);
        assert_abs_diff_eq!(ll, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_lengthscale_rejected() {
        let model = Model::Gp(GpModel::new(
            Kernel::SquaredExponential,
            vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
        ));
        let xt = array![[0.0]];
        let yt = array![[0.0]];
        let params = ModelParams {
            theta: None,
            lengthscales: Some(vec![array![-1.0]]),
            noise_var: array![0.1],
        };
        assert_eq!(
            joint_loglik(&model, xt.view(), yt.view(), &params, &[]),
            f64::NEG_INFINITY
        );
    }
}
