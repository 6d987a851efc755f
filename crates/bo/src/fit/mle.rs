use crate::data::Dataset;
use crate::errors::Result;
use crate::fit::{FitParams, ModelFitter, ParamSpace};
use crate::optimizers::{Algorithm, StartKind, generate_starts, minimize_multistart};
use baybox_surrogate::likelihood::joint_loglik;
use baybox_surrogate::{Model, Prior};
use finitediff::FiniteDiff;
use log::debug;
use ndarray::{Axis, concatenate};
use rand_xoshiro::Xoshiro256Plus;

/// Default number of multistart replicates for likelihood maximization
pub const MLE_OPTIM_N_START: usize = 10;
/// Default bound on likelihood evaluations of one replicate
pub const MLE_OPTIM_MAX_EVAL: usize = 1000;

/// Maximum-likelihood parameter inference through constrained multistart
/// maximization of the joint log-likelihood.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MleFitter {
    /// Number of multistart replicates (at least 1)
    pub n_start: usize,
    /// Bound on likelihood evaluations of one replicate
    pub max_eval: usize,
    /// Inner optimization backend
    pub algo: Algorithm,
    /// How replicate starting points are generated
    pub starts: StartKind,
}

impl Default for MleFitter {
    fn default() -> Self {
        MleFitter {
            n_start: MLE_OPTIM_N_START,
            max_eval: MLE_OPTIM_MAX_EVAL,
            algo: Algorithm::Cobyla,
            starts: StartKind::default(),
        }
    }
}

impl ModelFitter for MleFitter {
    fn fit(
        &self,
        model: &Model,
        data: &Dataset,
        noise_priors: &[Prior],
        rng: &mut Xoshiro256Plus,
    ) -> Result<FitParams> {
        let space = ParamSpace::new(model, noise_priors);
        let bounds = space.bounds_matrix();
        let xt = data.x();
        let yt = data.y();

        let objective = |p: &[f64], gradient: Option<&mut [f64]>, _u: &mut ()| -> f64 {
            let eval = |p: &[f64]| -> f64 {
                if p.iter().any(|v| v.is_nan()) {
                    return f64::INFINITY;
                }
                let params = space.unpack(p);
                let ll = joint_loglik(model, xt, yt, &params, noise_priors);
                if ll.is_finite() { -ll } else { f64::INFINITY }
            };
            if let Some(grad) = gradient {
                let p = p.to_vec();
                let g = p.central_diff(&|v: &Vec<f64>| eval(v));
                grad[..].copy_from_slice(&g);
            }
            eval(p)
        };

        // anchor start at the transformed prior means, remaining starts
        // spread over the bounds
        let anchor = space.init().insert_axis(Axis(0));
        let starts = if self.n_start > 1 {
            let spread = generate_starts(self.starts, &bounds, self.n_start - 1, rng);
            concatenate![Axis(0), anchor, spread]
        } else {
            anchor.to_owned()
        };
        debug!(
            "MLE multistart over {} starts in dimension {}",
            starts.nrows(),
            space.dim()
        );

        let (neg_ll, p_best) = minimize_multistart(
            self.algo,
            &objective,
            &[],
            &(),
            &bounds,
            &starts,
            self.max_eval,
        )?;
        debug!("MLE done, loglik = {}", -neg_ll);
        Ok(FitParams::Mle(space.unpack(p_best.as_slice().unwrap())))
    }
}
