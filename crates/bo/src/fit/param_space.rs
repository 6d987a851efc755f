//! Flat parameter vector `[theta; vec(lengthscales); noise_var]` shared by
//! the MLE and Bayesian fitters, with the transforms keeping each block in
//! its admissible region:
//!
//! * `theta` is optimized in its raw space,
//! * length-scales are optimized in `log10` space,
//! * noise variances are softplus-transformed.
//!
//! Box bounds are derived from the prior supports, truncated to a
//! finite high-mass interval when a support is unbounded.

use crate::utils::{softplus, softplus_inv, softplus_log_grad};
use baybox_surrogate::{Model, ModelParams, Prior};
use ndarray::{Array1, Array2};
use rand_xoshiro::Xoshiro256Plus;

const LN_10: f64 = std::f64::consts::LN_10;
/// Smallest positive value a transformed positive parameter may take
const POSITIVE_FLOOR: f64 = 1e-10;

/// Finite box bounds covering the high-mass region of a prior.
fn finite_bounds(prior: &Prior) -> (f64, f64) {
    match prior {
        Prior::Normal { mean, std } => (mean - 6. * std, mean + 6. * std),
        Prior::LogNormal { location, scale } => {
            ((location - 6. * scale).exp(), (location + 6. * scale).exp())
        }
        Prior::Uniform { low, high } => (*low, *high),
        Prior::Exponential { rate } => (POSITIVE_FLOOR, 20. / rate),
        Prior::Fixed(v) => (*v, *v),
    }
}

/// Layout and transforms of the flat inference vector.
#[derive(Clone, Debug)]
pub(crate) struct ParamSpace {
    n_theta: usize,
    /// Length-scale dimensions per output of the GP part
    ls_dims: Vec<usize>,
    n_noise: usize,
    /// Transformed-space bounds, one per flat component
    bounds: Vec<(f64, f64)>,
    /// Transformed prior means, the deterministic anchor start
    init: Vec<f64>,
}

impl ParamSpace {
    pub fn new(model: &Model, noise_priors: &[Prior]) -> Self {
        let mut bounds = Vec::new();
        let mut init = Vec::new();

        let n_theta = model.parametric().map(|p| p.n_params()).unwrap_or(0);
        if let Some(p) = model.parametric() {
            for prior in p.theta_priors() {
                bounds.push(finite_bounds(prior));
                init.push(prior.mean());
            }
        }

        let mut ls_dims = Vec::new();
        if let Some(gp) = model.gp_part() {
            for priors in gp.lengthscale_priors() {
                ls_dims.push(priors.len());
                for prior in priors {
                    let (lo, hi) = finite_bounds(prior);
                    bounds.push((lo.max(POSITIVE_FLOOR).log10(), hi.max(POSITIVE_FLOOR).log10()));
                    init.push(prior.mean().max(POSITIVE_FLOOR).log10());
                }
            }
        }

        let n_noise = noise_priors.len();
        for prior in noise_priors {
            let (lo, hi) = finite_bounds(prior);
            bounds.push((
                softplus_inv(lo.max(POSITIVE_FLOOR)),
                softplus_inv(hi.max(POSITIVE_FLOOR)),
            ));
            init.push(softplus_inv(prior.mean().max(POSITIVE_FLOOR)));
        }

        ParamSpace {
            n_theta,
            ls_dims,
            n_noise,
            bounds,
            init,
        }
    }

    /// Flat dimension of the inference vector.
    pub fn dim(&self) -> usize {
        self.bounds.len()
    }

    /// Transformed-space box bounds as a (dim, 2) matrix.
    pub fn bounds_matrix(&self) -> Array2<f64> {
        let mut m = Array2::zeros((self.bounds.len(), 2));
        for (i, (lo, hi)) in self.bounds.iter().enumerate() {
            m[[i, 0]] = *lo;
            m[[i, 1]] = *hi;
        }
        m
    }

    /// Deterministic starting vector (transformed prior means).
    pub fn init(&self) -> Array1<f64> {
        Array1::from_vec(self.init.clone())
    }

    /// Random starting vector drawn from the priors, transformed and clipped
    /// into the box bounds.
    pub fn sample_init(
        &self,
        model: &Model,
        noise_priors: &[Prior],
        rng: &mut Xoshiro256Plus,
    ) -> Array1<f64> {
        let mut v = Vec::with_capacity(self.dim());
        if let Some(p) = model.parametric() {
            for prior in p.theta_priors() {
                v.push(prior.sample(rng));
            }
        }
        if let Some(gp) = model.gp_part() {
            for priors in gp.lengthscale_priors() {
                for prior in priors {
                    v.push(prior.sample(rng).max(POSITIVE_FLOOR).log10());
                }
            }
        }
        for prior in noise_priors {
            v.push(softplus_inv(prior.sample(rng).max(POSITIVE_FLOOR)));
        }
        let mut v = Array1::from_vec(v);
        for (i, (lo, hi)) in self.bounds.iter().enumerate() {
            v[i] = v[i].clamp(*lo, *hi);
        }
        v
    }

    /// Split a transformed flat vector back into model parameters.
    pub fn unpack(&self, p: &[f64]) -> ModelParams {
        let theta = if self.n_theta > 0 {
            Some(Array1::from_vec(p[..self.n_theta].to_vec()))
        } else {
            None
        };
        let mut offset = self.n_theta;
        let lengthscales = if self.ls_dims.is_empty() {
            None
        } else {
            let mut per_output = Vec::with_capacity(self.ls_dims.len());
            for d in &self.ls_dims {
                let ls = p[offset..offset + d]
                    .iter()
                    .map(|v| 10f64.powf(*v))
                    .collect::<Vec<_>>();
                per_output.push(Array1::from_vec(ls));
                offset += d;
            }
            Some(per_output)
        };
        let noise_var = Array1::from_iter(p[offset..offset + self.n_noise].iter().map(|v| softplus(*v)));
        ModelParams {
            theta,
            lengthscales,
            noise_var,
        }
    }

    /// Change-of-variable correction `sum ln |d transform / d p|` of the
    /// transformed components, added to the log-density when sampling in the
    /// unconstrained space.
    pub fn log_jacobian(&self, p: &[f64]) -> f64 {
        let mut lj = 0.;
        let mut offset = self.n_theta;
        for d in &self.ls_dims {
            for v in &p[offset..offset + d] {
                // d(10^v)/dv = 10^v ln 10
                lj += v * LN_10 + LN_10.ln();
            }
            offset += d;
        }
        for v in &p[offset..offset + self.n_noise] {
            lj += softplus_log_grad(*v);
        }
        lj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use baybox_surrogate::{GpModel, Kernel, ParametricModel, PredictorFn};
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use std::sync::Arc;

    fn gp_model() -> Model {
        Model::Gp(GpModel::new(
            Kernel::SquaredExponential,
            vec![vec![Prior::LogNormal { location: 0., scale: 1. }; 2]],
        ))
    }

    #[test]
    fn test_layout_gp() {
        let model = gp_model();
        let noise = [Prior::LogNormal { location: -2., scale: 1. }];
        let space = ParamSpace::new(&model, &noise);
        // 2 lengthscales + 1 noise
        assert_eq!(space.dim(), 3);
        let params = space.unpack(&[0., 1., softplus_inv(0.5)]);
        assert!(params.theta.is_none());
        let ls = params.lengthscales.unwrap();
        assert_abs_diff_eq!(ls[0][0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ls[0][1], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(params.noise_var[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_layout_parametric() {
        let predictor: PredictorFn = Arc::new(|x, theta| array![theta[0] * x[0] + theta[1]]);
        let model = Model::Parametric(ParametricModel::new(
            predictor,
            vec![
                Prior::Normal { mean: 1., std: 1. },
                Prior::Uniform { low: -2., high: 2. },
            ],
            1,
        ));
        let noise = [Prior::Normal { mean: 1., std: 1. }];
        let space = ParamSpace::new(&model, &noise);
        assert_eq!(space.dim(), 3);
        // theta block is untransformed
        let params = space.unpack(&[0.5, -1., 0.]);
        assert_eq!(params.theta.unwrap(), array![0.5, -1.]);
        // noise is softplus-transformed and stays positive
        assert_abs_diff_eq!(params.noise_var[0], softplus(0.), epsilon = 1e-12);
        // bounds of the uniform prior pass through untouched
        let bounds = space.bounds_matrix();
        assert_abs_diff_eq!(bounds[[1, 0]], -2., epsilon = 1e-12);
        assert_abs_diff_eq!(bounds[[1, 1]], 2., epsilon = 1e-12);
    }

    #[test]
    fn test_unpack_always_positive_noise() {
        let model = gp_model();
        let noise = [Prior::Normal { mean: 1., std: 1. }];
        let space = ParamSpace::new(&model, &noise);
        for raw in [-30., -1., 0., 5.] {
            let params = space.unpack(&[0., 0., raw]);
            assert!(params.noise_var[0] > 0.);
        }
    }

    #[test]
    fn test_sample_init_within_bounds() {
        let model = gp_model();
        let noise = [Prior::LogNormal { location: -2., scale: 1. }];
        let space = ParamSpace::new(&model, &noise);
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        for _ in 0..20 {
            let v = space.sample_init(&model, &noise, &mut rng);
            for (i, (lo, hi)) in space.bounds.iter().enumerate() {
                assert!(v[i] >= *lo && v[i] <= *hi);
            }
        }
    }

    #[test]
    fn test_log_jacobian_matches_numeric() {
        let model = gp_model();
        let noise = [Prior::LogNormal { location: -2., scale: 1. }];
        let space = ParamSpace::new(&model, &noise);
        let p = [0.3, -0.2, 0.4];
        // numeric check of one length-scale component
        let h = 1e-6;
        let f = |v: f64| 10f64.powf(v);
        let numeric = ((f(p[0] + h) - f(p[0] - h)) / (2. * h)).ln()
            + ((f(p[1] + h) - f(p[1] - h)) / (2. * h)).ln()
            + ((softplus(p[2] + h) - softplus(p[2] - h)) / (2. * h)).ln();
        assert_abs_diff_eq!(space.log_jacobian(&p), numeric, epsilon = 1e-5);
    }
}
