use crate::criteria::{Acquisition, AcqData};
use crate::utils::{is_admissible, norm_cdf, norm_pdf};
use baybox_surrogate::Predictive;
use ndarray::{Array1, ArrayView1};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256Plus;

/// Default Monte-Carlo sample count of the sampled EI estimate
pub const EI_DEFAULT_N_DRAWS: usize = 200;

/// Expected Improvement over the best admissible fitness.
///
/// With a linear fitness and unconstrained outputs the fitness-projected
/// predictive is Gaussian and EI has the closed form
/// `s * pdf(z) + (m - f*) * cdf(z)` with `z = (m - f*) / s`; otherwise EI is
/// estimated by Monte Carlo over `n_draws` Gaussian output draws, counting
/// only draws meeting the output constraints.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExpectedImprovement {
    /// Monte-Carlo sample count of the sampled estimate
    pub n_draws: usize,
}

impl Default for ExpectedImprovement {
    fn default() -> Self {
        ExpectedImprovement {
            n_draws: EI_DEFAULT_N_DRAWS,
        }
    }
}

impl ExpectedImprovement {
    fn single(
        &self,
        post: &Predictive,
        x: &ArrayView1<f64>,
        data: &AcqData,
        rng: &mut Xoshiro256Plus,
    ) -> f64 {
        let (mu, var) = post.predict(x);
        let constrained = data.y_max.iter().any(|m| m.is_finite());
        match (data.fitness.linear_coeffs(), constrained) {
            (Some(c), false) => {
                let mean = c.dot(&mu);
                let s2 = c
                    .iter()
                    .zip(var.iter())
                    .map(|(ci, vi)| ci * ci * vi)
                    .sum::<f64>();
                if s2.abs() < f64::EPSILON {
                    return 0.;
                }
                let s = s2.sqrt();
                let z = (mean - data.best_fitness) / s;
                (s * norm_pdf(z) + (mean - data.best_fitness) * norm_cdf(z)).max(0.)
            }
            _ => {
                let std = var.mapv(f64::sqrt);
                let mut acc = 0.;
                let mut y = Array1::zeros(mu.len());
                for _ in 0..self.n_draws {
                    for j in 0..mu.len() {
                        let z: f64 = rng.sample(StandardNormal);
                        y[j] = mu[j] + std[j] * z;
                    }
                    if is_admissible(&y.view(), &data.y_max) {
                        acc += (data.fitness.eval(&y.view()) - data.best_fitness).max(0.);
                    }
                }
                acc / self.n_draws as f64
            }
        }
    }
}

impl Acquisition for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "EI"
    }

    fn value(
        &self,
        x: &ArrayView1<f64>,
        posteriors: &[Predictive],
        data: &AcqData,
        rng: &mut Xoshiro256Plus,
    ) -> f64 {
        let sum: f64 = posteriors
            .iter()
            .map(|post| self.single(post, x, data, rng))
            .sum();
        sum / posteriors.len() as f64
    }
}
