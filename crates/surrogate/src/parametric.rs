//! Parametric surrogate models: a user predictor `g(x, theta)` with priors on
//! `theta`. A linear specialization builds the predictor from per-output
//! feature lifts.

use crate::errors::{Result, SurrogateError};
use crate::priors::Prior;
use ndarray::{Array1, ArrayView1};
use std::fmt;
use std::sync::Arc;

/// A user-supplied parametric predictor `g(x, theta)` returning one value per
/// output dimension.
pub type PredictorFn = Arc<dyn Fn(&ArrayView1<f64>, &ArrayView1<f64>) -> Array1<f64> + Send + Sync>;

/// Per-output feature lifts `phi_j(x)` of a linear model.
pub type FeatureLift = Arc<dyn Fn(&ArrayView1<f64>) -> Vec<Array1<f64>> + Send + Sync>;

/// A parametric surrogate model `y ~ N(g(x, theta), diag(noise_var))`.
#[derive(Clone)]
pub struct ParametricModel {
    predictor: PredictorFn,
    theta_priors: Vec<Prior>,
    n_outputs: usize,
}

impl fmt::Debug for ParametricModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ParametricModel(n_params={}, n_outputs={})",
            self.theta_priors.len(),
            self.n_outputs
        )
    }
}

impl ParametricModel {
    /// Constructor given the predictor, one prior per parameter and the
    /// output dimension of the predictor.
    pub fn new(predictor: PredictorFn, theta_priors: Vec<Prior>, n_outputs: usize) -> Self {
        ParametricModel {
            predictor,
            theta_priors,
            n_outputs,
        }
    }

    /// Evaluate the predictor at `x` with parameters `theta`.
    pub fn eval(&self, x: &ArrayView1<f64>, theta: &ArrayView1<f64>) -> Array1<f64> {
        (self.predictor)(x, theta)
    }

    /// Priors over the flat parameter vector.
    pub fn theta_priors(&self) -> &[Prior] {
        &self.theta_priors
    }

    /// Number of free parameters.
    pub fn n_params(&self) -> usize {
        self.theta_priors.len()
    }

    /// Number of output dimensions.
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub(crate) fn predictor(&self) -> PredictorFn {
        self.predictor.clone()
    }
}

/// A linear parametric model `g(x, theta)_j = theta_j . phi_j(x)` where
/// `theta` is laid out as the concatenation of the per-output blocks.
///
/// Linear models are routed through the generic parametric path; no
/// closed-form posterior is computed.
#[derive(Clone)]
pub struct LinearModel {
    lift: FeatureLift,
    block_sizes: Vec<usize>,
    theta_priors: Vec<Prior>,
}

impl fmt::Debug for LinearModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinearModel(blocks={:?})", self.block_sizes)
    }
}

impl LinearModel {
    /// Constructor given the feature lift, the feature count of each output
    /// block and one prior per parameter; fails with `InvalidModel` when
    /// `theta_priors.len()` differs from the sum of `block_sizes`.
    pub fn new(lift: FeatureLift, block_sizes: Vec<usize>, theta_priors: Vec<Prior>) -> Result<Self> {
        let n_params: usize = block_sizes.iter().sum();
        if theta_priors.len() != n_params {
            return Err(SurrogateError::InvalidModel(format!(
                "linear model expects {} priors for blocks {:?}, got {}",
                n_params,
                block_sizes,
                theta_priors.len()
            )));
        }
        Ok(LinearModel {
            lift,
            block_sizes,
            theta_priors,
        })
    }

    /// Lower the linear model into its generic parametric form.
    pub fn into_parametric(self) -> ParametricModel {
        let lift = self.lift.clone();
        let block_sizes = self.block_sizes.clone();
        let n_outputs = block_sizes.len();
        let predictor: PredictorFn = Arc::new(move |x, theta| {
            let features = (lift)(x);
            let mut y = Array1::zeros(n_outputs);
            let mut offset = 0;
            for (j, size) in block_sizes.iter().enumerate() {
                let block = theta.slice(ndarray::s![offset..offset + size]);
                y[j] = block.dot(&features[j]);
                offset += size;
            }
            y
        });
        ParametricModel::new(predictor, self.theta_priors, n_outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_parametric_eval() {
        let predictor: PredictorFn =
            Arc::new(|x, theta| array![theta[0] * x[0] + theta[1] * x[0].cos()]);
        let model = ParametricModel::new(
            predictor,
            vec![
                Prior::Normal { mean: 0., std: 1. },
                Prior::Normal { mean: 0., std: 1. },
            ],
            1,
        );
        let y = model.eval(&array![2.0].view(), &array![3.0, 0.0].view());
        assert_abs_diff_eq!(y[0], 6.0, epsilon = 1e-12);
        assert_eq!(model.n_params(), 2);
    }

    #[test]
    fn test_linear_model_blocks() {
        // two outputs: y_0 = a + b*x, y_1 = c*x^2
        let lift: FeatureLift = Arc::new(|x| vec![array![1., x[0]], array![x[0] * x[0]]]);
        let model = LinearModel::new(
            lift,
            vec![2, 1],
            vec![
                Prior::Normal { mean: 0., std: 1. },
                Prior::Normal { mean: 0., std: 1. },
                Prior::Normal { mean: 0., std: 1. },
            ],
        )
        .unwrap()
        .into_parametric();
        let y = model.eval(&array![3.0].view(), &array![1.0, 2.0, 0.5].view());
        assert_abs_diff_eq!(y[0], 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y[1], 4.5, epsilon = 1e-12);
        assert_eq!(model.n_outputs(), 2);
    }

    #[test]
    fn test_linear_model_bad_prior_count() {
        let lift: FeatureLift = Arc::new(|x| vec![array![x[0]]]);
        let res = LinearModel::new(lift, vec![1], vec![]);
        assert!(matches!(res, Err(SurrogateError::InvalidModel(_))));
    }
}
