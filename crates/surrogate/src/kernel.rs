//! Positive-definite covariance kernels parameterized by per-dimension
//! length-scales. One kernel instance models the spatial correlation of a
//! single output dimension.

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Covariance kernels available for Gaussian process surrogates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kernel {
    /// Squared exponential (RBF) kernel
    ///
    ///   k(x, x') = exp( -1/2 sum_j ((x_j - x'_j) / l_j)^2 )
    #[default]
    SquaredExponential,
    /// Absolute exponential kernel
    ///
    ///   k(x, x') = exp( -sum_j |x_j - x'_j| / l_j )
    AbsoluteExponential,
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kernel::SquaredExponential => write!(f, "SquaredExponential"),
            Kernel::AbsoluteExponential => write!(f, "AbsoluteExponential"),
        }
    }
}

impl Kernel {
    /// Kernel value between two points given length-scales `ls` (one per dimension).
    pub fn value(&self, x: &ArrayView1<f64>, y: &ArrayView1<f64>, ls: &Array1<f64>) -> f64 {
        match self {
            Kernel::SquaredExponential => {
                let r = x
                    .iter()
                    .zip(y.iter())
                    .zip(ls.iter())
                    .map(|((a, b), l)| {
                        let d = (a - b) / l;
                        d * d
                    })
                    .sum::<f64>();
                (-0.5 * r).exp()
            }
            Kernel::AbsoluteExponential => {
                let r = x
                    .iter()
                    .zip(y.iter())
                    .zip(ls.iter())
                    .map(|((a, b), l)| (a - b).abs() / l)
                    .sum::<f64>();
                (-r).exp()
            }
        }
    }

    /// Symmetric kernel matrix over the rows of `x`.
    pub fn matrix(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, ls: &Array1<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        for i in 0..n {
            k[[i, i]] = self.value(&x.row(i), &x.row(i), ls);
            for j in (i + 1)..n {
                let v = self.value(&x.row(i), &x.row(j), ls);
                k[[i, j]] = v;
                k[[j, i]] = v;
            }
        }
        k
    }

    /// Cross-covariance vector between a point `x` and the rows of `xt`.
    pub fn cross(
        &self,
        x: &ArrayView1<f64>,
        xt: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        ls: &Array1<f64>,
    ) -> Array1<f64> {
        let mut k = Array1::zeros(xt.nrows());
        for (i, row) in xt.rows().into_iter().enumerate() {
            k[i] = self.value(x, &row, ls);
        }
        k
    }
}
