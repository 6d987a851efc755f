use crate::BoState;
use argmin::core::CostFunction;
use ndarray::{Array1, Array2, ArrayView1};
use std::fmt;
use std::sync::Arc;

/// A user-supplied map from an output vector to a scalar quality.
pub type FitnessFn = Arc<dyn Fn(&ArrayView1<f64>) -> f64 + Send + Sync>;

/// Fitness over model outputs, maximized by the engine.
#[derive(Clone)]
pub enum Fitness {
    /// Linear fitness `F(y) = c . y`, enabling the closed-form acquisition
    Linear(Array1<f64>),
    /// General nonlinear fitness, forcing the sampled acquisition
    NonLinear(FitnessFn),
    /// No fitness; requires an acquisition that does not consume one
    None,
}

impl fmt::Debug for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fitness::Linear(c) => write!(f, "Fitness::Linear({c})"),
            Fitness::NonLinear(_) => write!(f, "Fitness::NonLinear"),
            Fitness::None => write!(f, "Fitness::None"),
        }
    }
}

impl Fitness {
    /// Evaluate the fitness of an output vector.
    ///
    /// **Panics** for [Fitness::None]; variant compatibility is checked at
    /// solver initialization.
    pub fn eval(&self, y: &ArrayView1<f64>) -> f64 {
        match self {
            Fitness::Linear(c) => c.dot(y),
            Fitness::NonLinear(f) => (f)(y),
            Fitness::None => panic!("fitness-free problems need a fitness-free acquisition"),
        }
    }

    /// Linear coefficients when the fitness is linear.
    pub fn linear_coeffs(&self) -> Option<&Array1<f64>> {
        match self {
            Fitness::Linear(c) => Some(c),
            _ => None,
        }
    }
}

/// An interface for the black-box objective function `f: R^n -> R^m`.
///
/// The function is evaluated one point at a time; `None` signals an
/// evaluation failure, surfaced as `EvaluationFailed` by default.
pub trait ObjectiveFn: Clone + Fn(&ArrayView1<f64>) -> Option<Array1<f64>> {}
impl<T> ObjectiveFn for T where T: Clone + Fn(&ArrayView1<f64>) -> Option<Array1<f64>> {}

/// A structure to handle the objective function for implementing
/// `argmin::CostFunction` to be used with the argmin framework.
#[derive(Clone)]
pub struct ObjFunc<O: ObjectiveFn> {
    fobj: O,
}

impl<O: ObjectiveFn> ObjFunc<O> {
    /// Constructor given the objective function
    pub fn new(fobj: O) -> Self {
        ObjFunc { fobj }
    }
}

impl<O: ObjectiveFn> CostFunction for ObjFunc<O> {
    /// Type of the parameter vector
    type Param = Array2<f64>;
    /// Type of the return value computed by the cost function
    type Output = Array2<f64>;

    /// Apply the objective to each row of `p`
    fn cost(&self, p: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let mut rows = Vec::with_capacity(p.nrows());
        for x in p.rows() {
            match (self.fobj)(&x) {
                Some(y) => rows.push(y),
                None => {
                    return Err(crate::BoError::EvaluationFailed(format!(
                        "objective returned no value at x={x}"
                    ))
                    .into());
                }
            }
        }
        let m = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut y = Array2::zeros((rows.len(), m));
        for (i, r) in rows.iter().enumerate() {
            y.row_mut(i).assign(r);
        }
        Ok(y)
    }
}

/// A trait for functions used by internal optimizers.
/// Functions are expected to be defined as `g(x, g, u)` where
/// * `x` is the input point,
/// * `g` an optional gradient to be updated if present,
/// * `u` information provided by the caller.
pub trait ObjFn<U>: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}
impl<T, U> ObjFn<U> for T where T: Fn(&[f64], Option<&mut [f64]>, &mut U) -> f64 {}

/// A termination condition evaluated once per loop head over the current
/// solver state.
pub trait TermCond: Send + Sync {
    /// Returns true when the loop has to stop.
    fn should_stop(&mut self, state: &BoState) -> bool;
}

/// Iteration budget: continues while fewer than `limit` iterations completed.
#[derive(Clone, Debug)]
pub struct IterLimit {
    limit: u64,
    iter: u64,
}

impl IterLimit {
    /// Constructor given the iteration budget
    pub fn new(limit: u64) -> Self {
        IterLimit { limit, iter: 0 }
    }
}

impl TermCond for IterLimit {
    fn should_stop(&mut self, _state: &BoState) -> bool {
        if self.iter < self.limit {
            self.iter += 1;
            false
        } else {
            true
        }
    }
}

/// Optimization result
#[derive(Clone, Debug)]
pub struct OptimResult {
    /// Best input found (admissible w.r.t. output constraints when possible)
    pub x_opt: Array1<f64>,
    /// Output at the best input
    pub y_opt: Array1<f64>,
    /// History of evaluated inputs
    pub x_hist: Array2<f64>,
    /// History of evaluated outputs
    pub y_hist: Array2<f64>,
    /// Final solver state
    pub state: BoState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use argmin::core::State;
    use ndarray::array;

    #[test]
    fn test_linear_fitness() {
        let f = Fitness::Linear(array![1., -2.]);
        assert_abs_diff_eq!(f.eval(&array![3., 1.].view()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nonlinear_fitness() {
        let f = Fitness::NonLinear(Arc::new(|y: &ArrayView1<f64>| -y[0] * y[0]));
        assert_abs_diff_eq!(f.eval(&array![2.].view()), -4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iter_limit_drives_exactly_n() {
        let mut cond = IterLimit::new(3);
        let state = BoState::new();
        let mut continues = 0;
        while !cond.should_stop(&state) {
            continues += 1;
            assert!(continues <= 3, "IterLimit(3) allowed more than 3 iterations");
        }
        assert_eq!(continues, 3);
        // stays stopped
        assert!(cond.should_stop(&state));
    }

    #[test]
    fn test_objfunc_propagates_failure() {
        let fobj = ObjFunc::new(|x: &ArrayView1<f64>| {
            if x[0] < 0. { None } else { Some(array![x[0]]) }
        });
        assert!(fobj.cost(&array![[1.0]]).is_ok());
        assert!(fobj.cost(&array![[-1.0]]).is_err());
    }
}
