use crate::types::ObjFn;
use cobyla::RhoBeg;
use ndarray::{Array1, Array2, ArrayView1, arr1};

/// Inner optimization backends unified behind the [Optimizer] facade.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    /// Derivative-free optimizer handling box bounds and nonlinear
    /// inequality constraints
    Cobyla,
    /// Gradient-based SQP optimizer (gradients supplied through the
    /// objective closure)
    Slsqp,
}

/// Default bound on objective evaluations of a single replicate
pub const OPTIM_MAX_EVAL_DEFAULT: usize = 2000;

/// Facade for the inner optimization algorithms.
///
/// The facade minimizes; callers maximizing a criterion hand over its
/// negation. A failed run yields an infinite cost so replicates can be
/// ranked and isolated uniformly.
pub struct Optimizer<'a, U> {
    algo: Algorithm,
    fun: &'a (dyn ObjFn<U> + Sync),
    cons: Vec<&'a (dyn ObjFn<U> + Sync)>,
    bounds: Array2<f64>,
    user_data: &'a U,
    max_eval: usize,
    xinit: Option<Array1<f64>>,
    ftol_abs: Option<f64>,
    ftol_rel: Option<f64>,
}

impl<'a, U: Clone> Optimizer<'a, U> {
    /// Constructor given the algorithm, the objective, inequality
    /// constraints (feasible when negative), caller data and `(n, 2)` bounds.
    pub fn new(
        algo: Algorithm,
        fun: &'a (dyn ObjFn<U> + Sync),
        cons: &[&'a (dyn ObjFn<U> + Sync)],
        user_data: &'a U,
        bounds: &Array2<f64>,
    ) -> Self {
        Optimizer {
            algo,
            fun,
            cons: cons.to_vec(),
            bounds: bounds.clone(),
            user_data,
            max_eval: OPTIM_MAX_EVAL_DEFAULT,
            xinit: None,
            ftol_abs: None,
            ftol_rel: None,
        }
    }

    /// Sets the absolute tolerance on objective change
    pub fn ftol_abs(&mut self, ftol_abs: f64) -> &mut Self {
        self.ftol_abs = Some(ftol_abs);
        self
    }

    /// Sets the relative tolerance on objective change
    pub fn ftol_rel(&mut self, ftol_rel: f64) -> &mut Self {
        self.ftol_rel = Some(ftol_rel);
        self
    }

    /// Bounds the number of objective evaluations
    pub fn max_eval(&mut self, max_eval: usize) -> &mut Self {
        self.max_eval = max_eval;
        self
    }

    /// Sets the starting point
    pub fn xinit(&mut self, xinit: &ArrayView1<f64>) -> &mut Self {
        self.xinit = Some(xinit.to_owned());
        self
    }

    /// Runs the minimization, returning `(cost, argmin)`; cost is
    /// `f64::INFINITY` when the backend failed.
    pub fn minimize(&self) -> (f64, Array1<f64>) {
        let res = match self.algo {
            Algorithm::Cobyla => {
                let xinit = self.xinit.clone().unwrap().to_vec();
                let bounds: Vec<_> = self
                    .bounds
                    .outer_iter()
                    .map(|row| (row[0], row[1]))
                    .collect();
                let cstrs: Vec<_> = self
                    .cons
                    .iter()
                    .map(|f| {
                        move |x: &[f64], u: &mut U| -> f64 { -(*f)(x, None, u) }
                    })
                    .collect();
                let cstrs: Vec<&dyn cobyla::Func<U>> =
                    cstrs.iter().map(|c| c as &dyn cobyla::Func<U>).collect();
                let res = cobyla::minimize(
                    |x: &[f64], u: &mut U| (self.fun)(x, None, u),
                    &xinit,
                    &bounds,
                    &cstrs,
                    self.user_data.clone(),
                    self.max_eval,
                    RhoBeg::All(0.5),
                    Some(cobyla::StopTols {
                        ftol_rel: self.ftol_rel.unwrap_or(0.0),
                        ftol_abs: self.ftol_abs.unwrap_or(0.0),
                        ..cobyla::StopTols::default()
                    }),
                );
                match res {
                    Ok((_, x_opt, y_opt)) => (y_opt, arr1(&x_opt)),
                    Err((_, x_opt, _)) => (f64::INFINITY, arr1(&x_opt)),
                }
            }
            Algorithm::Slsqp => {
                let xinit = self.xinit.clone().unwrap().to_vec();
                let bounds: Vec<_> = self
                    .bounds
                    .outer_iter()
                    .map(|row| (row[0], row[1]))
                    .collect();
                let cstrs: Vec<_> = self
                    .cons
                    .iter()
                    .map(|f| {
                        move |x: &[f64], g: Option<&mut [f64]>, u: &mut U| -> f64 { (*f)(x, g, u) }
                    })
                    .collect();
                let res = slsqp::minimize(
                    self.fun,
                    &xinit,
                    &bounds,
                    &cstrs,
                    self.user_data.clone(),
                    self.max_eval,
                    Some(slsqp::StopTols {
                        ftol_rel: self.ftol_rel.unwrap_or(0.0),
                        ftol_abs: self.ftol_abs.unwrap_or(0.0),
                        ..slsqp::StopTols::default()
                    }),
                );
                match res {
                    Ok((_, x_opt, y_opt)) => (y_opt, arr1(&x_opt)),
                    Err((_, x_opt, _)) => (f64::INFINITY, arr1(&x_opt)),
                }
            }
        };
        let (cost, x_opt) = res;
        if cost.is_nan() {
            (f64::INFINITY, x_opt)
        } else {
            (cost, x_opt)
        }
    }
}
