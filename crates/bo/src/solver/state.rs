/// Implementation of `argmin::core::State` for the Bayesian optimization loop
use crate::fit::FitParams;
use argmin::core::{Problem, State, TerminationReason, TerminationStatus};
use ndarray::{Array1, Array2};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maintains the state from iteration to iteration of the
/// [crate::BoSolver]: the evolving dataset, the recomputed parameter state
/// and the best-index bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoState {
    /// Last proposed input point
    pub param: Option<Array1<f64>>,
    /// Previous proposed input point
    pub prev_param: Option<Array1<f64>>,
    /// Best input point so far
    pub best_param: Option<Array1<f64>>,
    /// Previous best input point
    pub prev_best_param: Option<Array1<f64>>,

    /// Output vector of the last evaluated point
    pub cost: Option<Array1<f64>>,
    /// Output vector of the previously evaluated point
    pub prev_cost: Option<Array1<f64>>,
    /// Output vector of the best point so far
    pub best_cost: Option<Array1<f64>>,
    /// Output vector of the previous best point
    pub prev_best_cost: Option<Array1<f64>>,
    /// Target cost (unused, kept at -inf)
    pub target_cost: f64,

    /// Current iteration
    pub iter: u64,
    /// Iteration number of the last best point
    pub last_best_iter: u64,
    /// Maximum number of iterations
    pub max_iters: u64,
    /// Evaluation counts
    pub counts: HashMap<String, u64>,
    /// Time required so far
    pub time: Option<web_time::Duration>,
    /// Optimization status
    pub termination_status: TerminationStatus,

    /// Evolving dataset (inputs, outputs), rows are points
    pub data: Option<(Array2<f64>, Array2<f64>)>,
    /// Parameter state recomputed by the last inference pass
    pub fit_params: Option<FitParams>,
    /// Index of the best point in the dataset
    pub best_index: Option<usize>,
    /// Previous index of the best point
    pub prev_best_index: Option<usize>,
    /// Size of the initial dataset
    pub doe_size: usize,
    /// Acquisition value of the last proposal
    pub acq_value: f64,

    /// Random number generator for reproducibility
    pub rng: Option<Xoshiro256Plus>,
}

impl BoState {
    /// Set the proposed point, shifting the stored one to the previous slot.
    #[must_use]
    pub fn param(mut self, param: Array1<f64>) -> Self {
        std::mem::swap(&mut self.prev_param, &mut self.param);
        self.param = Some(param);
        self
    }

    /// Set the output of the evaluated point, shifting the stored one to the
    /// previous slot.
    #[must_use]
    pub fn cost(mut self, cost: Array1<f64>) -> Self {
        std::mem::swap(&mut self.prev_cost, &mut self.cost);
        self.cost = Some(cost);
        self
    }

    /// Set the maximum number of iterations.
    #[must_use]
    pub fn max_iters(mut self, iters: u64) -> Self {
        self.max_iters = iters;
        self
    }

    /// Set the dataset `(x, y)`, rows are points.
    pub fn data(mut self, data: (Array2<f64>, Array2<f64>)) -> Self {
        self.data = Some(data);
        self
    }

    /// Moves the dataset out and replaces it internally with `None`.
    pub fn take_data(&mut self) -> Option<(Array2<f64>, Array2<f64>)> {
        self.data.take()
    }

    /// Set the inferred parameter state.
    pub fn fit_params(mut self, fit_params: FitParams) -> Self {
        self.fit_params = Some(fit_params);
        self
    }

    /// Moves the parameter state out and replaces it internally with `None`.
    pub fn take_fit_params(&mut self) -> Option<FitParams> {
        self.fit_params.take()
    }

    /// Set the random number generator.
    pub fn rng(mut self, rng: Xoshiro256Plus) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Moves the random number generator out and replaces it internally with
    /// `None`.
    pub fn take_rng(&mut self) -> Option<Xoshiro256Plus> {
        self.rng.take()
    }

    /// Set the acquisition value of the last proposal.
    pub fn acq_value(mut self, value: f64) -> Self {
        self.acq_value = value;
        self
    }

    /// Returns the full output vector of the last evaluated point.
    pub fn get_full_cost(&self) -> Option<&Array1<f64>> {
        self.cost.as_ref()
    }

    /// Returns the full output vector of the best point.
    pub fn get_full_best_cost(&self) -> Option<&Array1<f64>> {
        self.best_cost.as_ref()
    }
}

impl State for BoState {
    /// Type of parameter vector
    type Param = Array1<f64>;
    /// Floating point precision
    type Float = f64;

    /// Create a new `BoState` instance
    ///
    /// # Example
    ///
    /// ```
    /// # use argmin::core::State;
    /// use baybox_bo::BoState;
    /// let state = BoState::new();
    /// # assert!(state.param.is_none());
    /// # assert_eq!(state.iter, 0);
    /// # assert_eq!(state.max_iters, u64::MAX);
    /// ```
    fn new() -> Self {
        BoState {
            param: None,
            prev_param: None,
            best_param: None,
            prev_best_param: None,

            cost: None,
            prev_cost: None,
            best_cost: None,
            prev_best_cost: None,
            target_cost: f64::NEG_INFINITY,

            iter: 0,
            last_best_iter: 0,
            max_iters: u64::MAX,
            counts: HashMap::new(),
            time: Some(web_time::Duration::new(0, 0)),
            termination_status: TerminationStatus::NotTerminated,

            data: None,
            fit_params: None,
            best_index: None,
            prev_best_index: None,
            doe_size: 0,
            acq_value: f64::INFINITY,

            rng: Some(Xoshiro256Plus::from_entropy()),
        }
    }

    /// Promote the solver-selected best index into the best param/cost slots.
    fn update(&mut self) {
        if let (Some(best_index), Some((x_data, y_data))) = (self.best_index, self.data.as_ref()) {
            let param = x_data.row(best_index).to_owned();
            std::mem::swap(&mut self.prev_best_param, &mut self.best_param);
            self.best_param = Some(param);

            let cost = y_data.row(best_index).to_owned();
            std::mem::swap(&mut self.prev_best_cost, &mut self.best_cost);
            self.best_cost = Some(cost);

            if best_index >= self.doe_size {
                if let Some(prev_best_index) = self.prev_best_index {
                    if best_index != prev_best_index {
                        self.last_best_iter = self.iter + 1;
                    }
                }
            }
        }
    }

    fn get_param(&self) -> Option<&Array1<f64>> {
        self.param.as_ref()
    }

    fn get_best_param(&self) -> Option<&Array1<f64>> {
        self.best_param.as_ref()
    }

    fn terminate_with(mut self, reason: TerminationReason) -> Self {
        self.termination_status = TerminationStatus::Terminated(reason);
        self
    }

    fn time(&mut self, time: Option<web_time::Duration>) -> &mut Self {
        self.time = time;
        self
    }

    /// Returns the first output component of the last evaluated point
    /// (infinite when nothing was evaluated yet).
    fn get_cost(&self) -> Self::Float {
        match self.cost.as_ref() {
            Some(c) => *(c.get(0).unwrap_or(&f64::INFINITY)),
            None => f64::INFINITY,
        }
    }

    fn get_best_cost(&self) -> Self::Float {
        match self.best_cost.as_ref() {
            Some(c) => *(c.get(0).unwrap_or(&f64::INFINITY)),
            None => f64::INFINITY,
        }
    }

    fn get_target_cost(&self) -> Self::Float {
        self.target_cost
    }

    fn get_iter(&self) -> u64 {
        self.iter
    }

    fn get_last_best_iter(&self) -> u64 {
        self.last_best_iter
    }

    fn get_max_iters(&self) -> u64 {
        self.max_iters
    }

    fn get_termination_status(&self) -> &TerminationStatus {
        &self.termination_status
    }

    fn get_termination_reason(&self) -> Option<&TerminationReason> {
        match &self.termination_status {
            TerminationStatus::Terminated(reason) => Some(reason),
            TerminationStatus::NotTerminated => None,
        }
    }

    fn get_time(&self) -> Option<web_time::Duration> {
        self.time
    }

    fn increment_iter(&mut self) {
        self.iter += 1;
    }

    fn func_counts<O>(&mut self, problem: &Problem<O>) {
        for (k, &v) in problem.counts.iter() {
            let count = self.counts.entry(k.to_string()).or_insert(0);
            *count = v
        }
    }

    fn get_func_counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    fn is_best(&self) -> bool {
        self.last_best_iter == self.iter + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_param_shifts_previous() {
        let state = BoState::new().param(array![1.0]);
        assert!(state.prev_param.is_none());
        let state = state.param(array![2.0]);
        assert_eq!(state.prev_param.as_ref().unwrap()[0], 1.0);
        assert_eq!(state.param.as_ref().unwrap()[0], 2.0);
    }

    #[test]
    fn test_update_promotes_best_index() {
        let mut state = BoState::new().data((array![[0.], [1.], [2.]], array![[5.], [1.], [3.]]));
        state.iter = 1;
        state.doe_size = 1;
        state.prev_best_index = Some(0);
        state.best_index = Some(1);
        state.update();
        assert_eq!(state.best_param.as_ref().unwrap()[0], 1.0);
        assert_eq!(state.best_cost.as_ref().unwrap()[0], 1.0);
        assert_eq!(state.last_best_iter, 2);
        assert!(state.is_best());
    }

    #[test]
    fn test_take_accessors() {
        let mut state = BoState::new().data((array![[0.]], array![[1.]]));
        assert!(state.take_data().is_some());
        assert!(state.take_data().is_none());
        assert!(state.take_rng().is_some());
        assert!(state.take_rng().is_none());
    }
}
