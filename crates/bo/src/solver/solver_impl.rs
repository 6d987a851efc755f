//! The Bayesian optimization loop as an [argmin::core::Solver], driven by
//! `argmin::core::Executor`. Each iteration recomputes the parameter state
//! from scratch, maximizes the acquisition, evaluates the black-box objective
//! at the proposal and appends the result to the dataset.

use crate::criteria::{AcqData, Acquisition, ExpectedImprovement};
use crate::data::Dataset;
use crate::errors::{BoError, Result};
use crate::fit::{FitParams, ModelFitter};
use crate::problem::BoProblem;
use crate::solver::acq_optim::maximize_acquisition;
use crate::solver::{BoConfig, BoState};
use crate::types::{Fitness, TermCond};
use crate::utils::{best_admissible_fitness, find_best_index};

use argmin::core::{
    CostFunction, KV, Problem, Solver, State, TerminationReason, TerminationStatus,
};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Implementation of `argmin::core::Solver` for the Bayesian optimization
/// loop, usable with `argmin::core::Executor`.
pub struct BoSolver {
    pub(crate) problem: BoProblem,
    pub(crate) config: BoConfig,
    pub(crate) term_cond: Box<dyn TermCond>,
}

impl BoSolver {
    /// Constructor given the problem, the configuration and a termination
    /// condition.
    pub fn new(problem: BoProblem, config: BoConfig, term_cond: Box<dyn TermCond>) -> Self {
        BoSolver {
            problem,
            config,
            term_cond,
        }
    }

    fn build_fitter(&self) -> Box<dyn ModelFitter> {
        self.config.fitter.build()
    }

    fn acquisition(&self) -> ExpectedImprovement {
        ExpectedImprovement {
            n_draws: self.config.acq.n_draws,
        }
    }

    /// Eager structural validation before the first iteration.
    fn validate(&self) -> Result<()> {
        self.config.check()?;
        self.problem.validate()?;
        if matches!(self.problem.fitness, Fitness::None) && self.acquisition().requires_fitness() {
            return Err(BoError::InvalidModel(
                "expected improvement needs a fitness; fitness-free problems need a fitness-free acquisition"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn acq_data(&self, data: &Dataset) -> AcqData {
        AcqData {
            fitness: self.problem.fitness.clone(),
            y_max: self.problem.y_max.clone(),
            best_fitness: best_admissible_fitness(
                &data.y(),
                &self.problem.fitness,
                &self.problem.y_max,
                self.config.fitness_default,
            ),
        }
    }
}

/// Propose `q_points` input points by maximizing the acquisition, extending a
/// private dataset copy with fantasy observations (the marginalized posterior
/// mean at the already-picked points) between picks. The visible dataset is
/// never touched. Returns the proposal matrix and the acquisition value of
/// the first pick.
pub(crate) fn propose_points(
    problem: &BoProblem,
    config: &BoConfig,
    acq: &dyn Acquisition,
    data: &Dataset,
    fit: &FitParams,
    acq_data: &AcqData,
    rng: &mut Xoshiro256Plus,
) -> Result<(Array2<f64>, f64)> {
    let q = config.q_points;
    let mut work = data.clone();
    let mut proposals = Array2::zeros((q, problem.domain.dim()));
    let mut first_acq = 0.;
    for b in 0..q {
        let posteriors = fit.posteriors(&problem.model, &work)?;
        let (x, a) = maximize_acquisition(
            acq,
            &posteriors,
            acq_data,
            &problem.domain,
            &config.maximizer,
            rng,
        )?;
        if b == 0 {
            first_acq = a;
        }
        if b + 1 < q {
            // fantasy observation keeps later picks away from this one
            let mut y_mean = Array1::zeros(problem.model.n_outputs());
            for post in &posteriors {
                y_mean += &post.predict(&x.view()).0;
            }
            y_mean /= posteriors.len() as f64;
            work.append(&x.view(), &y_mean.view());
        }
        proposals.row_mut(b).assign(&x);
    }
    Ok((proposals, first_acq))
}

impl<O> Solver<O, BoState> for BoSolver
where
    O: CostFunction<Param = Array2<f64>, Output = Array2<f64>>,
{
    const NAME: &'static str = "BayBox";

    fn init(
        &mut self,
        _problem: &mut Problem<O>,
        state: BoState,
    ) -> std::result::Result<(BoState, Option<KV>), argmin::core::Error> {
        self.validate()?;

        let rng = if let Some(seed) = self.config.seed {
            Xoshiro256Plus::seed_from_u64(seed)
        } else {
            Xoshiro256Plus::from_entropy()
        };

        // prune exterior data; structural errors surface eagerly here
        let n_before = self.problem.data.len();
        let (x_data, y_data) = self
            .problem
            .domain
            .exclude_exterior(&self.problem.data.x().to_owned(), &self.problem.data.y().to_owned())?;
        if self.config.info && x_data.nrows() < n_before {
            info!(
                "dropped {} exterior dataset point(s)",
                n_before - x_data.nrows()
            );
        }

        let best_index = find_best_index(&y_data.view(), &self.problem.fitness, &self.problem.y_max);
        let doe_size = x_data.nrows();

        let mut initial_state = state.data((x_data, y_data)).rng(rng);
        initial_state.doe_size = doe_size;
        initial_state.best_index = Some(best_index);
        initial_state.prev_best_index = Some(best_index);
        initial_state.last_best_iter = 0;

        if self.config.info {
            let (x_data, y_data) = initial_state.data.as_ref().unwrap();
            info!(
                "********* Initialization: best y[{}]={} at x={}",
                best_index,
                y_data.row(best_index),
                x_data.row(best_index)
            );
        }
        Ok((initial_state, None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        mut state: BoState,
    ) -> std::result::Result<(BoState, Option<KV>), argmin::core::Error> {
        debug!(
            "********* Start iteration {}/{}",
            state.get_iter() + 1,
            state.get_max_iters()
        );
        let mut rng = state.take_rng().unwrap();
        let (x_data, y_data) = state.take_data().unwrap();
        let mut data = Dataset::new(x_data, y_data)?;

        // parameter state is recomputed from scratch from current data
        let fitter = self.build_fitter();
        let fit = fitter.fit(
            &self.problem.model,
            &data,
            &self.problem.noise_priors,
            &mut rng,
        )?;

        let acq = self.acquisition();
        let acq_data = self.acq_data(&data);
        let (proposals, acq_value) = propose_points(
            &self.problem,
            &self.config,
            &acq,
            &data,
            &fit,
            &acq_data,
            &mut rng,
        )?;

        // evaluate the black-box objective at each proposal and append
        for x in proposals.rows() {
            if !data.accepts(&x) {
                if self.config.info {
                    warn!("proposal {x} coincides with a stored point, skipped");
                }
                continue;
            }
            let x_mat = x.to_owned().insert_axis(Axis(0));
            match problem.cost(&x_mat) {
                Ok(y) => {
                    let y_row = y.row(0).to_owned();
                    data.append(&x, &y_row.view());
                    state = state.param(x.to_owned()).cost(y_row);
                }
                Err(err) => {
                    if self.config.reject_failed_eval {
                        warn!("objective evaluation rejected at x={x}: {err}");
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        let best_index = find_best_index(&data.y(), &self.problem.fitness, &self.problem.y_max);
        state.prev_best_index = state.best_index;
        state.best_index = Some(best_index);

        if self.config.info {
            let (xb, yb) = (data.x().row(best_index).to_owned(), data.y().row(best_index).to_owned());
            info!(
                "********* End iteration {}/{}: best y[{}]={} at x={}",
                state.get_iter() + 1,
                state.get_max_iters(),
                best_index,
                yb,
                xb
            );
        }

        let (x_data, y_data) = data.into_parts();
        let new_state = state
            .data((x_data, y_data))
            .fit_params(fit)
            .acq_value(acq_value)
            .rng(rng);
        Ok((new_state, None))
    }

    fn terminate(&mut self, state: &BoState) -> TerminationStatus {
        if self.term_cond.should_stop(state) {
            TerminationStatus::Terminated(TerminationReason::MaxItersReached)
        } else {
            TerminationStatus::NotTerminated
        }
    }
}
