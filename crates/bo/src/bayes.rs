//! Public entry points of the Bayesian optimization engine: [solve] runs the
//! full evaluate-and-learn loop, [recommend] performs a single suggestion
//! pass over a problem without an objective, [BoService] exposes the latter
//! as an ask-and-tell interface and [BoBuilder] wraps everything behind a
//! fluent facade.
//!
//! ```no_run
//! use baybox_bo::{BoBuilder, BoProblem, Dataset, Domain, Fitness};
//! use baybox_surrogate::{GpModel, Kernel, Model, Prior};
//! use ndarray::{array, Array1, ArrayView1};
//!
//! // black-box objective: one output, maximized through the fitness
//! let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![-(x[0] * x[0])]) };
//!
//! let problem = BoProblem {
//!     fitness: Fitness::Linear(array![1.]),
//!     y_max: array![f64::INFINITY],
//!     domain: Domain::new(array![-5.], array![5.]).unwrap(),
//!     model: Model::Gp(GpModel::new(
//!         Kernel::SquaredExponential,
//!         vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
//!     )),
//!     noise_priors: vec![Prior::LogNormal { location: -4., scale: 1. }],
//!     data: Dataset::new(array![[3.0]], array![[-9.0]]).unwrap(),
//! };
//!
//! let res = BoBuilder::optimize(fobj)
//!     .configure(|config| config.max_iters(10).seed(42))
//!     .min_within(problem)
//!     .run()
//!     .expect("quadratic bowl maximized");
//! println!("best x = {}", res.x_opt);
//! ```

use crate::criteria::ExpectedImprovement;
use crate::data::Dataset;
use crate::errors::{BoError, Result};
use crate::problem::BoProblem;
use crate::solver::{BoConfig, BoSolver, propose_points};
use crate::types::{Fitness, IterLimit, ObjFunc, ObjectiveFn, OptimResult, TermCond};
use crate::utils::best_admissible_fitness;
use crate::criteria::AcqData;

use argmin::core::Executor;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Bayesian optimization builder allowing to specify the black-box objective
/// to be solved and to tune the loop configuration.
pub struct BoBuilder<O: ObjectiveFn> {
    fobj: O,
    config: BoConfig,
}

impl<O: ObjectiveFn> BoBuilder<O> {
    /// Entry point given the objective function `f: R^n -> R^m`, evaluated
    /// one point at a time.
    pub fn optimize(fobj: O) -> Self {
        BoBuilder {
            fobj,
            config: BoConfig::default(),
        }
    }

    /// Tune the configuration with a closure taking and returning a
    /// [BoConfig].
    pub fn configure<F: FnOnce(BoConfig) -> BoConfig>(mut self, init: F) -> Self {
        self.config = init(self.config);
        self
    }

    /// Bind the problem whose domain the objective is optimized within,
    /// yielding a runnable optimizer.
    pub fn min_within(self, problem: BoProblem) -> Bo<O> {
        Bo {
            fobj: self.fobj,
            config: self.config,
            problem,
        }
    }
}

/// A configured Bayesian optimizer bound to its problem, ready to [Bo::run].
pub struct Bo<O: ObjectiveFn> {
    fobj: O,
    config: BoConfig,
    problem: BoProblem,
}

impl<O: ObjectiveFn> Bo<O> {
    /// Run the optimization loop.
    pub fn run(self) -> Result<OptimResult> {
        solve(self.fobj, self.problem, self.config)
    }
}

/// Run the Bayesian optimization loop: per iteration, infer parameters from
/// scratch, maximize the acquisition, evaluate the objective at the proposal
/// and append the observation. Terminates after `max_iters` iterations.
pub fn solve<O: ObjectiveFn>(fobj: O, problem: BoProblem, config: BoConfig) -> Result<OptimResult> {
    let max_iters = config.max_iters;
    let term = Box::new(IterLimit::new(max_iters));
    run_loop(fobj, problem, config, term, Some(max_iters))
}

/// [solve] with a custom termination condition evaluated once per loop head.
pub fn solve_with_term<O: ObjectiveFn>(
    fobj: O,
    problem: BoProblem,
    config: BoConfig,
    term_cond: Box<dyn TermCond>,
) -> Result<OptimResult> {
    run_loop(fobj, problem, config, term_cond, None)
}

fn run_loop<O: ObjectiveFn>(
    fobj: O,
    problem: BoProblem,
    config: BoConfig,
    term_cond: Box<dyn TermCond>,
    max_iters: Option<u64>,
) -> Result<OptimResult> {
    let solver = BoSolver::new(problem, config, term_cond);
    let executor = Executor::new(ObjFunc::new(fobj), solver);
    let executor = match max_iters {
        Some(n) => executor.configure(|state: crate::BoState| state.max_iters(n)),
        None => executor,
    };
    let res = executor.run()?;
    let state = res.state;
    let (x_hist, y_hist) = state
        .data
        .clone()
        .expect("solver state carries the dataset");
    let best = state.best_index.unwrap_or(0);
    Ok(OptimResult {
        x_opt: x_hist.row(best).to_owned(),
        y_opt: y_hist.row(best).to_owned(),
        x_hist,
        y_hist,
        state,
    })
}

/// One suggestion pass over a problem without an objective: infer parameters,
/// maximize the acquisition and return the proposed point(s) as a
/// `(q_points, n)` matrix. The problem dataset is never mutated.
pub fn recommend(problem: &BoProblem, config: &BoConfig) -> Result<Array2<f64>> {
    config.check()?;
    problem.validate()?;
    if matches!(problem.fitness, Fitness::None) {
        return Err(BoError::InvalidModel(
            "expected improvement needs a fitness; fitness-free problems need a fitness-free acquisition"
                .to_string(),
        ));
    }
    let mut rng = if let Some(seed) = config.seed {
        Xoshiro256Plus::seed_from_u64(seed)
    } else {
        Xoshiro256Plus::from_entropy()
    };
    let (x_data, y_data) = problem
        .domain
        .exclude_exterior(&problem.data.x().to_owned(), &problem.data.y().to_owned())?;
    let data = Dataset::new(x_data, y_data)?;

    let fitter = config.fitter.build();
    let fit = fitter.fit(&problem.model, &data, &problem.noise_priors, &mut rng)?;

    let acq = ExpectedImprovement {
        n_draws: config.acq.n_draws,
    };
    let acq_data = AcqData {
        fitness: problem.fitness.clone(),
        y_max: problem.y_max.clone(),
        best_fitness: best_admissible_fitness(
            &data.y(),
            &problem.fitness,
            &problem.y_max,
            config.fitness_default,
        ),
    };
    let (proposals, _) = propose_points(problem, config, &acq, &data, &fit, &acq_data, &mut rng)?;
    Ok(proposals)
}

/// Ask-and-tell interface: the caller keeps control of the evaluation loop,
/// telling observed data and asking for the next promising point(s).
pub struct BoService {
    config: BoConfig,
    fitness: Fitness,
    y_max: ndarray::Array1<f64>,
    domain: crate::domain::Domain,
    model: baybox_surrogate::Model,
    noise_priors: Vec<baybox_surrogate::Prior>,
}

impl BoService {
    /// Constructor from the problem ingredients (everything but data).
    pub fn new(
        fitness: Fitness,
        y_max: ndarray::Array1<f64>,
        domain: crate::domain::Domain,
        model: baybox_surrogate::Model,
        noise_priors: Vec<baybox_surrogate::Prior>,
        config: BoConfig,
    ) -> Self {
        BoService {
            config,
            fitness,
            y_max,
            domain,
            model,
            noise_priors,
        }
    }

    /// Given evaluated `(x, y)` data, return the next promising point(s)
    /// with regard to the acquisition criterion.
    pub fn suggest(
        &self,
        x_data: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        y_data: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array2<f64>> {
        let problem = BoProblem {
            fitness: self.fitness.clone(),
            y_max: self.y_max.clone(),
            domain: self.domain.clone(),
            model: self.model.clone(),
            noise_priors: self.noise_priors.clone(),
            data: Dataset::new(x_data.to_owned(), y_data.to_owned())?,
        };
        recommend(&problem, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::fit::MleFitter;
    use crate::sampling::NutsConfig;
    use approx::assert_abs_diff_eq;
    use baybox_surrogate::{GpModel, Kernel, Model, ParametricModel, PredictorFn, Prior};
    use ndarray::{Array1, ArrayView1, array};
    use std::sync::Arc;

    fn gp_model_1d() -> Model {
        Model::Gp(GpModel::new(
            Kernel::SquaredExponential,
            vec![vec![Prior::LogNormal { location: 0., scale: 1. }]],
        ))
    }

    fn quick_mle() -> MleFitter {
        MleFitter {
            n_start: 4,
            max_eval: 300,
            ..MleFitter::default()
        }
    }

    fn bowl_problem() -> BoProblem {
        BoProblem {
            fitness: Fitness::Linear(array![1.]),
            y_max: array![f64::INFINITY],
            domain: Domain::new(array![-5.], array![5.]).unwrap(),
            model: gp_model_1d(),
            noise_priors: vec![Prior::LogNormal { location: -4., scale: 1. }],
            data: Dataset::new(array![[3.0]], array![[-9.0]]).unwrap(),
        }
    }

    #[test]
    fn test_quadratic_bowl_converges() {
        // maximize -x^2 on [-5, 5] from a single point at x = 3
        let fobj =
            |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![-(x[0] * x[0])]) };
        let res = BoBuilder::optimize(fobj)
            .configure(|c| c.max_iters(10).seed(42).mle_fitter(quick_mle()))
            .min_within(bowl_problem())
            .run()
            .expect("bowl solved");
        assert!(
            res.x_opt[0].abs() <= 0.5,
            "best x = {} too far from 0",
            res.x_opt[0]
        );
        // dataset grew by one point per iteration
        assert_eq!(res.x_hist.nrows(), 1 + 10);
    }

    #[test]
    fn test_iter_limit_drives_exact_count() {
        let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![-x[0]]) };
        let res = solve(
            fobj,
            bowl_problem(),
            BoConfig::default().max_iters(3).seed(0).mle_fitter(quick_mle()),
        )
        .expect("solved");
        assert_eq!(res.state.iter, 3);
        assert_eq!(res.x_hist.nrows(), 4);
    }

    #[test]
    fn test_discrete_proposals_are_integers() {
        let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> {
            Some(array![-(x[0] - 6.3) * (x[0] - 6.3)])
        };
        let problem = BoProblem {
            fitness: Fitness::Linear(array![1.]),
            y_max: array![f64::INFINITY],
            domain: Domain::new(array![0.], array![10.])
                .unwrap()
                .with_discrete(vec![true])
                .unwrap(),
            model: gp_model_1d(),
            noise_priors: vec![Prior::LogNormal { location: -4., scale: 1. }],
            data: Dataset::new(array![[2.0]], array![[-18.49]]).unwrap(),
        };
        let res = solve(
            fobj,
            problem,
            BoConfig::default().max_iters(4).seed(7).mle_fitter(quick_mle()),
        )
        .expect("discrete solve");
        for x in res.x_hist.rows() {
            assert_abs_diff_eq!(x[0], x[0].round(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_output_constraint_respected() {
        // two outputs [x, x]; second constrained to <= 0, fitness maximizes the first
        let fobj =
            |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![x[0], x[0]]) };
        let problem = BoProblem {
            fitness: Fitness::Linear(array![1., 0.]),
            y_max: array![f64::INFINITY, 0.],
            domain: Domain::new(array![-5.], array![5.]).unwrap(),
            model: Model::Gp(GpModel::new(
                Kernel::SquaredExponential,
                vec![vec![Prior::LogNormal { location: 0., scale: 1. }]; 2],
            )),
            noise_priors: vec![Prior::LogNormal { location: -4., scale: 1. }; 2],
            data: Dataset::new(array![[-4.0], [-1.0]], array![[-4.0, -4.0], [-1.0, -1.0]])
                .unwrap(),
        };
        let res = solve(
            fobj,
            problem,
            BoConfig::default()
                .max_iters(5)
                .seed(3)
                .acq_draws(300)
                .mle_fitter(quick_mle()),
        )
        .expect("constrained solve");
        // best point is admissible and moved towards the constraint boundary
        assert!(res.y_opt[1] <= 1e-9, "y_opt = {}", res.y_opt);
        assert!(res.x_opt[0] > -2.5, "no progress: x_opt = {}", res.x_opt);
    }

    #[test]
    fn test_recommend_batch_keeps_dataset_private() {
        let problem = BoProblem {
            data: Dataset::new(array![[-3.0], [1.0], [4.0]], array![[-9.0], [-1.0], [-16.0]])
                .unwrap(),
            ..bowl_problem()
        };
        let n_before = problem.data.len();
        let config = BoConfig::default()
            .q_points(3)
            .seed(11)
            .mle_fitter(quick_mle());
        let proposals = recommend(&problem, &config).expect("batch recommendation");
        assert_eq!(proposals.nrows(), 3);
        // the visible dataset is untouched by fantasy batching
        assert_eq!(problem.data.len(), n_before);
        // picks are pairwise non-coincident
        for i in 0..3 {
            for j in (i + 1)..3 {
                let d = (proposals[[i, 0]] - proposals[[j, 0]]).abs();
                assert!(d > 1e-8, "coincident batch picks: {proposals}");
            }
        }
    }

    #[test]
    fn test_evaluation_failure_surfaces() {
        let fobj = |_x: &ArrayView1<f64>| -> Option<Array1<f64>> { None };
        let res = solve(
            fobj,
            bowl_problem(),
            BoConfig::default().max_iters(2).seed(5).mle_fitter(quick_mle()),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_evaluation_failure_rejected_when_configured() {
        let fobj = |_x: &ArrayView1<f64>| -> Option<Array1<f64>> { None };
        let res = solve(
            fobj,
            bowl_problem(),
            BoConfig::default()
                .max_iters(2)
                .seed(5)
                .reject_failed_eval(true)
                .mle_fitter(quick_mle()),
        )
        .expect("failures treated as rejected points");
        // nothing was appended
        assert_eq!(res.x_hist.nrows(), 1);
    }

    #[test]
    fn test_fitness_free_problem_rejected() {
        let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![x[0]]) };
        let problem = BoProblem {
            fitness: Fitness::None,
            ..bowl_problem()
        };
        let res = solve(fobj, problem, BoConfig::default().seed(1));
        assert!(res.is_err());
    }

    #[test]
    fn test_solve_reproducible_with_seed() {
        let fobj =
            |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![-(x[0] * x[0])]) };
        let cfg = || {
            BoConfig::default()
                .max_iters(3)
                .seed(123)
                .mle_fitter(quick_mle())
        };
        let a = solve(fobj, bowl_problem(), cfg()).unwrap();
        let b = solve(fobj, bowl_problem(), cfg()).unwrap();
        assert_eq!(a.x_hist, b.x_hist);
    }

    #[test]
    fn test_bayes_mode_smoke() {
        // parametric slope model inferred by NUTS inside the loop
        let predictor: PredictorFn = Arc::new(|x, theta| array![theta[0] * x[0]]);
        let model = Model::Parametric(ParametricModel::new(
            predictor,
            vec![Prior::Normal { mean: 0., std: 5. }],
            1,
        ));
        let fobj = |x: &ArrayView1<f64>| -> Option<Array1<f64>> { Some(array![2.0 * x[0]]) };
        let problem = BoProblem {
            fitness: Fitness::Linear(array![1.]),
            y_max: array![f64::INFINITY],
            domain: Domain::new(array![0.], array![4.]).unwrap(),
            model,
            noise_priors: vec![Prior::LogNormal { location: -2., scale: 0.5 }],
            data: Dataset::new(array![[1.0], [2.0]], array![[2.0], [4.1]]).unwrap(),
        };
        let res = solve(
            fobj,
            problem,
            BoConfig::default().max_iters(1).seed(9).bayes_fitter(NutsConfig {
                n_chains: 2,
                warmup: 60,
                n_samples: 40,
                parallel: false,
                ..NutsConfig::default()
            }),
        )
        .expect("Bayesian mode solve");
        match res.state.fit_params.as_ref().unwrap() {
            crate::fit::FitParams::Bayes(pool) => assert_eq!(pool.len(), 80),
            _ => panic!("expected Bayesian parameter state"),
        }
    }

    #[test]
    fn test_service_suggest() {
        let service = BoService::new(
            Fitness::Linear(array![1.]),
            array![f64::INFINITY],
            Domain::new(array![-5.], array![5.]).unwrap(),
            gp_model_1d(),
            vec![Prior::LogNormal { location: -4., scale: 1. }],
            BoConfig::default().seed(21).mle_fitter(quick_mle()),
        );
        let x = array![[-3.0], [0.0], [3.0]];
        let y = array![[-9.0], [0.0], [-9.0]];
        let suggested = service.suggest(&x, &y).expect("suggestion");
        assert_eq!(suggested.shape(), &[1, 1]);
        assert!(suggested[[0, 0]] >= -5. && suggested[[0, 0]] <= 5.);
    }
}
