use crate::errors::{BoError, Result};
use crate::optimizers::{Algorithm, Optimizer};
use crate::types::ObjFn;
use baybox_doe::{Lhs, Random, SamplingMethod};
use log::{debug, warn};
use ndarray::{Array, Array1, Array2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How multistart initial points are generated over the box bounds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StartKind {
    /// Latin Hypercube sampling (default whenever two or more starts are requested)
    #[default]
    Lhs,
    /// Uniform random sampling
    Random,
}

/// Generate `n_start` starting points within `bounds` given as a (n, 2)
/// matrix. LHS construction needs at least two points; a single start falls
/// back to uniform sampling.
pub fn generate_starts(
    kind: StartKind,
    bounds: &Array2<f64>,
    n_start: usize,
    rng: &mut Xoshiro256Plus,
) -> Array2<f64> {
    let sampler_rng = Xoshiro256Plus::seed_from_u64(rng.r#gen::<u64>());
    match kind {
        StartKind::Lhs if n_start >= 2 => {
            Lhs::new(bounds).with_rng(sampler_rng).sample(n_start)
        }
        _ => Random::new(bounds).with_rng(sampler_rng).sample(n_start),
    }
}

/// Runs one [Optimizer] replicate per row of `starts` on the rayon pool and
/// returns the best `(cost, argmin)`.
///
/// Individual replicate failures are isolated: they are counted, logged and
/// ranked as `+inf`. Only aggregate failure (the failure count reaching the
/// start count) raises `OptimizationFailed`. Ties between replicates break
/// towards the lowest start index.
pub fn minimize_multistart<U: Clone + Sync>(
    algo: Algorithm,
    fun: &(dyn ObjFn<U> + Sync),
    cons: &[&(dyn ObjFn<U> + Sync)],
    user_data: &U,
    bounds: &Array2<f64>,
    starts: &Array2<f64>,
    max_eval: usize,
) -> Result<(f64, Array1<f64>)> {
    let n_start = starts.nrows();
    let failures = AtomicUsize::new(0);
    let best = (0..n_start)
        .into_par_iter()
        .map(|i| {
            let (cost, x_opt) = Optimizer::new(algo, fun, cons, user_data, bounds)
                .xinit(&starts.row(i))
                .max_eval(max_eval)
                .ftol_rel(1e-4)
                .ftol_abs(1e-4)
                .minimize();
            if !cost.is_finite() {
                failures.fetch_add(1, Ordering::Relaxed);
                debug!("multistart replicate {i} failed");
            }
            (i, cost, x_opt)
        })
        .reduce(
            || (usize::MAX, f64::INFINITY, Array::zeros(bounds.nrows())),
            |a, b| {
                if b.1 < a.1 || (b.1 == a.1 && b.0 < a.0) {
                    b
                } else {
                    a
                }
            },
        );
    let n_failed = failures.load(Ordering::Relaxed);
    if n_failed == n_start {
        warn!("all {n_start} multistart replicates failed");
        return Err(BoError::OptimizationFailed(format!(
            "all {n_start} replicates failed"
        )));
    }
    if n_failed > 0 {
        debug!("{n_failed}/{n_start} multistart replicates failed");
    }
    Ok((best.1, best.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_generate_starts_shapes() {
        let bounds = array![[0., 1.], [5., 6.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let lhs = generate_starts(StartKind::Lhs, &bounds, 4, &mut rng);
        assert_eq!(lhs.shape(), &[4, 2]);
        let single = generate_starts(StartKind::Lhs, &bounds, 1, &mut rng);
        assert_eq!(single.shape(), &[1, 2]);
        for row in lhs.rows() {
            assert!(row[0] >= 0. && row[0] <= 1.);
            assert!(row[1] >= 5. && row[1] <= 6.);
        }
    }

    #[test]
    fn test_multistart_finds_global_of_bimodal() {
        // two valleys, the deeper one at x = 0.8
        let fun = |x: &[f64], _g: Option<&mut [f64]>, _u: &mut ()| -> f64 {
            let a = (x[0] - 0.2).powi(2);
            let b = (x[0] - 0.8).powi(2) - 0.5;
            a.min(b)
        };
        let bounds = array![[0., 1.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let starts = generate_starts(StartKind::Lhs, &bounds, 8, &mut rng);
        let (cost, x) =
            minimize_multistart(Algorithm::Cobyla, &fun, &[], &(), &bounds, &starts, 300)
                .expect("multistart");
        assert!(cost < -0.49);
        assert_abs_diff_eq!(x[0], 0.8, epsilon = 5e-2);
    }

    #[test]
    fn test_multistart_isolates_partial_failures() {
        // replicates starting left of 0.5 return NaN and must be isolated
        let fun = |x: &[f64], _g: Option<&mut [f64]>, _u: &mut ()| -> f64 {
            if x[0] < 0.5 {
                f64::NAN
            } else {
                (x[0] - 0.7).powi(2)
            }
        };
        let bounds = array![[0., 1.]];
        let starts = array![[0.1], [0.9]];
        let res = minimize_multistart(Algorithm::Cobyla, &fun, &[], &(), &bounds, &starts, 300);
        assert!(res.is_ok());
    }

    #[test]
    fn test_multistart_aggregate_failure() {
        let fun = |_x: &[f64], _g: Option<&mut [f64]>, _u: &mut ()| -> f64 { f64::NAN };
        let bounds = array![[0., 1.]];
        let starts = array![[0.1], [0.9]];
        let res = minimize_multistart(Algorithm::Cobyla, &fun, &[], &(), &bounds, &starts, 50);
        assert!(matches!(res, Err(BoError::OptimizationFailed(_))));
    }
}
