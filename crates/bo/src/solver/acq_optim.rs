//! Acquisition maximization through the optimizer facade: multistart over the
//! domain with the infeasibility gate and discrete projection wrapped around
//! the criterion.

use crate::criteria::{AcqData, Acquisition};
use crate::domain::Domain;
use crate::errors::Result;
use crate::optimizers::{generate_starts, minimize_multistart};
use crate::solver::MaximizerConfig;
use baybox_surrogate::Predictive;
use finitediff::FiniteDiff;
use log::debug;
use ndarray::{Array1, ArrayView1};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Data owned by each acquisition-optimization replicate: the Monte-Carlo
/// generator travels in the optimizer user data so criterion draws never
/// touch shared state.
#[derive(Clone)]
pub(crate) struct AcqObjData {
    pub rng: Xoshiro256Plus,
    pub data: AcqData,
}

/// Negated, gated criterion handed to the minimizing facade: discrete
/// coordinates are projected before prediction and the gate returns 0
/// outside the domain.
fn neg_acq(
    x: &[f64],
    acq: &dyn Acquisition,
    posteriors: &[Predictive],
    data: &AcqData,
    domain: &Domain,
    rng: &mut Xoshiro256Plus,
) -> f64 {
    let xp = domain.project_discrete(&ArrayView1::from(x));
    if !domain.contains(&xp.view()) {
        return 0.;
    }
    -acq.value(&xp.view(), posteriors, data, rng)
}

/// Maximize the acquisition over the domain; returns the (discrete-projected)
/// argmax and the criterion value there.
pub(crate) fn maximize_acquisition(
    acq: &dyn Acquisition,
    posteriors: &[Predictive],
    acq_data: &AcqData,
    domain: &Domain,
    config: &MaximizerConfig,
    rng: &mut Xoshiro256Plus,
) -> Result<(Array1<f64>, f64)> {
    let bounds = domain.bounds();
    let user = AcqObjData {
        rng: Xoshiro256Plus::seed_from_u64(rng.r#gen::<u64>()),
        data: acq_data.clone(),
    };

    let obj = |x: &[f64], gradient: Option<&mut [f64]>, u: &mut AcqObjData| -> f64 {
        if x.iter().any(|v| v.is_nan()) {
            return f64::INFINITY;
        }
        if let Some(grad) = gradient {
            // finite differences with common random numbers
            let base_rng = u.rng.clone();
            let data = u.data.clone();
            let f = |xv: &Vec<f64>| -> f64 {
                let mut rng = base_rng.clone();
                neg_acq(xv, acq, posteriors, &data, domain, &mut rng)
            };
            let g = x.to_vec().central_diff(&f);
            grad[..].copy_from_slice(&g);
        }
        neg_acq(x, acq, posteriors, &u.data, domain, &mut u.rng)
    };

    let mut starts = generate_starts(config.starts, &bounds, config.n_start, rng);
    if config.algo == crate::optimizers::Algorithm::Slsqp {
        // gradient-based starts must not sit on the boundary
        for i in 0..starts.nrows() {
            let xi = domain.interiorize(&starts.row(i), 1e-6)?;
            starts.row_mut(i).assign(&xi);
        }
    }
    let (neg, x_opt) = minimize_multistart(
        config.algo,
        &obj,
        &[],
        &user,
        &bounds,
        &starts,
        config.max_eval,
    )?;
    let xp = domain.project_discrete(&x_opt.view());
    debug!("acquisition {} = {} at x = {}", acq.name(), -neg, xp);
    Ok((xp, -neg))
}
