//! Input domain: box bounds, discrete-coordinate mask and an optional general
//! feasibility predicate.

use crate::errors::{BoError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis, concatenate};
use std::fmt;
use std::sync::Arc;

/// A general feasibility predicate over input points.
pub type PredicateFn = Arc<dyn Fn(&ArrayView1<f64>) -> bool + Send + Sync>;

/// The input domain of the optimized objective.
#[derive(Clone)]
pub struct Domain {
    lb: Array1<f64>,
    ub: Array1<f64>,
    discrete: Vec<bool>,
    predicate: Option<PredicateFn>,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Domain(lb={}, ub={}, discrete={:?}, predicate={})",
            self.lb,
            self.ub,
            self.discrete,
            self.predicate.is_some()
        )
    }
}

impl Domain {
    /// Constructor given box bounds; fails with `InvalidDomain` when bounds
    /// are inconsistent.
    pub fn new(lb: Array1<f64>, ub: Array1<f64>) -> Result<Self> {
        if lb.len() != ub.len() {
            return Err(BoError::InvalidDomain(format!(
                "bound dimensions differ: {} vs {}",
                lb.len(),
                ub.len()
            )));
        }
        if lb.iter().zip(ub.iter()).any(|(l, u)| l > u) {
            return Err(BoError::InvalidDomain(format!(
                "lower bound above upper bound: lb={lb}, ub={ub}"
            )));
        }
        let dim = lb.len();
        Ok(Domain {
            lb,
            ub,
            discrete: vec![false; dim],
            predicate: None,
        })
    }

    /// Marks coordinates as integer-valued; fails with `InvalidDomain` when
    /// the mask arity mismatches or a discrete interval contains no integer.
    pub fn with_discrete(mut self, discrete: Vec<bool>) -> Result<Self> {
        if discrete.len() != self.lb.len() {
            return Err(BoError::InvalidDomain(format!(
                "discreteness mask covers {} dimensions, domain has {}",
                discrete.len(),
                self.lb.len()
            )));
        }
        for (i, d) in discrete.iter().enumerate() {
            if *d && self.ub[i].floor() < self.lb[i].ceil() {
                return Err(BoError::InvalidDomain(format!(
                    "no integer in [{}, {}] for discrete coordinate {}",
                    self.lb[i], self.ub[i], i
                )));
            }
        }
        self.discrete = discrete;
        Ok(self)
    }

    /// Sets the general feasibility predicate.
    pub fn with_predicate(mut self, predicate: PredicateFn) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Input dimension.
    pub fn dim(&self) -> usize {
        self.lb.len()
    }

    /// Lower bounds.
    pub fn lb(&self) -> &Array1<f64> {
        &self.lb
    }

    /// Upper bounds.
    pub fn ub(&self) -> &Array1<f64> {
        &self.ub
    }

    /// Whether any coordinate is marked discrete.
    pub fn has_discrete(&self) -> bool {
        self.discrete.iter().any(|d| *d)
    }

    /// Discreteness mask.
    pub fn discrete(&self) -> &[bool] {
        &self.discrete
    }

    /// Bounds as a (nx, 2) xlimits matrix for sampling methods.
    pub fn bounds(&self) -> Array2<f64> {
        let lb = self.lb.view().insert_axis(Axis(1));
        let ub = self.ub.view().insert_axis(Axis(1));
        concatenate![Axis(1), lb, ub]
    }

    /// Feasibility over bounds, discreteness and the predicate if any.
    pub fn contains(&self, x: &ArrayView1<f64>) -> bool {
        if x.len() != self.dim() {
            return false;
        }
        let in_bounds = x
            .iter()
            .zip(self.lb.iter().zip(self.ub.iter()))
            .all(|(v, (l, u))| *v >= *l && *v <= *u);
        if !in_bounds {
            return false;
        }
        let integral = x
            .iter()
            .zip(self.discrete.iter())
            .all(|(v, d)| !*d || (v - v.round()).abs() < f64::EPSILON * v.abs().max(1.));
        if !integral {
            return false;
        }
        match &self.predicate {
            Some(p) => (p)(x),
            None => true,
        }
    }

    /// Rounds components flagged discrete to the nearest integer within the
    /// bounds; continuous components are left untouched.
    pub fn project_discrete(&self, x: &ArrayView1<f64>) -> Array1<f64> {
        let mut xp = x.to_owned();
        for (i, d) in self.discrete.iter().enumerate() {
            if *d {
                xp[i] = x[i].round().clamp(self.lb[i].ceil(), self.ub[i].floor());
            }
        }
        xp
    }

    /// Moves `x` strictly inside the bounds by at least `margin`
    /// component-wise, as required by optimizers rejecting boundary starts.
    pub fn interiorize(&self, x: &ArrayView1<f64>, margin: f64) -> Result<Array1<f64>> {
        if self
            .lb
            .iter()
            .zip(self.ub.iter())
            .any(|(l, u)| u - l < 2. * margin)
        {
            return Err(BoError::InvalidDomain(format!(
                "domain too narrow to interiorize with margin {margin}"
            )));
        }
        let mut xi = x.to_owned();
        for i in 0..self.dim() {
            xi[i] = xi[i].clamp(self.lb[i] + margin, self.ub[i] - margin);
        }
        Ok(xi)
    }

    /// Drops all dataset rows infeasible under the domain, preserving the
    /// relative order of survivors; fails with `InvalidDomain` when the
    /// dataset empties.
    pub fn exclude_exterior(&self, x: &Array2<f64>, y: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        let keep: Vec<usize> = x
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| self.contains(row))
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(BoError::InvalidDomain(
                "no dataset point lies inside the domain".to_string(),
            ));
        }
        Ok((x.select(Axis(0), &keep), y.select(Axis(0), &keep)))
    }
}
