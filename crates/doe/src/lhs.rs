use crate::SamplingMethod;
use crate::utils::pdist;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{
    RandomExt, rand::Rng, rand::SeedableRng, rand::seq::SliceRandom, rand_distr::Uniform,
};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use std::sync::{Arc, RwLock};

/// Kinds of Latin Hypercube Design
#[derive(Clone, Debug, Default, Copy)]
pub enum LhsKind {
    /// sample is choosen randomly within its latin hypercube intervals
    Classic,
    /// sample is the middle of its latin hypercube intervals
    Centered,
    /// distance between points is maximized
    #[default]
    Maximin,
}

type RngRef<R> = Arc<RwLock<R>>;

/// The LHS design is built as follows: each dimension space is divided into
/// ns sections where ns is the number of sampling points, and one point is
/// selected in each section. The selection method gives the kind of LHS
/// (see [LhsKind]).
#[derive(Clone, Debug)]
pub struct Lhs<R: Rng> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<f64>,
    /// The requested kind of LHS
    kind: LhsKind,
    /// Random generator used for reproducibility (not used in case of Centered LHS)
    rng: RngRef<R>,
}

/// Number of plans generated when maximizing inter-point distance
const LHS_MAXIMIN_N_ITER: usize = 5;

/// LHS with default random generator
impl Lhs<Xoshiro256Plus> {
    /// Constructor given a design space as a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// ```
    /// use baybox_doe::Lhs;
    /// use ndarray::arr2;
    ///
    /// let doe = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<R: Rng> SamplingMethod for Lhs<R> {
    fn sampling_space(&self) -> &Array2<f64> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<f64> {
        match &self.kind {
            LhsKind::Classic => self._classic_lhs(ns),
            LhsKind::Centered => self._centered_lhs(ns),
            LhsKind::Maximin => self._maximin_lhs(ns, LHS_MAXIMIN_N_ITER),
        }
    }
}

impl<R: Rng> Lhs<R> {
    /// Constructor with given design space and random generator.
    /// * `xlimits`: (nx, 2) matrix where nx is the dimension of the samples and the ith row
    ///   is the definition interval of the ith component of x.
    /// * `rng`: random generator used for [LhsKind::Classic] and [LhsKind::Maximin] LHS
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>, rng: R) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::default(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Lhs<R2> {
        Lhs {
            xlimits: self.xlimits,
            kind: self.kind,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    fn _classic_lhs(&self, ns: usize) -> Array2<f64> {
        let nx = self.xlimits.nrows();
        let cut = Array::linspace(0., 1., ns + 1);

        let mut rng = self.rng.write().unwrap();
        let rnd = Array::random_using((ns, nx), Uniform::new(0., 1.), &mut *rng);
        let a = cut.slice(ndarray::s![..ns]).to_owned();
        let b = cut.slice(ndarray::s![1..(ns + 1)]);
        let c = &b - &a;
        let mut rdpoints = Array::zeros((ns, nx));
        for j in 0..nx {
            let d = rnd.column(j).to_owned() * &c + &a;
            rdpoints.column_mut(j).assign(&d)
        }
        let mut lhs = Array::zeros((ns, nx));
        for j in 0..nx {
            let mut colj = rdpoints.column(j).to_owned().to_vec();
            colj.shuffle(&mut *rng);
            let colj = Array::from_vec(colj);
            lhs.column_mut(j).assign(&colj);
        }
        lhs
    }

    fn _centered_lhs(&self, ns: usize) -> Array2<f64> {
        let nx = self.xlimits.nrows();
        let cut = Array::linspace(0., 1., ns + 1);

        let a = cut.slice(ndarray::s![..ns]).to_owned();
        let b = cut.slice(ndarray::s![1..(ns + 1)]);
        let mut c = (a + b) / 2.;
        let mut lhs = Array::zeros((ns, nx));

        let mut rng = self.rng.write().unwrap();
        for j in 0..nx {
            let cs = c.as_slice_mut().unwrap();
            cs.shuffle(&mut *rng);
            lhs.column_mut(j).assign(&c);
        }
        lhs
    }

    fn _maximin_lhs(&self, ns: usize, n_iter: usize) -> Array2<f64> {
        let mut best = self._classic_lhs(ns);
        if ns < 2 {
            return best;
        }
        let mut max_min_dist = *pdist(&best).min().unwrap();
        for _ in 1..n_iter {
            let plan = self._classic_lhs(ns);
            let min_dist = *pdist(&plan).min().unwrap();
            if min_dist > max_min_dist {
                max_min_dist = min_dist;
                best = plan;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, array};

    #[test]
    fn test_lhs_stratification() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let ns = 10;
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(ns);
        assert_eq!(doe.shape(), &[ns, 2]);
        // each of the ns strata of each dimension holds exactly one point
        for j in 0..2 {
            let lo = xlimits[[j, 0]];
            let width = (xlimits[[j, 1]] - lo) / ns as f64;
            let mut counts = vec![0; ns];
            for v in doe.column(j) {
                let k = (((v - lo) / width) as usize).min(ns - 1);
                counts[k] += 1;
            }
            assert!(counts.iter().all(|&c| c == 1), "bad strata: {counts:?}");
        }
    }

    #[test]
    fn test_centered_lhs_midpoints() {
        let xlimits = array![[0., 1.]];
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .kind(LhsKind::Centered)
            .sample(4);
        let mut vals = doe.column(0).to_vec();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(vals, vec![0.125, 0.375, 0.625, 0.875]);
    }

    #[test]
    fn test_maximin_lhs_spread() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let classic = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .kind(LhsKind::Classic)
            .sample(8);
        let maximin = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .kind(LhsKind::Maximin)
            .sample(8);
        let d_classic = *pdist(&classic).min().unwrap();
        let d_maximin = *pdist(&maximin).min().unwrap();
        assert!(d_maximin >= d_classic);
    }

    #[test]
    fn test_lhs_reproducibility() {
        let xlimits = array![[0., 10.]];
        let a = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(7))
            .sample(5);
        let b = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(7))
            .sample(5);
        assert_eq!(a, b);
    }
}
