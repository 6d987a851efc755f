//! Evolving dataset of evaluated points. Rows are points: `x` is `(k, n)`,
//! `y` is `(k, m)` with `k >= 1` at any observable state.

use crate::errors::{BoError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};
use ndarray_stats::DeviationExt;

/// Dataset `D = (X, Y)` of evaluated inputs and outputs.
#[derive(Clone, Debug)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array2<f64>,
}

impl Dataset {
    /// Constructor; fails when row counts differ or the dataset is empty.
    pub fn new(x: Array2<f64>, y: Array2<f64>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(BoError::InvalidDomain(format!(
                "dataset has {} inputs for {} outputs",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.nrows() == 0 {
            return Err(BoError::InvalidDomain(
                "dataset needs at least one point".to_string(),
            ));
        }
        Ok(Dataset { x, y })
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    /// Whether the dataset is empty (never true for a constructed dataset).
    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    /// Input dimension.
    pub fn n_inputs(&self) -> usize {
        self.x.ncols()
    }

    /// Output dimension.
    pub fn n_outputs(&self) -> usize {
        self.y.ncols()
    }

    /// Stored inputs, one row per point.
    pub fn x(&self) -> ArrayView2<f64> {
        self.x.view()
    }

    /// Stored outputs, one row per point.
    pub fn y(&self) -> ArrayView2<f64> {
        self.y.view()
    }

    /// Append an evaluated point.
    pub fn append(&mut self, x: &ArrayView1<f64>, y: &ArrayView1<f64>) {
        let xdat = x.insert_axis(Axis(0));
        let ydat = y.insert_axis(Axis(0));
        self.x = concatenate![Axis(0), self.x.view(), xdat];
        self.y = concatenate![Axis(0), self.y.view(), ydat];
    }

    /// Check a new point is not numerically coincident with a stored one.
    pub fn accepts(&self, x_new: &ArrayView1<f64>) -> bool {
        for row in self.x.rows() {
            if row.l1_dist(x_new).unwrap() < 100. * f64::EPSILON {
                return false;
            }
        }
        true
    }

    /// Last stored point.
    pub fn last(&self) -> (ArrayView1<f64>, ArrayView1<f64>) {
        let k = self.len() - 1;
        (self.x.row(k), self.y.row(k))
    }

    /// Consume the dataset into its raw `(x, y)` matrices.
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>) {
        (self.x, self.y)
    }
}

/// Helper building a dataset from a single point.
pub fn single_point(x: Array1<f64>, y: Array1<f64>) -> Result<Dataset> {
    let n = x.len();
    let m = y.len();
    Dataset::new(
        x.into_shape_with_order((1, n)).unwrap(),
        y.into_shape_with_order((1, m)).unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_checks_row_parity() {
        assert!(Dataset::new(array![[0.]], array![[1.], [2.]]).is_err());
        assert!(Dataset::new(Array2::zeros((0, 1)), Array2::zeros((0, 1))).is_err());
    }

    #[test]
    fn test_append_grows_by_one() {
        let mut ds = Dataset::new(array![[0.0]], array![[1.0]]).unwrap();
        ds.append(&array![2.0].view(), &array![3.0].view());
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.x(), array![[0.0], [2.0]]);
        assert_eq!(ds.y(), array![[1.0], [3.0]]);
    }

    #[test]
    fn test_accepts_rejects_coincident() {
        let ds = Dataset::new(array![[0., 1.], [2., 3.]], array![[0.], [1.]]).unwrap();
        assert!(ds.accepts(&array![3., 4.].view()));
        assert!(!ds.accepts(&array![1e-15, 1.].view()));
    }

    #[test]
    fn test_single_point() {
        let ds = single_point(array![1., 2.], array![3.]).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.n_inputs(), 2);
        assert_eq!(ds.n_outputs(), 1);
    }
}
