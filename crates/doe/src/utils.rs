use ndarray::{Array1, ArrayBase, Data, Ix2};

/// Computes the condensed vector of euclidean distances between all
/// pairs of rows of `x`, in row-major pair order (i < j).
pub fn pdist(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array1<f64> {
    let n = x.nrows();
    let mut dist = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..(n - 1) {
        for j in (i + 1)..n {
            let d = (&x.row(i) - &x.row(j)).mapv(|v| v * v).sum().sqrt();
            dist.push(d);
        }
    }
    Array1::from_vec(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_pdist() {
        let x = array![[0., 0.], [3., 4.], [0., 1.]];
        let d = pdist(&x);
        assert_abs_diff_eq!(d, array![5., 1., 4.242640687119285], epsilon = 1e-12);
    }
}
