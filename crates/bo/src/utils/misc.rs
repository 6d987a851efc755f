use crate::types::Fitness;
use libm::erfc;
use ndarray::{Array1, ArrayView2};

const SQRT_2PI: f64 = 2.5066282746310007;

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

/// Whether an output vector meets the upper output constraints
/// (`+inf` entries disable the constraint for that output).
pub fn is_admissible(y: &ndarray::ArrayView1<f64>, y_max: &Array1<f64>) -> bool {
    y.iter().zip(y_max.iter()).all(|(v, m)| v <= m)
}

/// Sum of output-constraint violations of an output vector.
fn violation(y: &ndarray::ArrayView1<f64>, y_max: &Array1<f64>) -> f64 {
    y.iter()
        .zip(y_max.iter())
        .filter(|(v, m)| v > m)
        .fold(0., |acc, (v, m)| acc + (v - m).abs())
}

/// Index of the best stored point: the admissible row maximizing the fitness,
/// or, when no row is admissible, the row minimizing the total constraint
/// violation.
pub fn find_best_index(y_data: &ArrayView2<f64>, fitness: &Fitness, y_max: &Array1<f64>) -> usize {
    let mut best = 0;
    let mut best_fit = f64::NEG_INFINITY;
    let mut any_admissible = false;
    for (i, y) in y_data.rows().into_iter().enumerate() {
        if is_admissible(&y, y_max) {
            let fit = fitness.eval(&y);
            if !any_admissible || fit > best_fit {
                best = i;
                best_fit = fit;
                any_admissible = true;
            }
        }
    }
    if any_admissible {
        return best;
    }
    // no admissible point: take the minimal violation sum
    let mut best_viol = f64::INFINITY;
    for (i, y) in y_data.rows().into_iter().enumerate() {
        let v = violation(&y, y_max);
        if v < best_viol {
            best_viol = v;
            best = i;
        }
    }
    best
}

/// Best admissible fitness observed so far, or `default` when no stored point
/// is admissible, or the minimal observed fitness when no default is given.
pub fn best_admissible_fitness(
    y_data: &ArrayView2<f64>,
    fitness: &Fitness,
    y_max: &Array1<f64>,
    default: Option<f64>,
) -> f64 {
    let mut best = f64::NEG_INFINITY;
    let mut found = false;
    for y in y_data.rows() {
        if is_admissible(&y, y_max) {
            best = best.max(fitness.eval(&y));
            found = true;
        }
    }
    if found {
        return best;
    }
    default.unwrap_or_else(|| {
        y_data
            .rows()
            .into_iter()
            .map(|y| fitness.eval(&y))
            .fold(f64::INFINITY, f64::min)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_norm_helpers() {
        assert_abs_diff_eq!(norm_cdf(0.), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_pdf(0.), 1. / SQRT_2PI, epsilon = 1e-12);
        assert!(norm_cdf(5.) > 0.999999);
    }

    #[test]
    fn test_find_best_index_admissible() {
        // maximize y_0 subject to y_1 <= 0
        let y = array![[1., -1.], [5., 2.], [3., -0.5]];
        let fitness = Fitness::Linear(array![1., 0.]);
        let y_max = array![f64::INFINITY, 0.];
        assert_eq!(find_best_index(&y.view(), &fitness, &y_max), 2);
    }

    #[test]
    fn test_find_best_index_no_admissible() {
        let y = array![[1., 3.], [5., 1.]];
        let fitness = Fitness::Linear(array![1., 0.]);
        let y_max = array![f64::INFINITY, 0.];
        // minimal violation is row 1
        assert_eq!(find_best_index(&y.view(), &fitness, &y_max), 1);
    }

    #[test]
    fn test_best_admissible_fitness_fallbacks() {
        let y = array![[1., 3.], [5., 1.]];
        let fitness = Fitness::Linear(array![1., 0.]);
        let y_max = array![f64::INFINITY, 0.];
        assert_abs_diff_eq!(
            best_admissible_fitness(&y.view(), &fitness, &y_max, Some(-7.)),
            -7.,
            epsilon = 1e-12
        );
        // without default: minimal observed fitness
        assert_abs_diff_eq!(
            best_admissible_fitness(&y.view(), &fitness, &y_max, None),
            1.,
            epsilon = 1e-12
        );
    }
}
