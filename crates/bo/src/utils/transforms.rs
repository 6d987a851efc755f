//! Stable nonlinear transforms keeping optimized parameters in their
//! admissible region. The `x > 20` cutoff keeps `f64` arithmetic in a
//! well-conditioned regime.

/// Numerically stable softplus `ln(1 + exp(x))`, mapping R to (0, inf).
pub fn softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on (0, inf): solves `softplus(t) = x`.
pub fn softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Log-derivative `ln(d softplus(x) / dx) = ln(sigmoid(x))`, used as the
/// change-of-variable correction when sampling in the unconstrained space.
pub fn softplus_log_grad(x: f64) -> f64 {
    -softplus(-x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_softplus_roundtrip() {
        for v in [1e-6, 0.1, 1.0, 5.0, 25.0, 1e3] {
            assert_abs_diff_eq!(softplus(softplus_inv(v)), v, epsilon = 1e-9 * v.max(1.));
        }
    }

    #[test]
    fn test_softplus_positive() {
        for x in [-50., -1., 0., 1., 50.] {
            assert!(softplus(x) > 0.);
        }
    }

    #[test]
    fn test_softplus_log_grad_bounds() {
        // sigmoid is in (0, 1) so its log is negative
        for x in [-5., 0., 5.] {
            assert!(softplus_log_grad(x) < 0.);
        }
        assert_abs_diff_eq!(softplus_log_grad(0.), (0.5f64).ln(), epsilon = 1e-12);
    }
}
