// src/calculus/integral.rs

//! Composite Simpson's rule.

use crate::expr::Evaluator;
use crate::{EngineError, EngineResult};

/// Default number of subintervals.
pub const DEFAULT_INTERVALS: usize = 200;

/// Simpson needs an even interval count: odd `n` is bumped up, and at least 2 are used.
pub fn simpson_intervals(n: usize) -> usize {
    let n = n.max(2);
    if n % 2 == 1 {
        n + 1
    } else {
        n
    }
}

/// Weighted Simpson sum over equally spaced samples `f(x_0) .. f(x_n)`, scaled by `h / 3`.
fn simpson_sum(samples: &[f64], h: f64) -> f64 {
    let last = samples.len() - 1;
    let interior: f64 = samples[1..last]
        .iter()
        .enumerate()
        .map(|(i, y)| if i % 2 == 0 { 4.0 * y } else { 2.0 * y })
        .sum();
    (samples[0] + samples[last] + interior) * h / 3.0
}

/// Integrates a closure over `[a, b]` with `n` subintervals (normalized by [`simpson_intervals`]).
pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, n: usize) -> f64 {
    let n = simpson_intervals(n);
    let h = (b - a) / n as f64;
    let samples: Vec<f64> = (0..=n).map(|i| f(a + i as f64 * h)).collect();
    simpson_sum(&samples, h)
}

/// Approximates the definite integral of `expression` in `x` from `a` to `b`.
///
/// Bounds need not be ordered; `b < a` yields the negated integral.
pub fn numeric_integral(evaluator: &Evaluator, expression: &str, a: f64, b: f64, n: usize) -> EngineResult<f64> {
    if !a.is_finite() || !b.is_finite() {
        return Err(EngineError::InvalidArgument(format!(
            "integration bounds [{}, {}] must be finite",
            a, b
        )));
    }

    let f = evaluator.compile(expression)?;
    let n = simpson_intervals(n);
    let h = (b - a) / n as f64;

    let mut samples = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let x = a + i as f64 * h;
        let y = f.eval_at("x", x)?;
        if !y.is_finite() {
            tracing::debug!(expression = f.source(), x, "non-finite sample");
            return Err(EngineError::UndefinedIntegral { a, b });
        }
        samples.push(y);
    }

    let area = simpson_sum(&samples, h);
    if !area.is_finite() {
        return Err(EngineError::UndefinedIntegral { a, b });
    }
    Ok(area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_normalization() {
        assert_eq!(simpson_intervals(200), 200);
        assert_eq!(simpson_intervals(7), 8);
        assert_eq!(simpson_intervals(1), 2);
        assert_eq!(simpson_intervals(0), 2);
    }

    #[test]
    fn test_integral_of_constant() {
        let evaluator = Evaluator::new();
        let area = numeric_integral(&evaluator, "1", 0.0, 5.0, DEFAULT_INTERVALS).unwrap();
        assert!((area - 5.0).abs() < 1e-9, "expected 5, got {}", area);
    }

    #[test]
    fn test_integral_of_cubic_is_exact() {
        // Simpson's rule is exact for polynomials up to degree three.
        let evaluator = Evaluator::new();
        let area = numeric_integral(&evaluator, "x^3 - 2*x", 0.0, 2.0, 3).unwrap();
        assert!((area - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_integral_of_sine() {
        let evaluator = Evaluator::new();
        let area = numeric_integral(&evaluator, "sin(x)", 0.0, std::f64::consts::PI, DEFAULT_INTERVALS).unwrap();
        assert!((area - 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_reversed_bounds_negate() {
        let evaluator = Evaluator::new();
        let forward = numeric_integral(&evaluator, "x^2", 0.0, 3.0, DEFAULT_INTERVALS).unwrap();
        let backward = numeric_integral(&evaluator, "x^2", 3.0, 0.0, DEFAULT_INTERVALS).unwrap();
        assert!((forward - 9.0).abs() < 1e-9);
        assert!((forward + backward).abs() < 1e-9);
    }

    #[test]
    fn test_undefined_integral() {
        let evaluator = Evaluator::new();
        let err = numeric_integral(&evaluator, "1/x", -1.0, 1.0, DEFAULT_INTERVALS).unwrap_err();
        assert!(matches!(err, EngineError::UndefinedIntegral { .. }));
    }

    #[test]
    fn test_non_finite_bounds() {
        let evaluator = Evaluator::new();
        let err = numeric_integral(&evaluator, "x", 0.0, f64::INFINITY, DEFAULT_INTERVALS).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_simpson_closure() {
        let area = simpson(|x| x.exp(), 0.0, 1.0, 100);
        assert!((area - (std::f64::consts::E - 1.0)).abs() < 1e-9);
    }
}
