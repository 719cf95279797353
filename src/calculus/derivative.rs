// src/calculus/derivative.rs

//! Central-difference differentiation.

use crate::expr::Evaluator;
use crate::{EngineError, EngineResult};

/// Default half-width of the difference stencil.
pub const DEFAULT_STEP: f64 = 1e-5;

/// `(f(x + h) - f(x - h)) / 2h`
pub fn central_difference<F: Fn(f64) -> f64>(f: F, x: f64, h: f64) -> f64 {
    (f(x + h) - f(x - h)) / (2.0 * h)
}

/// Approximates `d/dx expression` at `x`.
pub fn numeric_derivative(evaluator: &Evaluator, expression: &str, x: f64, h: f64) -> EngineResult<f64> {
    if !x.is_finite() {
        return Err(EngineError::InvalidArgument(format!("derivative point {} is not finite", x)));
    }
    if !(h.is_finite() && h > 0.0) {
        return Err(EngineError::InvalidArgument(format!("step {} must be a positive number", h)));
    }

    let f = evaluator.compile(expression)?;
    let forward = f.eval_at("x", x + h)?;
    let backward = f.eval_at("x", x - h)?;
    let slope = (forward - backward) / (2.0 * h);

    if !slope.is_finite() {
        tracing::debug!(expression = f.source(), x, "derivative is not finite");
        return Err(EngineError::UndefinedDerivative { x });
    }
    Ok(slope)
}
