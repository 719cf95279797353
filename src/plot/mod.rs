// src/plot/mod.rs

//! Samples expressions into plain arrays for the chart layer.
//!
//! Points where the function is undefined are kept as gaps (`None` for
//! curves, `NaN` for surfaces) rather than failing the whole plot.

use ndarray::Array2;
use serde::Serialize;

use crate::expr::Evaluator;
use crate::{EngineError, EngineResult};

/// Samples of `y = f(x)` on an evenly spaced grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSample {
    pub x: Vec<f64>,
    pub y: Vec<Option<f64>>,
}

impl CurveSample {
    pub fn defined_points(&self) -> usize {
        self.y.iter().filter(|y| y.is_some()).count()
    }
}

/// Samples of `z = f(x, y)`. `z[[i, j]]` is the value at `(x[j], y[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSample {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Array2<f64>,
}

impl SurfaceSample {
    /// Row-major nested form with `None` for undefined points.
    pub fn z_rows(&self) -> Vec<Vec<Option<f64>>> {
        self.z
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|v| v.is_finite().then_some(*v)).collect())
            .collect()
    }
}

fn linspace(min: f64, max: f64, points: usize) -> EngineResult<Vec<f64>> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(EngineError::InvalidArgument(format!(
            "plot range [{}, {}] must be finite and non-empty",
            min, max
        )));
    }
    if points < 2 {
        return Err(EngineError::InvalidArgument(format!(
            "at least 2 sample points are needed, got {}",
            points
        )));
    }
    let step = (max - min) / (points - 1) as f64;
    Ok((0..points)
        .map(|i| if i == points - 1 { max } else { min + i as f64 * step })
        .collect())
}

pub fn sample_curve(
    evaluator: &Evaluator,
    expression: &str,
    x_min: f64,
    x_max: f64,
    points: usize,
) -> EngineResult<CurveSample> {
    let xs = linspace(x_min, x_max, points)?;
    let f = evaluator.compile(expression)?;
    let mut ys = Vec::with_capacity(xs.len());
    for &x in &xs {
        let y = f.eval_at("x", x)?;
        ys.push(y.is_finite().then_some(y));
    }
    let sample = CurveSample { x: xs, y: ys };
    tracing::debug!(
        expression = f.source(),
        points,
        defined = sample.defined_points(),
        "sampled curve"
    );
    Ok(sample)
}

/// Samples `expression` in `x` and `y` on a `resolution × resolution` grid.
pub fn sample_surface(
    evaluator: &Evaluator,
    expression: &str,
    x_range: (f64, f64),
    y_range: (f64, f64),
    resolution: usize,
) -> EngineResult<SurfaceSample> {
    let xs = linspace(x_range.0, x_range.1, resolution)?;
    let ys = linspace(y_range.0, y_range.1, resolution)?;
    let f = evaluator.compile(expression)?;

    let mut z = Array2::from_elem((ys.len(), xs.len()), f64::NAN);
    for (i, &y) in ys.iter().enumerate() {
        for (j, &x) in xs.iter().enumerate() {
            let value = f.eval_xy(x, y)?;
            if value.is_finite() {
                z[[i, j]] = value;
            }
        }
    }

    Ok(SurfaceSample { x: xs, y: ys, z })
}
