// src/kernel/rref.rs

//! Reduced row-echelon form with a recorded trace of row operations.

use serde::Serialize;

use super::{augment_identity, ensure_square, format_value, pivot_row, Matrix};
use crate::{EngineError, EngineResult};

/// An elementary row operation. Row indices are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowOperation {
    Swap { first: usize, second: usize },
    Scale { row: usize, factor: f64 },
    /// `target += factor * source`
    Combine { target: usize, source: usize, factor: f64 },
}

impl RowOperation {
    /// Human-readable form with one-based row labels, e.g. `R2 = R2 - 3 * R1`.
    pub fn describe(&self) -> String {
        match *self {
            RowOperation::Swap { first, second } => format!("Swap R{} <-> R{}", first + 1, second + 1),
            RowOperation::Scale { row, factor } => {
                format!("R{} = {} * R{}", row + 1, format_value(factor), row + 1)
            }
            RowOperation::Combine { target, source, factor } => {
                let sign = if factor < 0.0 { '-' } else { '+' };
                format!(
                    "R{} = R{} {} {} * R{}",
                    target + 1,
                    target + 1,
                    sign,
                    format_value(factor.abs()),
                    source + 1
                )
            }
        }
    }
}

/// One recorded step: the operation and the matrix right after it.
#[derive(Debug, Clone)]
pub struct RrefStep {
    pub operation: RowOperation,
    pub description: String,
    pub matrix: Matrix,
}

#[derive(Debug, Clone)]
pub struct RrefTrace {
    pub steps: Vec<RrefStep>,
    pub result: Matrix,
    /// Column index of each leading one, top to bottom.
    pub pivot_columns: Vec<usize>,
}

impl RrefTrace {
    pub fn rank(&self) -> usize {
        self.pivot_columns.len()
    }
}

#[derive(Debug, Clone)]
pub struct InverseTrace {
    pub inverse: Matrix,
    pub steps: Vec<RrefStep>,
}

struct Recorder {
    matrix: Matrix,
    steps: Vec<RrefStep>,
}

impl Recorder {
    fn apply(&mut self, operation: RowOperation) {
        let cols = self.matrix.ncols();
        match operation {
            RowOperation::Swap { first, second } => self.matrix.swap_rows(first, second),
            RowOperation::Scale { row, factor } => {
                for k in 0..cols {
                    self.matrix[(row, k)] *= factor;
                }
            }
            RowOperation::Combine { target, source, factor } => {
                for k in 0..cols {
                    let delta = factor * self.matrix[(source, k)];
                    self.matrix[(target, k)] += delta;
                }
            }
        }
    }

    /// Snapshots the current matrix under `operation`.
    fn record(&mut self, operation: RowOperation) {
        self.steps.push(RrefStep {
            description: operation.describe(),
            operation,
            matrix: self.matrix.clone(),
        });
    }
}

/// Reduces `m` to RREF using partial pivoting, recording every row operation.
///
/// Columns whose best pivot is below `tolerance` are skipped.
pub fn rref_with_steps(m: &Matrix, tolerance: f64) -> RrefTrace {
    let (rows, cols) = m.shape();
    let mut rec = Recorder {
        matrix: m.clone(),
        steps: Vec::new(),
    };
    let mut pivot_columns = Vec::new();
    let mut lead = 0;

    for col in 0..cols {
        if lead >= rows {
            break;
        }
        let p = pivot_row(&rec.matrix, col, lead);
        if rec.matrix[(p, col)].abs() < tolerance {
            continue;
        }
        if p != lead {
            let swap = RowOperation::Swap { first: lead, second: p };
            rec.apply(swap.clone());
            rec.record(swap);
        }

        let pivot = rec.matrix[(lead, col)];
        if pivot != 1.0 {
            let scale = RowOperation::Scale {
                row: lead,
                factor: 1.0 / pivot,
            };
            rec.apply(scale.clone());
            // 1/p * p can miss 1.0 by an ulp
            rec.matrix[(lead, col)] = 1.0;
            rec.record(scale);
        }

        for row in 0..rows {
            if row == lead {
                continue;
            }
            let value = rec.matrix[(row, col)];
            if value == 0.0 {
                continue;
            }
            if value.abs() < tolerance {
                rec.matrix[(row, col)] = 0.0;
                continue;
            }
            let combine = RowOperation::Combine {
                target: row,
                source: lead,
                factor: -value,
            };
            rec.apply(combine.clone());
            rec.matrix[(row, col)] = 0.0;
            rec.record(combine);
        }

        pivot_columns.push(col);
        lead += 1;
    }

    tracing::debug!(steps = rec.steps.len(), rank = pivot_columns.len(), "rref complete");
    RrefTrace {
        steps: rec.steps,
        result: rec.matrix,
        pivot_columns,
    }
}

/// Inverts `m` by reducing `[m | I]`, keeping the step trace.
pub fn inverse_with_steps(m: &Matrix, tolerance: f64) -> EngineResult<InverseTrace> {
    let n = ensure_square(m)?;
    let trace = rref_with_steps(&augment_identity(m), tolerance);

    let left_pivots = trace.pivot_columns.iter().take_while(|&&c| c < n).count();
    if left_pivots < n {
        return Err(EngineError::SingularMatrix);
    }

    let inverse = Matrix::from_fn(n, n, |i, j| trace.result[(i, n + j)]);
    Ok(InverseTrace {
        inverse,
        steps: trace.steps,
    })
}
