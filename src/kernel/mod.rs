// src/kernel/mod.rs

//! The matrix kernel.
//! Parsing, arithmetic, elimination-based determinant and inverse, and
//! display formatting for dense `f64` matrices.

pub mod rref;

use nalgebra::DMatrix;

use crate::{EngineError, EngineResult};

pub use rref::{inverse_with_steps, rref_with_steps, InverseTrace, RowOperation, RrefStep, RrefTrace};

// Type alias for clarity throughout the engine.
pub type Matrix = DMatrix<f64>;

/// Pivots with a smaller magnitude are treated as zero.
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Decimal places used when displaying results.
pub const DISPLAY_DECIMALS: usize = 6;

/// Digits past this are noise for an `f64`.
pub const MAX_DISPLAY_DECIMALS: usize = 17;

/// Parses matrix text: rows separated by newlines or `;`, cells by whitespace or `,`.
pub fn parse_matrix(text: &str) -> EngineResult<Matrix> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for line in text.split(|c: char| c == '\n' || c == ';') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row_number = rows.len() + 1;
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|cell| !cell.is_empty())
            .map(|cell| parse_cell(cell, row_number))
            .collect::<EngineResult<Vec<f64>>>()?;
        rows.push(row);
    }
    from_rows(&rows)
}

fn parse_cell(cell: &str, row_number: usize) -> EngineResult<f64> {
    let value: f64 = cell
        .replace('−', "-")
        .parse()
        .map_err(|_| EngineError::MatrixParse(format!("row {}: '{}' is not a number", row_number, cell)))?;
    if !value.is_finite() {
        return Err(EngineError::MatrixParse(format!(
            "row {}: '{}' is not a finite number",
            row_number, cell
        )));
    }
    Ok(value)
}

/// Builds a matrix from nested rows, rejecting empty, ragged or non-finite input.
pub fn from_rows(rows: &[Vec<f64>]) -> EngineResult<Matrix> {
    let Some(first) = rows.first() else {
        return Err(EngineError::MatrixParse("matrix is empty".to_string()));
    };
    let cols = first.len();
    if cols == 0 {
        return Err(EngineError::MatrixParse("matrix is empty".to_string()));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != cols {
            return Err(EngineError::MatrixParse(format!(
                "row {} has {} columns, expected {}",
                i + 1,
                row.len(),
                cols
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::MatrixParse(format!("row {} contains a non-finite value", i + 1)));
        }
    }
    Ok(Matrix::from_fn(rows.len(), cols, |i, j| rows[i][j]))
}

/// Converts a matrix back into nested rows.
pub fn to_rows(m: &Matrix) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| m.row(i).iter().copied().collect())
        .collect()
}

pub fn identity(n: usize) -> Matrix {
    Matrix::identity(n, n)
}

pub fn add(a: &Matrix, b: &Matrix) -> EngineResult<Matrix> {
    if a.shape() != b.shape() {
        return Err(EngineError::DimensionMismatch {
            op: "addition",
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(a + b)
}

pub fn multiply(a: &Matrix, b: &Matrix) -> EngineResult<Matrix> {
    if a.ncols() != b.nrows() {
        return Err(EngineError::DimensionMismatch {
            op: "multiplication",
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(a * b)
}

fn ensure_square(m: &Matrix) -> EngineResult<usize> {
    if !m.is_square() || m.nrows() == 0 {
        return Err(EngineError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        });
    }
    Ok(m.nrows())
}

/// Row index in `from..` holding the largest magnitude in `col`. First wins on ties.
pub(crate) fn pivot_row(m: &Matrix, col: usize, from: usize) -> usize {
    let mut best = from;
    for row in from + 1..m.nrows() {
        if m[(row, col)].abs() > m[(best, col)].abs() {
            best = row;
        }
    }
    best
}

/// Determinant by Gaussian elimination with partial pivoting.
///
/// A pivot below `tolerance` short-circuits to `0.0`.
pub fn determinant(m: &Matrix, tolerance: f64) -> EngineResult<f64> {
    let n = ensure_square(m)?;
    let mut a = m.clone();
    let mut det = 1.0;

    for col in 0..n {
        let p = pivot_row(&a, col, col);
        let pivot = a[(p, col)];
        if pivot.abs() < tolerance {
            return Ok(0.0);
        }
        if p != col {
            a.swap_rows(p, col);
            det = -det;
        }
        det *= pivot;

        for row in col + 1..n {
            let factor = a[(row, col)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let delta = factor * a[(col, k)];
                a[(row, k)] -= delta;
            }
        }
    }

    Ok(det)
}

/// Inverse by Gauss-Jordan elimination on `[m | I]`.
pub fn inverse(m: &Matrix, tolerance: f64) -> EngineResult<Matrix> {
    let n = ensure_square(m)?;
    let mut aug = augment_identity(m);

    for col in 0..n {
        let p = pivot_row(&aug, col, col);
        let pivot = aug[(p, col)];
        if pivot.abs() < tolerance {
            return Err(EngineError::SingularMatrix);
        }
        if p != col {
            aug.swap_rows(p, col);
        }
        for k in 0..2 * n {
            aug[(col, k)] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for k in 0..2 * n {
                let delta = factor * aug[(col, k)];
                aug[(row, k)] -= delta;
            }
        }
    }

    Ok(Matrix::from_fn(n, n, |i, j| aug[(i, n + j)]))
}

pub(crate) fn augment_identity(m: &Matrix) -> Matrix {
    let n = m.nrows();
    Matrix::from_fn(n, 2 * n, |i, j| {
        if j < n {
            m[(i, j)]
        } else if j - n == i {
            1.0
        } else {
            0.0
        }
    })
}

/// Rounds to `decimals` places for display. Non-finite values render as `NaN`.
pub fn format_value_with(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "NaN".to_string();
    }
    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

pub fn format_value(value: f64) -> String {
    format_value_with(value, DISPLAY_DECIMALS)
}

/// One line per row, cells separated by single spaces.
pub fn format_matrix(m: &Matrix) -> String {
    format_matrix_with(m, DISPLAY_DECIMALS)
}

pub fn format_matrix_with(m: &Matrix, decimals: usize) -> String {
    (0..m.nrows())
        .map(|i| {
            m.row(i)
                .iter()
                .map(|v| format_value_with(*v, decimals))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
