//! Numeric primitives invoked by compiled operations.
//!
//! Thin wrappers around nalgebra that turn dimension problems into
//! `EquationError::Shape` instead of panicking. Flattened element access
//! is row-major.

use nalgebra::DMatrix;

use crate::error::{EquationError, Result};

pub type Mat = DMatrix<f64>;

const SINGULAR_EPS: f64 = 1e-12;

fn dims(m: &Mat) -> String {
    format!("{}x{}", m.nrows(), m.ncols())
}

/// Element-wise ops on two matrices must match exactly. A 1x1 operand gets
/// a hint, since it was most likely meant as a scalar.
fn same_shape(a: &Mat, b: &Mat, what: &str) -> Result<()> {
    if a.shape() == b.shape() {
        return Ok(());
    }
    if a.len() == 1 || b.len() == 1 {
        let (one, other) = if a.len() == 1 { (a, b) } else { (b, a) };
        return Err(EquationError::shape(format!(
            "Trying to {what} a {} matrix to every element in a {} matrix; use a scalar instead",
            dims(one),
            dims(other)
        )));
    }
    Err(EquationError::shape(format!(
        "cannot {what} {} and {}",
        dims(a),
        dims(b)
    )))
}

pub fn add(a: &Mat, b: &Mat) -> Result<Mat> {
    same_shape(a, b, "add")?;
    Ok(a + b)
}

pub fn subtract(a: &Mat, b: &Mat) -> Result<Mat> {
    same_shape(a, b, "subtract")?;
    Ok(a - b)
}

pub fn multiply(a: &Mat, b: &Mat) -> Result<Mat> {
    if a.ncols() != b.nrows() {
        same_shape(a, b, "multiply")?;
        return Err(EquationError::shape(format!(
            "cannot multiply {} by {}",
            dims(a),
            dims(b)
        )));
    }
    Ok(a * b)
}

pub fn element_mult(a: &Mat, b: &Mat) -> Result<Mat> {
    same_shape(a, b, "element-wise multiply")?;
    Ok(a.component_mul(b))
}

pub fn element_div(a: &Mat, b: &Mat) -> Result<Mat> {
    same_shape(a, b, "element-wise divide")?;
    Ok(a.component_div(b))
}

pub fn element_pow(a: &Mat, b: &Mat) -> Result<Mat> {
    same_shape(a, b, "element-wise raise")?;
    Ok(a.zip_map(b, f64::powf))
}

pub fn transpose(a: &Mat) -> Mat {
    a.transpose()
}

fn square(a: &Mat, what: &str) -> Result<()> {
    if a.is_square() {
        Ok(())
    } else {
        Err(EquationError::shape(format!(
            "{what} requires a square matrix, not {}",
            dims(a)
        )))
    }
}

pub fn invert(a: &Mat) -> Result<Mat> {
    square(a, "inv")?;
    a.clone()
        .try_inverse()
        .ok_or_else(|| EquationError::numeric("Inverse failed! matrix is singular"))
}

pub fn pseudo_inverse(a: &Mat) -> Result<Mat> {
    a.clone()
        .pseudo_inverse(SINGULAR_EPS)
        .map_err(|e| EquationError::numeric(format!("pinv failed: {e}")))
}

pub fn determinant(a: &Mat) -> Result<f64> {
    square(a, "det")?;
    Ok(a.determinant())
}

pub fn trace(a: &Mat) -> f64 {
    let n = a.nrows().min(a.ncols());
    (0..n).map(|i| a[(i, i)]).sum()
}

pub fn norm_f(a: &Mat) -> f64 {
    a.norm()
}

pub fn norm_p(a: &Mat, p: f64) -> Result<f64> {
    let is_vector = a.nrows() == 1 || a.ncols() == 1;
    if is_vector {
        if p < 1.0 {
            return Err(EquationError::numeric(format!("normP needs p >= 1, got {p}")));
        }
        return Ok(a.iter().map(|x| x.abs().powf(p)).sum::<f64>().powf(1.0 / p));
    }
    if p == 1.0 {
        Ok(a
            .column_iter()
            .map(|c| c.iter().map(|x| x.abs()).sum::<f64>())
            .fold(0.0, f64::max))
    } else if p == 2.0 {
        Ok(a.clone().singular_values().max())
    } else {
        Err(EquationError::numeric(format!(
            "normP of a matrix supports p = 1 or 2, got {p}"
        )))
    }
}

/// Reduced row echelon form by Gauss-Jordan elimination with partial pivoting.
pub fn rref(a: &Mat) -> Mat {
    let mut m = a.clone();
    let (rows, cols) = m.shape();
    let mut lead_row = 0;
    for col in 0..cols {
        if lead_row >= rows {
            break;
        }
        let pivot = (lead_row..rows)
            .max_by(|&x, &y| m[(x, col)].abs().total_cmp(&m[(y, col)].abs()))
            .unwrap_or(lead_row);
        if m[(pivot, col)].abs() <= SINGULAR_EPS {
            continue;
        }
        m.swap_rows(lead_row, pivot);
        let p = m[(lead_row, col)];
        for j in 0..cols {
            m[(lead_row, j)] /= p;
        }
        for i in 0..rows {
            if i != lead_row {
                let factor = m[(i, col)];
                if factor != 0.0 {
                    for j in 0..cols {
                        let v = m[(lead_row, j)];
                        m[(i, j)] -= factor * v;
                    }
                }
            }
        }
        lead_row += 1;
    }
    m
}

pub fn kron(a: &Mat, b: &Mat) -> Mat {
    a.kronecker(b)
}

fn is_vector(a: &Mat) -> bool {
    a.nrows() == 1 || a.ncols() == 1
}

pub fn dot(a: &Mat, b: &Mat) -> Result<f64> {
    if !is_vector(a) || !is_vector(b) {
        return Err(EquationError::shape("Both inputs to dot() must be vectors"));
    }
    if a.len() != b.len() {
        return Err(EquationError::shape(format!(
            "dot() of vectors with {} and {} elements",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Solves `a * x = b`; least squares when `a` is not square.
pub fn solve(a: &Mat, b: &Mat) -> Result<Mat> {
    if a.nrows() != b.nrows() {
        return Err(EquationError::shape(format!(
            "cannot solve {} system with {} right-hand side",
            dims(a),
            dims(b)
        )));
    }
    if a.is_square() {
        a.clone()
            .lu()
            .solve(b)
            .ok_or_else(|| EquationError::numeric("Solver failed! matrix is singular"))
    } else {
        a.clone()
            .svd(true, true)
            .solve(b, SINGULAR_EPS)
            .map_err(|e| EquationError::numeric(format!("Solver failed! {e}")))
    }
}

pub fn identity_like(a: &Mat) -> Mat {
    Mat::identity(a.nrows(), a.ncols())
}

pub fn diag(a: &Mat) -> Mat {
    if is_vector(a) {
        let n = a.len();
        let mut out = Mat::zeros(n, n);
        for (i, v) in a.iter().enumerate() {
            out[(i, i)] = *v;
        }
        out
    } else {
        let n = a.nrows().min(a.ncols());
        Mat::from_fn(n, 1, |i, _| a[(i, i)])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Max,
    Min,
    Sum,
}

impl Reduction {
    fn fold(self, values: impl Iterator<Item = f64>) -> f64 {
        match self {
            Reduction::Max => values.fold(f64::NEG_INFINITY, f64::max),
            Reduction::Min => values.fold(f64::INFINITY, f64::min),
            Reduction::Sum => values.sum(),
        }
    }
}

pub fn reduce(a: &Mat, how: Reduction) -> f64 {
    how.fold(a.iter().copied())
}

/// One value per row (`rows == true`, column vector) or per column (row vector).
pub fn reduce_axis(a: &Mat, how: Reduction, rows: bool) -> Mat {
    if rows {
        Mat::from_fn(a.nrows(), 1, |i, _| how.fold(a.row(i).iter().copied()))
    } else {
        Mat::from_fn(1, a.ncols(), |_, j| how.fold(a.column(j).iter().copied()))
    }
}

/// Row-major element access.
pub fn flat_get(a: &Mat, index: usize) -> f64 {
    let cols = a.ncols();
    a[(index / cols, index % cols)]
}

pub fn flat_set(a: &mut Mat, index: usize, value: f64) {
    let cols = a.ncols();
    a[(index / cols, index % cols)] = value;
}

/// Checks each index against `len` and converts it to `usize`.
pub fn check_indices(indices: impl Iterator<Item = i64>, len: usize, what: &str) -> Result<Vec<usize>> {
    indices
        .map(|i| {
            if i < 0 || i as usize >= len {
                Err(EquationError::shape(format!(
                    "{what} index {i} is out of bounds for size {len}"
                )))
            } else {
                Ok(i as usize)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: usize, cols: usize, data: &[f64]) -> Mat {
        Mat::from_row_slice(rows, cols, data)
    }

    #[test]
    fn test_shape_errors() {
        let a = m(3, 4, &[0.0; 12]);
        let b = m(5, 6, &[0.0; 30]);
        assert!(matches!(multiply(&a, &b), Err(EquationError::Shape(_))));
        assert!(matches!(add(&a, &b), Err(EquationError::Shape(_))));

        let one = m(1, 1, &[2.0]);
        let err = add(&one, &a).unwrap_err();
        assert!(err.to_string().contains("Trying to add a 1x1"), "{err}");
        let err = multiply(&a, &one).unwrap_err();
        assert!(err.to_string().contains("Trying to multiply a 1x1"), "{err}");
    }

    #[test]
    fn test_rref() {
        let a = m(2, 3, &[1.0, 2.0, 3.0, 2.0, 4.0, 7.0]);
        let r = rref(&a);
        let expected = m(2, 3, &[1.0, 2.0, 0.0, 0.0, 0.0, 1.0]);
        assert!((r - expected).norm() < 1e-10);
    }

    #[test]
    fn test_solve_and_invert() {
        let a = m(2, 2, &[4.0, 1.0, 2.0, 3.0]);
        let b = m(2, 1, &[1.0, 2.0]);
        let x = solve(&a, &b).unwrap();
        assert!((&a * &x - &b).norm() < 1e-10);

        let inv = invert(&a).unwrap();
        assert!((&a * inv - Mat::identity(2, 2)).norm() < 1e-10);

        let singular = m(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(matches!(invert(&singular), Err(EquationError::Numeric(_))));
    }

    #[test]
    fn test_reductions_and_flat_order() {
        let a = m(2, 3, &[1.0, 5.0, 3.0, 4.0, 2.0, 6.0]);
        assert_eq!(reduce(&a, Reduction::Max), 6.0);
        assert_eq!(reduce(&a, Reduction::Sum), 21.0);
        assert_eq!(reduce_axis(&a, Reduction::Max, true), m(2, 1, &[5.0, 6.0]));
        assert_eq!(reduce_axis(&a, Reduction::Min, false), m(1, 3, &[1.0, 2.0, 3.0]));
        assert_eq!(flat_get(&a, 3), 4.0);
        assert_eq!(trace(&a), 3.0);
        assert_eq!(diag(&a), m(2, 1, &[1.0, 2.0]));
    }
}
