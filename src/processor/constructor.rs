//! Bracket literals such as `[A, b; 0 1:3]`.
//!
//! Rows are stacked top to bottom, and the blocks of a row are laid out left
//! to right. Scalars are 1x1 blocks and integer sequences become row vectors.

use super::kernel::Mat;
use super::temps::TempManager;
use crate::error::{EquationError, Result};
use crate::model::{Shared, Variable};

#[derive(Debug, Clone)]
pub struct MatrixConstructor {
    rows: Vec<Vec<Variable>>,
    output: Shared<Mat>,
}

impl MatrixConstructor {
    pub fn new(rows: Vec<Vec<Variable>>, output: Shared<Mat>) -> Self {
        Self { rows, output }
    }

    /// Rejects literals whose shape is already inconsistent before any
    /// operation runs. Blocks with a shape only known at run time are skipped.
    pub fn check_static(&self, temps: &TempManager) -> Result<()> {
        let mut width = None;
        for (r, row) in self.rows.iter().enumerate() {
            let shapes: Vec<Option<(usize, usize)>> =
                row.iter().map(|item| static_shape(item, temps)).collect();

            let mut height = None;
            for (rows, _) in shapes.iter().flatten() {
                match height {
                    Some(h) if h != *rows => {
                        return Err(EquationError::syntax(format!(
                            "blocks in row {r} of the matrix literal have different heights"
                        )));
                    }
                    _ => height = Some(*rows),
                }
            }

            let row_width = shapes
                .iter()
                .try_fold(0usize, |total, s| total.checked_add(s.map(|(_, c)| c)?));
            if let Some(w) = row_width {
                match width {
                    Some(expected) if expected != w => {
                        return Err(EquationError::syntax(format!(
                            "row {r} of the matrix literal is {w} wide, expected {expected}"
                        )));
                    }
                    _ => width = Some(w),
                }
            }
        }
        Ok(())
    }

    pub fn construct(&self) -> Result<()> {
        let mut blocks = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let row: Vec<Mat> = row.iter().map(as_block).collect::<Result<_>>()?;
            blocks.push(row);
        }

        let mut heights = Vec::with_capacity(blocks.len());
        let mut width = None;
        for (r, row) in blocks.iter().enumerate() {
            let height = row.first().map_or(0, |b| b.nrows());
            if let Some(b) = row.iter().find(|b| b.nrows() != height) {
                return Err(EquationError::shape(format!(
                    "row {r} of the matrix literal mixes heights {height} and {}",
                    b.nrows()
                )));
            }
            let w: usize = row.iter().map(|b| b.ncols()).sum();
            match width {
                Some(expected) if expected != w => {
                    return Err(EquationError::shape(format!(
                        "row {r} of the matrix literal is {w} wide, expected {expected}"
                    )));
                }
                _ => width = Some(w),
            }
            heights.push(height);
        }

        let mut out = Mat::zeros(heights.iter().sum(), width.unwrap_or(0));
        let mut top = 0;
        for (row, height) in blocks.iter().zip(heights) {
            let mut left = 0;
            for b in row {
                out.view_mut((top, left), b.shape()).copy_from(b);
                left += b.ncols();
            }
            top += height;
        }
        *self.output.borrow_mut() = out;
        Ok(())
    }
}

fn static_shape(item: &Variable, temps: &TempManager) -> Option<(usize, usize)> {
    match item {
        Variable::Integer(_) | Variable::Double(_) => Some((1, 1)),
        Variable::Sequence(s) => s
            .borrow()
            .static_len(&|cell| temps.constant(cell))
            .map(|n| (1, n)),
        Variable::Matrix(_) => None,
    }
}

fn as_block(item: &Variable) -> Result<Mat> {
    match item {
        Variable::Matrix(m) => Ok(m.borrow().clone()),
        Variable::Double(_) | Variable::Integer(_) => {
            let value = item.as_scalar().map_or(0.0, |s| s.get());
            Ok(Mat::from_element(1, 1, value))
        }
        Variable::Sequence(s) => {
            let values: Vec<f64> = s.borrow().initialize(0)?.map(|i| i as f64).collect();
            Ok(Mat::from_row_slice(1, values.len(), &values))
        }
    }
}
