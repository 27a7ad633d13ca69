//! Integer sequences used to address rows, columns or flattened elements.

use super::Shared;
use crate::error::{EquationError, Result};

/// A lazily evaluated set of indices.
///
/// Bounds are shared integer cells, so a sequence compiled once reads the
/// *current* bound values every time it is initialized.
#[derive(Debug, Clone)]
pub enum IntegerSequence {
    /// `1 0 2` – every index written out, order preserved.
    Explicit(Vec<Shared<i64>>),
    /// `a:b` or `a:s:b` – inclusive arithmetic progression.
    For {
        start: Shared<i64>,
        step: Option<Shared<i64>>,
        end: Shared<i64>,
    },
    /// `:` or `a:` – runs to the end of the addressed dimension.
    Range {
        start: Option<Shared<i64>>,
        end: Option<Shared<i64>>,
    },
    /// `2 3:5` – concatenation of the parts, left to right.
    Combined(Vec<IntegerSequence>),
}

/// One resolved part of a sequence: either listed values or a progression
/// that is stepped on demand.
#[derive(Debug)]
enum Run {
    Listed(std::vec::IntoIter<i64>),
    Stepped { next: Option<i64>, step: i64, end: i64 },
}

impl Iterator for Run {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        match self {
            Run::Listed(values) => values.next(),
            Run::Stepped { next, step, end } => {
                let i = (*next)?;
                let inside = if *step > 0 { i <= *end } else { i >= *end };
                if !inside {
                    *next = None;
                    return None;
                }
                // stops instead of wrapping past i64::MAX / i64::MIN
                *next = i.checked_add(*step);
                Some(i)
            }
        }
    }
}

/// Single-pass iterator produced by [`IntegerSequence::initialize`].
///
/// Bounds are read once, when the iterator is created; indices are
/// generated lazily, so a huge range costs nothing until it is consumed.
#[derive(Debug)]
pub struct Indices {
    // in reverse: the run being consumed is last
    runs: Vec<Run>,
}

impl Iterator for Indices {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while let Some(run) = self.runs.last_mut() {
            if let Some(i) = run.next() {
                return Some(i);
            }
            self.runs.pop();
        }
        None
    }
}

impl IntegerSequence {
    /// Resolves the sequence against a dimension of `dimension` elements.
    pub fn initialize(&self, dimension: usize) -> Result<Indices> {
        let mut runs = Vec::new();
        self.collect_runs(dimension, &mut runs)?;
        runs.reverse();
        Ok(Indices { runs })
    }

    fn collect_runs(&self, dimension: usize, out: &mut Vec<Run>) -> Result<()> {
        match self {
            IntegerSequence::Explicit(items) => {
                let values: Vec<i64> = items.iter().map(|v| *v.borrow()).collect();
                out.push(Run::Listed(values.into_iter()));
            }
            IntegerSequence::For { start, step, end } => {
                let step = step.as_ref().map_or(1, |s| *s.borrow());
                out.push(progression(*start.borrow(), step, *end.borrow())?);
            }
            IntegerSequence::Range { start, end } => {
                let start = start.as_ref().map_or(0, |s| *s.borrow());
                let end = match end {
                    Some(e) => *e.borrow(),
                    None => i64::try_from(dimension).unwrap_or(i64::MAX) - 1,
                };
                out.push(progression(start, 1, end)?);
            }
            IntegerSequence::Combined(parts) => {
                for part in parts {
                    part.collect_runs(dimension, out)?;
                }
            }
        }
        Ok(())
    }

    /// True when the sequence can only be resolved against a dimension.
    pub fn needs_dimension(&self) -> bool {
        match self {
            IntegerSequence::Range { end, .. } => end.is_none(),
            IntegerSequence::Combined(parts) => parts.iter().any(|p| p.needs_dimension()),
            IntegerSequence::Explicit(_) | IntegerSequence::For { .. } => false,
        }
    }

    /// Length known before any operation runs, given a way to read
    /// compile-time constants.
    pub fn static_len(&self, constant: &dyn Fn(&Shared<i64>) -> Option<i64>) -> Option<usize> {
        match self {
            IntegerSequence::Explicit(items) => Some(items.len()),
            IntegerSequence::For { start, step, end } => {
                let start = constant(start)?;
                let end = constant(end)?;
                let step = match step {
                    Some(s) => constant(s)?,
                    None => 1,
                };
                progression_len(start, step, end)
            }
            IntegerSequence::Range { start, end } => {
                let start = match start {
                    Some(s) => constant(s)?,
                    None => 0,
                };
                progression_len(start, 1, constant(end.as_ref()?)?)
            }
            IntegerSequence::Combined(parts) => parts
                .iter()
                .try_fold(0usize, |total, p| total.checked_add(p.static_len(constant)?)),
        }
    }
}

/// Number of terms, or `None` when the step is zero or the count does not
/// fit in `usize`.
fn progression_len(start: i64, step: i64, end: i64) -> Option<usize> {
    if step == 0 {
        return None;
    }
    if (step > 0 && start > end) || (step < 0 && start < end) {
        return Some(0);
    }
    let terms = (i128::from(end) - i128::from(start)) / i128::from(step) + 1;
    usize::try_from(terms).ok()
}

fn progression(start: i64, step: i64, end: i64) -> Result<Run> {
    if step == 0 {
        return Err(EquationError::numeric("range step must not be zero"));
    }
    Ok(Run::Stepped {
        next: Some(start),
        step,
        end,
    })
}
