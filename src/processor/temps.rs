//! Intermediate variables owned by one compile session.

use std::rc::Rc;

use crate::model::{IntegerSequence, Shared, Variable, shared};

use super::kernel::Mat;

/// Creates temporaries on demand and remembers which integer cells hold
/// literal constants, so shapes can be checked before anything runs.
#[derive(Debug, Default)]
pub struct TempManager {
    created: Vec<Variable>,
    constants: Vec<(Shared<i64>, i64)>,
}

impl TempManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, v: Variable) -> Variable {
        self.created.push(v.clone());
        v
    }

    pub fn create_matrix(&mut self) -> Shared<Mat> {
        let cell = shared(Mat::zeros(0, 0));
        self.track(Variable::Matrix(cell.clone()));
        cell
    }

    pub fn create_double(&mut self) -> Shared<f64> {
        let cell = shared(0.0);
        self.track(Variable::Double(cell.clone()));
        cell
    }

    pub fn create_integer(&mut self) -> Shared<i64> {
        let cell = shared(0);
        self.track(Variable::Integer(cell.clone()));
        cell
    }

    pub fn create_sequence(&mut self, value: IntegerSequence) -> Shared<IntegerSequence> {
        let cell = shared(value);
        self.track(Variable::Sequence(cell.clone()));
        cell
    }

    pub fn literal_integer(&mut self, value: i64) -> Variable {
        let cell = shared(value);
        self.constants.push((cell.clone(), value));
        self.track(Variable::Integer(cell))
    }

    pub fn literal_double(&mut self, value: f64) -> Variable {
        self.track(Variable::double(value))
    }

    /// Value of `cell` if it came from a literal in the source text.
    pub fn constant(&self, cell: &Shared<i64>) -> Option<i64> {
        self.constants
            .iter()
            .find(|(c, _)| Rc::ptr_eq(c, cell))
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Drops the session's own handles. Operations that captured a
    /// temporary keep it alive through their clone.
    pub fn release(&mut self) {
        log::debug!("releasing {} temporaries", self.created.len());
        self.created.clear();
        self.constants.clear();
    }
}
