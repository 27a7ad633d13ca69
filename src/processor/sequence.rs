use super::operation::Operation;
use crate::error::Result;

/// Compiled form of one statement: operations in execution order.
///
/// Performing a sequence again re-reads the current contents of every
/// variable it was compiled against.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    operations: Vec<Operation>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, op: Operation) {
        log::trace!("emit {}", op.name());
        self.operations.push(op);
    }

    /// Runs every operation in order and stops at the first failure; the
    /// operations before it have already written their outputs.
    pub fn perform(&self) -> Result<()> {
        for op in &self.operations {
            op.perform()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Names of the operations, in order. Handy for comparing two compiles.
    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }
}
