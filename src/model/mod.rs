//! Values the equation compiler binds names to.
//!
//! A variable is a shared, mutable cell. Compiled operations keep clones of
//! the handles, so the caller can change an input and re-run a sequence
//! without compiling again.

pub mod sequence;
pub mod workspace;

use nalgebra::DMatrix;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use sequence::{Indices, IntegerSequence};
pub use workspace::{ProcessedWorkspace, RawValue, RawWorkspace};

pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// The four kinds of value a name can be bound to.
#[derive(Debug, Clone)]
pub enum Variable {
    Matrix(Shared<DMatrix<f64>>),
    Double(Shared<f64>),
    Integer(Shared<i64>),
    Sequence(Shared<IntegerSequence>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Matrix,
    Double,
    Integer,
    Sequence,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Matrix => "matrix",
            Kind::Double => "double",
            Kind::Integer => "integer",
            Kind::Sequence => "integer sequence",
        };
        f.write_str(name)
    }
}

impl Variable {
    pub fn matrix(value: DMatrix<f64>) -> Self {
        Variable::Matrix(shared(value))
    }

    pub fn double(value: f64) -> Self {
        Variable::Double(shared(value))
    }

    pub fn integer(value: i64) -> Self {
        Variable::Integer(shared(value))
    }

    pub fn sequence(value: IntegerSequence) -> Self {
        Variable::Sequence(shared(value))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Variable::Matrix(_) => Kind::Matrix,
            Variable::Double(_) => Kind::Double,
            Variable::Integer(_) => Kind::Integer,
            Variable::Sequence(_) => Kind::Sequence,
        }
    }

    /// A fresh variable of the same kind holding an empty/zero value.
    pub fn empty_like(&self) -> Self {
        match self {
            Variable::Matrix(_) => Variable::matrix(DMatrix::zeros(0, 0)),
            Variable::Double(_) => Variable::double(0.0),
            Variable::Integer(_) => Variable::integer(0),
            Variable::Sequence(_) => Variable::sequence(IntegerSequence::Explicit(Vec::new())),
        }
    }

    /// Identity check: both handles point at the same cell.
    pub fn same(&self, other: &Variable) -> bool {
        match (self, other) {
            (Variable::Matrix(a), Variable::Matrix(b)) => Rc::ptr_eq(a, b),
            (Variable::Double(a), Variable::Double(b)) => Rc::ptr_eq(a, b),
            (Variable::Integer(a), Variable::Integer(b)) => Rc::ptr_eq(a, b),
            (Variable::Sequence(a), Variable::Sequence(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Integer or double, viewed as a scalar operand.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Variable::Integer(v) => Some(Scalar::Integer(v.clone())),
            Variable::Double(v) => Some(Scalar::Double(v.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Matrix(m) => {
                let m = m.borrow();
                write!(f, "Matrix({}x{})", m.nrows(), m.ncols())
            }
            Variable::Double(v) => write!(f, "Double({})", v.borrow()),
            Variable::Integer(v) => write!(f, "Integer({})", v.borrow()),
            Variable::Sequence(_) => f.write_str("IntegerSequence"),
        }
    }
}

/// Either scalar kind; reads widen integers to `f64`.
#[derive(Debug, Clone)]
pub enum Scalar {
    Integer(Shared<i64>),
    Double(Shared<f64>),
}

impl Scalar {
    pub fn get(&self) -> f64 {
        match self {
            Scalar::Integer(v) => *v.borrow() as f64,
            Scalar::Double(v) => *v.borrow(),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}
