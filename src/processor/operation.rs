//! Bound units of work produced by the compiler.
//!
//! Every operand is fixed when the operation is created; `perform` only
//! reads the current contents of its inputs and overwrites its output.

use super::constructor::MatrixConstructor;
use super::kernel::{self, Mat, Reduction};
use crate::error::{EquationError, Result};
use crate::model::{IntegerSequence, Scalar, Shared};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Atan2,
}

impl Arith {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Arith::Add => a + b,
            Arith::Subtract => a - b,
            Arith::Multiply => a * b,
            Arith::Divide => a / b,
            Arith::Power => a.powf(b),
            Arith::Atan2 => a.atan2(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixArith {
    Add,
    Subtract,
    Multiply,
    ElementMultiply,
    ElementDivide,
    ElementPower,
}

/// Function applied to a scalar, or to every element of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFn {
    Negate,
    Abs,
    Sin,
    Cos,
    Atan,
    Exp,
    Log,
    Sqrt,
    Reciprocal,
    Identity,
    Rref,
}

impl ElementFn {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            ElementFn::Negate => -x,
            ElementFn::Abs => x.abs(),
            ElementFn::Sin => x.sin(),
            ElementFn::Cos => x.cos(),
            ElementFn::Atan => x.atan(),
            ElementFn::Exp => x.exp(),
            ElementFn::Log => x.ln(),
            ElementFn::Sqrt => x.sqrt(),
            ElementFn::Reciprocal => 1.0 / x,
            ElementFn::Identity => x,
            ElementFn::Rref => {
                if x == 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntFn {
    Negate,
    Abs,
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixFn {
    Transpose,
    Inverse,
    PseudoInverse,
    Rref,
    Diag,
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixReduce {
    Determinant,
    Trace,
    NormF,
    Extreme(Reduction),
}

/// One addressed dimension: a bare index or an integer sequence.
#[derive(Debug, Clone)]
pub enum Index {
    Single(Shared<i64>),
    Sequence(Shared<IntegerSequence>),
}

impl Index {
    pub fn is_single(&self) -> bool {
        matches!(self, Index::Single(_))
    }

    fn resolve(&self, len: usize, what: &str) -> Result<Vec<usize>> {
        match self {
            Index::Single(i) => kernel::check_indices(std::iter::once(*i.borrow()), len, what),
            Index::Sequence(s) => {
                let indices = s.borrow().initialize(len)?;
                kernel::check_indices(indices, len, what)
            }
        }
    }
}

/// `A(i)` addresses flattened elements, `A(i,j)` rows and columns.
#[derive(Debug, Clone)]
pub enum Address {
    Flat(Index),
    Grid(Index, Index),
}

#[derive(Debug, Clone)]
pub enum Source {
    Matrix(Shared<Mat>),
    Scalar(Scalar),
}

#[derive(Debug, Clone)]
pub enum OpKind {
    IntArith {
        op: Arith,
        a: Shared<i64>,
        b: Shared<i64>,
        out: Shared<i64>,
    },
    ScalarArith {
        op: Arith,
        a: Scalar,
        b: Scalar,
        out: Shared<f64>,
    },
    MatrixArith {
        op: MatrixArith,
        a: Shared<Mat>,
        b: Shared<Mat>,
        out: Shared<Mat>,
    },
    /// Scalar broadcast against every element; `scalar_first` keeps operand order.
    Broadcast {
        op: Arith,
        m: Shared<Mat>,
        s: Scalar,
        scalar_first: bool,
        out: Shared<Mat>,
    },
    Solve {
        a: Shared<Mat>,
        b: Shared<Mat>,
        out: Shared<Mat>,
    },
    IntUnary {
        op: IntFn,
        a: Shared<i64>,
        out: Shared<i64>,
    },
    ScalarUnary {
        op: ElementFn,
        a: Scalar,
        out: Shared<f64>,
    },
    ElementWise {
        op: ElementFn,
        a: Shared<Mat>,
        out: Shared<Mat>,
    },
    MatrixUnary {
        op: MatrixFn,
        a: Shared<Mat>,
        out: Shared<Mat>,
    },
    Reduce {
        op: MatrixReduce,
        a: Shared<Mat>,
        out: Shared<f64>,
    },
    ReduceAxis {
        op: Reduction,
        rows: bool,
        a: Shared<Mat>,
        out: Shared<Mat>,
    },
    NormP {
        a: Shared<Mat>,
        p: Scalar,
        out: Shared<f64>,
    },
    Fill {
        rows: Shared<i64>,
        cols: Shared<i64>,
        value: f64,
        out: Shared<Mat>,
    },
    Eye {
        n: Shared<i64>,
        out: Shared<Mat>,
    },
    Kron {
        a: Shared<Mat>,
        b: Shared<Mat>,
        out: Shared<Mat>,
    },
    Dot {
        a: Shared<Mat>,
        b: Shared<Mat>,
        out: Shared<f64>,
    },
    Extract {
        src: Shared<Mat>,
        address: Address,
        out: Shared<Mat>,
    },
    ExtractScalar {
        src: Shared<Mat>,
        address: Address,
        out: Shared<f64>,
    },
    Insert {
        src: Source,
        dst: Shared<Mat>,
        address: Address,
    },
    Construct(MatrixConstructor),
    CopyMatrix {
        src: Shared<Mat>,
        dst: Shared<Mat>,
    },
    CopyMatrixToDouble {
        src: Shared<Mat>,
        dst: Shared<f64>,
    },
    CopyInteger {
        src: Shared<i64>,
        dst: Shared<i64>,
    },
    CopyScalar {
        src: Scalar,
        dst: Shared<f64>,
    },
    CopySequence {
        src: Shared<IntegerSequence>,
        dst: Shared<IntegerSequence>,
    },
}

#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    kind: OpKind,
}

impl Operation {
    pub fn new(name: impl Into<String>, kind: OpKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn perform(&self) -> Result<()> {
        match &self.kind {
            OpKind::IntArith { op, a, b, out } => {
                let (a, b) = (*a.borrow(), *b.borrow());
                let value = match op {
                    Arith::Add => a.wrapping_add(b),
                    Arith::Subtract => a.wrapping_sub(b),
                    Arith::Multiply => a.wrapping_mul(b),
                    Arith::Divide => a.checked_div(b).ok_or_else(|| {
                        EquationError::numeric(format!("integer division {a} / {b} is undefined"))
                    })?,
                    Arith::Power | Arith::Atan2 => {
                        return Err(EquationError::numeric(format!(
                            "{op:?} is not an integer operation"
                        )));
                    }
                };
                *out.borrow_mut() = value;
            }
            OpKind::ScalarArith { op, a, b, out } => {
                *out.borrow_mut() = op.apply(a.get(), b.get());
            }
            OpKind::MatrixArith { op, a, b, out } => {
                let value = {
                    let (a, b) = (a.borrow(), b.borrow());
                    match op {
                        MatrixArith::Add => kernel::add(&a, &b)?,
                        MatrixArith::Subtract => kernel::subtract(&a, &b)?,
                        MatrixArith::Multiply => kernel::multiply(&a, &b)?,
                        MatrixArith::ElementMultiply => kernel::element_mult(&a, &b)?,
                        MatrixArith::ElementDivide => kernel::element_div(&a, &b)?,
                        MatrixArith::ElementPower => kernel::element_pow(&a, &b)?,
                    }
                };
                *out.borrow_mut() = value;
            }
            OpKind::Broadcast {
                op,
                m,
                s,
                scalar_first,
                out,
            } => {
                let s = s.get();
                let value = if *scalar_first {
                    m.borrow().map(|x| op.apply(s, x))
                } else {
                    m.borrow().map(|x| op.apply(x, s))
                };
                *out.borrow_mut() = value;
            }
            OpKind::Solve { a, b, out } => {
                let value = kernel::solve(&a.borrow(), &b.borrow())?;
                *out.borrow_mut() = value;
            }
            OpKind::IntUnary { op, a, out } => {
                let a = *a.borrow();
                *out.borrow_mut() = match op {
                    IntFn::Negate => a.wrapping_neg(),
                    IntFn::Abs => a.wrapping_abs(),
                    IntFn::Identity => a,
                };
            }
            OpKind::ScalarUnary { op, a, out } => {
                *out.borrow_mut() = op.apply(a.get());
            }
            OpKind::ElementWise { op, a, out } => {
                let value = a.borrow().map(|x| op.apply(x));
                *out.borrow_mut() = value;
            }
            OpKind::MatrixUnary { op, a, out } => {
                let value = {
                    let a = a.borrow();
                    match op {
                        MatrixFn::Transpose => kernel::transpose(&a),
                        MatrixFn::Inverse => kernel::invert(&a)?,
                        MatrixFn::PseudoInverse => kernel::pseudo_inverse(&a)?,
                        MatrixFn::Rref => kernel::rref(&a),
                        MatrixFn::Diag => kernel::diag(&a),
                        MatrixFn::Identity => kernel::identity_like(&a),
                    }
                };
                *out.borrow_mut() = value;
            }
            OpKind::Reduce { op, a, out } => {
                let value = {
                    let a = a.borrow();
                    match op {
                        MatrixReduce::Determinant => kernel::determinant(&a)?,
                        MatrixReduce::Trace => kernel::trace(&a),
                        MatrixReduce::NormF => kernel::norm_f(&a),
                        MatrixReduce::Extreme(how) => kernel::reduce(&a, *how),
                    }
                };
                *out.borrow_mut() = value;
            }
            OpKind::ReduceAxis { op, rows, a, out } => {
                let value = kernel::reduce_axis(&a.borrow(), *op, *rows);
                *out.borrow_mut() = value;
            }
            OpKind::NormP { a, p, out } => {
                let value = kernel::norm_p(&a.borrow(), p.get())?;
                *out.borrow_mut() = value;
            }
            OpKind::Fill {
                rows,
                cols,
                value,
                out,
            } => {
                let (r, c) = (dimension(rows)?, dimension(cols)?);
                *out.borrow_mut() = Mat::from_element(r, c, *value);
            }
            OpKind::Eye { n, out } => {
                let n = dimension(n)?;
                *out.borrow_mut() = Mat::identity(n, n);
            }
            OpKind::Kron { a, b, out } => {
                let value = kernel::kron(&a.borrow(), &b.borrow());
                *out.borrow_mut() = value;
            }
            OpKind::Dot { a, b, out } => {
                let value = kernel::dot(&a.borrow(), &b.borrow())?;
                *out.borrow_mut() = value;
            }
            OpKind::Extract { src, address, out } => {
                let value = extract(&src.borrow(), address)?;
                *out.borrow_mut() = value;
            }
            OpKind::ExtractScalar { src, address, out } => {
                let value = extract(&src.borrow(), address)?;
                *out.borrow_mut() = value[(0, 0)];
            }
            OpKind::Insert { src, dst, address } => insert(src, dst, address)?,
            OpKind::Construct(constructor) => constructor.construct()?,
            OpKind::CopyMatrix { src, dst } => {
                if !std::rc::Rc::ptr_eq(src, dst) {
                    let value = src.borrow().clone();
                    *dst.borrow_mut() = value;
                }
            }
            OpKind::CopyMatrixToDouble { src, dst } => {
                let src = src.borrow();
                if src.shape() != (1, 1) {
                    return Err(EquationError::shape(format!(
                        "Attempting to assign a {}x{} matrix to a double",
                        src.nrows(),
                        src.ncols()
                    )));
                }
                *dst.borrow_mut() = src[(0, 0)];
            }
            OpKind::CopyInteger { src, dst } => {
                let value = *src.borrow();
                *dst.borrow_mut() = value;
            }
            OpKind::CopyScalar { src, dst } => {
                let value = src.get();
                *dst.borrow_mut() = value;
            }
            OpKind::CopySequence { src, dst } => {
                if !std::rc::Rc::ptr_eq(src, dst) {
                    let value = src.borrow().clone();
                    *dst.borrow_mut() = value;
                }
            }
        }
        Ok(())
    }
}

fn dimension(v: &Shared<i64>) -> Result<usize> {
    let n = *v.borrow();
    usize::try_from(n).map_err(|_| EquationError::shape(format!("negative matrix dimension {n}")))
}

fn extract(src: &Mat, address: &Address) -> Result<Mat> {
    match address {
        Address::Flat(index) => {
            let indices = index.resolve(src.len(), "element")?;
            Ok(Mat::from_fn(1, indices.len(), |_, j| {
                kernel::flat_get(src, indices[j])
            }))
        }
        Address::Grid(rows, cols) => {
            let rows = rows.resolve(src.nrows(), "row")?;
            let cols = cols.resolve(src.ncols(), "column")?;
            Ok(Mat::from_fn(rows.len(), cols.len(), |i, j| src[(rows[i], cols[j])]))
        }
    }
}

/// Source values for an insertion, read in row-major order.
enum Values {
    Block(Mat),
    Fill(f64),
}

impl Values {
    fn read(src: &Source) -> Self {
        // snapshot, so `A(1,:) = A(0,:)` never aliases the destination borrow
        match src {
            Source::Matrix(m) => Values::Block(m.borrow().clone()),
            Source::Scalar(s) => Values::Fill(s.get()),
        }
    }
}

fn insert(src: &Source, dst: &Shared<Mat>, address: &Address) -> Result<()> {
    let values = Values::read(src);
    let mut dst = dst.borrow_mut();
    match address {
        Address::Flat(index) => {
            let indices = index.resolve(dst.len(), "element")?;
            if let Values::Block(m) = &values {
                if m.len() != indices.len() {
                    return Err(EquationError::shape(format!(
                        "cannot insert {} elements into {} positions",
                        m.len(),
                        indices.len()
                    )));
                }
            }
            for (k, &i) in indices.iter().enumerate() {
                let value = match &values {
                    Values::Block(m) => kernel::flat_get(m, k),
                    Values::Fill(v) => *v,
                };
                kernel::flat_set(&mut dst, i, value);
            }
        }
        Address::Grid(rows, cols) => {
            let rows = rows.resolve(dst.nrows(), "row")?;
            let cols = cols.resolve(dst.ncols(), "column")?;
            if let Values::Block(m) = &values {
                if m.shape() != (rows.len(), cols.len()) {
                    return Err(EquationError::shape(format!(
                        "cannot insert a {}x{} matrix into a {}x{} block",
                        m.nrows(),
                        m.ncols(),
                        rows.len(),
                        cols.len()
                    )));
                }
            }
            for (i, &r) in rows.iter().enumerate() {
                for (j, &c) in cols.iter().enumerate() {
                    dst[(r, c)] = match &values {
                        Values::Block(m) => m[(i, j)],
                        Values::Fill(v) => *v,
                    };
                }
            }
        }
    }
    Ok(())
}
