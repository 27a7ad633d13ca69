//! Built-in functions and the factory that turns operators and calls into
//! bound `Operation`s.
//!
//! Every factory inspects the *kinds* of its operands once, at compile time,
//! and picks the matching kernel. Unsupported combinations are syntax errors.

use super::constructor::MatrixConstructor;
use super::kernel::{Mat, Reduction};
use super::lexer::Symbol;
use super::operation::{
    Address, Arith, ElementFn, Index, IntFn, MatrixArith, MatrixFn, MatrixReduce, OpKind,
    Operation, Source,
};
use super::temps::TempManager;
use crate::error::{EquationError, Result};
use crate::model::{Scalar, Shared, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Inv,
    Pinv,
    Rref,
    Det,
    Trace,
    NormF,
    NormP,
    Max,
    Min,
    Sum,
    Abs,
    Sin,
    Cos,
    Atan,
    Exp,
    Log,
    Sqrt,
    Atan2,
    Pow,
    Eye,
    Diag,
    Zeros,
    Ones,
    Kron,
    Dot,
    Solve,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("inv", Builtin::Inv),
    ("pinv", Builtin::Pinv),
    ("rref", Builtin::Rref),
    ("det", Builtin::Det),
    ("trace", Builtin::Trace),
    ("normF", Builtin::NormF),
    ("normP", Builtin::NormP),
    ("max", Builtin::Max),
    ("min", Builtin::Min),
    ("sum", Builtin::Sum),
    ("abs", Builtin::Abs),
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("atan", Builtin::Atan),
    ("exp", Builtin::Exp),
    ("log", Builtin::Log),
    ("sqrt", Builtin::Sqrt),
    ("atan2", Builtin::Atan2),
    ("pow", Builtin::Pow),
    ("eye", Builtin::Eye),
    ("diag", Builtin::Diag),
    ("zeros", Builtin::Zeros),
    ("ones", Builtin::Ones),
    ("kron", Builtin::Kron),
    ("dot", Builtin::Dot),
    ("solve", Builtin::Solve),
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }

    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, b)| *b == self)
            .map_or("?", |(n, _)| n)
    }

    /// Accepted argument counts.
    pub fn arity(self) -> &'static [usize] {
        match self {
            Builtin::Max | Builtin::Min | Builtin::Sum => &[1, 2],
            Builtin::NormP
            | Builtin::Atan2
            | Builtin::Pow
            | Builtin::Zeros
            | Builtin::Ones
            | Builtin::Kron
            | Builtin::Dot
            | Builtin::Solve => &[2],
            _ => &[1],
        }
    }
}

/// An operation together with the variable it writes.
#[derive(Debug, Clone)]
pub struct Info {
    pub op: Operation,
    pub output: Variable,
}

fn unsupported(what: &str, operands: &[&Variable]) -> EquationError {
    let kinds: Vec<String> = operands.iter().map(|v| v.kind().to_string()).collect();
    EquationError::syntax(format!("{what} is not defined for {}", kinds.join(" and ")))
}

fn matrix_out(name: impl Into<String>, temps: &mut TempManager, kind: impl FnOnce(Shared<Mat>) -> OpKind) -> Info {
    let out = temps.create_matrix();
    Info {
        op: Operation::new(name, kind(out.clone())),
        output: Variable::Matrix(out),
    }
}

fn double_out(name: impl Into<String>, temps: &mut TempManager, kind: impl FnOnce(Shared<f64>) -> OpKind) -> Info {
    let out = temps.create_double();
    Info {
        op: Operation::new(name, kind(out.clone())),
        output: Variable::Double(out),
    }
}

fn integer_out(name: impl Into<String>, temps: &mut TempManager, kind: impl FnOnce(Shared<i64>) -> OpKind) -> Info {
    let out = temps.create_integer();
    Info {
        op: Operation::new(name, kind(out.clone())),
        output: Variable::Integer(out),
    }
}

/// How one binary operator treats each operand combination.
struct Binary {
    name: &'static str,
    scalar: Arith,
    matrix: Option<MatrixArith>,
    integer: bool,
    broadcast: bool,
}

impl Binary {
    fn create(&self, a: &Variable, b: &Variable, temps: &mut TempManager) -> Result<Info> {
        let name = self.name;
        match (a, b) {
            (Variable::Integer(x), Variable::Integer(y)) if self.integer => {
                let (x, y, op) = (x.clone(), y.clone(), self.scalar);
                Ok(integer_out(format!("{name}-ii"), temps, |out| OpKind::IntArith {
                    op,
                    a: x,
                    b: y,
                    out,
                }))
            }
            (Variable::Matrix(x), Variable::Matrix(y)) => {
                let op = self.matrix.ok_or_else(|| unsupported(name, &[a, b]))?;
                let (x, y) = (x.clone(), y.clone());
                Ok(matrix_out(format!("{name}-mm"), temps, |out| OpKind::MatrixArith {
                    op,
                    a: x,
                    b: y,
                    out,
                }))
            }
            (Variable::Matrix(m), other) | (other, Variable::Matrix(m)) => {
                let scalar_first = matches!(b, Variable::Matrix(_));
                let s = match other.as_scalar() {
                    Some(s) if self.broadcast => s,
                    _ => return Err(unsupported(name, &[a, b])),
                };
                let (m, op) = (m.clone(), self.scalar);
                let suffix = if scalar_first { "sm" } else { "ms" };
                Ok(matrix_out(format!("{name}-{suffix}"), temps, |out| OpKind::Broadcast {
                    op,
                    m,
                    s,
                    scalar_first,
                    out,
                }))
            }
            _ => match (a.as_scalar(), b.as_scalar()) {
                (Some(x), Some(y)) => {
                    let op = self.scalar;
                    Ok(double_out(format!("{name}-ss"), temps, |out| OpKind::ScalarArith {
                        op,
                        a: x,
                        b: y,
                        out,
                    }))
                }
                _ => Err(unsupported(name, &[a, b])),
            },
        }
    }
}

fn solve(a: &Variable, b: &Variable, temps: &mut TempManager) -> Result<Info> {
    match (a, b) {
        (Variable::Matrix(x), Variable::Matrix(y)) => {
            let (x, y) = (x.clone(), y.clone());
            Ok(matrix_out("solve", temps, |out| OpKind::Solve { a: x, b: y, out }))
        }
        _ => Err(unsupported("solve", &[a, b])),
    }
}

/// `a / b`; for two matrices this solves `b x = a`.
fn divide(a: &Variable, b: &Variable, temps: &mut TempManager) -> Result<Info> {
    if let (Variable::Matrix(_), Variable::Matrix(_)) = (a, b) {
        return solve(b, a, temps);
    }
    Binary {
        name: "divide",
        scalar: Arith::Divide,
        matrix: None,
        integer: true,
        broadcast: true,
    }
    .create(a, b, temps)
}

pub fn create_binary(
    symbol: Symbol,
    a: &Variable,
    b: &Variable,
    temps: &mut TempManager,
) -> Result<Info> {
    let binary = |name, scalar, matrix, integer, broadcast| Binary {
        name,
        scalar,
        matrix,
        integer,
        broadcast,
    };
    match symbol {
        Symbol::Plus => binary("add", Arith::Add, Some(MatrixArith::Add), true, true).create(a, b, temps),
        Symbol::Minus => binary("subtract", Arith::Subtract, Some(MatrixArith::Subtract), true, true)
            .create(a, b, temps),
        Symbol::Times => binary("multiply", Arith::Multiply, Some(MatrixArith::Multiply), true, true)
            .create(a, b, temps),
        Symbol::RDivide => divide(a, b, temps),
        Symbol::LDivide => divide(b, a, temps),
        Symbol::Power => binary("pow", Arith::Power, None, false, false).create(a, b, temps),
        Symbol::ElementTimes => binary(
            "elementMult",
            Arith::Multiply,
            Some(MatrixArith::ElementMultiply),
            true,
            true,
        )
        .create(a, b, temps),
        Symbol::ElementDivide => binary(
            "elementDivision",
            Arith::Divide,
            Some(MatrixArith::ElementDivide),
            false,
            true,
        )
        .create(a, b, temps),
        Symbol::ElementPower => binary(
            "elementPow",
            Arith::Power,
            Some(MatrixArith::ElementPower),
            false,
            true,
        )
        .create(a, b, temps),
        other => Err(EquationError::syntax(format!(
            "'{}' is not a binary operator",
            other.as_str()
        ))),
    }
}

/// Element-wise on matrices, direct on scalars. `int` keeps integers integral.
fn element_fn(
    name: &str,
    f: ElementFn,
    int: Option<IntFn>,
    a: &Variable,
    temps: &mut TempManager,
) -> Result<Info> {
    match (a, int) {
        (Variable::Matrix(m), _) => {
            let m = m.clone();
            Ok(matrix_out(format!("{name}-m"), temps, |out| OpKind::ElementWise {
                op: f,
                a: m,
                out,
            }))
        }
        (Variable::Integer(i), Some(op)) => {
            let i = i.clone();
            Ok(integer_out(format!("{name}-i"), temps, |out| OpKind::IntUnary {
                op,
                a: i,
                out,
            }))
        }
        _ => {
            let s = a.as_scalar().ok_or_else(|| unsupported(name, &[a]))?;
            Ok(double_out(format!("{name}-s"), temps, |out| OpKind::ScalarUnary {
                op: f,
                a: s,
                out,
            }))
        }
    }
}

fn matrix_fn(
    name: &str,
    f: MatrixFn,
    scalar: Option<ElementFn>,
    a: &Variable,
    temps: &mut TempManager,
) -> Result<Info> {
    match (a, scalar) {
        (Variable::Matrix(m), _) => {
            let m = m.clone();
            Ok(matrix_out(format!("{name}-m"), temps, |out| OpKind::MatrixUnary {
                op: f,
                a: m,
                out,
            }))
        }
        (_, Some(sf)) if a.as_scalar().is_some() => element_fn(name, sf, None, a, temps),
        _ => Err(unsupported(name, &[a])),
    }
}

fn reduce_fn(
    name: &str,
    r: MatrixReduce,
    scalar: ElementFn,
    int: Option<IntFn>,
    a: &Variable,
    temps: &mut TempManager,
) -> Result<Info> {
    match a {
        Variable::Matrix(m) => {
            let m = m.clone();
            Ok(double_out(format!("{name}-m"), temps, |out| OpKind::Reduce {
                op: r,
                a: m,
                out,
            }))
        }
        _ => element_fn(name, scalar, int, a, temps),
    }
}

/// `max(A,0)` reduces each row, `max(A,1)` each column.
fn reduce_axis(
    name: &str,
    how: Reduction,
    a: &Variable,
    axis: &Variable,
    temps: &mut TempManager,
) -> Result<Info> {
    let Variable::Matrix(m) = a else {
        return Err(unsupported(name, &[a, axis]));
    };
    let value = match axis {
        Variable::Integer(i) => temps.constant(i),
        _ => None,
    };
    let (rows, suffix) = match value {
        Some(0) => (true, "rows"),
        Some(1) => (false, "cols"),
        _ => {
            return Err(EquationError::syntax(format!(
                "{name}(A,d) expects d to be 0 for rows or 1 for columns"
            )));
        }
    };
    let m = m.clone();
    Ok(matrix_out(format!("{name}_{suffix}"), temps, |out| OpKind::ReduceAxis {
        op: how,
        rows,
        a: m,
        out,
    }))
}

fn two_matrices<'a>(
    name: &str,
    args: &'a [Variable],
) -> Result<(&'a Shared<Mat>, &'a Shared<Mat>)> {
    match args {
        [Variable::Matrix(a), Variable::Matrix(b)] => Ok((a, b)),
        _ => Err(unsupported(name, &args.iter().collect::<Vec<_>>())),
    }
}

pub fn create_function(
    builtin: Builtin,
    args: &[Variable],
    temps: &mut TempManager,
) -> Result<Info> {
    let name = builtin.name();
    if !builtin.arity().contains(&args.len()) {
        return Err(EquationError::syntax(format!(
            "{name} expects {:?} arguments, got {}",
            builtin.arity(),
            args.len()
        )));
    }
    let a = &args[0];
    match builtin {
        Builtin::Inv => matrix_fn(name, MatrixFn::Inverse, Some(ElementFn::Reciprocal), a, temps),
        Builtin::Pinv => matrix_fn(name, MatrixFn::PseudoInverse, Some(ElementFn::Reciprocal), a, temps),
        Builtin::Rref => matrix_fn(name, MatrixFn::Rref, Some(ElementFn::Rref), a, temps),
        Builtin::Diag => matrix_fn(name, MatrixFn::Diag, None, a, temps),
        Builtin::Det => reduce_fn(name, MatrixReduce::Determinant, ElementFn::Identity, None, a, temps),
        Builtin::Trace => reduce_fn(name, MatrixReduce::Trace, ElementFn::Identity, None, a, temps),
        Builtin::NormF => reduce_fn(name, MatrixReduce::NormF, ElementFn::Abs, None, a, temps),
        Builtin::Max | Builtin::Min | Builtin::Sum => {
            let how = match builtin {
                Builtin::Max => Reduction::Max,
                Builtin::Min => Reduction::Min,
                _ => Reduction::Sum,
            };
            match args {
                [a, axis] => reduce_axis(name, how, a, axis, temps),
                _ => reduce_fn(
                    name,
                    MatrixReduce::Extreme(how),
                    ElementFn::Identity,
                    Some(IntFn::Identity),
                    a,
                    temps,
                ),
            }
        }
        Builtin::Abs => element_fn(name, ElementFn::Abs, Some(IntFn::Abs), a, temps),
        Builtin::Sin => element_fn(name, ElementFn::Sin, None, a, temps),
        Builtin::Cos => element_fn(name, ElementFn::Cos, None, a, temps),
        Builtin::Atan => element_fn(name, ElementFn::Atan, None, a, temps),
        Builtin::Exp => element_fn(name, ElementFn::Exp, None, a, temps),
        Builtin::Log => element_fn(name, ElementFn::Log, None, a, temps),
        Builtin::Sqrt => element_fn(name, ElementFn::Sqrt, None, a, temps),
        Builtin::Atan2 | Builtin::Pow => {
            let scalar = if builtin == Builtin::Pow {
                Arith::Power
            } else {
                Arith::Atan2
            };
            Binary {
                name,
                scalar,
                matrix: None,
                integer: false,
                broadcast: false,
            }
            .create(&args[0], &args[1], temps)
        }
        Builtin::NormP => {
            let (Variable::Matrix(m), Some(p)) = (a, args[1].as_scalar()) else {
                return Err(unsupported(name, &[a, &args[1]]));
            };
            let m = m.clone();
            Ok(double_out(name, temps, |out| OpKind::NormP { a: m, p, out }))
        }
        Builtin::Eye => match a {
            Variable::Matrix(_) => matrix_fn(name, MatrixFn::Identity, None, a, temps),
            Variable::Integer(n) => {
                let n = n.clone();
                Ok(matrix_out("eye-i", temps, |out| OpKind::Eye { n, out }))
            }
            _ => Err(unsupported(name, &[a])),
        },
        Builtin::Zeros | Builtin::Ones => {
            let (Variable::Integer(rows), Variable::Integer(cols)) = (a, &args[1]) else {
                return Err(unsupported(name, &[a, &args[1]]));
            };
            let value = if builtin == Builtin::Ones { 1.0 } else { 0.0 };
            let (rows, cols) = (rows.clone(), cols.clone());
            Ok(matrix_out(name, temps, |out| OpKind::Fill {
                rows,
                cols,
                value,
                out,
            }))
        }
        Builtin::Kron => {
            let (x, y) = two_matrices(name, args)?;
            let (x, y) = (x.clone(), y.clone());
            Ok(matrix_out(name, temps, |out| OpKind::Kron { a: x, b: y, out }))
        }
        Builtin::Dot => {
            let (x, y) = two_matrices(name, args)?;
            let (x, y) = (x.clone(), y.clone());
            Ok(double_out(name, temps, |out| OpKind::Dot { a: x, b: y, out }))
        }
        Builtin::Solve => solve(&args[0], &args[1], temps),
    }
}

pub fn create_unary(symbol: Symbol, a: &Variable, temps: &mut TempManager) -> Result<Info> {
    match symbol {
        Symbol::Neg => element_fn("neg", ElementFn::Negate, Some(IntFn::Negate), a, temps),
        Symbol::Transpose => match a {
            Variable::Matrix(_) => matrix_fn("transpose", MatrixFn::Transpose, None, a, temps),
            _ => Err(EquationError::syntax(format!(
                "transpose only makes sense for a matrix, not a {}",
                a.kind()
            ))),
        },
        other => Err(EquationError::syntax(format!(
            "'{}' is not a unary operator",
            other.as_str()
        ))),
    }
}

/// Copies `src` into an existing variable.
pub fn copy(src: &Variable, dst: &Variable) -> Result<Operation> {
    let kind = match (src, dst) {
        (Variable::Matrix(s), Variable::Matrix(d)) => OpKind::CopyMatrix {
            src: s.clone(),
            dst: d.clone(),
        },
        (Variable::Matrix(s), Variable::Double(d)) => OpKind::CopyMatrixToDouble {
            src: s.clone(),
            dst: d.clone(),
        },
        (Variable::Integer(s), Variable::Integer(d)) => OpKind::CopyInteger {
            src: s.clone(),
            dst: d.clone(),
        },
        (Variable::Sequence(s), Variable::Sequence(d)) => OpKind::CopySequence {
            src: s.clone(),
            dst: d.clone(),
        },
        (Variable::Integer(s), Variable::Double(d)) => OpKind::CopyScalar {
            src: Scalar::Integer(s.clone()),
            dst: d.clone(),
        },
        (Variable::Double(s), Variable::Double(d)) => OpKind::CopyScalar {
            src: Scalar::Double(s.clone()),
            dst: d.clone(),
        },
        _ => {
            return Err(EquationError::syntax(format!(
                "cannot assign a {} to a {}",
                src.kind(),
                dst.kind()
            )));
        }
    };
    let name = match kind {
        OpKind::CopyMatrix { .. } => "copy-mm",
        OpKind::CopyMatrixToDouble { .. } => "copy-m1s",
        OpKind::CopyInteger { .. } => "copy-ii",
        OpKind::CopySequence { .. } => "copy-is-is",
        _ => "copy-ss",
    };
    Ok(Operation::new(name, kind))
}

/// Writes `src` into the addressed elements of `dst`.
pub fn insert(src: &Variable, dst: &Shared<Mat>, address: Address) -> Result<Operation> {
    let src = match src {
        Variable::Matrix(m) => Source::Matrix(m.clone()),
        other => Source::Scalar(other.as_scalar().ok_or_else(|| {
            EquationError::syntax(format!("cannot assign a {} to a submatrix", other.kind()))
        })?),
    };
    Ok(Operation::new(
        "copyR",
        OpKind::Insert {
            src,
            dst: dst.clone(),
            address,
        },
    ))
}

/// Reads the addressed elements of `src`. A lone index in every dimension
/// yields a double rather than a 1x1 matrix.
pub fn extract(src: &Shared<Mat>, address: Address, temps: &mut TempManager) -> Info {
    let scalar = match &address {
        Address::Flat(i) => i.is_single(),
        Address::Grid(r, c) => r.is_single() && c.is_single(),
    };
    let src = src.clone();
    if scalar {
        double_out("extractScalar", temps, |out| OpKind::ExtractScalar { src, address, out })
    } else {
        matrix_out("extract", temps, |out| OpKind::Extract { src, address, out })
    }
}

pub fn construct(constructor: MatrixConstructor) -> Operation {
    Operation::new("matrixConstructor", OpKind::Construct(constructor))
}

/// Kinds an index argument may have.
pub fn as_index(v: &Variable) -> Result<Index> {
    match v {
        Variable::Integer(i) => Ok(Index::Single(i.clone())),
        Variable::Sequence(s) => Ok(Index::Sequence(s.clone())),
        other => Err(EquationError::syntax(format!(
            "expected an integer or integer sequence as an index, found a {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Kind, shared};

    fn matrix(rows: usize, cols: usize, data: &[f64]) -> Variable {
        Variable::Matrix(shared(Mat::from_row_slice(rows, cols, data)))
    }

    #[test]
    fn test_names_round_trip() {
        for (name, b) in BUILTINS {
            assert_eq!(Builtin::from_name(name), Some(*b));
            assert_eq!(b.name(), *name);
        }
        assert_eq!(Builtin::from_name("rand"), None);
    }

    #[test]
    fn test_binary_dispatch_by_kind() {
        let m = matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let i = Variable::integer(3);
        let d = Variable::double(0.5);

        let test_cases = vec![
            (Symbol::Plus, &i, &i, "add-ii", Kind::Integer),
            (Symbol::Plus, &i, &d, "add-ss", Kind::Double),
            (Symbol::Times, &m, &m, "multiply-mm", Kind::Matrix),
            (Symbol::Times, &d, &m, "multiply-sm", Kind::Matrix),
            (Symbol::Minus, &m, &i, "subtract-ms", Kind::Matrix),
            (Symbol::RDivide, &m, &m, "solve", Kind::Matrix),
            (Symbol::LDivide, &m, &m, "solve", Kind::Matrix),
            (Symbol::RDivide, &i, &i, "divide-ii", Kind::Integer),
            (Symbol::Power, &i, &i, "pow-ss", Kind::Double),
            (Symbol::ElementPower, &m, &d, "elementPow-ms", Kind::Matrix),
        ];

        let mut temps = TempManager::new();
        for (symbol, a, b, name, kind) in test_cases {
            let info = create_binary(symbol, a, b, &mut temps).unwrap();
            assert_eq!(info.op.name(), name, "{symbol:?}");
            assert_eq!(info.output.kind(), kind, "{symbol:?}");
        }
    }

    #[test]
    fn test_rejects_bad_operands() {
        let m = matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let d = Variable::double(0.5);
        let mut temps = TempManager::new();

        assert!(create_binary(Symbol::Power, &m, &d, &mut temps).unwrap_err().is_syntax());
        assert!(create_unary(Symbol::Transpose, &d, &mut temps).unwrap_err().is_syntax());
        assert!(create_function(Builtin::Inv, &[m.clone(), m.clone()], &mut temps)
            .unwrap_err()
            .is_syntax());
        assert!(create_function(Builtin::Kron, &[m.clone(), d.clone()], &mut temps)
            .unwrap_err()
            .is_syntax());
        assert!(copy(&m, &Variable::integer(0)).unwrap_err().is_syntax());

        // the axis argument has to be a literal
        let axis = Variable::integer(0);
        assert!(create_function(Builtin::Max, &[m.clone(), axis], &mut temps)
            .unwrap_err()
            .is_syntax());
        let axis = temps.literal_integer(1);
        let info = create_function(Builtin::Max, &[m, axis], &mut temps).unwrap();
        assert_eq!(info.op.name(), "max_cols");
    }

    #[test]
    fn test_function_results() {
        let m = matrix(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let mut temps = TempManager::new();

        let det = create_function(Builtin::Det, &[m.clone()], &mut temps).unwrap();
        det.op.perform().unwrap();
        let Variable::Double(out) = &det.output else {
            panic!("det should produce a double");
        };
        assert!((*out.borrow() - 10.0).abs() < 1e-10);

        let n = temps.literal_integer(3);
        let eye = create_function(Builtin::Eye, &[n], &mut temps).unwrap();
        eye.op.perform().unwrap();
        let Variable::Matrix(out) = &eye.output else {
            panic!("eye should produce a matrix");
        };
        assert_eq!(*out.borrow(), Mat::identity(3, 3));

        let abs = create_function(Builtin::Abs, &[Variable::integer(-4)], &mut temps).unwrap();
        abs.op.perform().unwrap();
        assert_eq!(abs.output.kind(), Kind::Integer);
    }
}
