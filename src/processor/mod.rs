//! The functional core: compiles equation text into re-runnable sequences.
//!
//! ```text
//! text ─ lexer ─ macros ─ bind ─ groups/calls ─ operator tiers ─ ranges ─ Sequence
//! ```
pub mod compiler;
pub mod constructor;
pub mod functions;
pub mod kernel;
pub mod lexer;
pub mod macros;
pub mod operation;
pub mod sequence;
pub mod temps;
pub mod tokens;

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;

pub use sequence::Sequence;

use crate::error::{EquationError, Result};
use crate::model::{ProcessedWorkspace, RawValue, RawWorkspace, Shared, Variable, shared};
use crate::parser::{from_matrix, to_matrix};
use compiler::Compiler;
use functions::Builtin;
use lexer::Token;
use macros::Macro;

/// Names that can never be bound to a variable or a macro.
pub fn is_reserved(name: &str) -> bool {
    name == "macro" || Builtin::from_name(name).is_some()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_name(name: &str) -> Result<()> {
    if is_reserved(name) || !is_identifier(name) {
        Err(EquationError::Reserved(name.to_string()))
    } else {
        Ok(())
    }
}

/// Named variables and macros, plus the entry points that compile against them.
#[derive(Debug, Default)]
pub struct Equation {
    variables: BTreeMap<String, Variable>,
    macros: HashMap<String, Macro>,
}

impl Equation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to a matrix. An existing matrix of that name is
    /// overwritten in place, so sequences compiled against it see the new value.
    pub fn alias_matrix(&mut self, name: &str, value: DMatrix<f64>) -> Result<Shared<DMatrix<f64>>> {
        check_name(name)?;
        if let Some(Variable::Matrix(cell)) = self.variables.get(name) {
            *cell.borrow_mut() = value;
            return Ok(cell.clone());
        }
        let cell = shared(value);
        self.variables
            .insert(name.to_string(), Variable::Matrix(cell.clone()));
        Ok(cell)
    }

    pub fn alias_double(&mut self, name: &str, value: f64) -> Result<Shared<f64>> {
        check_name(name)?;
        if let Some(Variable::Double(cell)) = self.variables.get(name) {
            *cell.borrow_mut() = value;
            return Ok(cell.clone());
        }
        let cell = shared(value);
        self.variables
            .insert(name.to_string(), Variable::Double(cell.clone()));
        Ok(cell)
    }

    pub fn alias_integer(&mut self, name: &str, value: i64) -> Result<Shared<i64>> {
        check_name(name)?;
        if let Some(Variable::Integer(cell)) = self.variables.get(name) {
            *cell.borrow_mut() = value;
            return Ok(cell.clone());
        }
        let cell = shared(value);
        self.variables
            .insert(name.to_string(), Variable::Integer(cell.clone()));
        Ok(cell)
    }

    /// Binds an existing variable handle, replacing any previous binding.
    pub fn alias(&mut self, name: &str, variable: Variable) -> Result<()> {
        check_name(name)?;
        self.variables.insert(name.to_string(), variable);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn lookup_matrix(&self, name: &str) -> Option<DMatrix<f64>> {
        match self.variables.get(name)? {
            Variable::Matrix(m) => Some(m.borrow().clone()),
            _ => None,
        }
    }

    /// Current value of a double or integer variable.
    pub fn lookup_double(&self, name: &str) -> Option<f64> {
        self.variables.get(name)?.as_scalar().map(|s| s.get())
    }

    pub fn lookup_integer(&self, name: &str) -> Option<i64> {
        match self.variables.get(name)? {
            Variable::Integer(i) => Some(*i.borrow()),
            _ => None,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    /// Every bound name, in sorted order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Compiles one statement. A `macro` declaration registers the macro
    /// and yields an empty sequence.
    ///
    /// On error nothing is bound: neither the assignment target nor the macro.
    pub fn compile(&mut self, src: &str) -> Result<Sequence> {
        let tokens = lexer::tokenize(src)?;

        if let Some(Token::Word(w)) = tokens.first() {
            if w == "macro" {
                let m = Macro::parse(&tokens[1..])?;
                check_name(&m.name)?;
                log::debug!("declared macro {}({})", m.name, m.params.join(", "));
                self.macros.insert(m.name.clone(), m);
                return Ok(Sequence::new());
            }
        }

        let compiled = Compiler::new(&self.variables, &self.macros).compile(tokens)?;
        if let Some((name, variable)) = compiled.declared {
            log::debug!("declared {name} as a {}", variable.kind());
            self.variables.insert(name, variable);
        }
        Ok(compiled.sequence)
    }

    /// Compiles and performs a statement once.
    pub fn process(&mut self, src: &str) -> Result<Sequence> {
        let sequence = self.compile(src)?;
        sequence.perform()?;
        Ok(sequence)
    }
}

/// Aliases the workspace variables, runs every statement in order and
/// collects the final value of each bound name.
pub fn run(raw: &RawWorkspace, extra: &[String]) -> anyhow::Result<ProcessedWorkspace> {
    use anyhow::Context;

    let mut eq = Equation::new();
    for (name, value) in &raw.variables {
        match value {
            RawValue::Matrix(rows) => {
                eq.alias_matrix(name, to_matrix(rows)?)?;
            }
            RawValue::Double(v) => {
                eq.alias_double(name, *v)?;
            }
            RawValue::Integer(v) => {
                eq.alias_integer(name, *v)?;
            }
        }
    }

    for (i, statement) in raw.equations.iter().chain(extra).enumerate() {
        eq.process(statement)
            .with_context(|| format!("statement {}: `{}`", i + 1, statement))?;
    }
    log::info!("Processed {} statements", raw.equations.len() + extra.len());

    let mut processed = ProcessedWorkspace::default();
    for (name, variable) in eq.variables() {
        let value = match variable {
            Variable::Matrix(m) => RawValue::Matrix(from_matrix(&m.borrow())),
            Variable::Double(v) => RawValue::Double(*v.borrow()),
            Variable::Integer(v) => RawValue::Integer(*v.borrow()),
            Variable::Sequence(_) => {
                log::warn!("skipping `{name}`: integer sequences are not written out");
                continue;
            }
        };
        processed.values.insert(name.to_string(), value);
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_checks_names() {
        let mut eq = Equation::new();
        let test_cases = vec![
            ("A", true),
            ("_tmp2", true),
            ("inv", false),
            ("macro", false),
            ("2x", false),
            ("a-b", false),
            ("", false),
        ];
        for (name, ok) in test_cases {
            let res = eq.alias_double(name, 1.0);
            assert_eq!(res.is_ok(), ok, "{name}");
            if !ok {
                assert!(matches!(res, Err(EquationError::Reserved(_))), "{name}");
            }
        }
    }

    #[test]
    fn test_realias_keeps_compiled_sequences_live() {
        let mut eq = Equation::new();
        eq.alias_double("a", 2.0).unwrap();
        let seq = eq.compile("b = a * 3").unwrap();
        seq.perform().unwrap();
        assert_eq!(eq.lookup_double("b"), Some(6.0));

        eq.alias_double("a", 5.0).unwrap();
        seq.perform().unwrap();
        assert_eq!(eq.lookup_double("b"), Some(15.0));

        // a different kind replaces the binding instead
        eq.alias_integer("a", 1).unwrap();
        seq.perform().unwrap();
        assert_eq!(eq.lookup_double("b"), Some(15.0));
        assert_eq!(eq.lookup_integer("a"), Some(1));
    }

    #[test]
    fn test_alias_shared_sequence() {
        use crate::model::IntegerSequence;

        let mut eq = Equation::new();
        eq.alias_matrix("A", DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        let stop = shared(1);
        let idx = Variable::sequence(IntegerSequence::For {
            start: shared(0),
            step: None,
            end: stop.clone(),
        });
        eq.alias("idx", idx.clone()).unwrap();
        assert!(eq.lookup("idx").is_some_and(|v| v.same(&idx)));
        assert!(matches!(
            eq.alias("det", idx),
            Err(EquationError::Reserved(_))
        ));

        let seq = eq.process("b = A(idx)").unwrap();
        assert_eq!(eq.lookup_matrix("b").unwrap().ncols(), 2);

        *stop.borrow_mut() = 3;
        seq.perform().unwrap();
        assert_eq!(
            eq.lookup_matrix("b"),
            Some(DMatrix::from_row_slice(1, 4, &[1.0, 2.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn test_macro_registration() {
        let mut eq = Equation::new();
        assert!(eq.compile("macro sq(x) = x*x").unwrap().is_empty());
        assert!(matches!(
            eq.compile("macro inv(x) = x"),
            Err(EquationError::Reserved(_))
        ));
        assert!(eq.compile("macro bad(x) = ").unwrap_err().is_syntax());
        assert_eq!(eq.macro_names(), vec!["sq"]);

        eq.alias_integer("n", 3).unwrap();
        eq.process("m = sq(n+1)").unwrap();
        assert_eq!(eq.lookup_integer("m"), Some(16));
    }

    #[test]
    fn test_failed_compile_binds_nothing() {
        let mut eq = Equation::new();
        eq.alias_integer("n", 3).unwrap();
        assert!(eq.compile("m = n + q").is_err());
        assert!(eq.lookup("m").is_none());
        assert!(eq.remove("n").is_some());
        assert!(matches!(eq.compile("m = n"), Err(EquationError::Unbound(_))));
    }
}
