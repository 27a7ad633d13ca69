use thiserror::Error;

/// Every failure the equation compiler or a compiled sequence can report.
///
/// Compile-time problems are `Syntax`, `Unbound` or `Reserved`; the other
/// variants only come out of `Sequence::perform`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown variable `{0}`")]
    Unbound(String),

    #[error("reserved name `{0}`")]
    Reserved(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("numeric failure: {0}")]
    Numeric(String),
}

impl EquationError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        EquationError::Syntax(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        EquationError::Shape(msg.into())
    }

    pub fn numeric(msg: impl Into<String>) -> Self {
        EquationError::Numeric(msg.into())
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, EquationError::Syntax(_))
    }
}

pub type Result<T> = std::result::Result<T, EquationError>;
