//! Hand-written lexer for the equation language.
//!
//! Breaks the raw text into `Token`s. Words are *not* looked up here; the
//! binder replaces them with variables or functions later.
//
//  Lexical items:
//
//      Word     ::= [A-Za-z_][A-Za-z0-9_]*
//      Integer  ::= [0-9]+
//      Double   ::= [0-9]* '.' [0-9]* ([eE] [+-]? [0-9]+)?
//      Symbols  ::= = + - * / \ ^ .* ./ .^ ' ( ) [ ] : , ;
//      Whitespace is discarded.
//
//  A '-' is unary when nothing, or an operator, comes before it. A unary
//  minus directly followed by a number is folded into the literal;
//  otherwise it becomes `Symbol::Neg`.

use std::iter::Peekable;
use std::str::Chars;

use super::functions::Builtin;
use crate::error::{EquationError, Result};
use crate::model::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Plus,
    Minus,
    Neg,
    Times,
    RDivide,
    LDivide,
    Power,
    ElementTimes,
    ElementDivide,
    ElementPower,
    Transpose,
    Assign,
    ParenLeft,
    ParenRight,
    BracketLeft,
    BracketRight,
    Comma,
    Colon,
    Semicolon,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Plus => "+",
            Symbol::Minus | Symbol::Neg => "-",
            Symbol::Times => "*",
            Symbol::RDivide => "/",
            Symbol::LDivide => "\\",
            Symbol::Power => "^",
            Symbol::ElementTimes => ".*",
            Symbol::ElementDivide => "./",
            Symbol::ElementPower => ".^",
            Symbol::Transpose => "'",
            Symbol::Assign => "=",
            Symbol::ParenLeft => "(",
            Symbol::ParenRight => ")",
            Symbol::BracketLeft => "[",
            Symbol::BracketRight => "]",
            Symbol::Comma => ",",
            Symbol::Colon => ":",
            Symbol::Semicolon => ";",
        }
    }

    /// Symbols after which a following value is an operand, not an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Symbol::ParenRight | Symbol::BracketRight | Symbol::Transpose
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Symbol(Symbol),
    Word(String),
    Integer(i64),
    Double(f64),
    Function(Builtin),
    Variable(Variable),
}

impl Token {
    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Token::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        self.symbol() == Some(symbol)
    }

    pub fn variable(&self) -> Option<&Variable> {
        match self {
            Token::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Token::Symbol(s) => format!("'{}'", s.as_str()),
            Token::Word(w) => format!("word `{w}`"),
            Token::Integer(i) => i.to_string(),
            Token::Double(d) => d.to_string(),
            Token::Function(f) => format!("function `{}`", f.name()),
            Token::Variable(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Nothing,
    Operand,
    Operator,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    previous: Previous,
    open: Vec<char>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            previous: Previous::Nothing,
            open: Vec::new(),
            finished: false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// The character after the peeked one.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut id = String::new();
        id.push(first);
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_', &mut id);
        id
    }

    /// A '.' right after digits belongs to `.*`, `./` or `.^` when one of
    /// those characters follows it.
    fn dot_is_operator(&self) -> bool {
        matches!(self.peek_second(), Some('*') | Some('/') | Some('^'))
    }

    fn read_number(&mut self, first: char) -> Result<Token> {
        let mut num = String::new();
        num.push(first);
        let mut is_float = first == '.';
        self.consume_while(|c| c.is_ascii_digit(), &mut num);

        if self.peek_char() == Some('.') && !self.dot_is_operator() {
            if is_float {
                return Err(EquationError::syntax(format!(
                    "unexpected '.' in number {num}"
                )));
            }
            is_float = true;
            num.push('.');
            self.next_char();
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
        }

        if let Some(e @ ('e' | 'E')) = self.peek_char() {
            is_float = true;
            num.push(e);
            self.next_char();
            if let Some(sign @ ('+' | '-')) = self.peek_char() {
                num.push(sign);
                self.next_char();
            }
            let before = num.len();
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
            if num.len() == before {
                return Err(EquationError::syntax(format!(
                    "malformed exponent in {num}"
                )));
            }
        }

        match self.peek_char() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                return Err(EquationError::syntax(format!(
                    "malformed numeric literal {num}{c}"
                )));
            }
            Some('.') if !self.dot_is_operator() => {
                return Err(EquationError::syntax(format!(
                    "unexpected '.' in number {num}"
                )));
            }
            _ => {}
        }

        if is_float {
            num.parse::<f64>()
                .map(Token::Double)
                .map_err(|e| EquationError::syntax(format!("bad number {num}: {e}")))
        } else {
            num.parse::<i64>()
                .map(Token::Integer)
                .map_err(|e| EquationError::syntax(format!("bad integer {num}: {e}")))
        }
    }

    fn read_dot(&mut self) -> Result<Token> {
        match self.peek_char() {
            Some('*') => {
                self.next_char();
                Ok(Token::Symbol(Symbol::ElementTimes))
            }
            Some('/') => {
                self.next_char();
                Ok(Token::Symbol(Symbol::ElementDivide))
            }
            Some('^') => {
                self.next_char();
                Ok(Token::Symbol(Symbol::ElementPower))
            }
            Some(c) if c.is_ascii_digit() => self.read_number('.'),
            _ => Err(EquationError::syntax("unexpected '.'")),
        }
    }

    fn read_minus(&mut self) -> Result<Token> {
        if self.previous == Previous::Operand {
            return Ok(Token::Symbol(Symbol::Minus));
        }
        let starts_number = match self.peek_char() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.peek_second().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        };
        if !starts_number {
            return Ok(Token::Symbol(Symbol::Neg));
        }
        let first = self.next_char().unwrap_or('0');
        match self.read_number(first)? {
            Token::Integer(i) => Ok(Token::Integer(-i)),
            Token::Double(d) => Ok(Token::Double(-d)),
            other => Ok(other),
        }
    }

    fn open_bracket(&mut self, c: char, symbol: Symbol) -> Result<Token> {
        self.open.push(c);
        Ok(Token::Symbol(symbol))
    }

    fn close_bracket(&mut self, c: char, symbol: Symbol) -> Result<Token> {
        let expected = if c == ')' { '(' } else { '[' };
        match self.open.pop() {
            Some(o) if o == expected => Ok(Token::Symbol(symbol)),
            Some(o) => Err(EquationError::syntax(format!(
                "'{c}' does not close '{o}'"
            ))),
            None => Err(EquationError::syntax(format!("'{c}' with no matching '{expected}'"))),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }

        let ch = match self.next_char() {
            Some(c) => c,
            None => {
                self.finished = true;
                return match self.open.last() {
                    Some(o) => Some(Err(EquationError::syntax(format!("unterminated '{o}'")))),
                    None => None,
                };
            }
        };

        let tok_res = match ch {
            '+' => Ok(Token::Symbol(Symbol::Plus)),
            '-' => self.read_minus(),
            '*' => Ok(Token::Symbol(Symbol::Times)),
            '/' => Ok(Token::Symbol(Symbol::RDivide)),
            '\\' => Ok(Token::Symbol(Symbol::LDivide)),
            '^' => Ok(Token::Symbol(Symbol::Power)),
            '.' => self.read_dot(),
            '\'' => match self.previous {
                Previous::Operand => Ok(Token::Symbol(Symbol::Transpose)),
                _ => Err(EquationError::syntax("transpose with nothing to transpose")),
            },
            '=' => Ok(Token::Symbol(Symbol::Assign)),
            '(' => self.open_bracket(ch, Symbol::ParenLeft),
            '[' => self.open_bracket(ch, Symbol::BracketLeft),
            ')' => self.close_bracket(ch, Symbol::ParenRight),
            ']' => self.close_bracket(ch, Symbol::BracketRight),
            ',' => Ok(Token::Symbol(Symbol::Comma)),
            ':' => Ok(Token::Symbol(Symbol::Colon)),
            ';' => Ok(Token::Symbol(Symbol::Semicolon)),
            c if c.is_ascii_digit() => self.read_number(c),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(Token::Word(self.read_identifier(c))),
            e => Err(EquationError::syntax(format!("unexpected character {e}"))),
        };

        match &tok_res {
            Ok(Token::Symbol(s)) if !s.ends_operand() => self.previous = Previous::Operator,
            Ok(_) => self.previous = Previous::Operand,
            Err(_) => self.finished = true,
        }

        Some(tok_res)
    }
}

/// Tokenizes the whole input, stopping at the first error.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::{Symbol, Token, tokenize};

    fn sym(s: Symbol) -> Token {
        Token::Symbol(s)
    }

    fn word(w: &str) -> Token {
        Token::Word(w.into())
    }

    #[test]
    fn test_tokenisation() {
        let test_cases = vec![
            (
                "R=A*(B+C)",
                vec![
                    word("R"),
                    sym(Symbol::Assign),
                    word("A"),
                    sym(Symbol::Times),
                    sym(Symbol::ParenLeft),
                    word("B"),
                    sym(Symbol::Plus),
                    word("C"),
                    sym(Symbol::ParenRight),
                ],
            ),
            (
                "c = a .* b' ./ d .^ 2",
                vec![
                    word("c"),
                    sym(Symbol::Assign),
                    word("a"),
                    sym(Symbol::ElementTimes),
                    word("b"),
                    sym(Symbol::Transpose),
                    sym(Symbol::ElementDivide),
                    word("d"),
                    sym(Symbol::ElementPower),
                    Token::Integer(2),
                ],
            ),
            (
                "E=2.001e-6*1e3+.5",
                vec![
                    word("E"),
                    sym(Symbol::Assign),
                    Token::Double(2.001e-6),
                    sym(Symbol::Times),
                    Token::Double(1e3),
                    sym(Symbol::Plus),
                    Token::Double(0.5),
                ],
            ),
            (
                "x=2.*b",
                vec![
                    word("x"),
                    sym(Symbol::Assign),
                    Token::Integer(2),
                    sym(Symbol::ElementTimes),
                    word("b"),
                ],
            ),
            (
                "b(1:2,0:4)=A",
                vec![
                    word("b"),
                    sym(Symbol::ParenLeft),
                    Token::Integer(1),
                    sym(Symbol::Colon),
                    Token::Integer(2),
                    sym(Symbol::Comma),
                    Token::Integer(0),
                    sym(Symbol::Colon),
                    Token::Integer(4),
                    sym(Symbol::ParenRight),
                    sym(Symbol::Assign),
                    word("A"),
                ],
            ),
        ];

        for (src, expected) in test_cases {
            let tokens = tokenize(src).unwrap();
            assert_eq!(tokens, expected, "{src}");
        }
    }

    #[test]
    fn test_minus_disambiguation() {
        let test_cases = vec![
            (
                "B--B",
                vec![word("B"), sym(Symbol::Minus), sym(Symbol::Neg), word("B")],
            ),
            (
                "B---5",
                vec![
                    word("B"),
                    sym(Symbol::Minus),
                    sym(Symbol::Neg),
                    Token::Integer(-5),
                ],
            ),
            ("-2.5", vec![Token::Double(-2.5)]),
            (
                "a=-b",
                vec![word("a"), sym(Symbol::Assign), sym(Symbol::Neg), word("b")],
            ),
            (
                "(2)-1",
                vec![
                    sym(Symbol::ParenLeft),
                    Token::Integer(2),
                    sym(Symbol::ParenRight),
                    sym(Symbol::Minus),
                    Token::Integer(1),
                ],
            ),
            (
                "[1,-1;A'-1]",
                vec![
                    sym(Symbol::BracketLeft),
                    Token::Integer(1),
                    sym(Symbol::Comma),
                    Token::Integer(-1),
                    sym(Symbol::Semicolon),
                    word("A"),
                    sym(Symbol::Transpose),
                    sym(Symbol::Minus),
                    Token::Integer(1),
                    sym(Symbol::BracketRight),
                ],
            ),
            (
                "0 (-1)",
                vec![
                    Token::Integer(0),
                    sym(Symbol::ParenLeft),
                    Token::Integer(-1),
                    sym(Symbol::ParenRight),
                ],
            ),
        ];

        for (src, expected) in test_cases {
            let tokens = tokenize(src).unwrap();
            assert_eq!(tokens, expected, "{src}");
        }
    }

    #[test]
    fn test_malformed_input() {
        let test_cases = vec![
            "a(2,4:5",
            "m=[3:4",
            "a=1.2.3",
            "a=2e",
            "a=12abc",
            "a=(b]",
            "a=b)",
            "a='b",
            "a=b#c",
        ];

        for src in test_cases {
            let err = tokenize(src).unwrap_err();
            assert!(err.is_syntax(), "{src}: {err}");
        }
    }
}
