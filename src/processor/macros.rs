//! Purely syntactic macros: `macro name(a, b) = <body>`.
//!
//! An invocation `name(x, y)` is replaced by the body with every parameter
//! swapped for the matching argument tokens. Arguments longer than one token
//! are wrapped in parentheses, and so is the whole expansion, so operator
//! precedence at the call site is unaffected.

use std::collections::HashMap;

use super::lexer::{Symbol, Token};
use super::tokens::{TokenArena, TokenList};
use crate::error::{EquationError, Result};

/// Expansions nested deeper than this are assumed to be recursive.
pub const MAX_EXPANSION_DEPTH: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Token>,
}

fn word(token: Option<&Token>, what: &str) -> Result<String> {
    match token {
        Some(Token::Word(w)) => Ok(w.clone()),
        Some(other) => Err(EquationError::syntax(format!(
            "expected {what}, found {}",
            other.describe()
        ))),
        None => Err(EquationError::syntax(format!("expected {what}"))),
    }
}

fn expect(token: Option<&Token>, symbol: Symbol) -> Result<()> {
    match token {
        Some(t) if t.is_symbol(symbol) => Ok(()),
        Some(t) => Err(EquationError::syntax(format!(
            "expected '{}', found {}",
            symbol.as_str(),
            t.describe()
        ))),
        None => Err(EquationError::syntax(format!("expected '{}'", symbol.as_str()))),
    }
}

impl Macro {
    /// Parses the tokens that follow the `macro` keyword.
    pub fn parse(tokens: &[Token]) -> Result<Self> {
        let mut it = tokens.iter();
        let name = word(it.next(), "a macro name")?;
        expect(it.next(), Symbol::ParenLeft)?;

        let mut params: Vec<String> = Vec::new();
        let mut t = it.next();
        if !t.is_some_and(|t| t.is_symbol(Symbol::ParenRight)) {
            loop {
                let p = word(t, "a parameter name")?;
                if params.contains(&p) {
                    return Err(EquationError::syntax(format!(
                        "parameter `{p}` appears twice in macro `{name}`"
                    )));
                }
                params.push(p);
                match it.next() {
                    Some(s) if s.is_symbol(Symbol::Comma) => t = it.next(),
                    other => {
                        expect(other, Symbol::ParenRight)?;
                        break;
                    }
                }
            }
        }

        expect(it.next(), Symbol::Assign)?;
        let body: Vec<Token> = it.cloned().collect();
        if body.is_empty() {
            return Err(EquationError::syntax(format!("macro `{name}` has an empty body")));
        }
        if body.iter().any(|t| t.is_symbol(Symbol::Assign)) {
            return Err(EquationError::syntax(format!(
                "macro `{name}` body contains an assignment"
            )));
        }
        Ok(Self { name, params, body })
    }

    fn instantiate(&self, args: &[Vec<Token>]) -> Vec<Token> {
        let mut out = vec![Token::Symbol(Symbol::ParenLeft)];
        for t in &self.body {
            let arg = match t {
                Token::Word(w) => self.params.iter().position(|p| p == w).map(|i| &args[i]),
                _ => None,
            };
            match arg {
                Some(arg) if arg.len() == 1 => out.extend(arg.iter().cloned()),
                Some(arg) => {
                    out.push(Token::Symbol(Symbol::ParenLeft));
                    out.extend(arg.iter().cloned());
                    out.push(Token::Symbol(Symbol::ParenRight));
                }
                None => out.push(t.clone()),
            }
        }
        out.push(Token::Symbol(Symbol::ParenRight));
        out
    }
}

/// Replaces every macro invocation in `list`, including ones produced by
/// an expansion.
pub fn expand(
    arena: &mut TokenArena,
    list: &mut TokenList,
    macros: &HashMap<String, Macro>,
    depth: usize,
) -> Result<()> {
    if macros.is_empty() {
        return Ok(());
    }
    if depth > MAX_EXPANSION_DEPTH {
        return Err(EquationError::syntax(
            "macro expansion nested too deeply; is a macro recursive?",
        ));
    }

    let mut cursor = list.first();
    while let Some(id) = cursor {
        let invoked = match arena.get(id) {
            Token::Word(w) => macros.get(w),
            _ => None,
        };
        let open = arena.next(id).filter(|n| arena.is_symbol(*n, Symbol::ParenLeft));
        let (Some(m), Some(open)) = (invoked, open) else {
            cursor = arena.next(id);
            continue;
        };

        let close = arena
            .matching_close(open)
            .ok_or_else(|| EquationError::syntax("unterminated macro invocation"))?;
        let before = arena.prev(id);
        let after = arena.next(close);

        let mut call = list.extract(arena, id, close);
        let inner = match (arena.next(open), arena.prev(close)) {
            (Some(b), Some(e)) if b != close => call.extract(arena, b, e),
            _ => TokenList::new(),
        };
        call.clear(arena);

        let args: Vec<Vec<Token>> = if inner.is_empty() {
            Vec::new()
        } else {
            inner
                .split(arena, Symbol::Comma)
                .into_iter()
                .map(|mut piece| {
                    let tokens = piece.tokens(arena);
                    piece.clear(arena);
                    tokens
                })
                .collect()
        };

        if args.len() != m.params.len() {
            return Err(EquationError::syntax(format!(
                "macro `{}` expects {} arguments, got {}",
                m.name,
                m.params.len(),
                args.len()
            )));
        }
        if args.iter().any(|a| a.is_empty()) {
            return Err(EquationError::syntax(format!(
                "empty argument in invocation of macro `{}`",
                m.name
            )));
        }

        log::trace!("expanding macro {}", m.name);
        let mut expansion = TokenList::from_tokens(arena, m.instantiate(&args));
        expand(arena, &mut expansion, macros, depth + 1)?;
        list.splice_after(arena, before, &mut expansion);
        cursor = after;
    }
    Ok(())
}
