//! Turns one tokenized statement into a `Sequence`.
//!
//! The right-hand side is parsed by collapsing the token list in place:
//! bracketed groups first (innermost work happens through recursion), then
//! operator tiers from tightest to loosest, and finally ranges and
//! adjacency. Every collapse emits at most one operation and leaves a
//! single variable token behind.

use std::collections::{BTreeMap, HashMap};

use super::constructor::MatrixConstructor;
use super::functions::{self, Builtin};
use super::is_reserved;
use super::lexer::{Symbol, Token};
use super::macros::{self, Macro};
use super::operation::Address;
use super::sequence::Sequence;
use super::temps::TempManager;
use super::tokens::{TokenArena, TokenId, TokenList};
use crate::error::{EquationError, Result};
use crate::model::{IntegerSequence, Shared, Variable};

/// Groups nested deeper than this are rejected.
pub const MAX_NESTING: usize = 64;

/// Result of compiling one statement. `declared` is the lazily created
/// target, bound by the caller only once compilation has succeeded.
#[derive(Debug)]
pub struct Compiled {
    pub sequence: Sequence,
    pub declared: Option<(String, Variable)>,
}

/// State of one compile session.
pub struct Compiler<'a> {
    variables: &'a BTreeMap<String, Variable>,
    macros: &'a HashMap<String, Macro>,
    arena: TokenArena,
    temps: TempManager,
    sequence: Sequence,
    depth: usize,
}

fn syntax(msg: impl Into<String>) -> EquationError {
    EquationError::syntax(msg)
}

impl<'a> Compiler<'a> {
    pub fn new(
        variables: &'a BTreeMap<String, Variable>,
        macros: &'a HashMap<String, Macro>,
    ) -> Self {
        Self {
            variables,
            macros,
            arena: TokenArena::new(),
            temps: TempManager::new(),
            sequence: Sequence::new(),
            depth: 0,
        }
    }

    pub fn compile(mut self, tokens: Vec<Token>) -> Result<Compiled> {
        let total = tokens.len();
        let mut assigns = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_symbol(Symbol::Assign))
            .map(|(i, _)| i);
        let at = match (assigns.next(), assigns.next()) {
            (Some(at), None) => at,
            (None, _) => return Err(syntax("expected an assignment")),
            (Some(_), Some(_)) => return Err(syntax("only one '=' is allowed per statement")),
        };
        let mut tokens = tokens;
        let rhs = tokens.split_off(at + 1);
        tokens.pop();
        let lhs = tokens;

        if rhs.is_empty() {
            return Err(syntax("nothing to the right of '='"));
        }
        let name = match lhs.first() {
            Some(Token::Word(w)) => w.clone(),
            Some(other) => return Err(syntax(format!("cannot assign to {}", other.describe()))),
            None => return Err(syntax("nothing to the left of '='")),
        };
        if is_reserved(&name) {
            return Err(EquationError::Reserved(name));
        }

        let value = {
            let list = self.prepare(rhs)?;
            self.parse_single(list)?
                .ok_or_else(|| syntax("nothing to assign"))?
        };

        let target = self.variables.get(&name).cloned();
        let mut declared = None;
        if lhs.len() == 1 {
            let target = match target {
                Some(t) => t,
                None => {
                    let t = value.empty_like();
                    declared = Some((name.clone(), t.clone()));
                    t
                }
            };
            self.sequence.add(functions::copy(&value, &target)?);
        } else {
            let matrix = match target {
                Some(Variable::Matrix(m)) => m,
                Some(other) => {
                    return Err(syntax(format!(
                        "cannot assign into elements of `{name}`, a {}",
                        other.kind()
                    )));
                }
                None => return Err(EquationError::Unbound(name)),
            };
            let address = self.target_address(lhs)?;
            self.sequence.add(functions::insert(&value, &matrix, address)?);
        }

        log::debug!(
            "compiled {} tokens into {} operations using {} temporaries",
            total,
            self.sequence.len(),
            self.temps.len()
        );
        self.temps.release();
        Ok(Compiled {
            sequence: self.sequence,
            declared,
        })
    }

    /// `name ( index [, index] )` on the left of `=`.
    fn target_address(&mut self, lhs: Vec<Token>) -> Result<Address> {
        let opens = lhs.get(1).is_some_and(|t| t.is_symbol(Symbol::ParenLeft));
        let closes = lhs.last().is_some_and(|t| t.is_symbol(Symbol::ParenRight));
        if !opens || !closes || lhs.len() < 4 {
            return Err(syntax("expected `name` or `name(indices)` to the left of '='"));
        }
        let mut list = TokenList::from_tokens(&mut self.arena, lhs);
        let ids = list.ids(&self.arena);
        if self.arena.matching_close(ids[1]) != list.last() {
            return Err(syntax("expected `name` or `name(indices)` to the left of '='"));
        }
        let mut inner = list.extract(&mut self.arena, ids[2], ids[ids.len() - 2]);
        list.clear(&mut self.arena);

        macros::expand(&mut self.arena, &mut inner, self.macros, 0)?;
        self.bind(&inner)?;
        self.parse_address(inner)
    }

    fn prepare(&mut self, tokens: Vec<Token>) -> Result<TokenList> {
        let mut list = TokenList::from_tokens(&mut self.arena, tokens);
        macros::expand(&mut self.arena, &mut list, self.macros, 0)?;
        self.bind(&list)?;
        Ok(list)
    }

    /// Replaces words with variables or functions, and literals with
    /// constant temporaries.
    fn bind(&mut self, list: &TokenList) -> Result<()> {
        for id in list.ids(&self.arena) {
            let bound = match self.arena.get(id) {
                Token::Word(w) => {
                    if let Some(v) = self.variables.get(w) {
                        Token::Variable(v.clone())
                    } else if let Some(f) = Builtin::from_name(w) {
                        Token::Function(f)
                    } else if w == "macro" {
                        return Err(syntax("`macro` may only start a declaration"));
                    } else {
                        return Err(EquationError::Unbound(w.clone()));
                    }
                }
                Token::Integer(i) => Token::Variable(self.temps.literal_integer(*i)),
                Token::Double(d) => Token::Variable(self.temps.literal_double(*d)),
                _ => continue,
            };
            self.arena.replace(id, bound);
        }
        Ok(())
    }

    fn variable(&self, id: TokenId, context: &str) -> Result<Variable> {
        match self.arena.get(id) {
            Token::Variable(v) => Ok(v.clone()),
            other => Err(syntax(format!("{context}: unexpected {}", other.describe()))),
        }
    }

    /// Parses a list into one value; adjacent indices form a sequence.
    fn parse_single(&mut self, list: TokenList) -> Result<Option<Variable>> {
        let items = self.parse_block(list)?;
        self.combine(items)
    }

    /// Parses a list into its adjacent items, consuming the list.
    fn parse_block(&mut self, mut list: TokenList) -> Result<Vec<Variable>> {
        self.depth += 1;
        let result = if self.depth > MAX_NESTING {
            Err(syntax("expression nested too deeply"))
        } else {
            self.parse_tiers(&mut list)
        };
        self.depth -= 1;
        list.clear(&mut self.arena);
        result
    }

    fn parse_tiers(&mut self, list: &mut TokenList) -> Result<Vec<Variable>> {
        self.resolve_groups(list)?;
        self.check_leftovers(list)?;
        self.transpose_tier(list)?;
        self.binary_tier(list, &[Symbol::Power, Symbol::ElementPower])?;
        self.binary_tier(list, &[Symbol::ElementTimes, Symbol::ElementDivide])?;
        self.binary_tier(list, &[Symbol::Times, Symbol::RDivide, Symbol::LDivide])?;
        self.negate_tier(list)?;
        self.binary_tier(list, &[Symbol::Plus, Symbol::Minus])?;
        self.ranges(list)
    }

    /// Removes `first..=last` and puts `token` in its place.
    fn collapse(&mut self, list: &mut TokenList, first: TokenId, last: TokenId, token: Option<Token>) {
        let anchor = self.arena.prev(first);
        let mut span = list.extract(&mut self.arena, first, last);
        span.clear(&mut self.arena);
        if let Some(token) = token {
            list.insert_after(&mut self.arena, anchor, token);
        }
    }

    /// Resolves every `(...)` and `[...]`, left to right.
    fn resolve_groups(&mut self, list: &mut TokenList) -> Result<()> {
        let mut cursor = list.first();
        while let Some(open) = cursor {
            let bracket = match self.arena.get(open).symbol() {
                Some(s @ (Symbol::ParenLeft | Symbol::BracketLeft)) => s,
                Some(s @ (Symbol::ParenRight | Symbol::BracketRight)) => {
                    return Err(syntax(format!("unmatched '{}'", s.as_str())));
                }
                _ => {
                    cursor = self.arena.next(open);
                    continue;
                }
            };
            let close = self
                .arena
                .matching_close(open)
                .ok_or_else(|| syntax(format!("unterminated '{}'", bracket.as_str())))?;
            let after = self.arena.next(close);
            let before = self.arena.prev(open);
            let inner = match (self.arena.next(open), self.arena.prev(close)) {
                (Some(b), Some(e)) if b != close => list.extract(&mut self.arena, b, e),
                _ => TokenList::new(),
            };

            if bracket == Symbol::BracketLeft {
                let value = self.parse_matrix(inner)?;
                self.collapse(list, open, close, Some(Token::Variable(value)));
            } else {
                match before.map(|b| self.arena.get(b).clone()) {
                    Some(Token::Function(f)) => {
                        let value = self.call(f, inner)?;
                        self.collapse(list, before.unwrap_or(open), close, Some(Token::Variable(value)));
                    }
                    Some(Token::Variable(Variable::Matrix(m))) => {
                        let address = self.parse_address(inner)?;
                        let info = functions::extract(&m, address, &mut self.temps);
                        self.sequence.add(info.op);
                        let first = before.unwrap_or(open);
                        self.collapse(list, first, close, Some(Token::Variable(info.output)));
                    }
                    _ => {
                        // a plain group; an empty one leaves nothing behind
                        let value = self.parse_single(inner)?;
                        self.collapse(list, open, close, value.map(Token::Variable));
                    }
                }
            }
            cursor = after;
        }
        Ok(())
    }

    fn check_leftovers(&self, list: &TokenList) -> Result<()> {
        for id in list.ids(&self.arena) {
            match self.arena.get(id) {
                Token::Function(f) => {
                    return Err(syntax(format!("`{}` must be called with arguments", f.name())));
                }
                Token::Symbol(s @ (Symbol::Comma | Symbol::Semicolon | Symbol::Assign)) => {
                    return Err(syntax(format!("unexpected '{}'", s.as_str())));
                }
                Token::Word(w) => return Err(EquationError::Unbound(w.clone())),
                _ => {}
            }
        }
        Ok(())
    }

    fn call(&mut self, f: Builtin, inner: TokenList) -> Result<Variable> {
        let mut args = Vec::new();
        if !inner.is_empty() {
            for piece in inner.split(&mut self.arena, Symbol::Comma) {
                if piece.is_empty() {
                    return Err(syntax(format!("empty argument in call to `{}`", f.name())));
                }
                let arg = self
                    .parse_single(piece)?
                    .ok_or_else(|| syntax(format!("empty argument in call to `{}`", f.name())))?;
                args.push(arg);
            }
        }
        let info = functions::create_function(f, &args, &mut self.temps)?;
        self.sequence.add(info.op);
        Ok(info.output)
    }

    /// One index list addresses flattened elements; two address rows and columns.
    fn parse_address(&mut self, inner: TokenList) -> Result<Address> {
        if inner.is_empty() {
            return Err(syntax("empty index"));
        }
        let mut indices = Vec::new();
        for piece in inner.split(&mut self.arena, Symbol::Comma) {
            let value = self
                .parse_single(piece)?
                .ok_or_else(|| syntax("empty index"))?;
            indices.push(functions::as_index(&value)?);
        }
        let mut indices = indices.into_iter();
        match (indices.next(), indices.next(), indices.next()) {
            (Some(flat), None, None) => Ok(Address::Flat(flat)),
            (Some(rows), Some(cols), None) => Ok(Address::Grid(rows, cols)),
            _ => Err(syntax("matrices take at most two indices")),
        }
    }

    /// `[a, b; c d]`: rows split on `;`, blocks on `,` or adjacency.
    fn parse_matrix(&mut self, inner: TokenList) -> Result<Variable> {
        let mut rows = Vec::new();
        if !inner.is_empty() {
            for row in inner.split(&mut self.arena, Symbol::Semicolon) {
                if row.is_empty() {
                    return Err(syntax("empty row in matrix literal"));
                }
                let mut items = Vec::new();
                for block in row.split(&mut self.arena, Symbol::Comma) {
                    if block.is_empty() {
                        return Err(syntax("empty element in matrix literal"));
                    }
                    items.extend(self.parse_block(block)?);
                }
                if let Some(v) = items.iter().find(|v| needs_dimension(v)) {
                    return Err(syntax(format!(
                        "open-ended range in matrix literal: {v}"
                    )));
                }
                rows.push(items);
            }
        }
        let output = self.temps.create_matrix();
        let constructor = MatrixConstructor::new(rows, output.clone());
        constructor.check_static(&self.temps)?;
        self.sequence.add(functions::construct(constructor));
        Ok(Variable::Matrix(output))
    }

    fn transpose_tier(&mut self, list: &mut TokenList) -> Result<()> {
        let mut cursor = list.first();
        while let Some(id) = cursor {
            if !self.arena.is_symbol(id, Symbol::Transpose) {
                cursor = self.arena.next(id);
                continue;
            }
            let left = self
                .arena
                .prev(id)
                .ok_or_else(|| syntax("transpose with nothing to transpose"))?;
            let a = self.variable(left, "transpose")?;
            let info = functions::create_unary(Symbol::Transpose, &a, &mut self.temps)?;
            self.sequence.add(info.op);
            self.arena.replace(left, Token::Variable(info.output));
            list.remove(&mut self.arena, id);
            cursor = self.arena.next(left);
        }
        Ok(())
    }

    fn binary_tier(&mut self, list: &mut TokenList, symbols: &[Symbol]) -> Result<()> {
        let mut cursor = list.first();
        while let Some(id) = cursor {
            let symbol = match self.arena.get(id).symbol() {
                Some(s) if symbols.contains(&s) => s,
                _ => {
                    cursor = self.arena.next(id);
                    continue;
                }
            };
            let context = format!("operand of '{}'", symbol.as_str());
            let left = self
                .arena
                .prev(id)
                .ok_or_else(|| syntax(format!("'{}' is missing its left operand", symbol.as_str())))?;
            let right = self
                .arena
                .next(id)
                .ok_or_else(|| syntax(format!("'{}' is missing its right operand", symbol.as_str())))?;
            // `A*-B`: the negation binds to the right operand first
            if self.arena.is_symbol(right, Symbol::Neg) {
                self.negate_at(list, right)?;
            }
            let a = self.variable(left, &context)?;
            let b = self.variable(right, &context)?;
            let info = functions::create_binary(symbol, &a, &b, &mut self.temps)?;
            self.sequence.add(info.op);
            self.arena.replace(left, Token::Variable(info.output));
            list.remove(&mut self.arena, id);
            list.remove(&mut self.arena, right);
            cursor = self.arena.next(left);
        }
        Ok(())
    }

    /// Negates the operand after the `Neg` at `id`, resolving `--x` chains.
    fn negate_at(&mut self, list: &mut TokenList, id: TokenId) -> Result<()> {
        let operand = self
            .arena
            .next(id)
            .ok_or_else(|| syntax("'-' with nothing to negate"))?;
        if self.arena.is_symbol(operand, Symbol::Neg) {
            self.negate_at(list, operand)?;
        }
        let a = self.variable(operand, "operand of '-'")?;
        let info = functions::create_unary(Symbol::Neg, &a, &mut self.temps)?;
        self.sequence.add(info.op);
        self.arena.replace(id, Token::Variable(info.output));
        list.remove(&mut self.arena, operand);
        Ok(())
    }

    fn negate_tier(&mut self, list: &mut TokenList) -> Result<()> {
        let mut cursor = list.first();
        while let Some(id) = cursor {
            if self.arena.is_symbol(id, Symbol::Neg) {
                self.negate_at(list, id)?;
            }
            cursor = self.arena.next(id);
        }
        Ok(())
    }

    /// Resolves `:` forms and returns the remaining adjacent items.
    ///
    /// `:` is the whole dimension, `a:` runs to its end, `a:b` and `a:s:b`
    /// are inclusive progressions.
    fn ranges(&mut self, list: &mut TokenList) -> Result<Vec<Variable>> {
        enum Item {
            Value(Variable),
            Colon,
        }
        let mut tokens = Vec::with_capacity(list.len());
        for t in list.tokens(&self.arena) {
            match t {
                Token::Variable(v) => tokens.push(Item::Value(v)),
                Token::Symbol(Symbol::Colon) => tokens.push(Item::Colon),
                other => return Err(syntax(format!("unexpected {}", other.describe()))),
            }
        }

        let mut items = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let seq = match (&tokens[i], tokens.get(i + 1), tokens.get(i + 2)) {
                (Item::Colon, None | Some(Item::Colon), _) => {
                    i += 1;
                    IntegerSequence::Range {
                        start: None,
                        end: None,
                    }
                }
                (Item::Colon, Some(Item::Value(_)), _) => {
                    return Err(syntax("a range needs a start before ':'"));
                }
                (Item::Value(start), Some(Item::Colon), Some(Item::Value(second))) => {
                    let start = bound(start)?;
                    let second = bound(second)?;
                    match (tokens.get(i + 3), tokens.get(i + 4)) {
                        (Some(Item::Colon), Some(Item::Value(end))) => {
                            i += 5;
                            IntegerSequence::For {
                                start,
                                step: Some(second),
                                end: bound(end)?,
                            }
                        }
                        (Some(Item::Colon), _) => {
                            return Err(syntax("a range with a step needs an end after ':'"));
                        }
                        _ => {
                            i += 3;
                            IntegerSequence::For {
                                start,
                                step: None,
                                end: second,
                            }
                        }
                    }
                }
                (Item::Value(start), Some(Item::Colon), None) => {
                    i += 2;
                    IntegerSequence::Range {
                        start: Some(bound(start)?),
                        end: None,
                    }
                }
                (Item::Value(_), Some(Item::Colon), Some(Item::Colon)) => {
                    return Err(syntax("unexpected '::'"));
                }
                (Item::Value(v), _, _) => {
                    items.push(v.clone());
                    i += 1;
                    continue;
                }
            };
            items.push(Variable::Sequence(self.temps.create_sequence(seq)));
        }
        Ok(items)
    }

    /// Joins adjacent integers and sequences into one sequence, in order.
    fn combine(&mut self, items: Vec<Variable>) -> Result<Option<Variable>> {
        if items.len() < 2 {
            return Ok(items.into_iter().next());
        }
        let mut parts = Vec::new();
        let mut run = Vec::new();
        for item in items {
            match item {
                Variable::Integer(cell) => run.push(cell),
                Variable::Sequence(s) => {
                    if !run.is_empty() {
                        parts.push(IntegerSequence::Explicit(std::mem::take(&mut run)));
                    }
                    parts.push(s.borrow().clone());
                }
                other => {
                    return Err(syntax(format!(
                        "only integers and ranges can be listed side by side, found {other}"
                    )));
                }
            }
        }
        if !run.is_empty() {
            parts.push(IntegerSequence::Explicit(run));
        }
        let seq = match parts.len() {
            1 => parts.remove(0),
            _ => IntegerSequence::Combined(parts),
        };
        Ok(Some(Variable::Sequence(self.temps.create_sequence(seq))))
    }
}

fn bound(v: &Variable) -> Result<Shared<i64>> {
    match v {
        Variable::Integer(cell) => Ok(cell.clone()),
        other => Err(syntax(format!(
            "range bounds must be integers, found a {}",
            other.kind()
        ))),
    }
}

fn needs_dimension(v: &Variable) -> bool {
    match v {
        Variable::Sequence(s) => s.borrow().needs_dimension(),
        _ => false,
    }
}
