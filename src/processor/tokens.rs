//! Doubly-linked token list stored in an arena.
//!
//! The list is the parser's working buffer: groups are cut out, resolved,
//! and replaced by a single token in place. Several lists may share one
//! arena; a `TokenList` is just the `first`/`last` ends of a chain.
//! Removed nodes go on a free list and are recycled.

use super::lexer::{Symbol, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenId(usize);

#[derive(Debug)]
struct Node {
    token: Token,
    prev: Option<TokenId>,
    next: Option<TokenId>,
}

#[derive(Debug, Default)]
pub struct TokenArena {
    nodes: Vec<Node>,
    free: Vec<TokenId>,
}

impl TokenArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, token: Token) -> TokenId {
        let node = Node {
            token,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                TokenId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: TokenId) {
        let node = &mut self.nodes[id.0];
        node.prev = None;
        node.next = None;
        node.token = Token::Symbol(Symbol::Comma);
        self.free.push(id);
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.nodes[id.0].token
    }

    pub fn next(&self, id: TokenId) -> Option<TokenId> {
        self.nodes[id.0].next
    }

    pub fn prev(&self, id: TokenId) -> Option<TokenId> {
        self.nodes[id.0].prev
    }

    /// Overwrites the token stored at `id`; links are untouched.
    pub fn replace(&mut self, id: TokenId, token: Token) {
        self.nodes[id.0].token = token;
    }

    pub fn is_symbol(&self, id: TokenId, symbol: Symbol) -> bool {
        self.get(id).is_symbol(symbol)
    }

    /// The bracket closing the one opened at `open`.
    pub fn matching_close(&self, open: TokenId) -> Option<TokenId> {
        let mut depth = 0usize;
        let mut cursor = Some(open);
        while let Some(id) = cursor {
            match self.get(id).symbol() {
                Some(Symbol::ParenLeft | Symbol::BracketLeft) => depth += 1,
                Some(Symbol::ParenRight | Symbol::BracketRight) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(id);
                    }
                }
                _ => {}
            }
            cursor = self.next(id);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenList {
    first: Option<TokenId>,
    last: Option<TokenId>,
    size: usize,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(arena: &mut TokenArena, tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut list = TokenList::new();
        for t in tokens {
            list.push(arena, t);
        }
        list
    }

    pub fn first(&self) -> Option<TokenId> {
        self.first
    }

    pub fn last(&self) -> Option<TokenId> {
        self.last
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Appends a token to the end of the list.
    pub fn push(&mut self, arena: &mut TokenArena, token: Token) -> TokenId {
        let id = arena.alloc(token);
        match self.last {
            Some(last) => {
                arena.nodes[last.0].next = Some(id);
                arena.nodes[id.0].prev = Some(last);
            }
            None => self.first = Some(id),
        }
        self.last = Some(id);
        self.size += 1;
        id
    }

    /// Inserts `token` after `where_`, or at the front when `where_` is `None`.
    pub fn insert_after(
        &mut self,
        arena: &mut TokenArena,
        where_: Option<TokenId>,
        token: Token,
    ) -> TokenId {
        let id = arena.alloc(token);
        let mut single = TokenList {
            first: Some(id),
            last: Some(id),
            size: 1,
        };
        self.splice_after(arena, where_, &mut single);
        id
    }

    /// Unlinks and frees a token, returning what it held.
    pub fn remove(&mut self, arena: &mut TokenArena, id: TokenId) -> Token {
        self.unlink(arena, id);
        let token = std::mem::replace(&mut arena.nodes[id.0].token, Token::Symbol(Symbol::Comma));
        arena.release(id);
        token
    }

    fn unlink(&mut self, arena: &mut TokenArena, id: TokenId) {
        let (prev, next) = (arena.prev(id), arena.next(id));
        match prev {
            Some(p) => arena.nodes[p.0].next = next,
            None => self.first = next,
        }
        match next {
            Some(n) => arena.nodes[n.0].prev = prev,
            None => self.last = prev,
        }
        arena.nodes[id.0].prev = None;
        arena.nodes[id.0].next = None;
        self.size -= 1;
    }

    /// Cuts `begin..=end` out of this list and returns it as its own list.
    pub fn extract(&mut self, arena: &mut TokenArena, begin: TokenId, end: TokenId) -> TokenList {
        let before = arena.prev(begin);
        let after = arena.next(end);

        let mut size = 1;
        let mut t = begin;
        while t != end {
            match arena.next(t) {
                Some(n) => t = n,
                None => break,
            }
            size += 1;
        }

        match before {
            Some(b) => arena.nodes[b.0].next = after,
            None => self.first = after,
        }
        match after {
            Some(a) => arena.nodes[a.0].prev = before,
            None => self.last = before,
        }
        arena.nodes[begin.0].prev = None;
        arena.nodes[end.0].next = None;
        self.size -= size;

        TokenList {
            first: Some(begin),
            last: Some(end),
            size,
        }
    }

    /// Moves every node of `other` into this list after `where_`
    /// (front when `None`), leaving `other` empty.
    pub fn splice_after(
        &mut self,
        arena: &mut TokenArena,
        where_: Option<TokenId>,
        other: &mut TokenList,
    ) {
        let (Some(first), Some(last)) = (other.first, other.last) else {
            return;
        };
        let after = match where_ {
            Some(w) => arena.next(w),
            None => self.first,
        };

        arena.nodes[first.0].prev = where_;
        match where_ {
            Some(w) => arena.nodes[w.0].next = Some(first),
            None => self.first = Some(first),
        }
        arena.nodes[last.0].next = after;
        match after {
            Some(a) => arena.nodes[a.0].prev = Some(last),
            None => self.last = Some(last),
        }

        self.size += other.size;
        *other = TokenList::new();
    }

    /// Frees every node of the list.
    pub fn clear(&mut self, arena: &mut TokenArena) {
        let mut cursor = self.first;
        while let Some(id) = cursor {
            cursor = arena.next(id);
            arena.release(id);
        }
        *self = TokenList::new();
    }

    pub fn ids(&self, arena: &TokenArena) -> Vec<TokenId> {
        let mut out = Vec::with_capacity(self.size);
        let mut cursor = self.first;
        while let Some(id) = cursor {
            out.push(id);
            cursor = arena.next(id);
        }
        out
    }

    pub fn tokens(&self, arena: &TokenArena) -> Vec<Token> {
        self.ids(arena)
            .into_iter()
            .map(|id| arena.get(id).clone())
            .collect()
    }

    /// Splits on top-level occurrences of `separator`, consuming the list.
    /// Separators are freed; empty pieces are kept so callers can reject them.
    pub fn split(mut self, arena: &mut TokenArena, separator: Symbol) -> Vec<TokenList> {
        let mut pieces = Vec::new();
        let mut depth = 0usize;
        let mut start = self.first;
        let mut cursor = self.first;
        while let Some(id) = cursor {
            let next = arena.next(id);
            match arena.get(id).symbol() {
                Some(Symbol::ParenLeft | Symbol::BracketLeft) => depth += 1,
                Some(Symbol::ParenRight | Symbol::BracketRight) => depth = depth.saturating_sub(1),
                Some(s) if s == separator && depth == 0 => {
                    let piece = match (start, arena.prev(id)) {
                        (Some(b), Some(e)) if b != id => self.extract(arena, b, e),
                        _ => TokenList::new(),
                    };
                    pieces.push(piece);
                    self.remove(arena, id);
                    start = next;
                }
                _ => {}
            }
            cursor = next;
        }
        pieces.push(self);
        pieces
    }
}
