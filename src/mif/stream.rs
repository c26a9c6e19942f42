//! Buffered, committable output regions.
//!
//! Formatted markup for a paragraph, table cell or text flow is buffered
//! before it is known how to merge it with sibling content and before
//! cross-references can be resolved. A buffered region is an ordered
//! sequence of literal text and cross-reference placeholders — a tagged
//! token stream, so no byte value is reserved and no input text can
//! collide with the placeholder representation.

use crate::error::Result;
use crate::mif::xref::RefResolver;

/// One buffered token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    /// Index into the cross-reference table.
    CrossRef(usize),
}

/// What a stream is buffering; only paragraph streams feed the
/// paragraph-reopening machinery on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Paragraph,
    Cell,
    TextFlow,
    HeaderFooter,
}

/// A buffered output region.
#[derive(Debug, Clone)]
pub struct TagStream {
    kind: StreamKind,
    tokens: Vec<Token>,
    column: usize,
}

impl TagStream {
    pub fn new(kind: StreamKind) -> TagStream {
        TagStream {
            kind,
            tokens: Vec::new(),
            column: 0,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Current output column, for cross-reference line wrapping.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Append literal text, merging into a trailing literal token.
    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match text.rfind('\n') {
            Some(pos) => self.column = text[pos + 1..].chars().count(),
            None => self.column += text.chars().count(),
        }
        if let Some(Token::Literal(last)) = self.tokens.last_mut() {
            last.push_str(text);
        } else {
            self.tokens.push(Token::Literal(text.to_string()));
        }
    }

    /// Append a cross-reference placeholder.
    pub fn write_ref(&mut self, index: usize) {
        self.tokens.push(Token::CrossRef(index));
    }

    /// Splice another stream's tokens onto the end of this one.
    pub fn append(&mut self, other: TagStream) {
        let mut tokens = other.tokens.into_iter();
        // Merge the boundary literals so resolve output stays contiguous.
        if let Some(first) = tokens.next() {
            match first {
                Token::Literal(s) => self.write(&s),
                t => self.tokens.push(t),
            }
            self.tokens.extend(tokens);
        }
        if let Some(Token::Literal(last)) = self.tokens.last()
            && let Some(pos) = last.rfind('\n')
        {
            self.column = last[pos + 1..].chars().count();
        }
    }

    /// Commit the buffer: a single linear scan substituting every
    /// placeholder with its resolved textual form.
    pub fn resolve(&self, refs: &RefResolver<'_>) -> Result<String> {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::CrossRef(index) => refs.substitute(*index, &mut out)?,
            }
        }
        Ok(out)
    }
}
