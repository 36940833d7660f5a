//! Classified lexemes produced by the tokenizer and consumed as a FIFO queue
//! by the statement parser.

use std::collections::VecDeque;

use crate::value::Value;

/// The classification of a single lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // keywords
    Create,
    Drop,
    Truncate,
    Primary,
    Key,
    Table,
    Keyspace,
    Insert,
    Update,
    Set,
    Values,
    Select,
    Delete,
    From,
    Where,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    And,
    In,
    If,
    Not,
    Exists,
    // punctuation and operators
    Lparen,
    Rparen,
    Ltri,
    Rtri,
    Comma,
    Dot,
    Lbracket,
    Rbracket,
    Eql,
    Plus,
    Minus,
    Star,
    Parameter,
    // literals and identifiers
    Int,
    Float,
    String,
    Id,
    /// Synthetic end-of-stream marker returned once the queue is exhausted.
    Eof,
}

/// Look up the keyword kind for an unquoted word, case-insensitively.
pub fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_lowercase().as_str() {
        "create" => TokenKind::Create,
        "drop" => TokenKind::Drop,
        "truncate" => TokenKind::Truncate,
        "primary" => TokenKind::Primary,
        "key" => TokenKind::Key,
        "table" => TokenKind::Table,
        "keyspace" => TokenKind::Keyspace,
        "insert" => TokenKind::Insert,
        "update" => TokenKind::Update,
        "set" => TokenKind::Set,
        "values" => TokenKind::Values,
        "select" => TokenKind::Select,
        "delete" => TokenKind::Delete,
        "from" => TokenKind::From,
        "where" => TokenKind::Where,
        "order" => TokenKind::Order,
        "by" => TokenKind::By,
        "asc" => TokenKind::Asc,
        "desc" => TokenKind::Desc,
        "limit" => TokenKind::Limit,
        "and" => TokenKind::And,
        "in" => TokenKind::In,
        "if" => TokenKind::If,
        "not" => TokenKind::Not,
        "exists" => TokenKind::Exists,
        _ => return None,
    };
    Some(kind)
}

/// A classified lexeme: its kind plus the raw (unescaped) source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    fn eof() -> Self {
        Token::new(TokenKind::Eof, "")
    }

    /// Convert the lexeme into a typed value: integer and decimal lexemes
    /// become numeric, every other kind keeps its literal text.
    pub fn normalized_value(&self) -> Value {
        match self.kind {
            TokenKind::Int => self
                .text
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(self.text.clone())),
            TokenKind::Float => self
                .text
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(self.text.clone())),
            _ => Value::Text(self.text.clone()),
        }
    }
}

/// FIFO queue of tokens in source order. Popping past the end yields a
/// synthetic [`TokenKind::Eof`] token instead of failing.
#[derive(Debug, Default)]
pub struct TokenQueue {
    tokens: VecDeque<Token>,
}

impl TokenQueue {
    pub fn new(tokens: VecDeque<Token>) -> Self {
        Self { tokens }
    }

    pub fn pop(&mut self) -> Token {
        self.tokens.pop_front().unwrap_or_else(Token::eof)
    }

    pub fn peek(&self) -> TokenKind {
        self.tokens
            .front()
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    /// Kind of the token `n` positions past the front (0 == `peek`).
    pub fn peek_nth(&self, n: usize) -> TokenKind {
        self.tokens.get(n).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    /// The front token without consuming it.
    pub fn front(&self) -> Option<&Token> {
        self.tokens.front()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(keyword("SELECT"), Some(TokenKind::Select));
        assert_eq!(keyword("select"), Some(TokenKind::Select));
        assert_eq!(keyword("Select"), Some(TokenKind::Select));
        assert_eq!(keyword("everything"), None);
    }

    #[test]
    fn normalized_value_converts_numeric_lexemes() {
        assert_eq!(
            Token::new(TokenKind::Int, "5").normalized_value(),
            Value::Int(5)
        );
        assert_eq!(
            Token::new(TokenKind::Float, "5.367").normalized_value(),
            Value::Float(5.367)
        );
        assert_eq!(
            Token::new(TokenKind::String, "hello world").normalized_value(),
            Value::Text("hello world".into())
        );
        assert_eq!(
            Token::new(TokenKind::Id, "hello").normalized_value(),
            Value::Text("hello".into())
        );
    }

    #[test]
    fn queue_yields_eof_when_exhausted() {
        let mut q = TokenQueue::new(VecDeque::from(vec![Token::new(TokenKind::Select, "SELECT")]));
        assert_eq!(q.pop().kind, TokenKind::Select);
        assert_eq!(q.pop().kind, TokenKind::Eof);
        assert_eq!(q.peek(), TokenKind::Eof);
    }
}
