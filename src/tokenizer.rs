//! Character-level scanner converting raw CQL text into a token queue.

use std::collections::VecDeque;

use crate::token::{keyword, Token, TokenKind, TokenQueue};

const SPECIALS: &[char] = &[
    '(', ')', '<', '>', ',', '.', '[', ']', '=', '+', '-', '*', '?',
];

fn special_kind(c: char) -> Option<TokenKind> {
    let kind = match c {
        '(' => TokenKind::Lparen,
        ')' => TokenKind::Rparen,
        '<' => TokenKind::Ltri,
        '>' => TokenKind::Rtri,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '[' => TokenKind::Lbracket,
        ']' => TokenKind::Rbracket,
        '=' => TokenKind::Eql,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '?' => TokenKind::Parameter,
        _ => return None,
    };
    Some(kind)
}

/// Tokenize `cql` into a FIFO queue of [`Token`]s in source order.
///
/// Single-character operators and the `?` parameter marker become their own
/// tokens even without surrounding whitespace (`ck1<=?` scans as
/// `Id Ltri Eql Parameter`). Quoted strings (`'...'`) and quoted identifiers
/// (`"..."`) honor backslash escapes, and the resulting token text is the
/// unescaped interior. Whitespace separates tokens but never produces one.
pub fn tokenize(cql: &str) -> TokenQueue {
    let chars: Vec<char> = cql.chars().collect();
    let mut tokens = VecDeque::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if let Some(kind) = special_kind(c) {
            tokens.push_back(Token::new(kind, c.to_string()));
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            let kind = if c == '\'' {
                TokenKind::String
            } else {
                TokenKind::Id
            };
            let (text, next) = scan_quoted(&chars, i + 1, c);
            tokens.push_back(Token::new(kind, text));
            i = next;
            continue;
        }
        if c.is_ascii_digit() {
            let (token, next) = scan_number(&chars, i);
            tokens.push_back(token);
            i = next;
            continue;
        }
        let (word, next) = scan_word(&chars, i);
        let kind = keyword(&word).unwrap_or(TokenKind::Id);
        tokens.push_back(Token::new(kind, word));
        i = next;
    }

    TokenQueue::new(tokens)
}

/// Consume the interior of a quoted region, unescaping backslashed
/// characters, and return the text plus the index past the closing quote.
fn scan_quoted(chars: &[char], start: usize, quote: char) -> (String, usize) {
    let mut text = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            text.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c == quote {
            return (text, i + 1);
        }
        text.push(c);
        i += 1;
    }
    // unterminated quote: surface what we have, the parser will reject it
    (text, i)
}

/// Consume an integer- or decimal-shaped run. A single `.` followed by a
/// digit is part of the number; any other `.` is left for the dot token.
fn scan_number(chars: &[char], start: usize) -> (Token, usize) {
    let mut i = start;
    let mut text = String::new();
    let mut seen_dot = false;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            text.push(c);
            i += 1;
        } else if c == '.'
            && !seen_dot
            && chars.get(i + 1).map(|d| d.is_ascii_digit()).unwrap_or(false)
        {
            seen_dot = true;
            text.push(c);
            i += 1;
        } else {
            break;
        }
    }
    let kind = if seen_dot {
        TokenKind::Float
    } else {
        TokenKind::Int
    };
    (Token::new(kind, text), i)
}

/// Consume a bare word: everything up to whitespace, a special character, or
/// a quote.
fn scan_word(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut word = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || SPECIALS.contains(&c) || c == '\'' || c == '"' {
            break;
        }
        word.push(c);
        i += 1;
    }
    (word, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(cql: &str) -> Vec<TokenKind> {
        let mut q = tokenize(cql);
        let mut out = Vec::new();
        while !q.is_empty() {
            out.push(q.pop().kind);
        }
        out
    }

    #[test]
    fn reserved_keywords_scan_case_insensitively() {
        for (word, kind) in [
            ("INSERT", TokenKind::Insert),
            ("VALUES", TokenKind::Values),
            ("SELECT", TokenKind::Select),
            ("DELETE", TokenKind::Delete),
            ("FROM", TokenKind::From),
            ("WHERE", TokenKind::Where),
            ("AND", TokenKind::And),
            ("IN", TokenKind::In),
            ("NOT", TokenKind::Not),
        ] {
            assert_eq!(kinds(word), vec![kind]);
            assert_eq!(kinds(&word.to_lowercase()), vec![kind]);
        }
    }

    #[test]
    fn scans_full_select_statement() {
        let got = kinds("SELECT * FROM everything WHERE something <= ? AND x IN (1,2)");
        let want = vec![
            TokenKind::Select,
            TokenKind::Star,
            TokenKind::From,
            TokenKind::Id,
            TokenKind::Where,
            TokenKind::Id,
            TokenKind::Ltri,
            TokenKind::Eql,
            TokenKind::Parameter,
            TokenKind::And,
            TokenKind::Id,
            TokenKind::In,
            TokenKind::Lparen,
            TokenKind::Int,
            TokenKind::Comma,
            TokenKind::Int,
            TokenKind::Rparen,
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn operators_split_without_whitespace() {
        assert_eq!(
            kinds("ck1<=?"),
            vec![
                TokenKind::Id,
                TokenKind::Ltri,
                TokenKind::Eql,
                TokenKind::Parameter
            ]
        );
    }

    #[test]
    fn quoted_strings_keep_interior_text() {
        let mut q = tokenize("'hello world'");
        let t = q.pop();
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(t.text, "hello world");
    }

    #[test]
    fn quoted_strings_unescape_quotes() {
        let mut q = tokenize(r"'don\'t panic'");
        let t = q.pop();
        assert_eq!(t.kind, TokenKind::String);
        assert_eq!(t.text, "don't panic");
    }

    #[test]
    fn quoted_identifiers_scan_as_ids() {
        let mut q = tokenize(r#""mixed Case name""#);
        let t = q.pop();
        assert_eq!(t.kind, TokenKind::Id);
        assert_eq!(t.text, "mixed Case name");
    }

    #[test]
    fn numbers_classify_as_int_or_float() {
        let mut q = tokenize("5 4.23");
        let a = q.pop();
        assert_eq!(a.kind, TokenKind::Int);
        assert_eq!(a.text, "5");
        let b = q.pop();
        assert_eq!(b.kind, TokenKind::Float);
        assert_eq!(b.text, "4.23");
    }

    #[test]
    fn namespaced_names_split_on_dot() {
        // "keyspace" happens to be a reserved word; the parser treats any
        // non-punctuation token as a name, so the split is what matters
        assert_eq!(
            kinds("keyspace.books"),
            vec![TokenKind::Keyspace, TokenKind::Dot, TokenKind::Id]
        );
        assert_eq!(
            kinds("store.books"),
            vec![TokenKind::Id, TokenKind::Dot, TokenKind::Id]
        );
    }
}
