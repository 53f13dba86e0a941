// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A byte-cursor lexer for the restricted SQL dialect.
//!
//! The stream is lazy: tokens are cut on demand and `peek` never advances the cursor.
//! Keywords are matched case-insensitively by lowercasing `Name` tokens on read; callers
//! that need the original spelling (projection fields, sort fields) use the `_keep_case`
//! variants.

use std::borrow::Cow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    String,
    Symbol,
    End,
}

#[derive(Clone, Debug)]
pub(crate) struct Token<'q> {
    pub kind: TokenKind,
    pub text: Cow<'q, str>,
}

impl Token<'_> {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn into_text(self) -> String {
        self.text.into_owned()
    }
}

pub(crate) struct Tokenizer<'q> {
    input: &'q str,
    pos: usize,
}

impl<'q> Tokenizer<'q> {
    pub fn new(input: &'q str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn next_token(&mut self) -> Token<'q> {
        let (token, next_pos) = self.read_token(false);
        self.pos = next_pos;
        token
    }

    pub fn next_token_keep_case(&mut self) -> Token<'q> {
        let (token, next_pos) = self.read_token(true);
        self.pos = next_pos;
        token
    }

    pub fn peek_token(&self) -> Token<'q> {
        self.read_token(false).0
    }

    pub fn peek_token_keep_case(&self) -> Token<'q> {
        self.read_token(true).0
    }

    pub fn skip_space(&mut self) {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    pub fn end(&self) -> bool {
        self.input[self.pos..]
            .bytes()
            .all(|b| b.is_ascii_whitespace())
    }

    /// Describes the position of the next token, for error messages.
    pub fn where_is(&self) -> String {
        let consumed = &self.input[..self.pos];
        let line = consumed.matches('\n').count() + 1;
        let column = self.pos - consumed.rfind('\n').map_or(0, |nl| nl + 1) + 1;
        format!("line {line} column {column}")
    }

    fn read_token(&self, preserve_case: bool) -> (Token<'q>, usize) {
        let bytes = self.input.as_bytes();
        let mut start = self.pos;
        while start < bytes.len() && bytes[start].is_ascii_whitespace() {
            start += 1;
        }
        if start >= bytes.len() {
            return (
                Token {
                    kind: TokenKind::End,
                    text: Cow::Borrowed(""),
                },
                start,
            );
        }

        let c = bytes[start];
        if c.is_ascii_alphabetic() || c == b'_' {
            let mut end = start + 1;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
            }
            let text = &self.input[start..end];
            let text = if preserve_case || !text.bytes().any(|b| b.is_ascii_uppercase()) {
                Cow::Borrowed(text)
            } else {
                Cow::Owned(text.to_ascii_lowercase())
            };
            return (
                Token {
                    kind: TokenKind::Name,
                    text,
                },
                end,
            );
        }

        if c.is_ascii_digit()
            || (c == b'-' && start + 1 < bytes.len() && bytes[start + 1].is_ascii_digit())
        {
            let mut end = start + 1;
            let mut seen_dot = false;
            while end < bytes.len() {
                match bytes[end] {
                    b'0'..=b'9' => end += 1,
                    b'.' if !seen_dot => {
                        seen_dot = true;
                        end += 1;
                    }
                    _ => break,
                }
            }
            return (
                Token {
                    kind: TokenKind::Number,
                    text: Cow::Borrowed(&self.input[start..end]),
                },
                end,
            );
        }

        if c == b'\'' || c == b'"' {
            return self.read_string_token(start, c);
        }

        // Two-character comparison operators are fused into one symbol token.
        let end = if matches!(c, b'<' | b'>' | b'=' | b'!')
            && bytes.get(start + 1).is_some_and(|&n| matches!(n, b'=' | b'>'))
            && !(c == b'>' && bytes[start + 1] == b'>')
        {
            start + 2
        } else {
            // Advance over the whole character so multi-byte input cannot split.
            start + self.input[start..].chars().next().map_or(1, char::len_utf8)
        };
        (
            Token {
                kind: TokenKind::Symbol,
                text: Cow::Borrowed(&self.input[start..end]),
            },
            end,
        )
    }

    fn read_string_token(&self, start: usize, quote: u8) -> (Token<'q>, usize) {
        let bytes = self.input.as_bytes();
        let mut end = start + 1;
        let mut escaped = false;
        while end < bytes.len() && (bytes[end] != quote || escaped) {
            escaped = bytes[end] == b'\\' && !escaped;
            end += 1;
        }
        let body = &self.input[start + 1..end];
        let next_pos = (end + 1).min(self.input.len());
        let text = if body.contains('\\') {
            let mut unescaped = String::with_capacity(body.len());
            let mut chars = body.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    match chars.next() {
                        Some('n') => unescaped.push('\n'),
                        Some('t') => unescaped.push('\t'),
                        Some(other) => unescaped.push(other),
                        None => {}
                    }
                } else {
                    unescaped.push(c);
                }
            }
            Cow::Owned(unescaped)
        } else {
            Cow::Borrowed(body)
        };
        (
            Token {
                kind: TokenKind::String,
                text,
            },
            next_pos,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_texts(input: &str) -> Vec<(TokenKind, String)> {
        let mut tokens = Tokenizer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = tokens.next_token();
            if tok.kind == TokenKind::End {
                return out;
            }
            out.push((tok.kind, tok.into_text()));
        }
    }

    #[test]
    fn splits_names_numbers_and_symbols() {
        assert_eq!(
            kinds_and_texts("select * from ns where price>=10.5"),
            vec![
                (TokenKind::Name, "select".into()),
                (TokenKind::Symbol, "*".into()),
                (TokenKind::Name, "from".into()),
                (TokenKind::Name, "ns".into()),
                (TokenKind::Name, "where".into()),
                (TokenKind::Name, "price".into()),
                (TokenKind::Symbol, ">=".into()),
                (TokenKind::Number, "10.5".into()),
            ]
        );
    }

    #[test]
    fn lowercases_names_unless_asked_not_to() {
        let mut tokens = Tokenizer::new("SeLeCt Price");
        assert_eq!(tokens.next_token().text, "select");
        assert_eq!(tokens.peek_token_keep_case().text, "Price");
        assert_eq!(tokens.next_token().text, "price");
    }

    #[test]
    fn negative_numbers_attach_the_sign() {
        assert_eq!(
            kinds_and_texts("a > -42"),
            vec![
                (TokenKind::Name, "a".into()),
                (TokenKind::Symbol, ">".into()),
                (TokenKind::Number, "-42".into()),
            ]
        );
        // A dash not followed by a digit stays a symbol.
        assert_eq!(kinds_and_texts("-")[0].0, TokenKind::Symbol);
    }

    #[test]
    fn quoted_strings_unescape() {
        assert_eq!(
            kinds_and_texts(r#"'it''s' "a \'b\'" 'c'"#),
            vec![
                (TokenKind::String, "it".into()),
                (TokenKind::String, "s".into()),
                (TokenKind::String, "a 'b'".into()),
                (TokenKind::String, "c".into()),
            ]
        );
    }

    #[test]
    fn peek_does_not_advance() {
        let tokens = Tokenizer::new("a b");
        assert_eq!(tokens.peek_token().text, "a");
        assert_eq!(tokens.peek_token().text, "a");
    }

    #[test]
    fn reports_line_and_column() {
        let mut tokens = Tokenizer::new("select *\nfrom ns");
        for _ in 0..3 {
            tokens.next_token();
        }
        assert_eq!(tokens.where_is(), "line 2 column 5");
    }

    #[test]
    fn end_ignores_trailing_whitespace() {
        let mut tokens = Tokenizer::new("a   \n ");
        tokens.next_token();
        assert!(tokens.end());
    }
}
