//! Lexical analysis of assembly text.
//!
//! Whitespace is skipped, `;` starts a comment running to the end of
//! the line, and line breaks are significant: instructions are one per
//! line, so the lexer emits a single [`TokenKind::Newline`] for every
//! run of line breaks.

use crate::parser::ParseError;
use crate::token::{Token, TokenKind};

/// Lexes the given source text into tokens, ending with `Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        line: 1,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            self.skip_blanks_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(self.token(TokenKind::Eof, String::new()));
                return Ok(tokens);
            }
            if self.peek() == b'\n' {
                let line = self.line;
                while self.pos < self.source.len() {
                    match self.peek() {
                        b'\n' => {
                            self.line += 1;
                            self.pos += 1;
                        }
                        b' ' | b'\t' | b'\r' => self.pos += 1,
                        b';' => self.skip_comment(),
                        _ => break,
                    }
                }
                // Collapse leading breaks; a file-initial newline is noise.
                if tokens.last().is_some_and(|t| t.kind != TokenKind::Newline) {
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        text: String::new(),
                        line,
                    });
                }
                continue;
            }
            tokens.push(self.next_token()?);
        }
    }

    fn peek(&self) -> u8 {
        if self.pos < self.source.len() {
            self.source[self.pos]
        } else {
            0
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let idx = self.pos + offset;
        if idx < self.source.len() {
            self.source[idx]
        } else {
            0
        }
    }

    fn token(&self, kind: TokenKind, text: String) -> Token {
        Token {
            kind,
            text,
            line: self.line,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn skip_blanks_and_comments(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b';' => self.skip_comment(),
                _ => return,
            }
        }
    }

    fn skip_comment(&mut self) {
        while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let b = self.peek();

        if is_word_start(b) {
            return Ok(self.lex_word());
        }
        if b == b'%' || b == b'@' {
            self.pos += 1;
            let start = self.pos;
            while is_name_char(self.peek()) {
                self.pos += 1;
            }
            if self.pos == start {
                return Err(self.error("expected a name after the sigil"));
            }
            let text = self.text_from(start);
            let kind = if b == b'%' {
                TokenKind::PercentName
            } else {
                TokenKind::AtName
            };
            return Ok(self.token(kind, text));
        }
        if b.is_ascii_digit() {
            let start = self.pos;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
            if self.peek().is_ascii_alphabetic() {
                while self.peek().is_ascii_alphanumeric() {
                    self.pos += 1;
                }
                let text = self.text_from(start);
                return Ok(self.token(TokenKind::TimeLit, text));
            }
            let text = self.text_from(start);
            return Ok(self.token(TokenKind::Number, text));
        }
        if b == b'"' {
            self.pos += 1;
            let start = self.pos;
            while self.pos < self.source.len() && self.peek() != b'"' && self.peek() != b'\n' {
                self.pos += 1;
            }
            if self.peek() != b'"' {
                return Err(self.error("unterminated string literal"));
            }
            let text = self.text_from(start);
            self.pos += 1;
            return Ok(self.token(TokenKind::Str, text));
        }
        if b == b'-' && self.peek_at(1) == b'>' {
            self.pos += 2;
            return Ok(self.token(TokenKind::Arrow, String::new()));
        }

        let kind = match b {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'=' => TokenKind::Eq,
            b':' => TokenKind::Colon,
            b'$' => TokenKind::Dollar,
            b'*' => TokenKind::Star,
            b'-' => TokenKind::Minus,
            _ => return Err(self.error(format!("unexpected character `{}`", b as char))),
        };
        self.pos += 1;
        Ok(self.token(kind, String::new()))
    }

    fn lex_word(&mut self) -> Token {
        let start = self.pos;
        while is_name_char(self.peek()) {
            self.pos += 1;
        }
        let text = self.text_from(start);
        self.token(TokenKind::Word, text)
    }

    fn text_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}
