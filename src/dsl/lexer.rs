//! Lexer for the patch language.
//!
//! Converts source text into a stream of [`Token`]s, always terminated by
//! [`TokenKind::Eof`]. Lexing stops at the first error.

use super::error::CompileError;
use super::function::Function;
use super::reader::Reader;
use super::token::{Token, TokenKind};

pub struct Lexer {
    reader: Reader,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self::from_reader(Reader::new(source))
    }

    pub fn from_reader(reader: Reader) -> Self {
        Self { reader }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            self.skip_comment();

            let (line, col) = self.reader.position();
            let Some(ch) = self.reader.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    col,
                });
                break;
            };

            let token = match ch {
                '\n' | ';' => self.single_char(TokenKind::Separator),
                '+' => self.single_char(TokenKind::Plus),
                '-' => self.single_char(TokenKind::Minus),
                '*' => self.single_char(TokenKind::Star),
                '/' => self.single_char(TokenKind::Slash),
                '^' => self.single_char(TokenKind::Caret),
                '%' => self.single_char(TokenKind::Percent),
                '(' => self.single_char(TokenKind::LParen),
                ')' => self.single_char(TokenKind::RParen),
                ',' => self.single_char(TokenKind::Comma),
                '=' => self.single_char(TokenKind::Eq),
                '0'..='9' => self.lex_number()?,
                '.' if self.reader.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number()?
                }
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident_or_function(),
                _ => {
                    return Err(CompileError::lex(
                        format!("unexpected character: '{ch}'"),
                        line,
                        col,
                    ));
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.reader.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.reader.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        if self.reader.peek() == Some('/') && self.reader.peek_next() == Some('/') {
            while self.reader.peek().is_some_and(|c| c != '\n') {
                self.reader.advance();
            }
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let (line, col) = self.reader.position();
        self.reader.advance();
        Token { kind, line, col }
    }

    fn take_digits(&mut self, s: &mut String) -> usize {
        let mut count = 0;
        while let Some(ch) = self.reader.peek().filter(char::is_ascii_digit) {
            s.push(ch);
            self.reader.advance();
            count += 1;
        }
        count
    }

    fn lex_number(&mut self) -> Result<Token, CompileError> {
        let (line, col) = self.reader.position();
        let mut s = String::new();

        self.take_digits(&mut s);

        if self.reader.peek() == Some('.') {
            s.push('.');
            self.reader.advance();
            self.take_digits(&mut s);
        }

        if matches!(self.reader.peek(), Some('e' | 'E')) {
            s.push('e');
            self.reader.advance();
            if let Some(sign @ ('+' | '-')) = self.reader.peek() {
                s.push(sign);
                self.reader.advance();
            }
            if self.take_digits(&mut s) == 0 {
                return Err(CompileError::lex(
                    format!("malformed number: '{s}' has no exponent digits"),
                    line,
                    col,
                ));
            }
        }

        // `1.2.3`, `12abc` and friends
        if let Some(ch) = self
            .reader
            .peek()
            .filter(|c| *c == '.' || c.is_ascii_alphanumeric() || *c == '_')
        {
            return Err(CompileError::lex(
                format!("malformed number: '{s}{ch}'"),
                line,
                col,
            ));
        }

        let value: f32 = s
            .parse()
            .map_err(|_| CompileError::lex(format!("invalid number: {s}"), line, col))?;

        Ok(Token {
            kind: TokenKind::Number(value),
            line,
            col,
        })
    }

    fn lex_ident_or_function(&mut self) -> Token {
        let (line, col) = self.reader.position();
        let mut s = String::new();

        while let Some(ch) = self
            .reader
            .peek()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            s.push(ch);
            self.reader.advance();
        }

        let kind = match Function::from_name(&s) {
            Some(f) => TokenKind::Function(f),
            None => TokenKind::Ident(s),
        };

        Token { kind, line, col }
    }
}
