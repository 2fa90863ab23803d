//! Token types for the patch lexer.

use super::function::Function;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Ident(String),
    Number(f32),
    Function(Function),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,

    // Delimiters
    LParen,
    RParen,
    Comma,
    Eq,

    // Special
    Separator, // newline or ';'
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parser diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(v) => format!("number {v}"),
            TokenKind::Function(f) => format!("function '{}'", f.name()),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Caret => "'^'".to_string(),
            TokenKind::Percent => "'%'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Separator => "end of statement".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}
