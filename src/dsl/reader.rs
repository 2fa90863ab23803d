//! Position-tracked character source over patch text.

/// Hands out characters in order while tracking the 1-based line and column
/// of the next character.
pub struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Reader {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// The next character, or `None` at end of input.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// The character after the next one.
    pub fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    /// Consume one character, updating the line/column counters.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// `(line, column)` of the next character.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_columns_and_lines() {
        let mut reader = Reader::new("ab\nc");
        assert_eq!(reader.position(), (1, 1));
        reader.advance();
        assert_eq!(reader.position(), (1, 2));
        reader.advance();
        reader.advance(); // newline
        assert_eq!(reader.position(), (2, 1));
        assert_eq!(reader.peek(), Some('c'));
    }

    #[test]
    fn end_of_input() {
        let mut reader = Reader::new("x");
        assert!(!reader.is_at_end());
        assert_eq!(reader.peek_next(), None);
        assert_eq!(reader.advance(), Some('x'));
        assert!(reader.is_at_end());
        assert_eq!(reader.advance(), None);
        assert_eq!(reader.peek(), None);
    }

    #[test]
    fn multibyte_characters_count_as_one_column() {
        let mut reader = Reader::new("é=1");
        reader.advance();
        assert_eq!(reader.position(), (1, 2));
        assert_eq!(reader.peek(), Some('='));
    }
}
