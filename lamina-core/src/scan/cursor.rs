//! Source cursor with position tracking
//!
//! Walks template text character by character while maintaining the
//! 1-based line/column and byte offset used in error reports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A position inside template source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePos {
    /// 1-based line number
    pub line: usize,
    /// 1-based column number, counted in characters
    pub column: usize,
    /// Byte offset from the start of the source
    pub offset: usize,
}

impl SourcePos {
    /// Position of the first character.
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Character cursor over template source.
///
/// Cheap to copy; scanners snapshot the cursor to backtrack over
/// tentative matches.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Current position.
    pub fn pos(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    /// Current byte offset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.source.len()
    }

    /// Unconsumed remainder of the source.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    /// Look at the current character without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Look `n` characters ahead without consuming anything.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    /// Whether the unconsumed input starts with `pat`.
    pub fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    /// Consume one character, updating line and column.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume `pat` if the input starts with it.
    pub fn eat_str(&mut self, pat: &str) -> bool {
        if !self.starts_with(pat) {
            return false;
        }
        for _ in pat.chars() {
            self.advance();
        }
        true
    }

    /// Slice of the source between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.source[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advance() {
        let mut cursor = Cursor::new("abc");
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!(cursor.advance(), Some('b'));
        assert_eq!(cursor.advance(), Some('c'));
        assert_eq!(cursor.advance(), None);
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_cursor_position_tracking() {
        let mut cursor = Cursor::new("a\nb");
        assert_eq!(cursor.pos().line, 1);
        assert_eq!(cursor.pos().column, 1);

        cursor.advance();
        assert_eq!(cursor.pos().line, 1);
        assert_eq!(cursor.pos().column, 2);

        cursor.advance();
        assert_eq!(cursor.pos().line, 2);
        assert_eq!(cursor.pos().column, 1);
    }

    #[test]
    fn test_cursor_multibyte_columns() {
        let mut cursor = Cursor::new("héllo");
        cursor.advance();
        cursor.advance();
        // two characters consumed, three bytes
        assert_eq!(cursor.pos().column, 3);
        assert_eq!(cursor.offset(), 3);
    }

    #[test]
    fn test_cursor_peek_does_not_consume() {
        let cursor = Cursor::new("xy");
        assert_eq!(cursor.peek(), Some('x'));
        assert_eq!(cursor.peek(), Some('x'));
        assert_eq!(cursor.peek_nth(1), Some('y'));
        assert_eq!(cursor.peek_nth(2), None);
    }

    #[test]
    fn test_cursor_eat_str() {
        let mut cursor = Cursor::new("{{ x }}");
        assert!(cursor.eat_str("{{"));
        assert!(!cursor.eat_str("{{"));
        assert_eq!(cursor.peek(), Some(' '));
        assert_eq!(cursor.offset(), 2);
    }

    #[test]
    fn test_cursor_snapshot_restore() {
        let mut cursor = Cursor::new("abc");
        cursor.advance();
        let saved = cursor;
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_eof());
        cursor = saved;
        assert_eq!(cursor.peek(), Some('b'));
    }

    #[test]
    fn test_cursor_slice() {
        let mut cursor = Cursor::new("hello world");
        let start = cursor.offset();
        for _ in 0..5 {
            cursor.advance();
        }
        assert_eq!(cursor.slice(start, cursor.offset()), "hello");
    }

    #[test]
    fn test_source_pos_display() {
        let pos = SourcePos {
            line: 3,
            column: 7,
            offset: 42,
        };
        assert_eq!(format!("{pos}"), "3:7");
    }
}
