//! Directive scanner
//!
//! Splits template text into segments. Marker recognition is purely
//! lexical: any well-formed `@name` becomes a directive segment, and the
//! compiler decides whether it names a construct or falls back to
//! literal text.
//!
//! Directive arguments are captured by balance-counting parentheses,
//! with single- and double-quoted runs exempt from the count, so
//! `@if(label == ':)')` scans intact.

use tracing::trace;

use super::cursor::{Cursor, SourcePos};
use super::error::{ScanError, ScanErrorKind, ScanResult};
use super::segment::Segment;

/// Scan template text into a segment sequence.
pub fn scan(source: &str) -> ScanResult<Vec<Segment>> {
    let mut scanner = Scanner::new(source);
    scanner.run()?;
    trace!(
        target: "lamina::scan",
        segments = scanner.segments.len(),
        bytes = source.len(),
        "scanned template"
    );
    Ok(scanner.segments)
}

struct Scanner<'a> {
    cursor: Cursor<'a>,
    segments: Vec<Segment>,
    /// Start of the pending literal run
    text_start: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            segments: Vec::new(),
            text_start: 0,
        }
    }

    fn run(&mut self) -> ScanResult<()> {
        while !self.cursor.is_eof() {
            if self.cursor.starts_with("{{--") {
                self.comment()?;
            } else if self.cursor.starts_with("{!!") {
                self.raw_echo()?;
            } else if self.cursor.starts_with("{{") {
                self.escaped_echo()?;
            } else if self.cursor.starts_with("@") {
                self.at_marker()?;
            } else {
                self.cursor.advance();
            }
        }
        self.flush_text();
        Ok(())
    }

    /// Push the pending literal run, if any.
    fn flush_text(&mut self) {
        let end = self.cursor.offset();
        if end > self.text_start {
            let text = self.cursor.slice(self.text_start, end).to_string();
            self.segments.push(Segment::Text(text));
        }
        self.text_start = end;
    }

    /// Flush pending text and return the marker position.
    fn begin_marker(&mut self) -> SourcePos {
        self.flush_text();
        self.cursor.pos()
    }

    /// Restart literal tracking after a consumed marker.
    fn end_marker(&mut self) {
        self.text_start = self.cursor.offset();
    }

    fn comment(&mut self) -> ScanResult<()> {
        let pos = self.begin_marker();
        self.cursor.eat_str("{{--");
        let body_start = self.cursor.offset();
        loop {
            if self.cursor.is_eof() {
                return Err(ScanError::here(ScanErrorKind::UnterminatedComment, pos));
            }
            if self.cursor.starts_with("--}}") {
                let body = self.cursor.slice(body_start, self.cursor.offset()).to_string();
                self.cursor.eat_str("--}}");
                self.segments.push(Segment::Comment { body, pos });
                self.end_marker();
                return Ok(());
            }
            self.cursor.advance();
        }
    }

    fn escaped_echo(&mut self) -> ScanResult<()> {
        let pos = self.begin_marker();
        self.cursor.eat_str("{{");
        let expr = self.echo_body("}}", ScanErrorKind::UnterminatedEcho, pos)?;
        self.segments.push(Segment::EchoEscaped { expr, pos });
        self.end_marker();
        Ok(())
    }

    fn raw_echo(&mut self) -> ScanResult<()> {
        let pos = self.begin_marker();
        self.cursor.eat_str("{!!");
        let expr = self.echo_body("!!}", ScanErrorKind::UnterminatedRawEcho, pos)?;
        self.segments.push(Segment::EchoRaw { expr, pos });
        self.end_marker();
        Ok(())
    }

    /// Consume up to and including `close`, returning the trimmed body.
    fn echo_body(
        &mut self,
        close: &str,
        unterminated: ScanErrorKind,
        pos: SourcePos,
    ) -> ScanResult<String> {
        let body_start = self.cursor.offset();
        loop {
            if self.cursor.is_eof() {
                return Err(ScanError::here(unterminated, pos));
            }
            if self.cursor.starts_with(close) {
                let body = self.cursor.slice(body_start, self.cursor.offset());
                let expr = body.trim().to_string();
                self.cursor.eat_str(close);
                return Ok(expr);
            }
            self.cursor.advance();
        }
    }

    /// Dispatch on `@`: escapes, directives, or plain text.
    fn at_marker(&mut self) -> ScanResult<()> {
        if self.cursor.starts_with("@@") {
            // @@word emits a literal @word; a bare @@ stays text
            if self.cursor.peek_nth(2).map(is_name_start).unwrap_or(false) {
                self.begin_marker();
                self.cursor.eat_str("@@");
                let name = self.take_name();
                self.segments.push(Segment::RawEscape(format!("@{name}")));
                self.end_marker();
            } else {
                self.cursor.advance();
                self.cursor.advance();
            }
            return Ok(());
        }

        if self.cursor.starts_with("@{{") {
            // the brace pair is emitted literally; what follows is plain
            // text, so the echo never compiles
            self.begin_marker();
            self.cursor.eat_str("@{{");
            self.segments.push(Segment::RawEscape("{{".to_string()));
            self.end_marker();
            return Ok(());
        }

        if !self.cursor.peek_nth(1).map(is_name_start).unwrap_or(false) {
            // lone @ is ordinary text
            self.cursor.advance();
            return Ok(());
        }

        let pos = self.begin_marker();
        self.cursor.advance();
        let name = self.take_name();

        // optional horizontal whitespace before an argument list; kept as
        // literal text when no parentheses follow
        let saved = self.cursor;
        while matches!(self.cursor.peek(), Some(' ') | Some('\t')) {
            self.cursor.advance();
        }
        let args = if self.cursor.peek() == Some('(') {
            Some(self.directive_args(&name, pos)?)
        } else {
            self.cursor = saved;
            None
        };
        self.segments.push(Segment::Directive { name, args, pos });
        self.end_marker();
        Ok(())
    }

    /// Consume a directive name; the caller has checked the first char.
    fn take_name(&mut self) -> String {
        let start = self.cursor.offset();
        while self.cursor.peek().map(is_name_char).unwrap_or(false) {
            self.cursor.advance();
        }
        self.cursor.slice(start, self.cursor.offset()).to_string()
    }

    /// Consume `( ... )` with balance counting, returning the inner text.
    fn directive_args(&mut self, name: &str, pos: SourcePos) -> ScanResult<String> {
        self.cursor.advance();
        let start = self.cursor.offset();
        let mut depth = 1usize;
        loop {
            let c = match self.cursor.peek() {
                Some(c) => c,
                None => {
                    return Err(ScanError::here(
                        ScanErrorKind::UnbalancedDirectiveArgs {
                            directive: name.to_string(),
                        },
                        pos,
                    ))
                }
            };
            match c {
                '\'' | '"' => self.quoted_run(c, name, pos)?,
                '(' => {
                    depth += 1;
                    self.cursor.advance();
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let args = self.cursor.slice(start, self.cursor.offset()).to_string();
                        self.cursor.advance();
                        return Ok(args);
                    }
                    self.cursor.advance();
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// Consume a quoted string inside directive arguments.
    fn quoted_run(&mut self, quote: char, name: &str, pos: SourcePos) -> ScanResult<()> {
        self.cursor.advance();
        loop {
            match self.cursor.peek() {
                None => {
                    return Err(ScanError::here(
                        ScanErrorKind::UnterminatedArgumentString {
                            directive: name.to_string(),
                        },
                        pos,
                    ))
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some(c) if c == quote => {
                    self.cursor.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
