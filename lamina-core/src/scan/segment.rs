//! Scanner output segments

use super::cursor::SourcePos;

/// One lexical piece of a template.
///
/// The scanner is purely lexical: it recognizes marker shapes but never
/// decides whether a directive exists or what it means.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text, passed through to the output unchanged.
    Text(String),
    /// `{{-- ... --}}` body, without the markers.
    Comment { body: String, pos: SourcePos },
    /// `{{ expr }}`, rendered through the escape function.
    EchoEscaped { expr: String, pos: SourcePos },
    /// `{!! expr !!}`, rendered verbatim.
    EchoRaw { expr: String, pos: SourcePos },
    /// `@name` or `@name(args)`, argument text captured verbatim.
    Directive {
        name: String,
        args: Option<String>,
        pos: SourcePos,
    },
    /// Escape sequences that emit marker characters literally:
    /// `@@word` yields `@word`, `@{{` yields `{{`.
    RawEscape(String),
}
