use super::cursor::SourcePos;

/// Scan failure with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    /// What went wrong
    pub kind: ScanErrorKind,
    /// Where it happened
    pub location: ErrorLocation,
}

/// Location attached to scan and compile errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorLocation {
    /// A specific source position
    At(SourcePos),
    /// End of the template
    Eof,
    /// Position not recoverable
    Unknown,
}

/// Scan error categories.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanErrorKind {
    /// `{{` with no closing `}}`
    UnterminatedEcho,
    /// `{!!` with no closing `!!}`
    UnterminatedRawEcho,
    /// `{{--` with no closing `--}}`
    UnterminatedComment,
    /// Directive argument parentheses never close
    UnbalancedDirectiveArgs { directive: String },
    /// Quoted string inside directive arguments never closes
    UnterminatedArgumentString { directive: String },
}

impl ScanError {
    /// Error at an explicit line/column.
    pub fn at(kind: ScanErrorKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(SourcePos {
                line,
                column,
                offset: 0,
            }),
        }
    }

    /// Error at a tracked cursor position.
    pub fn here(kind: ScanErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(pos),
        }
    }

    /// Error at end of input.
    pub fn at_eof(kind: ScanErrorKind) -> Self {
        Self {
            kind,
            location: ErrorLocation::Eof,
        }
    }

    /// Line number, if the location carries one.
    pub fn line(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(pos) => Some(pos.line),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }

    /// Column number, if the location carries one.
    pub fn column(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(pos) => Some(pos.column),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }
}

impl ScanErrorKind {
    pub fn message(&self) -> String {
        match self {
            ScanErrorKind::UnterminatedEcho => "Unterminated echo '{{', expected '}}'".to_string(),
            ScanErrorKind::UnterminatedRawEcho => {
                "Unterminated raw echo '{!!', expected '!!}'".to_string()
            }
            ScanErrorKind::UnterminatedComment => {
                "Unterminated comment '{{--', expected '--}}'".to_string()
            }
            ScanErrorKind::UnbalancedDirectiveArgs { directive } => {
                format!("Unbalanced parentheses in arguments of '@{directive}'")
            }
            ScanErrorKind::UnterminatedArgumentString { directive } => {
                format!("Unterminated string in arguments of '@{directive}'")
            }
        }
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location_prefix = match &self.location {
            ErrorLocation::At(pos) => format!("{}:{}", pos.line, pos.column),
            ErrorLocation::Eof => "EOF".to_string(),
            ErrorLocation::Unknown => "?:?".to_string(),
        };
        write!(f, "[{location_prefix}] {}", self.kind.message())
    }
}

impl std::error::Error for ScanError {}

/// Scan result type.
pub type ScanResult<T> = Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_at_location() {
        let err = ScanError::at(ScanErrorKind::UnterminatedEcho, 10, 5);
        assert_eq!(err.line(), Some(10));
        assert_eq!(err.column(), Some(5));
        assert!(matches!(err.kind, ScanErrorKind::UnterminatedEcho));
    }

    #[test]
    fn test_error_at_eof() {
        let err = ScanError::at_eof(ScanErrorKind::UnterminatedComment);
        assert_eq!(err.line(), None);
        assert_eq!(err.column(), None);
        assert!(matches!(err.location, ErrorLocation::Eof));
    }

    #[test]
    fn test_error_display_with_location() {
        let err = ScanError::at(
            ScanErrorKind::UnbalancedDirectiveArgs {
                directive: "if".to_string(),
            },
            5,
            10,
        );
        let display = format!("{err}");
        assert!(display.contains("5:10"));
        assert!(display.contains("'@if'"));
    }

    #[test]
    fn test_error_display_eof() {
        let err = ScanError::at_eof(ScanErrorKind::UnterminatedEcho);
        let display = format!("{err}");
        assert!(display.contains("EOF"));
    }

    #[test]
    fn test_error_clone_equality() {
        let err1 = ScanError::at(ScanErrorKind::UnterminatedEcho, 1, 1);
        let err2 = err1.clone();
        let err3 = ScanError::at(ScanErrorKind::UnterminatedComment, 1, 1);
        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
