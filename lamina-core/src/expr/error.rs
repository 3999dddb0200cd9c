//! Expression errors
//!
//! Offsets are byte positions inside the expression text; the compiler maps
//! them onto the enclosing directive's template position when it surfaces
//! a `CompileError`.

/// An error produced while lexing or parsing an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub kind: ExprErrorKind,
    /// Byte offset inside the expression text
    pub offset: usize,
}

/// Expression error kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprErrorKind {
    /// Character with no token interpretation
    UnexpectedChar(char),
    /// String literal missing its closing quote
    UnterminatedString,
    /// Number that does not parse
    InvalidNumber(String),
    /// Token out of place
    UnexpectedToken {
        found: String,
        expected: Vec<String>,
    },
    /// Input ended mid-expression
    UnexpectedEnd,
    /// Identifier required
    ExpectedIdentifier { found: String },
    /// Pipe syntax used while pipes are disabled
    PipesDisabled,
    /// Complete expression parsed but input continues
    TrailingInput { found: String },
}

impl ExprError {
    pub fn new(kind: ExprErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn at_end(kind: ExprErrorKind, input_len: usize) -> Self {
        Self {
            kind,
            offset: input_len,
        }
    }

    fn message(&self) -> String {
        self.kind.message()
    }
}

impl ExprErrorKind {
    pub fn message(&self) -> String {
        match self {
            ExprErrorKind::UnexpectedChar(c) => format!("Unexpected character '{}'", c),
            ExprErrorKind::UnterminatedString => "Unterminated string literal".to_string(),
            ExprErrorKind::InvalidNumber(text) => format!("Invalid number '{}'", text),
            ExprErrorKind::UnexpectedToken { found, expected } => {
                if expected.is_empty() {
                    format!("Unexpected {}", found)
                } else {
                    format!("Unexpected {}, expected: {}", found, expected.join(", "))
                }
            }
            ExprErrorKind::UnexpectedEnd => "Unexpected end of expression".to_string(),
            ExprErrorKind::ExpectedIdentifier { found } => {
                format!("Expected identifier, found: {}", found)
            }
            ExprErrorKind::PipesDisabled => {
                "Pipe syntax is disabled; enable allow_pipes to use filters".to_string()
            }
            ExprErrorKind::TrailingInput { found } => {
                format!("Trailing input after expression: {}", found)
            }
        }
    }
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (offset {})", self.message(), self.offset)
    }
}

impl std::error::Error for ExprError {}

/// Result type for expression parsing
pub type ExprResult<T> = Result<T, ExprError>;

/// Helper: create an unexpected-token kind
pub fn unexpected_token(
    found: impl Into<String>,
    expected: Vec<impl Into<String>>,
) -> ExprErrorKind {
    ExprErrorKind::UnexpectedToken {
        found: found.into(),
        expected: expected.into_iter().map(Into::into).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_offset() {
        let err = ExprError::new(ExprErrorKind::UnterminatedString, 4);
        let text = format!("{}", err);
        assert!(text.contains("Unterminated string"));
        assert!(text.contains("offset 4"));
    }

    #[test]
    fn test_unexpected_token_helper() {
        let kind = unexpected_token("'+'", vec!["identifier"]);
        assert!(matches!(kind, ExprErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn test_error_clone_and_eq() {
        let a = ExprError::new(ExprErrorKind::UnexpectedEnd, 0);
        let b = a.clone();
        assert_eq!(a, b);
    }
}
