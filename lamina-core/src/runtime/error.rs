use crate::compile::CompileError;
use crate::resolve::ResolveError;
use crate::scan::{ErrorLocation, SourcePos};
use lamina_vfs::VfsError;

/// Execution failure with position information where one is known.
///
/// Ops that carry a source position (echoes, includes, directive calls)
/// attach it; failures inside structural ops surface without one.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderError {
    /// What went wrong
    pub kind: RenderErrorKind,
    /// Where it happened
    pub location: ErrorLocation,
}

/// Render error categories.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderErrorKind {
    /// Integer or float division with a zero divisor
    DivisionByZero,
    /// `@foreach` subject is not an array or map
    NotIterable { type_name: String },
    /// `@for` range bound did not evaluate to an integer
    RangeBoundNotInt { type_name: String },
    /// `@include` target did not evaluate to a string
    IncludeTargetNotString { type_name: String },
    /// `@include` data argument did not evaluate to a map
    IncludeDataNotMap { type_name: String },
    /// Pipe names a filter that is not registered
    UnknownFilter { name: String },
    /// A registered filter returned an error
    FilterFailed { name: String, message: String },
    /// Artifact calls a directive the registry no longer knows
    UnknownDirective { name: String },
    /// Artifact calls a directive now registered for compile time
    NotRunTimeDirective { name: String },
    /// A run-time directive handler returned an error
    DirectiveFailed { name: String, message: String },
    /// A template included itself, directly or through intermediates
    RecursiveInclude { chain: Vec<String> },
    /// Nested includes exceeded the configured depth
    IncludeDepthExceeded { limit: usize },
    /// A single loop ran past the configured iteration cap
    LoopLimitExceeded { limit: usize },
    /// Included view could not be resolved
    Resolve(ResolveError),
    /// Included view failed to compile
    Compile(CompileError),
    /// Template source could not be read
    Vfs(VfsError),
    /// The output sink failed
    Output { message: String },
}

impl RenderError {
    /// Error at a tracked source position.
    pub fn here(kind: RenderErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(pos),
        }
    }

    /// Error with no recoverable position.
    pub fn somewhere(kind: RenderErrorKind) -> Self {
        Self {
            kind,
            location: ErrorLocation::Unknown,
        }
    }

    /// Attach a position if the error does not already carry one.
    pub fn locate(mut self, pos: SourcePos) -> Self {
        if matches!(self.location, ErrorLocation::Unknown) {
            self.location = ErrorLocation::At(pos);
        }
        self
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

impl RenderErrorKind {
    pub fn message(&self) -> String {
        match self {
            RenderErrorKind::DivisionByZero => "Division by zero".to_string(),
            RenderErrorKind::NotIterable { type_name } => {
                format!("Cannot iterate over a value of type {type_name}")
            }
            RenderErrorKind::RangeBoundNotInt { type_name } => {
                format!("Range bound must be an integer, got {type_name}")
            }
            RenderErrorKind::IncludeTargetNotString { type_name } => {
                format!("Include target must be a string, got {type_name}")
            }
            RenderErrorKind::IncludeDataNotMap { type_name } => {
                format!("Include data must be a map, got {type_name}")
            }
            RenderErrorKind::UnknownFilter { name } => format!("Unknown filter '{name}'"),
            RenderErrorKind::FilterFailed { name, message } => {
                format!("Filter '{name}' failed: {message}")
            }
            RenderErrorKind::UnknownDirective { name } => {
                format!("Unknown directive '@{name}'")
            }
            RenderErrorKind::NotRunTimeDirective { name } => {
                format!("Directive '@{name}' is registered for compile time, not render time")
            }
            RenderErrorKind::DirectiveFailed { name, message } => {
                format!("Directive '@{name}' failed: {message}")
            }
            RenderErrorKind::RecursiveInclude { chain } => {
                format!("Recursive include: {}", chain.join(" -> "))
            }
            RenderErrorKind::IncludeDepthExceeded { limit } => {
                format!("Include depth limit ({limit}) exceeded")
            }
            RenderErrorKind::LoopLimitExceeded { limit } => {
                format!("Loop iteration limit ({limit}) exceeded")
            }
            RenderErrorKind::Resolve(err) => err.to_string(),
            RenderErrorKind::Compile(err) => err.kind.message(),
            RenderErrorKind::Vfs(err) => err.to_string(),
            RenderErrorKind::Output { message } => format!("Failed to write output: {message}"),
        }
    }
}

// Same "[line:column] message" form as scan and compile errors, so every
// engine phase reports locations identically.
impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location_prefix = match &self.location {
            ErrorLocation::At(pos) => format!("{}:{}", pos.line, pos.column),
            ErrorLocation::Eof => "EOF".to_string(),
            ErrorLocation::Unknown => "?:?".to_string(),
        };
        write!(f, "[{location_prefix}] {}", self.kind.message())
    }
}

impl std::error::Error for RenderError {}

impl From<ResolveError> for RenderError {
    fn from(err: ResolveError) -> Self {
        RenderError::somewhere(RenderErrorKind::Resolve(err))
    }
}

impl From<CompileError> for RenderError {
    fn from(err: CompileError) -> Self {
        let location = err.location;
        Self {
            kind: RenderErrorKind::Compile(err),
            location,
        }
    }
}

impl From<VfsError> for RenderError {
    fn from(err: VfsError) -> Self {
        RenderError::somewhere(RenderErrorKind::Vfs(err))
    }
}

impl From<crate::cache::FetchError> for RenderError {
    fn from(err: crate::cache::FetchError) -> Self {
        match err {
            crate::cache::FetchError::Vfs(err) => err.into(),
            crate::cache::FetchError::Compile(err) => err.into(),
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::somewhere(RenderErrorKind::Output {
            message: err.to_string(),
        })
    }
}

/// Render result type.
pub type RenderResult<T> = Result<T, RenderError>;
