//! Template scanner
//!
//! Turns raw template text into a flat segment sequence: literal runs,
//! echo expressions, comments, directives, and raw escapes. One scan per
//! template; nothing here consults the directive registry.

pub mod cursor;
pub mod error;
pub mod scanner;
pub mod segment;

pub use cursor::{Cursor, SourcePos};
pub use error::{ErrorLocation, ScanError, ScanErrorKind, ScanResult};
pub use scanner::scan;
pub use segment::Segment;
