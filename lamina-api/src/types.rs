//! API type definitions
//!
//! Input and output types for compile and render calls.

use lamina_core::{CacheStatus, Program};

/// Result of compiling (or fetching) one view.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Executable program for the view
    pub program: Program,
    /// Whether the artifact cache already had it
    pub cache: CacheStatus,
}
