//! Terminal-facing output helpers

mod cli;

pub use cli::print_error_with_source;
