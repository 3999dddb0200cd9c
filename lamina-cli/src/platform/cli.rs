//! CLI error display
//!
//! Command line friendly error output: the report line itself, then the
//! surrounding source lines with a marker under the failing column.

use lamina_api::ErrorReport;

/// Print an error report, with source context when the location is known.
pub fn print_error_with_source(report: &ErrorReport, source: Option<&str>) {
    eprintln!("❌ {}", report);

    if let (Some(text), Some(line), Some(column)) = (source, report.line, report.column) {
        if let Some(context) = format_source_context(text, line, column) {
            eprint!("{}", context);
        }
    }
}

/// Render the lines surrounding an error with a caret under the column.
///
/// Returns None when the line number falls outside the source; a located
/// error can point into an included view rather than the one whose source
/// the caller has at hand.
pub fn format_source_context(source: &str, error_line: usize, error_col: usize) -> Option<String> {
    const CONTEXT_LINES: usize = 5;

    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len();
    if error_line == 0 || error_line > total_lines {
        return None;
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(total_lines);

    // Line number column width for alignment
    let width = end_line.to_string().len();
    let rule = format!("{}|--\n", "-".repeat(width + 1));

    let mut out = String::new();
    out.push_str(&rule);
    for line_idx in start_line..=end_line {
        let content = lines[line_idx - 1];
        out.push_str(&format!("{:>width$} | {}\n", line_idx, content));

        if line_idx == error_line {
            let marker = " ".repeat(error_col.saturating_sub(1));
            out.push_str(&format!("{} | {}^\n", " ".repeat(width), marker));
        }
    }
    out.push_str(&rule);
    Some(out)
}
