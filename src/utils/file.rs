//! File utilities for indexing operations.

use std::fs;
use std::path::Path;

/// Read a newline-delimited UTF-8 file into its lines.
///
/// `\n` and `\r\n` terminators are stripped. Empty lines are kept so every
/// line keeps its position in the file.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}
