//! Utility modules.

pub mod file;

pub use file::read_lines;
