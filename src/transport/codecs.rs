/// Delimited lines.
pub mod lines;
