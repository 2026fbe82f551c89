//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – these routines format
//! messages in a style reminiscent of chibicc, pointing at the offending
//! byte with a caret.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{line}\n{marker} {message}"))]
  WithLocation {
    line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("not an lvalue"))]
  NotAnLvalue,
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  ///
  /// Only the line containing `loc` is reproduced, so multi-line programs
  /// still get a caret under the right column.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = loc.min(source.len());
    let start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let column = source[start..safe_loc].chars().count();
    Self::WithLocation {
      line: source[start..end].to_string(),
      marker: format!("{}^", " ".repeat(column)),
      message: message.into(),
    }
  }
}
