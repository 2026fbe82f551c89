//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable so they can be evolved independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the statement list of
//!   the implicit `main`, resolving locals through `locals` as it goes.
//! - `codegen` lowers the parsed function into x86-64 AT&T assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod error;
pub mod locals;
pub mod parser;
pub mod tokenizer;

mod codegen;

use std::ffi::OsString;

pub use error::{CompileError, CompileResult};

/// Turn a raw command-line argument into source text.
///
/// Input that is not UTF-8 is a lexical error at the first bad byte.
pub fn source_from_arg(arg: OsString) -> CompileResult<String> {
  arg.into_string().map_err(|raw| {
    let lossy = raw.to_string_lossy();
    let loc = lossy.find(char::REPLACEMENT_CHARACTER).unwrap_or(0);
    CompileError::at(&lossy, loc, "invalid UTF-8 in source")
  })
}

/// Compile a source string into AT&T assembly.
///
/// Every call starts from fresh state, so compiling twice in one process
/// yields identical output.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  codegen::generate(&program)
}
