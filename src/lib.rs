//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be
//! evolved independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the declaration AST.
//! - `symtab` builds the symbol-entry arena and the global and per-procedure tables.
//! - `typecheck` fills every expression type slot and enforces the nominal rules.
//! - `frame` assigns stack offsets and sizes each procedure's frame areas.
//! - `codegen` lowers the checked program into NASM x86-64 assembly.
//! - `error` centralises the fatal diagnostics shared by the other stages.
//!
//! Data flows strictly forward: each phase consumes the full output of
//! the previous one and only fills slots reserved for it (expression
//! type slots, symbol offsets and frame areas).

pub mod ast;
pub mod error;
pub mod frame;
pub mod parser;
pub mod symtab;
pub mod tokenizer;
pub mod typecheck;

mod codegen;

pub use error::{CompileError, CompileResult};

use log::debug;
use symtab::Symbols;

/// Compile NUL-terminated SPL source bytes into NASM assembly text.
pub fn compile(source: &[u8]) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  debug!("lexed {} tokens", tokens.len());

  let mut program = parser::parse(tokens)?;
  debug!("parsed {} top-level declarations", program.decls.len());

  let mut symbols = Symbols::build(&program)?;
  typecheck::check(&mut program, &symbols)?;
  frame::allocate(&program, &mut symbols)?;

  codegen::generate(&program, &symbols)
}
