//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are deliberately one line: the first failure in any phase
//! aborts compilation, so there is no error list to accumulate and no
//! source-position bookkeeping to carry around. The `Display` form of
//! `CompileError` is the exact text the driver prints before exiting
//! with status 1.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("Error: {message}"))]
  Lexical { message: String },

  #[snafu(display("Error: {message}"))]
  Syntactic { message: String },

  #[snafu(display("Error: {message}"))]
  Semantic { message: String },

  #[snafu(display("Internal: {message}"))]
  Internal { message: String },
}

impl CompileError {
  /// A lexical error: unrecognized byte, bad escape, literal overflow.
  pub fn lexical(message: impl Into<String>) -> Self {
    Self::Lexical {
      message: message.into(),
    }
  }

  /// A syntax error: the parser met a token it did not expect.
  pub fn syntactic(message: impl Into<String>) -> Self {
    Self::Syntactic {
      message: message.into(),
    }
  }

  /// A semantic error: unknown name, type mismatch, arity mismatch.
  pub fn semantic(message: impl Into<String>) -> Self {
    Self::Semantic {
      message: message.into(),
    }
  }

  /// An invariant violation in a phase that should never fail on
  /// well-checked input. Always a compiler bug.
  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }
}
