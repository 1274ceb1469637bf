//! Stack-frame allocation: turns declarations into RBP-relative offsets.
//!
//! Layout per procedure, growing downward from the frame pointer:
//! locals first (arrays rounded up to 8-byte units), then one spill slot
//! per register-passed parameter. Stack-passed parameters live in the
//! caller's frame at +16 and up, past the saved RBP and the return
//! address. The outgoing area at the bottom of the frame is sized by
//! the worst call site in the body so RSP never moves between prologue
//! and epilogue.

use crate::ast::{Decl, Program, Stmt};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{SymbolEntry, Symbols};

const WORD: i64 = 8;
const MAX_REG_ARGS: usize = 6;

/// Offset of the first stack-passed parameter: past the saved RBP at +0
/// and the return address at +8.
const FIRST_STACK_PARAM: i64 = 16;

/// Fill in variable offsets and the three frame areas for every user
/// procedure.
pub fn allocate(program: &Program, symbols: &mut Symbols) -> CompileResult<()> {
  for decl in &program.decls {
    let Decl::Proc(proc_decl) = decl else {
      continue;
    };
    let proc_id = symbols
      .lookup_global(&proc_decl.name)
      .ok_or_else(|| CompileError::internal("procedure vanished from the global table"))?;
    let table = symbols
      .procedure(proc_id)?
      .table
      .ok_or_else(|| CompileError::internal("user procedure has no local table"))?;

    // Locals, declaration order, growing downward.
    let mut local_area = 0;
    for var in &proc_decl.vars {
      let id = symbols
        .lookup(table, &var.name)
        .ok_or_else(|| CompileError::internal("local vanished from its table"))?;
      let size = round_word(symbols.size_of(symbols.variable(id)?.ty));
      local_area += size;
      let offset = -local_area;
      if let SymbolEntry::Variable(variable) = symbols.entry_mut(id) {
        variable.offset = offset;
      }
    }

    // Parameters: the first six get spill slots directly below the
    // locals, the rest already sit in the caller's frame.
    let mut offsets = Vec::with_capacity(proc_decl.params.len());
    for (index, param) in proc_decl.params.iter().enumerate() {
      let offset = if index < MAX_REG_ARGS {
        -(local_area + WORD * (index as i64 + 1))
      } else {
        FIRST_STACK_PARAM + WORD * (index - MAX_REG_ARGS) as i64
      };
      offsets.push(offset);

      let id = symbols
        .lookup(table, &param.name)
        .ok_or_else(|| CompileError::internal("parameter vanished from its table"))?;
      if let SymbolEntry::Variable(variable) = symbols.entry_mut(id) {
        variable.offset = offset;
      }
    }
    let spill_area = WORD * proc_decl.params.len().min(MAX_REG_ARGS) as i64;

    let outgoing_area = WORD * max_stack_args(&proc_decl.body);

    if let SymbolEntry::Procedure(proc) = symbols.entry_mut(proc_id) {
      for (param, offset) in proc.params.iter_mut().zip(offsets) {
        param.offset = offset;
      }
      proc.local_area = local_area;
      proc.spill_area = spill_area;
      proc.outgoing_area = outgoing_area;
    }
  }
  Ok(())
}

fn round_word(n: i64) -> i64 {
  (n + WORD - 1) & !(WORD - 1)
}

/// Worst-case number of stack-passed arguments over every call in the
/// statement list, nested statements included.
fn max_stack_args(stmts: &[Stmt]) -> i64 {
  stmts.iter().map(stmt_stack_args).max().unwrap_or(0)
}

fn stmt_stack_args(stmt: &Stmt) -> i64 {
  match stmt {
    Stmt::Call { args, .. } => args.len().saturating_sub(MAX_REG_ARGS) as i64,
    Stmt::If {
      then_branch,
      else_branch,
      ..
    } => {
      let mut n = stmt_stack_args(then_branch);
      if let Some(else_branch) = else_branch {
        n = n.max(stmt_stack_args(else_branch));
      }
      n
    }
    Stmt::While { body, .. } => stmt_stack_args(body),
    Stmt::Block(body) => max_stack_args(body),
    Stmt::Assign { .. } => 0,
  }
}
