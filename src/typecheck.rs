//! Semantic analysis: fills every expression type slot and enforces the
//! typing rules.
//!
//! Type comparison is nominal over resolved arena indices: alias chains
//! are flattened through `Symbols::resolve` before every equality test,
//! so distinct aliases of `int` are interchangeable while every `array`
//! declaration stays a type of its own. Alongside the slots, named
//! variables get their symbol handle filled so later phases never look
//! a name up twice.

use crate::ast::{Cond, Decl, Expr, Program, Stmt, Var};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{SymbolEntry, SymbolId, Symbols, TableId};

/// Check the whole program, filling type slots in place.
pub fn check(program: &mut Program, symbols: &Symbols) -> CompileResult<()> {
  for decl in &mut program.decls {
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
    let checker = Checker { symbols, table };
    for stmt in &mut proc_decl.body {
      checker.check_stmt(stmt)?;
    }
  }
  Ok(())
}

struct Checker<'a> {
  symbols: &'a Symbols,
  table: TableId,
}

impl Checker<'_> {
  fn check_stmt(&self, stmt: &mut Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Assign { target, value } => {
        let target_ty = self.check_var(target)?;
        let value_ty = self.check_expr(value)?;
        self.require_equal(target_ty, value_ty, "assignment")?;
        if self.symbols.resolve(target_ty) != self.symbols.int_type() {
          return Err(CompileError::semantic(format!(
            "cannot assign a value of type {}; only int assignments are allowed",
            self.symbols.describe(target_ty)
          )));
        }
        Ok(())
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.check_cond(cond)?;
        self.check_stmt(then_branch)?;
        if let Some(else_branch) = else_branch {
          self.check_stmt(else_branch)?;
        }
        Ok(())
      }
      Stmt::While { cond, body } => {
        self.check_cond(cond)?;
        self.check_stmt(body)
      }
      Stmt::Call { callee, args } => self.check_call(callee, args),
      Stmt::Block(body) => {
        for stmt in body {
          self.check_stmt(stmt)?;
        }
        Ok(())
      }
    }
  }

  fn check_cond(&self, cond: &mut Cond) -> CompileResult<()> {
    let lhs = self.check_expr(&mut cond.lhs)?;
    let rhs = self.check_expr(&mut cond.rhs)?;
    self.require_int(lhs, "comparison operand")?;
    self.require_int(rhs, "comparison operand")?;
    Ok(())
  }

  fn check_call(&self, callee: &str, args: &mut [Expr]) -> CompileResult<()> {
    let id = self
      .symbols
      .lookup(self.table, callee)
      .ok_or_else(|| CompileError::semantic(format!("undefined procedure '{callee}'")))?;
    let SymbolEntry::Procedure(proc) = self.symbols.entry(id) else {
      return Err(CompileError::semantic(format!(
        "'{callee}' is not a procedure"
      )));
    };

    if args.len() != proc.params.len() {
      return Err(CompileError::semantic(format!(
        "'{callee}' expects {} argument(s), got {}",
        proc.params.len(),
        args.len()
      )));
    }

    for (index, (arg, param)) in args.iter_mut().zip(&proc.params).enumerate() {
      if param.is_ref && arg.as_var().is_none() {
        return Err(CompileError::semantic(format!(
          "argument {} of '{callee}' must be a variable (reference parameter)",
          index + 1
        )));
      }
      let arg_ty = self.check_expr(arg)?;
      if self.symbols.resolve(arg_ty) != self.symbols.resolve(param.ty) {
        return Err(CompileError::semantic(format!(
          "argument {} of '{callee}': expected {}, got {}",
          index + 1,
          self.symbols.describe(param.ty),
          self.symbols.describe(arg_ty)
        )));
      }
    }
    Ok(())
  }

  /// Check an expression and fill its type slot.
  fn check_expr(&self, expr: &mut Expr) -> CompileResult<SymbolId> {
    let ty = match expr {
      Expr::IntLit { .. } => self.symbols.int_type(),
      Expr::Binary { lhs, rhs, .. } => {
        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;
        self.require_int(lhs_ty, "arithmetic operand")?;
        self.require_int(rhs_ty, "arithmetic operand")?;
        self.symbols.int_type()
      }
      Expr::Neg { operand, .. } => {
        let operand_ty = self.check_expr(operand)?;
        self.require_int(operand_ty, "unary minus operand")?;
        self.symbols.int_type()
      }
      Expr::Var { var, .. } => self.check_var(var)?,
    };
    *expr.ty_mut() = Some(ty);
    Ok(ty)
  }

  /// Check a variable designator and return its declared type. Named
  /// designators get their symbol handle filled as a side effect.
  fn check_var(&self, var: &mut Var) -> CompileResult<SymbolId> {
    match var {
      Var::Named { name, symbol } => {
        let id = self
          .symbols
          .lookup(self.table, name)
          .ok_or_else(|| CompileError::semantic(format!("undefined variable '{name}'")))?;
        let variable = match self.symbols.entry(id) {
          SymbolEntry::Variable(variable) => variable,
          _ => {
            return Err(CompileError::semantic(format!(
              "'{name}' is not a variable"
            )));
          }
        };
        *symbol = Some(id);
        Ok(variable.ty)
      }
      Var::Indexed { base, index } => {
        let base_ty = self.check_var(base)?;
        let elem = match self.symbols.entry(self.symbols.resolve(base_ty)) {
          SymbolEntry::ArrayType { elem, .. } => *elem,
          _ => {
            return Err(CompileError::semantic(format!(
              "cannot index a value of type {}",
              self.symbols.describe(base_ty)
            )));
          }
        };
        let index_ty = self.check_expr(index)?;
        self.require_int(index_ty, "array index")?;
        Ok(elem)
      }
    }
  }

  fn require_int(&self, ty: SymbolId, what: &str) -> CompileResult<()> {
    if self.symbols.resolve(ty) != self.symbols.int_type() {
      return Err(CompileError::semantic(format!(
        "{what} must be int, got {}",
        self.symbols.describe(ty)
      )));
    }
    Ok(())
  }

  fn require_equal(&self, lhs: SymbolId, rhs: SymbolId, what: &str) -> CompileResult<()> {
    if self.symbols.resolve(lhs) != self.symbols.resolve(rhs) {
      return Err(CompileError::semantic(format!(
        "type mismatch in {what}: {} vs {}",
        self.symbols.describe(lhs),
        self.symbols.describe(rhs)
      )));
    }
    Ok(())
  }
}
