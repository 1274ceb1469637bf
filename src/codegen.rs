//! Code generation: lower the checked AST into NASM x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression is
//! evaluated into RAX and intermediates ride the hardware stack, so a
//! binary operation is lhs, push, rhs, pop into RCX. RSP itself never
//! moves between prologue and epilogue apart from those transient
//! pushes; the outgoing argument area for calls past six arguments is
//! part of the frame.
//!
//! Code generation cannot fail on input that passed the earlier phases;
//! every error produced here is an internal invariant violation.

use crate::ast::{CmpOp, BinOp, Cond, Decl, Expr, ProcDecl, Program, Stmt, Var};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{Procedure, SymbolEntry, SymbolId, Symbols};

const BUILTINS: [&str; 6] = ["printi", "printc", "readi", "readc", "exit", "time_"];

const MAX_REG_ARGS: usize = 6;
const ARG_REGS: [&str; MAX_REG_ARGS] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Emit the whole program as NASM text.
pub fn generate(program: &Program, symbols: &Symbols) -> CompileResult<String> {
  let mut emitter = Codegen {
    symbols,
    asm: String::new(),
    labels: 0,
  };

  emitter.ins("section .text");
  for decl in &program.decls {
    if let Decl::Proc(proc_decl) = decl {
      emitter.ins(&format!("global {}", proc_decl.name));
    }
  }
  for name in BUILTINS {
    emitter.ins(&format!("extern {name}"));
  }

  for decl in &program.decls {
    if let Decl::Proc(proc_decl) = decl {
      emitter.emit_proc(proc_decl)?;
    }
  }

  Ok(emitter.asm)
}

struct Codegen<'a> {
  symbols: &'a Symbols,
  asm: String,
  labels: usize,
}

impl Codegen<'_> {
  fn emit_proc(&mut self, decl: &ProcDecl) -> CompileResult<()> {
    let proc = self.procedure_named(&decl.name)?;

    self.asm.push('\n');
    self.label_line(&decl.name);
    self.ins("push rbp");
    self.ins("mov rbp, rsp");
    let frame = proc.frame_size();
    if frame > 0 {
      self.ins(&format!("sub rsp, {frame}"));
    }
    for param in &proc.params {
      if let Some(reg) = param.reg.name() {
        self.ins(&format!("mov [rbp{:+}], {reg}", param.offset));
      }
    }

    for stmt in &decl.body {
      self.emit_stmt(stmt)?;
    }

    self.ins("mov rsp, rbp");
    self.ins("pop rbp");
    self.ins("ret");
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Assign { target, value } => {
        self.emit_var_addr(target)?;
        self.ins("push rax");
        self.emit_expr(value)?;
        self.ins("pop rcx");
        self.ins("mov [rcx], rax");
        Ok(())
      }
      Stmt::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let false_label = self.new_label();
        self.emit_cond(cond, &false_label)?;
        self.emit_stmt(then_branch)?;
        match else_branch {
          Some(else_branch) => {
            let end_label = self.new_label();
            self.ins(&format!("jmp {end_label}"));
            self.label_line(&false_label);
            self.emit_stmt(else_branch)?;
            self.label_line(&end_label);
          }
          None => self.label_line(&false_label),
        }
        Ok(())
      }
      Stmt::While { cond, body } => {
        let top_label = self.new_label();
        let bottom_label = self.new_label();
        self.label_line(&top_label);
        self.emit_cond(cond, &bottom_label)?;
        self.emit_stmt(body)?;
        self.ins(&format!("jmp {top_label}"));
        self.label_line(&bottom_label);
        Ok(())
      }
      Stmt::Call { callee, args } => self.emit_call(callee, args),
      Stmt::Block(body) => {
        for stmt in body {
          self.emit_stmt(stmt)?;
        }
        Ok(())
      }
    }
  }

  /// Evaluate both sides, compare, and jump to `false_label` on the
  /// inverted condition.
  fn emit_cond(&mut self, cond: &Cond, false_label: &str) -> CompileResult<()> {
    self.emit_expr(&cond.lhs)?;
    self.ins("push rax");
    self.emit_expr(&cond.rhs)?;
    self.ins("pop rcx");
    self.ins("cmp rcx, rax");
    let jump = match cond.op {
      CmpOp::Eq => "jne",
      CmpOp::Ne => "je",
      CmpOp::Lt => "jge",
      CmpOp::Le => "jg",
      CmpOp::Gt => "jle",
      CmpOp::Ge => "jl",
    };
    self.ins(&format!("{jump} {false_label}"));
    Ok(())
  }

  /// Arguments are evaluated right to left through the stack, then the
  /// first six are popped into their registers and the rest stored into
  /// the outgoing area.
  fn emit_call(&mut self, callee: &str, args: &[Expr]) -> CompileResult<()> {
    let proc = self.procedure_named(callee)?;
    if args.len() != proc.params.len() {
      return Err(CompileError::internal(
        "call arity mismatch after type checking",
      ));
    }

    for (arg, param) in args.iter().zip(&proc.params).rev() {
      if param.is_ref {
        let var = arg
          .as_var()
          .ok_or_else(|| CompileError::internal("ref argument is not an lvalue"))?;
        self.emit_var_addr(var)?;
      } else {
        self.emit_expr(arg)?;
      }
      self.ins("push rax");
    }

    for reg in ARG_REGS.iter().take(args.len()) {
      self.ins(&format!("pop {reg}"));
    }

    // Remaining temporaries drain top-down into the outgoing slots;
    // after each pop the target slot sits a constant 8*(k-1) above RSP.
    let stack_args = args.len().saturating_sub(MAX_REG_ARGS);
    if stack_args > 0 {
      let disp = 8 * (stack_args as i64 - 1);
      for _ in 0..stack_args {
        self.ins("pop rax");
        if disp == 0 {
          self.ins("mov [rsp], rax");
        } else {
          self.ins(&format!("mov [rsp+{disp}], rax"));
        }
      }
    }

    self.ins(&format!("call {callee}"));
    Ok(())
  }

  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::IntLit { value, .. } => {
        self.ins(&format!("mov rax, {value}"));
        Ok(())
      }
      Expr::Binary { op, lhs, rhs, .. } => {
        self.emit_expr(lhs)?;
        self.ins("push rax");
        self.emit_expr(rhs)?;
        self.ins("pop rcx");
        match op {
          BinOp::Add => self.ins("add rax, rcx"),
          BinOp::Sub => {
            self.ins("sub rcx, rax");
            self.ins("mov rax, rcx");
          }
          BinOp::Mul => self.ins("imul rax, rcx"),
          BinOp::Div => {
            self.ins("xchg rax, rcx");
            self.ins("cqo");
            self.ins("idiv rcx");
          }
        }
        Ok(())
      }
      Expr::Neg { operand, .. } => {
        self.emit_expr(operand)?;
        self.ins("neg rax");
        Ok(())
      }
      Expr::Var { var, .. } => {
        match var {
          // Named scalars load straight from their slot; ref parameters
          // hold a pointer there and need one more hop.
          Var::Named { name, symbol } => {
            let id = symbol.ok_or_else(|| {
              CompileError::internal(format!("symbol of '{name}' left unresolved"))
            })?;
            let variable = self.symbols.variable(id)?;
            self.ins(&format!("mov rax, [rbp{:+}]", variable.offset));
            if variable.is_ref {
              self.ins("mov rax, [rax]");
            }
          }
          Var::Indexed { .. } => {
            self.emit_var_addr(var)?;
            self.ins("mov rax, [rax]");
          }
        }
        Ok(())
      }
    }
  }

  /// Leave the address of a variable designator in RAX. Ref parameters
  /// hold a pointer in their slot; everything else lives in the frame.
  fn emit_var_addr(&mut self, var: &Var) -> CompileResult<()> {
    match var {
      Var::Named { name, symbol } => {
        let id = symbol.ok_or_else(|| {
          CompileError::internal(format!("symbol of '{name}' left unresolved"))
        })?;
        let variable = self.symbols.variable(id)?;
        if variable.is_ref {
          self.ins(&format!("mov rax, [rbp{:+}]", variable.offset));
        } else {
          self.ins(&format!("lea rax, [rbp{:+}]", variable.offset));
        }
        Ok(())
      }
      Var::Indexed { base, index } => {
        let (count, elem) = match self.symbols.entry(self.symbols.resolve(self.var_type(base)?))
        {
          SymbolEntry::ArrayType { elem, count, .. } => (*count, *elem),
          _ => {
            return Err(CompileError::internal("indexed base is not an array"));
          }
        };
        let elem_size = self.symbols.size_of(elem);

        self.emit_var_addr(base)?;
        self.ins("push rax");
        self.emit_expr(index)?;

        // Unsigned compare catches negative indexes as well. The
        // failure path may run with transient pushes outstanding (the
        // base address here, plus any enclosing intermediates), so it
        // realigns RSP before the call; exit never returns.
        let ok_label = self.new_label();
        self.ins(&format!("mov rcx, {count}"));
        self.ins("cmp rax, rcx");
        self.ins(&format!("jb {ok_label}"));
        self.ins("and rsp, -16");
        self.ins("call exit");
        self.label_line(&ok_label);

        self.ins("pop rcx");
        if elem_size == 8 {
          self.ins("lea rax, [rcx+rax*8]");
        } else {
          self.ins(&format!("imul rax, rax, {elem_size}"));
          self.ins("add rax, rcx");
        }
        Ok(())
      }
    }
  }

  /// Declared type of a designator, for array metadata during indexing.
  fn var_type(&self, var: &Var) -> CompileResult<SymbolId> {
    match var {
      Var::Named { name, symbol } => {
        let id = symbol.ok_or_else(|| {
          CompileError::internal(format!("symbol of '{name}' left unresolved"))
        })?;
        Ok(self.symbols.variable(id)?.ty)
      }
      Var::Indexed { base, .. } => {
        match self.symbols.entry(self.symbols.resolve(self.var_type(base)?)) {
          SymbolEntry::ArrayType { elem, .. } => Ok(*elem),
          _ => Err(CompileError::internal("indexed base is not an array")),
        }
      }
    }
  }

  fn procedure_named(&self, name: &str) -> CompileResult<Procedure> {
    let id = self
      .symbols
      .lookup_global(name)
      .ok_or_else(|| CompileError::internal(format!("procedure '{name}' not in table")))?;
    Ok(self.symbols.procedure(id)?.clone())
  }

  fn new_label(&mut self) -> String {
    let label = format!(".L{}", self.labels);
    self.labels += 1;
    label
  }

  fn ins(&mut self, text: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(text);
    self.asm.push('\n');
  }

  fn label_line(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }
}
