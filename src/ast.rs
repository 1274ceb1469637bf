//! Abstract syntax tree produced by the parser.
//!
//! Expression nodes reserve a type slot that starts out unset and is
//! filled in by the semantic phase; no later phase may see `None` there.
//! Named variables likewise carry a symbol handle resolved during type
//! checking so code generation never repeats a table lookup.

use crate::symtab::SymbolId;

/// Handle stored in every expression node, `None` until type checking.
pub type TypeSlot = Option<SymbolId>;

#[derive(Debug, Clone)]
pub struct Program {
  pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub enum Decl {
  Type(TypeDecl),
  Proc(ProcDecl),
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
  pub name: String,
  pub ty: TypeExpr,
}

/// A type expression as written in the source: either the use of a named
/// type or a fixed-size array over another type expression.
#[derive(Debug, Clone)]
pub enum TypeExpr {
  Name(String),
  Array { len: i64, elem: Box<TypeExpr> },
}

#[derive(Debug, Clone)]
pub struct ProcDecl {
  pub name: String,
  pub params: Vec<Param>,
  pub vars: Vec<VarDecl>,
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Param {
  pub name: String,
  pub is_ref: bool,
  pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
  pub name: String,
  pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub enum Stmt {
  Assign {
    target: Var,
    value: Expr,
  },
  If {
    cond: Cond,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
  },
  While {
    cond: Cond,
    body: Box<Stmt>,
  },
  Call {
    callee: String,
    args: Vec<Expr>,
  },
  Block(Vec<Stmt>),
}

/// Comparison operators. Legal only as the condition of `if`/`while`;
/// SPL has no boolean values outside control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

#[derive(Debug, Clone)]
pub struct Cond {
  pub op: CmpOp,
  pub lhs: Expr,
  pub rhs: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
}

#[derive(Debug, Clone)]
pub enum Expr {
  IntLit {
    value: i64,
    ty: TypeSlot,
  },
  Binary {
    op: BinOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
    ty: TypeSlot,
  },
  Neg {
    operand: Box<Expr>,
    ty: TypeSlot,
  },
  Var {
    var: Var,
    ty: TypeSlot,
  },
}

/// A variable designator: a plain name or an indexed element of another
/// designator. Both are lvalues.
#[derive(Debug, Clone)]
pub enum Var {
  Named {
    name: String,
    symbol: Option<SymbolId>,
  },
  Indexed {
    base: Box<Var>,
    index: Box<Expr>,
  },
}

impl Expr {
  pub fn int(value: i64) -> Self {
    Self::IntLit { value, ty: None }
  }

  pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
      ty: None,
    }
  }

  pub fn neg(operand: Expr) -> Self {
    Self::Neg {
      operand: Box::new(operand),
      ty: None,
    }
  }

  pub fn var(var: Var) -> Self {
    Self::Var { var, ty: None }
  }

  pub fn ty(&self) -> TypeSlot {
    match self {
      Expr::IntLit { ty, .. }
      | Expr::Binary { ty, .. }
      | Expr::Neg { ty, .. }
      | Expr::Var { ty, .. } => *ty,
    }
  }

  pub fn ty_mut(&mut self) -> &mut TypeSlot {
    match self {
      Expr::IntLit { ty, .. }
      | Expr::Binary { ty, .. }
      | Expr::Neg { ty, .. }
      | Expr::Var { ty, .. } => ty,
    }
  }

  /// The underlying designator if this expression is a plain variable
  /// reference; `ref` and array arguments must satisfy this.
  pub fn as_var(&self) -> Option<&Var> {
    match self {
      Expr::Var { var, .. } => Some(var),
      _ => None,
    }
  }
}

impl Var {
  pub fn named(name: impl Into<String>) -> Self {
    Self::Named {
      name: name.into(),
      symbol: None,
    }
  }

  pub fn indexed(base: Var, index: Expr) -> Self {
    Self::Indexed {
      base: Box::new(base),
      index: Box::new(index),
    }
  }
}
