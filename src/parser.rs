//! Recursive-descent parser producing the declaration/statement/expression AST.
//!
//! The parser mirrors the classic chibicc structure: a thin cursor over
//! the token vector plus one function per grammar production. Precedence
//! is encoded in the descent (`expr` over `term` over `factor`);
//! comparisons sit outside that ladder because they are only legal as
//! the parenthesised condition of `if` and `while`.

use crate::ast::{
  BinOp, CmpOp, Cond, Decl, Expr, Param, ProcDecl, Program, Stmt, TypeDecl, TypeExpr, Var,
  VarDecl,
};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::Token;

/// Parse the token stream into a program: a sequence of type and
/// procedure declarations.
pub fn parse(tokens: Vec<Token>) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens);
  let mut decls = Vec::new();

  while !stream.at_eof() {
    match stream.peek() {
      Token::KwType => decls.push(Decl::Type(parse_type_decl(&mut stream)?)),
      Token::KwProc => decls.push(Decl::Proc(parse_proc_decl(&mut stream)?)),
      other => {
        return Err(CompileError::syntactic(format!(
          "expected 'type' or 'proc' at top level, found {other}"
        )));
      }
    }
  }

  Ok(Program { decls })
}

fn parse_type_decl(stream: &mut TokenStream) -> CompileResult<TypeDecl> {
  stream.skip(&Token::KwType)?;
  let name = stream.get_ident()?;
  stream.skip(&Token::Eq)?;
  let ty = parse_type(stream)?;
  stream.skip(&Token::Semi)?;
  Ok(TypeDecl { name, ty })
}

/// `type = "array" "[" intLit "]" "of" type | ident`
fn parse_type(stream: &mut TokenStream) -> CompileResult<TypeExpr> {
  if stream.eat(&Token::KwArray) {
    stream.skip(&Token::LBracket)?;
    let len = stream.get_int()?;
    stream.skip(&Token::RBracket)?;
    stream.skip(&Token::KwOf)?;
    let elem = parse_type(stream)?;
    Ok(TypeExpr::Array {
      len,
      elem: Box::new(elem),
    })
  } else {
    Ok(TypeExpr::Name(stream.get_ident()?))
  }
}

fn parse_proc_decl(stream: &mut TokenStream) -> CompileResult<ProcDecl> {
  stream.skip(&Token::KwProc)?;
  let name = stream.get_ident()?;

  stream.skip(&Token::LParen)?;
  let mut params = Vec::new();
  if !stream.eat(&Token::RParen) {
    loop {
      let is_ref = stream.eat(&Token::KwRef);
      let param_name = stream.get_ident()?;
      stream.skip(&Token::Colon)?;
      let ty = parse_type(stream)?;
      params.push(Param {
        name: param_name,
        is_ref,
        ty,
      });
      if !stream.eat(&Token::Comma) {
        break;
      }
    }
    stream.skip(&Token::RParen)?;
  }

  stream.skip(&Token::LBrace)?;
  let mut vars = Vec::new();
  while stream.eat(&Token::KwVar) {
    let var_name = stream.get_ident()?;
    stream.skip(&Token::Colon)?;
    let ty = parse_type(stream)?;
    stream.skip(&Token::Semi)?;
    vars.push(VarDecl { name: var_name, ty });
  }

  let mut body = Vec::new();
  while !stream.eat(&Token::RBrace) {
    body.push(parse_stmt(stream)?);
  }

  Ok(ProcDecl {
    name,
    params,
    vars,
    body,
  })
}

// ----- Statement parsing -----

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  match stream.peek() {
    Token::KwIf => parse_if_stmt(stream),
    Token::KwWhile => parse_while_stmt(stream),
    Token::LBrace => parse_block(stream),
    Token::Ident(_) => {
      // Both calls and assignments start with an identifier; one token
      // of lookahead decides.
      if *stream.peek_second() == Token::LParen {
        parse_call_stmt(stream)
      } else {
        parse_assign_stmt(stream)
      }
    }
    other => Err(CompileError::syntactic(format!(
      "expected a statement, found {other}"
    ))),
  }
}

fn parse_block(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(&Token::LBrace)?;
  let mut body = Vec::new();
  while !stream.eat(&Token::RBrace) {
    body.push(parse_stmt(stream)?);
  }
  Ok(Stmt::Block(body))
}

fn parse_assign_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let target = parse_var(stream)?;
  stream.skip(&Token::Assign)?;
  let value = parse_expr(stream)?;
  stream.skip(&Token::Semi)?;
  Ok(Stmt::Assign { target, value })
}

fn parse_if_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(&Token::KwIf)?;
  stream.skip(&Token::LParen)?;
  let cond = parse_cmp(stream)?;
  stream.skip(&Token::RParen)?;
  let then_branch = Box::new(parse_stmt(stream)?);
  let else_branch = if stream.eat(&Token::KwElse) {
    Some(Box::new(parse_stmt(stream)?))
  } else {
    None
  };
  Ok(Stmt::If {
    cond,
    then_branch,
    else_branch,
  })
}

fn parse_while_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  stream.skip(&Token::KwWhile)?;
  stream.skip(&Token::LParen)?;
  let cond = parse_cmp(stream)?;
  stream.skip(&Token::RParen)?;
  let body = Box::new(parse_stmt(stream)?);
  Ok(Stmt::While { cond, body })
}

fn parse_call_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let callee = stream.get_ident()?;
  stream.skip(&Token::LParen)?;
  let mut args = Vec::new();
  if !stream.eat(&Token::RParen) {
    loop {
      args.push(parse_expr(stream)?);
      if !stream.eat(&Token::Comma) {
        break;
      }
    }
    stream.skip(&Token::RParen)?;
  }
  stream.skip(&Token::Semi)?;
  Ok(Stmt::Call { callee, args })
}

// ----- Expression parsing -----

/// `cmp = expr cmpOp expr`, only reachable from `if`/`while`.
fn parse_cmp(stream: &mut TokenStream) -> CompileResult<Cond> {
  let lhs = parse_expr(stream)?;
  let op = match stream.peek() {
    Token::Eq => CmpOp::Eq,
    Token::Ne => CmpOp::Ne,
    Token::Lt => CmpOp::Lt,
    Token::Le => CmpOp::Le,
    Token::Gt => CmpOp::Gt,
    Token::Ge => CmpOp::Ge,
    other => {
      return Err(CompileError::syntactic(format!(
        "expected a comparison operator, found {other}"
      )));
    }
  };
  stream.advance();
  let rhs = parse_expr(stream)?;
  Ok(Cond { op, lhs, rhs })
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_term(stream)?;
  loop {
    let op = match stream.peek() {
      Token::Plus => BinOp::Add,
      Token::Minus => BinOp::Sub,
      _ => break,
    };
    stream.advance();
    let rhs = parse_term(stream)?;
    node = Expr::binary(op, node, rhs);
  }
  Ok(node)
}

fn parse_term(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_factor(stream)?;
  loop {
    let op = match stream.peek() {
      Token::Star => BinOp::Mul,
      Token::Slash => BinOp::Div,
      _ => break,
    };
    stream.advance();
    let rhs = parse_factor(stream)?;
    node = Expr::binary(op, node, rhs);
  }
  Ok(node)
}

fn parse_factor(stream: &mut TokenStream) -> CompileResult<Expr> {
  match stream.peek().clone() {
    Token::IntLit(value) => {
      stream.advance();
      Ok(Expr::int(value))
    }
    // Character literals are just integers with nicer spelling.
    Token::CharLit(value) => {
      stream.advance();
      Ok(Expr::int(value))
    }
    Token::Minus => {
      stream.advance();
      Ok(Expr::neg(parse_factor(stream)?))
    }
    Token::LParen => {
      stream.advance();
      let node = parse_expr(stream)?;
      stream.skip(&Token::RParen)?;
      Ok(node)
    }
    Token::Ident(_) => Ok(Expr::var(parse_var(stream)?)),
    other => Err(CompileError::syntactic(format!(
      "expected an expression, found {other}"
    ))),
  }
}

/// `var = ident { "[" expr "]" }`
fn parse_var(stream: &mut TokenStream) -> CompileResult<Var> {
  let name = stream.get_ident()?;
  let mut var = Var::named(name);
  while stream.eat(&Token::LBracket) {
    let index = parse_expr(stream)?;
    stream.skip(&Token::RBracket)?;
    var = Var::indexed(var, index);
  }
  Ok(var)
}

/// Lightweight cursor over the token vector.
struct TokenStream {
  tokens: Vec<Token>,
  pos: usize,
}

const EOF: Token = Token::Eof;

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self) -> &Token {
    self.tokens.get(self.pos).unwrap_or(&EOF)
  }

  fn peek_second(&self) -> &Token {
    self.tokens.get(self.pos + 1).unwrap_or(&EOF)
  }

  fn advance(&mut self) {
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Consume the current token if it matches.
  fn eat(&mut self, token: &Token) -> bool {
    if self.peek() == token {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, token: &Token) -> CompileResult<()> {
    if self.eat(token) {
      Ok(())
    } else {
      Err(CompileError::syntactic(format!(
        "expected {token}, found {}",
        self.peek()
      )))
    }
  }

  fn get_ident(&mut self) -> CompileResult<String> {
    match self.peek() {
      Token::Ident(name) => {
        let name = name.clone();
        self.advance();
        Ok(name)
      }
      other => Err(CompileError::syntactic(format!(
        "expected an identifier, found {other}"
      ))),
    }
  }

  fn get_int(&mut self) -> CompileResult<i64> {
    match *self.peek() {
      Token::IntLit(value) => {
        self.advance();
        Ok(value)
      }
      ref other => Err(CompileError::syntactic(format!(
        "expected an integer literal, found {other}"
      ))),
    }
  }

  fn at_eof(&self) -> bool {
    *self.peek() == Token::Eof
  }
}
