//! Recursive-descent parser producing a statement list and expression AST.
//!
//! The parser mirrors the classic chibicc structure: one helper per grammar
//! production, lowest precedence first. Locals are resolved while parsing, so
//! the returned `Function` is ready for code generation as is.
//!
//! ```text
//! program    = stmt*
//! stmt       = "{" stmt* "}"
//!            | "if" "(" expr ")" stmt ("else" stmt)?
//!            | "while" "(" expr ")" stmt
//!            | "for" "(" expr? ";" expr? ";" expr? ")" stmt
//!            | "return" expr ";"
//!            | expr ";"
//! expr       = assign
//! assign     = equality ("=" assign)?
//! equality   = relational (("==" | "!=") relational)*
//! relational = add (("<" | "<=" | ">" | ">=") add)*
//! add        = mul (("+" | "-") mul)*
//! mul        = unary (("*" | "/") unary)*
//! unary      = ("+" | "-")? primary
//! primary    = num | ident ("(" (expr ("," expr)*)? ")")? | "(" expr ")"
//! ```

use crate::error::{CompileError, CompileResult};
use crate::locals::LocalTable;
use crate::tokenizer::{Keyword, Token, TokenKind, describe_token, token_text};

/// Integer argument registers available to a call site.
pub const MAX_CALL_ARGS: usize = 6;

/// Deepest statement/expression nesting accepted before giving up with a
/// diagnostic instead of exhausting the native stack.
pub const MAX_NESTING: usize = 128;

/// Binary operators recognised by the language.
///
/// `>` and `>=` never appear here: the parser swaps their operands and emits
/// `Lt`/`Le` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Var {
    offset: i64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Assign {
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Call {
    name: String,
    args: Vec<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(offset: i64) -> Self {
    Self::Var { offset }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(lhs: AstNode, rhs: AstNode) -> Self {
    Self::Assign {
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn call(name: impl Into<String>, args: Vec<AstNode>) -> Self {
    Self::Call {
      name: name.into(),
      args,
    }
  }
}

/// Statements. Only `Expr` leaves a value behind, which the code generator
/// discards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Expr(AstNode),
  Return(AstNode),
  If {
    cond: AstNode,
    then: Box<Stmt>,
    els: Option<Box<Stmt>>,
  },
  While {
    cond: AstNode,
    body: Box<Stmt>,
  },
  For {
    init: Option<AstNode>,
    cond: Option<AstNode>,
    inc: Option<AstNode>,
    body: Box<Stmt>,
  },
  Block(Vec<Stmt>),
}

/// The single implicit `main` function: its statements and its locals.
#[derive(Debug, Clone)]
pub struct Function {
  pub body: Vec<Stmt>,
  pub locals: LocalTable,
}

/// Parse a sequence of statements from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Function> {
  let mut parser = Parser::new(tokens, source);

  let mut body = Vec::new();
  while !parser.stream.is_eof() {
    body.push(parser.stmt()?);
  }

  let locals = parser.locals;
  tracing::debug!(
    statements = body.len(),
    locals = locals.len(),
    "parsed program"
  );
  Ok(Function { body, locals })
}

/// Parsing context: the token cursor plus the locals discovered so far.
struct Parser<'a> {
  stream: TokenStream<'a>,
  locals: LocalTable,
  depth: usize,
}

impl<'a> Parser<'a> {
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      stream: TokenStream::new(tokens, source),
      locals: LocalTable::new(),
      depth: 0,
    }
  }

  /// Run `f` one nesting level deeper, failing once `MAX_NESTING` is reached.
  fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
    if self.depth == MAX_NESTING {
      return Err(self.stream.error_here(format!(
        "nesting too deep (at most {MAX_NESTING} levels are supported)"
      )));
    }
    self.depth += 1;
    let result = f(self);
    self.depth -= 1;
    result
  }

  fn stmt(&mut self) -> CompileResult<Stmt> {
    self.nested(Self::stmt_body)
  }

  fn stmt_body(&mut self) -> CompileResult<Stmt> {
    if self.stream.equal("{") {
      let mut body = Vec::new();
      while !self.stream.equal("}") {
        if self.stream.is_eof() {
          return Err(self.stream.error_here("expected \"}\", but got \"EOF\""));
        }
        body.push(self.stmt()?);
      }
      return Ok(Stmt::Block(body));
    }

    if self.stream.equal_keyword(Keyword::If) {
      self.stream.skip("(")?;
      let cond = self.expr()?;
      self.stream.skip(")")?;
      let then = Box::new(self.stmt()?);
      let els = if self.stream.equal_keyword(Keyword::Else) {
        Some(Box::new(self.stmt()?))
      } else {
        None
      };
      return Ok(Stmt::If { cond, then, els });
    }

    if self.stream.equal_keyword(Keyword::While) {
      self.stream.skip("(")?;
      let cond = self.expr()?;
      self.stream.skip(")")?;
      let body = Box::new(self.stmt()?);
      return Ok(Stmt::While { cond, body });
    }

    if self.stream.equal_keyword(Keyword::For) {
      self.stream.skip("(")?;
      let init = self.optional_expr(";")?;
      let cond = self.optional_expr(";")?;
      let inc = self.optional_expr(")")?;
      let body = Box::new(self.stmt()?);
      return Ok(Stmt::For {
        init,
        cond,
        inc,
        body,
      });
    }

    if self.stream.equal_keyword(Keyword::Return) {
      let expr = self.expr()?;
      self.stream.skip(";")?;
      return Ok(Stmt::Return(expr));
    }

    let expr = self.expr()?;
    self.stream.skip(";")?;
    Ok(Stmt::Expr(expr))
  }

  /// Parse `expr? <terminator>`, as used by the three clauses of `for`.
  fn optional_expr(&mut self, terminator: &str) -> CompileResult<Option<AstNode>> {
    if self.stream.equal(terminator) {
      return Ok(None);
    }
    let expr = self.expr()?;
    self.stream.skip(terminator)?;
    Ok(Some(expr))
  }

  fn expr(&mut self) -> CompileResult<AstNode> {
    self.assign()
  }

  // Every recursive path through expressions (parentheses, call arguments,
  // chained `=`) re-enters here, so this is where nesting is counted.
  fn assign(&mut self) -> CompileResult<AstNode> {
    self.nested(Self::assign_body)
  }

  fn assign_body(&mut self) -> CompileResult<AstNode> {
    let node = self.equality()?;

    if self.stream.equal("=") {
      let rhs = self.assign()?;
      return Ok(AstNode::assign(node, rhs));
    }

    Ok(node)
  }

  fn equality(&mut self) -> CompileResult<AstNode> {
    let mut node = self.relational()?;

    loop {
      if self.stream.equal("==") {
        node = AstNode::binary(BinaryOp::Eq, node, self.relational()?);
      } else if self.stream.equal("!=") {
        node = AstNode::binary(BinaryOp::Ne, node, self.relational()?);
      } else {
        return Ok(node);
      }
    }
  }

  fn relational(&mut self) -> CompileResult<AstNode> {
    let mut node = self.add()?;

    loop {
      if self.stream.equal("<") {
        node = AstNode::binary(BinaryOp::Lt, node, self.add()?);
      } else if self.stream.equal("<=") {
        node = AstNode::binary(BinaryOp::Le, node, self.add()?);
      } else if self.stream.equal(">") {
        let rhs = self.add()?;
        node = AstNode::binary(BinaryOp::Lt, rhs, node);
      } else if self.stream.equal(">=") {
        let rhs = self.add()?;
        node = AstNode::binary(BinaryOp::Le, rhs, node);
      } else {
        return Ok(node);
      }
    }
  }

  fn add(&mut self) -> CompileResult<AstNode> {
    let mut node = self.mul()?;

    loop {
      if self.stream.equal("+") {
        node = AstNode::binary(BinaryOp::Add, node, self.mul()?);
      } else if self.stream.equal("-") {
        node = AstNode::binary(BinaryOp::Sub, node, self.mul()?);
      } else {
        return Ok(node);
      }
    }
  }

  fn mul(&mut self) -> CompileResult<AstNode> {
    let mut node = self.unary()?;

    loop {
      if self.stream.equal("*") {
        node = AstNode::binary(BinaryOp::Mul, node, self.unary()?);
      } else if self.stream.equal("/") {
        node = AstNode::binary(BinaryOp::Div, node, self.unary()?);
      } else {
        return Ok(node);
      }
    }
  }

  fn unary(&mut self) -> CompileResult<AstNode> {
    if self.stream.equal("+") {
      return self.primary();
    }

    if self.stream.equal("-") {
      let operand = self.primary()?;
      return Ok(AstNode::binary(BinaryOp::Sub, AstNode::number(0), operand));
    }

    self.primary()
  }

  fn primary(&mut self) -> CompileResult<AstNode> {
    if self.stream.equal("(") {
      let node = self.expr()?;
      self.stream.skip(")")?;
      return Ok(node);
    }

    if let Some(name) = self.stream.consume_ident() {
      if self.stream.equal("(") {
        let args = self.call_args()?;
        return Ok(AstNode::call(name, args));
      }
      let offset = self.locals.resolve(name);
      return Ok(AstNode::var(offset));
    }

    if let Some(value) = self.stream.consume_number() {
      return Ok(AstNode::number(value));
    }

    let got = describe_token(self.stream.peek(), self.stream.source);
    Err(
      self
        .stream
        .error_here(format!("expected an expression, but got \"{got}\"")),
    )
  }

  /// Parse the argument list of a call; the opening `(` is already consumed.
  fn call_args(&mut self) -> CompileResult<Vec<AstNode>> {
    let mut args = Vec::new();
    if self.stream.equal(")") {
      return Ok(args);
    }

    loop {
      let loc = self.stream.loc();
      let arg = self.expr()?;
      if args.len() == MAX_CALL_ARGS {
        return Err(CompileError::at(
          self.stream.source,
          loc,
          format!("too many arguments (at most {MAX_CALL_ARGS} are supported)"),
        ));
      }
      args.push(arg);
      if !self.stream.equal(",") {
        break;
      }
    }

    self.stream.skip(")")?;
    Ok(args)
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Byte offset of the current token, or the end of input.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Error anchored at the current token, or at the end of input.
  fn error_here(&self, message: impl Into<String>) -> CompileError {
    CompileError::at(self.source, self.loc(), message)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Punctuator
      && token.len == op.len()
      && token_text(token, self.source) == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn equal_keyword(&mut self, keyword: Keyword) -> bool {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Keyword(keyword)
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let got = describe_token(self.peek(), self.source);
      Err(self.error_here(format!("expected \"{s}\", but got \"{got}\"")))
    }
  }

  /// Consume the current token if it is an integer literal.
  fn consume_number(&mut self) -> Option<i64> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value;
      self.pos += 1;
      return value;
    }
    None
  }

  /// Consume the current token if it is an identifier.
  fn consume_ident(&mut self) -> Option<&'a str> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source);
      self.pos += 1;
      return Some(ident);
    }
    None
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
