//! Code generation: lower the parsed AST into AT&T x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack and statements pop intermediate results as we chain
//! them. Locals live on the stack frame and are addressed relative to `%rbp`.

use crate::error::{CompileError, CompileResult};
use crate::parser::{AstNode, BinaryOp, Function, Stmt};

/// Integer argument registers of the System V calling convention, in order.
const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Emit assembly for a function.
pub fn generate(func: &Function) -> CompileResult<String> {
  let stack_size = func.locals.stack_size();
  let mut cg = CodeGen::new();
  cg.asm.push_str(".att_syntax prefix\n");
  cg.asm.push_str(".globl main\n");
  cg.asm.push_str("main:\n");
  cg.asm.push_str("    push %rbp\n");
  cg.asm.push_str("    mov %rsp, %rbp\n");
  if stack_size > 0 {
    cg.asm.push_str(&format!("    sub ${stack_size}, %rsp\n"));
  }

  for stmt in &func.body {
    cg.emit_stmt(stmt)?;
  }

  // Falling off the end returns whatever the last expression left in %rax.
  cg.emit_epilogue();

  tracing::debug!(
    stack_size,
    labels = cg.label_count,
    "generated assembly"
  );
  Ok(cg.asm)
}

/// Per-compilation emitter state.
struct CodeGen {
  asm: String,
  label_count: usize,
}

impl CodeGen {
  fn new() -> Self {
    Self {
      asm: String::new(),
      label_count: 0,
    }
  }

  /// Hand out a label index that no other construct in this run uses.
  fn next_label(&mut self) -> usize {
    let label = self.label_count;
    self.label_count += 1;
    label
  }

  fn emit_epilogue(&mut self) {
    self.asm.push_str("    mov %rbp, %rsp\n");
    self.asm.push_str("    pop %rbp\n");
    self.asm.push_str("    ret\n");
  }

  /// Pop the condition value and jump to `target` when it is zero.
  fn emit_branch_if_zero(&mut self, target: &str) {
    self.asm.push_str("    pop %rax\n");
    self.asm.push_str("    cmp $0, %rax\n");
    self.asm.push_str(&format!("    je {target}\n"));
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Expr(expr) => {
        self.emit_expr(expr)?;
        self.asm.push_str("    pop %rax\n");
      }
      Stmt::Return(expr) => {
        self.emit_expr(expr)?;
        self.asm.push_str("    pop %rax\n");
        self.emit_epilogue();
      }
      Stmt::If { cond, then, els } => {
        let label = self.next_label();
        self.emit_expr(cond)?;
        match els {
          Some(els) => {
            self.emit_branch_if_zero(&format!(".L.else.{label}"));
            self.emit_stmt(then)?;
            self.asm.push_str(&format!("    jmp .L.end.{label}\n"));
            self.asm.push_str(&format!(".L.else.{label}:\n"));
            self.emit_stmt(els)?;
          }
          None => {
            self.emit_branch_if_zero(&format!(".L.end.{label}"));
            self.emit_stmt(then)?;
          }
        }
        self.asm.push_str(&format!(".L.end.{label}:\n"));
      }
      Stmt::While { cond, body } => {
        let label = self.next_label();
        self.asm.push_str(&format!(".L.begin.{label}:\n"));
        self.emit_expr(cond)?;
        self.emit_branch_if_zero(&format!(".L.end.{label}"));
        self.emit_stmt(body)?;
        self.asm.push_str(&format!("    jmp .L.begin.{label}\n"));
        self.asm.push_str(&format!(".L.end.{label}:\n"));
      }
      Stmt::For {
        init,
        cond,
        inc,
        body,
      } => {
        let label = self.next_label();
        if let Some(init) = init {
          self.emit_expr(init)?;
          self.asm.push_str("    pop %rax\n");
        }
        self.asm.push_str(&format!(".L.begin.{label}:\n"));
        if let Some(cond) = cond {
          self.emit_expr(cond)?;
          self.emit_branch_if_zero(&format!(".L.end.{label}"));
        }
        self.emit_stmt(body)?;
        if let Some(inc) = inc {
          self.emit_expr(inc)?;
          self.asm.push_str("    pop %rax\n");
        }
        self.asm.push_str(&format!("    jmp .L.begin.{label}\n"));
        self.asm.push_str(&format!(".L.end.{label}:\n"));
      }
      Stmt::Block(body) => {
        for stmt in body {
          self.emit_stmt(stmt)?;
        }
      }
    }
    Ok(())
  }

  /// Emit stack-based code for a single expression node.
  fn emit_expr(&mut self, node: &AstNode) -> CompileResult<()> {
    match node {
      AstNode::Num { value } => {
        self.asm.push_str(&format!("    mov ${value}, %rax\n"));
        self.asm.push_str("    push %rax\n");
      }
      AstNode::Var { .. } => {
        self.emit_addr(node)?;
        self.asm.push_str("    pop %rax\n");
        self.asm.push_str("    mov (%rax), %rax\n");
        self.asm.push_str("    push %rax\n");
      }
      AstNode::Assign { lhs, rhs } => {
        self.emit_addr(lhs)?;
        self.emit_expr(rhs)?;
        self.asm.push_str("    pop %rdi\n");
        self.asm.push_str("    pop %rax\n");
        self.asm.push_str("    mov %rdi, (%rax)\n");
        self.asm.push_str("    push %rdi\n");
      }
      AstNode::Call { name, args } => self.emit_call(name, args)?,
      AstNode::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.asm.push_str("    pop %rdi\n");
        self.asm.push_str("    pop %rax\n");
        match op {
          BinaryOp::Add => self.asm.push_str("    add %rdi, %rax\n"),
          BinaryOp::Sub => self.asm.push_str("    sub %rdi, %rax\n"),
          BinaryOp::Mul => self.asm.push_str("    imul %rdi, %rax\n"),
          BinaryOp::Div => {
            self.asm.push_str("    cqo\n");
            self.asm.push_str("    idiv %rdi\n");
          }
          BinaryOp::Eq => self.emit_compare("sete"),
          BinaryOp::Ne => self.emit_compare("setne"),
          BinaryOp::Lt => self.emit_compare("setl"),
          BinaryOp::Le => self.emit_compare("setle"),
        }
        self.asm.push_str("    push %rax\n");
      }
    }
    Ok(())
  }

  /// Compare `%rax` against `%rdi` and leave 0/1 in `%rax`.
  fn emit_compare(&mut self, set: &str) {
    self.asm.push_str("    cmp %rdi, %rax\n");
    self.asm.push_str(&format!("    {set} %al\n"));
    self.asm.push_str("    movzb %al, %rax\n");
  }

  fn emit_call(&mut self, name: &str, args: &[AstNode]) -> CompileResult<()> {
    for arg in args {
      self.emit_expr(arg)?;
    }
    for reg in ARG_REGS.iter().take(args.len()).rev() {
      self.asm.push_str(&format!("    pop {reg}\n"));
    }

    // Pad so %rsp is 16-byte aligned at the call; the pad itself is pushed
    // and contributes 8 bytes.
    self.asm.push_str("    mov %rsp, %rax\n");
    self.asm.push_str("    and $8, %rax\n");
    self.asm.push_str("    xor $8, %rax\n");
    self.asm.push_str("    sub %rax, %rsp\n");
    self.asm.push_str("    push %rax\n");
    self.asm.push_str("    mov $0, %rax\n");
    self.asm.push_str(&format!("    call {name}\n"));
    self.asm.push_str("    pop %rdi\n");
    self.asm.push_str("    add %rdi, %rsp\n");
    self.asm.push_str("    push %rax\n");
    Ok(())
  }

  fn emit_addr(&mut self, node: &AstNode) -> CompileResult<()> {
    match node {
      AstNode::Var { offset } => {
        self.asm.push_str(&format!("    lea -{offset}(%rbp), %rax\n"));
        self.asm.push_str("    push %rax\n");
        Ok(())
      }
      _ => Err(CompileError::NotAnLvalue),
    }
  }
}
