//! Shared AST builders for the integration tests.
//!
//! The core consumes a ready-made AST from the external parser, so tests
//! assemble the trees by hand through these helpers.

#![allow(dead_code)]

use std::rc::Rc;

use qanun_core::error::QanunError;
use qanun_core::expr::{Expr, FunctionBody, ReferenceId};
use qanun_core::interpreter::Interpreter;
use qanun_core::resolver::{Resolutions, Resolver};
use qanun_core::stmt::Stmt;
use qanun_core::token::{Token, TokenType};
use qanun_core::value::Value;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ─────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────

pub fn ident(name: &str) -> Token {
    Token::new(TokenType::IDENTIFIER, name, 1)
}

pub fn token(token_type: TokenType, lexeme: &str) -> Token {
    Token::new(token_type, lexeme, 1)
}

// ─────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────

pub fn number(n: f64) -> Expr {
    Expr::Literal(Token::new(TokenType::NUMBER(n), n.to_string(), 1))
}

pub fn string(s: &str) -> Expr {
    Expr::Literal(Token::new(TokenType::STRING(s.to_string()), s, 1))
}

pub fn boolean(b: bool) -> Expr {
    if b {
        Expr::Literal(token(TokenType::TRUE, "true"))
    } else {
        Expr::Literal(token(TokenType::FALSE, "false"))
    }
}

pub fn nil() -> Expr {
    Expr::Literal(token(TokenType::NIL, "nil"))
}

pub fn variable(name: &str) -> Expr {
    Expr::variable(ident(name))
}

pub fn assign(name: &str, value: Expr) -> Expr {
    Expr::assign(ident(name), value)
}

pub fn binary(left: Expr, token_type: TokenType, lexeme: &str, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator: token(token_type, lexeme),
        right: Box::new(right),
    }
}

pub fn logical(left: Expr, token_type: TokenType, lexeme: &str, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        operator: token(token_type, lexeme),
        right: Box::new(right),
    }
}

pub fn unary(token_type: TokenType, lexeme: &str, operand: Expr, is_postfix: bool) -> Expr {
    Expr::Unary {
        operator: token(token_type, lexeme),
        operand: Box::new(operand),
        is_postfix,
    }
}

pub fn ternary(condition: Expr, when_true: Expr, when_false: Expr) -> Expr {
    Expr::Ternary {
        condition: Box::new(condition),
        when_true: Box::new(when_true),
        when_false: Box::new(when_false),
    }
}

pub fn grouping(inner: Expr) -> Expr {
    Expr::Grouping(Box::new(inner))
}

pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        paren: token(TokenType::RIGHT_PAREN, ")"),
        arguments,
    }
}

pub fn get(object: Expr, name: &str) -> Expr {
    Expr::Get {
        object: Box::new(object),
        name: ident(name),
    }
}

pub fn set(object: Expr, name: &str, value: Expr) -> Expr {
    Expr::Set {
        object: Box::new(object),
        name: ident(name),
        value: Box::new(value),
    }
}

pub fn this_expr() -> Expr {
    Expr::this(token(TokenType::THIS, "this"))
}

pub fn super_expr(method: &str) -> Expr {
    Expr::super_access(token(TokenType::SUPER, "super"), ident(method))
}

pub fn list(elements: Vec<Expr>) -> Expr {
    Expr::List {
        bracket: token(TokenType::LEFT_BRACKET, "["),
        elements,
    }
}

pub fn index(object: Expr, index: Expr) -> Expr {
    Expr::ListAccessor {
        object: Box::new(object),
        bracket: token(TokenType::LEFT_BRACKET, "["),
        index: Box::new(index),
    }
}

pub fn index_set(accessor: Expr, value: Expr) -> Expr {
    Expr::ListMutator {
        target: Box::new(accessor),
        value: Box::new(value),
    }
}

pub fn fun_body(params: &[&str], body: Vec<Stmt>) -> Rc<FunctionBody> {
    Rc::new(FunctionBody {
        params: params.iter().map(|p| ident(p)).collect(),
        body,
    })
}

pub fn anon(params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::AnonymousFun(fun_body(params, body))
}

/// The [`ReferenceId`] behind a variable-like expression, for distance
/// assertions.
pub fn ref_id(expr: &Expr) -> ReferenceId {
    match expr {
        Expr::Variable { id, .. } => *id,
        Expr::Assign { id, .. } => *id,
        Expr::This { id, .. } => *id,
        Expr::Super { id, .. } => *id,
        other => panic!("expression carries no reference id: {:?}", other),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────────

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expression(expr)
}

pub fn var_stmt(name: &str, initializer: Option<Expr>) -> Stmt {
    Stmt::Var {
        name: ident(name),
        initializer,
    }
}

pub fn val_stmt(name: &str, initializer: Expr) -> Stmt {
    Stmt::Val {
        name: ident(name),
        initializer,
    }
}

pub fn block(statements: Vec<Stmt>) -> Stmt {
    Stmt::Block(statements)
}

pub fn if_stmt(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
    Stmt::If {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    }
}

pub fn while_stmt(condition: Expr, body: Stmt) -> Stmt {
    Stmt::While {
        condition,
        body: Box::new(body),
    }
}

pub fn for_stmt(
    initializer: Option<Stmt>,
    condition: Option<Expr>,
    increment: Option<Expr>,
    body: Stmt,
) -> Stmt {
    Stmt::For {
        initializer: initializer.map(Box::new),
        condition,
        increment,
        body: Box::new(body),
    }
}

pub fn foreach_stmt(loop_var: Stmt, iterable: Expr, body: Stmt) -> Stmt {
    Stmt::ForEach {
        initializer: Box::new(loop_var),
        iterable,
        body: Box::new(body),
    }
}

pub fn fun_stmt(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::Function {
        name: ident(name),
        fun: fun_body(params, body),
    }
}

pub fn return_stmt(value: Option<Expr>) -> Stmt {
    Stmt::Return {
        keyword: token(TokenType::RETURN, "return"),
        value,
    }
}

pub fn break_stmt() -> Stmt {
    Stmt::Break {
        keyword: token(TokenType::BREAK, "break"),
    }
}

pub fn continue_stmt() -> Stmt {
    Stmt::Continue {
        keyword: token(TokenType::CONTINUE, "continue"),
    }
}

/// `arms` pairs a candidate value (`None` for the default arm) with its
/// action block.
pub fn switch_stmt(subject: Expr, arms: Vec<(Option<Expr>, Vec<Stmt>)>) -> Stmt {
    let (values, actions) = arms.into_iter().unzip();
    Stmt::Switch {
        subject,
        values,
        actions,
    }
}

pub fn class_stmt(
    name: &str,
    superclass: Option<&str>,
    methods: Vec<Stmt>,
    static_methods: Vec<Stmt>,
) -> Stmt {
    Stmt::Class {
        name: ident(name),
        superclass: superclass.map(|s| Expr::variable(ident(s))),
        methods,
        static_methods,
    }
}

pub fn module_stmt(
    name: &str,
    classes: Vec<Stmt>,
    functions: Vec<Stmt>,
    variables: Vec<Stmt>,
    constants: Vec<Stmt>,
) -> Stmt {
    Stmt::Module {
        name: ident(name),
        classes,
        functions,
        variables,
        constants,
    }
}

pub fn import_stmt(path: &str) -> Stmt {
    Stmt::Import {
        keyword: token(TokenType::IMPORT, "import"),
        path: string(path),
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Drivers
// ─────────────────────────────────────────────────────────────────────────

pub fn resolve_ok(statements: &[Stmt]) -> Resolutions {
    Resolver::new()
        .resolve(statements)
        .expect("resolution should succeed")
}

pub fn resolve_errors(statements: &[Stmt]) -> Vec<QanunError> {
    init_logging();
    Resolver::new()
        .resolve(statements)
        .expect_err("resolution should fail")
}

/// Resolve and interpret on an existing interpreter (lets tests install
/// natives or loaders first).
pub fn run_in(interpreter: &mut Interpreter, statements: &[Stmt]) {
    let resolutions = resolve_ok(statements);
    interpreter.extend_resolutions(resolutions);
    interpreter
        .interpret(statements)
        .expect("interpretation should succeed");
}

/// Resolve and interpret a program, returning the interpreter so globals can
/// be inspected.
pub fn run(statements: &[Stmt]) -> Interpreter {
    init_logging();
    let mut interpreter = Interpreter::new();
    run_in(&mut interpreter, statements);
    interpreter
}

/// Resolve successfully, then interpret expecting a runtime error.
pub fn run_expect_err(statements: &[Stmt]) -> QanunError {
    init_logging();
    let mut interpreter = Interpreter::new();
    let resolutions = resolve_ok(statements);
    interpreter.extend_resolutions(resolutions);
    interpreter
        .interpret(statements)
        .expect_err("interpretation should fail")
}

/// Read a top-level binding after a run.
pub fn global(interpreter: &Interpreter, name: &str) -> Value {
    interpreter
        .globals()
        .borrow()
        .get(&ident(name))
        .expect("global should exist")
}

pub fn as_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        other => panic!("expected a number, got {}", other),
    }
}

pub fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => panic!("expected a string, got {}", other),
    }
}
