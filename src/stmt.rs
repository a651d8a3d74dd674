use std::rc::Rc;

use crate::expr::{Expr, FunctionBody};
use crate::token::Token;

/// Statement nodes produced by the parser.
///
/// Like [`Expr`], pure data with no behavior of its own.
#[derive(Debug, Clone)]
pub enum Stmt {
    // `{ ... }` — runs in a fresh child scope
    Block(Vec<Stmt>),

    Expression(Expr),

    // Named function declaration; shares its body representation with
    // anonymous function expressions
    Function {
        name: Token,
        fun: Rc<FunctionBody>,
    },

    // `class Name : Super { methods... static methods... }`.
    // `superclass` is a Variable expression so the resolver can record its
    // scope distance; `methods`/`static_methods` hold `Stmt::Function` nodes.
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Stmt>,
        static_methods: Vec<Stmt>,
    },

    // `module Name { ... }` — a named aggregate of declarations exposed as a
    // sub-scope under the module name
    Module {
        name: Token,
        classes: Vec<Stmt>,
        functions: Vec<Stmt>,
        variables: Vec<Stmt>,
        constants: Vec<Stmt>,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    // Mutable binding; a missing initializer means nil
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    // Immutable binding; the initializer is mandatory
    Val {
        name: Token,
        initializer: Expr,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
    },

    // `foreach (var x : iterable) { ... }` — `initializer` is the Var/Val
    // declaration of the loop variable, rebound freshly per iteration
    ForEach {
        initializer: Box<Stmt>,
        iterable: Expr,
        body: Box<Stmt>,
    },

    Break {
        keyword: Token,
    },

    Continue {
        keyword: Token,
    },

    // `values` and `actions` are parallel arrays: values[i] guards
    // actions[i].  A `None` value marks the default arm.  First match wins,
    // no fallthrough.
    Switch {
        subject: Expr,
        values: Vec<Option<Expr>>,
        actions: Vec<Vec<Stmt>>,
    },

    // `import "path";` — delegated to the installed module loader,
    // memoized by path
    Import {
        keyword: Token,
        path: Expr,
    },
}
