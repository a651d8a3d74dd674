use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::stmt::Stmt;
use crate::token::Token;

/// Identity of a single variable-like reference (`Variable`, `Assign`,
/// `This`, `Super`) inside the AST.
///
/// The resolver records scope distances in a side table keyed by this id, and
/// the interpreter consults the same table at evaluation time.  Ids are minted
/// process-wide, so resolutions from separately resolved compilation units
/// (e.g. imported modules) can be merged into one interpreter without clashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceId(usize);

impl ReferenceId {
    /// Mint a fresh, never-before-used id.
    pub fn fresh() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);

        ReferenceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Parameter list and body shared by named function declarations and
/// anonymous function expressions.
///
/// `Rc` so that every closure created from the same definition site shares one
/// copy of the (immutable) body instead of cloning the subtree per call.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// Expression nodes produced by the parser.
///
/// Pure data: variants carry only tokens and sub-expressions. Behavior lives
/// in the resolver and the interpreter, which pattern-match exhaustively over
/// this enum.
#[derive(Debug, Clone)]
pub enum Expr {
    // Assignment to a named binding: `a = expr`
    Assign {
        id: ReferenceId,
        name: Token,
        value: Box<Expr>,
    },

    // Arithmetic, comparison and equality operators
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // Short-circuiting 'and' / 'or' (distinct from Binary)
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    // Negation, logical not, and prefix/postfix '++' / '--'
    Unary {
        operator: Token,
        operand: Box<Expr>,
        is_postfix: bool,
    },

    // Function, class-constructor or native call; `paren` is the closing
    // parenthesis, kept for error locations
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },

    // Property read: `object.name`
    Get { object: Box<Expr>, name: Token },

    // Field write: `object.name = value`
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    This {
        id: ReferenceId,
        keyword: Token,
    },

    // `super.method` — method is resolved above the defining class
    Super {
        id: ReferenceId,
        keyword: Token,
        method: Token,
    },

    // Parenthesized grouped expression
    Grouping(Box<Expr>),

    // Literal token: number, string, true, false, nil
    Literal(Token),

    // List literal: `[e0, e1, ...]`
    List {
        bracket: Token,
        elements: Vec<Expr>,
    },

    // Index read: `object[index]`
    ListAccessor {
        object: Box<Expr>,
        bracket: Token,
        index: Box<Expr>,
    },

    // Index write. The grammar gives the mutator no index slot of its own:
    // `target` is the ListAccessor being written through, and the mutator
    // reuses its index sub-expression.
    ListMutator {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    // `fun (params) { body }` as a value
    AnonymousFun(Rc<FunctionBody>),

    // A named reference
    Variable {
        id: ReferenceId,
        name: Token,
    },

    // `cond ? whenTrue : whenFalse`
    Ternary {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
}

impl Expr {
    /// Build a `Variable` reference with a fresh [`ReferenceId`].
    pub fn variable(name: Token) -> Expr {
        Expr::Variable {
            id: ReferenceId::fresh(),
            name,
        }
    }

    /// Build an `Assign` node with a fresh [`ReferenceId`].
    pub fn assign(name: Token, value: Expr) -> Expr {
        Expr::Assign {
            id: ReferenceId::fresh(),
            name,
            value: Box::new(value),
        }
    }

    /// Build a `This` reference with a fresh [`ReferenceId`].
    pub fn this(keyword: Token) -> Expr {
        Expr::This {
            id: ReferenceId::fresh(),
            keyword,
        }
    }

    /// Build a `Super` access with a fresh [`ReferenceId`].
    pub fn super_access(keyword: Token, method: Token) -> Expr {
        Expr::Super {
            id: ReferenceId::fresh(),
            keyword,
            method,
        }
    }

    /// Source line this expression originates from, for error reporting.
    pub fn line(&self) -> usize {
        match self {
            Expr::Assign { name, .. } => name.line,

            Expr::Binary { operator, .. } => operator.line,

            Expr::Logical { operator, .. } => operator.line,

            Expr::Unary { operator, .. } => operator.line,

            Expr::Call { paren, .. } => paren.line,

            Expr::Get { name, .. } => name.line,

            Expr::Set { name, .. } => name.line,

            Expr::This { keyword, .. } => keyword.line,

            Expr::Super { keyword, .. } => keyword.line,

            Expr::Grouping(inner) => inner.line(),

            Expr::Literal(token) => token.line,

            Expr::List { bracket, .. } => bracket.line,

            Expr::ListAccessor { bracket, .. } => bracket.line,

            Expr::ListMutator { target, .. } => target.line(),

            Expr::AnonymousFun(fun) => fun.params.first().map(|p| p.line).unwrap_or(0),

            Expr::Variable { name, .. } => name.line,

            Expr::Ternary { condition, .. } => condition.line(),
        }
    }
}
