//! Centralised error hierarchy for the **Qanun interpreter core**.
//!
//! All subsystems (environment, resolver, evaluator, module loading) must
//! convert their internal failure modes into one of the variants defined here.
//! This enables a uniform `Result<T>` alias throughout the crate while still
//! preserving rich diagnostic detail: every variant raised on behalf of a
//! source construct carries the offending token's line (and lexeme where one
//! exists), so the external driver can format locations.
//!
//! The module **does not** print diagnostics itself.
//!
//! Note that `break`/`continue`/`return` are *not* errors — they travel on the
//! interpreter's separate [`Signal`](crate::interpreter::Signal) channel.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QanunError {
    /// A name was declared twice (variable or constant) in the same scope.
    #[error("[line {line}] Error at '{lexeme}': redeclaration of '{lexeme}'.")]
    Redeclaration { lexeme: String, line: usize },

    /// A name was looked up or assigned but is bound nowhere on the scope
    /// chain.
    #[error("[line {line}] Error at '{lexeme}': undefined variable or constant '{lexeme}'.")]
    UndefinedName { lexeme: String, line: usize },

    /// Assignment to a `val` binding.
    #[error("[line {line}] Error at '{lexeme}': assignment of constant '{lexeme}'.")]
    ConstantAssignment { lexeme: String, line: usize },

    /// An operand or callee had the wrong runtime type.
    #[error("[line {line}] Error: {message}")]
    TypeMismatch { message: String, line: usize },

    /// Division (or remainder) with a zero divisor.
    #[error("[line {line}] Error: division by zero.")]
    DivisionByZero { line: usize },

    /// List index outside `[0, length)`.
    #[error("[line {line}] Error: index {index} out of bounds for list of length {length}.")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        line: usize,
    },

    /// Call-site argument count differs from the callee's declared arity.
    #[error("[line {line}] Error: expected {expected} arguments but got {found}.")]
    ArityMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// Resolver-only: `return` in an invalid position.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    InvalidReturn {
        lexeme: String,
        message: String,
        line: usize,
    },

    /// Resolver-only: `break`/`continue` outside a loop body.
    #[error("[line {line}] Error at '{lexeme}': '{lexeme}' outside of a loop.")]
    InvalidBreakContinue { lexeme: String, line: usize },

    /// Resolver-only: `this`/`super` in an invalid position.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    InvalidThisSuper {
        lexeme: String,
        message: String,
        line: usize,
    },

    /// A native function reported a failure through its opaque entry point.
    #[error("[line {line}] Error in native function '{name}': {message}")]
    Native {
        name: String,
        message: String,
        line: usize,
    },

    /// Module import failure (no loader installed, bad path value, or a
    /// loader-reported problem).
    #[error("[line {line}] Error: {message}")]
    Import { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on module
    /// loaders that read from the filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl QanunError {
    /// Declaration conflict in a single scope.
    pub fn redeclaration(name: &Token) -> Self {
        info!(
            "Creating Redeclaration error: line={}, name={}",
            name.line, name.lexeme
        );

        QanunError::Redeclaration {
            lexeme: name.lexeme.clone(),
            line: name.line,
        }
    }

    /// Unbound name on the scope chain.
    pub fn undefined_name(name: &Token) -> Self {
        info!(
            "Creating UndefinedName error: line={}, name={}",
            name.line, name.lexeme
        );

        QanunError::UndefinedName {
            lexeme: name.lexeme.clone(),
            line: name.line,
        }
    }

    /// Write to an immutable binding.
    pub fn constant_assignment(name: &Token) -> Self {
        info!(
            "Creating ConstantAssignment error: line={}, name={}",
            name.line, name.lexeme
        );

        QanunError::ConstantAssignment {
            lexeme: name.lexeme.clone(),
            line: name.line,
        }
    }

    /// Wrong runtime type for an operation.
    pub fn type_mismatch<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating TypeMismatch error: line={}, msg={}", line, message);

        QanunError::TypeMismatch { message, line }
    }

    pub fn division_by_zero(line: usize) -> Self {
        info!("Creating DivisionByZero error: line={}", line);

        QanunError::DivisionByZero { line }
    }

    pub fn index_out_of_bounds(line: usize, index: i64, length: usize) -> Self {
        info!(
            "Creating IndexOutOfBounds error: line={}, index={}, length={}",
            line, index, length
        );

        QanunError::IndexOutOfBounds {
            index,
            length,
            line,
        }
    }

    pub fn arity_mismatch(line: usize, expected: usize, found: usize) -> Self {
        info!(
            "Creating ArityMismatch error: line={}, expected={}, found={}",
            line, expected, found
        );

        QanunError::ArityMismatch {
            expected,
            found,
            line,
        }
    }

    /// Helper constructor for the **resolver**: misplaced `return`.
    pub fn invalid_return<S: Into<String>>(keyword: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating InvalidReturn error: line={}, msg={}",
            keyword.line, message
        );

        QanunError::InvalidReturn {
            lexeme: keyword.lexeme.clone(),
            message,
            line: keyword.line,
        }
    }

    /// Helper constructor for the **resolver**: misplaced `break`/`continue`.
    pub fn invalid_break_continue(keyword: &Token) -> Self {
        info!(
            "Creating InvalidBreakContinue error: line={}, keyword={}",
            keyword.line, keyword.lexeme
        );

        QanunError::InvalidBreakContinue {
            lexeme: keyword.lexeme.clone(),
            line: keyword.line,
        }
    }

    /// Helper constructor for the **resolver**: misplaced `this`/`super`.
    pub fn invalid_this_super<S: Into<String>>(keyword: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating InvalidThisSuper error: line={}, msg={}",
            keyword.line, message
        );

        QanunError::InvalidThisSuper {
            lexeme: keyword.lexeme.clone(),
            message,
            line: keyword.line,
        }
    }

    /// Failure reported across the native-function capability boundary.
    pub fn native<S: Into<String>>(name: &str, line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Native error: fn={}, line={}, msg={}",
            name, line, message
        );

        QanunError::Native {
            name: name.to_string(),
            message,
            line,
        }
    }

    /// Module import failure.
    pub fn import<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Import error: line={}, msg={}", line, message);

        QanunError::Import { message, line }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, QanunError>;
