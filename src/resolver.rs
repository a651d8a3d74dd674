//! Static resolver pass for the **Qanun** interpreter.
//!
//! One AST walk does three jobs:
//! 1. Build lexical scope frames (a stack of `name → binding-state` maps)
//!    mirroring, frame for frame, the environment chain the interpreter will
//!    later create.
//! 2. Report structural errors: redeclaration, reading a local in its own
//!    initializer, assignment to a statically visible constant, misplaced
//!    `return`/`break`/`continue`/`this`/`super`, self-inheritance.  Errors
//!    are *collected*, not thrown — the whole batch is reported before any
//!    evaluation starts.
//! 3. Record, for every variable-like reference, how many scope hops separate
//!    the use site from the declaration site.  Names found in no frame are
//!    left to dynamic lookup against the global scope.

use std::collections::HashMap;

use log::{debug, info};

use crate::error::QanunError;
use crate::expr::{Expr, FunctionBody, ReferenceId};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};

/// What kind of function body are we inside?  Validates `return`, `this` and
/// `super` placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
    StaticMethod,
}

/// What kind of class body are we inside?  Validates `this`/`super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Are we inside a loop body?  Validates `break`/`continue`.  A `switch` arm
/// is deliberately *not* a loop: `break` inside a switch targets the
/// enclosing loop or is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LoopType {
    None,
    Loop,
}

/// Per-name state inside one scope frame.
#[derive(Copy, Clone, Debug)]
struct Binding {
    /// False between declaration and the end of the initializer.
    defined: bool,

    /// True for `val` bindings (and the injected `super`).
    constant: bool,
}

/// Scope-distance side table produced by the resolver and consumed by the
/// interpreter.  Keyed by [`ReferenceId`], so tables from separately resolved
/// units (imported modules) merge without collisions.
#[derive(Debug, Default, Clone)]
pub struct Resolutions {
    depths: HashMap<ReferenceId, usize>,
}

impl Resolutions {
    pub fn new() -> Self {
        Resolutions::default()
    }

    pub fn insert(&mut self, id: ReferenceId, depth: usize) {
        self.depths.insert(id, depth);
    }

    /// Distance for a reference, or `None` if it resolved to the global
    /// scope.
    pub fn get(&self, id: ReferenceId) -> Option<usize> {
        self.depths.get(&id).copied()
    }

    /// Merge another table into this one (used when imports bring their own
    /// resolutions).
    pub fn extend(&mut self, other: Resolutions) {
        self.depths.extend(other.depths);
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances for the interpreter.
pub struct Resolver {
    scopes: Vec<HashMap<String, Binding>>,
    resolutions: Resolutions,
    errors: Vec<QanunError>,
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopType,
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            resolutions: Resolutions::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopType::None,
        }
    }

    /// Walk all top-level statements.  Returns the distance table on success,
    /// or every structural error found on failure — the evaluator must never
    /// run on a script that failed to resolve.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolutions, Vec<QanunError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            info!("Resolve pass recorded {} local(s)", self.resolutions.len());
            Ok(self.resolutions)
        } else {
            info!("Resolve pass failed with {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for statement in statements {
                    self.resolve_stmt(statement);
                }
                self.end_scope();
            }

            Stmt::Expression(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so the initializer
                // cannot read the name it is initializing
                self.declare(name, false);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Val { name, initializer } => {
                self.declare(name, true);
                self.resolve_expr(initializer);
                self.define(name);
            }

            Stmt::Function { name, fun } => {
                // the name is visible inside its own body, enabling recursion
                self.declare(name, false);
                self.define(name);
                self.resolve_function(fun, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
            } => {
                self.resolve_class(name, superclass.as_ref(), methods, static_methods);
            }

            Stmt::Module {
                name,
                classes,
                functions,
                variables,
                constants,
            } => {
                self.declare(name, false);
                self.define(name);

                // mirror the interpreter's execution order inside the module
                // scope: values first, then code
                self.begin_scope();
                for member in variables.iter().chain(constants) {
                    self.resolve_stmt(member);
                }
                for member in functions.iter().chain(classes) {
                    self.resolve_stmt(member);
                }
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(QanunError::invalid_return(
                        keyword,
                        "'return' outside of a function.",
                    ));
                } else if self.current_function == FunctionType::Initializer && value.is_some() {
                    self.errors.push(QanunError::invalid_return(
                        keyword,
                        "Can't return a value from an initializer.",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_loop_body(body);
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // one frame for the loop header; the body block pushes its
                // own, matching the single header environment the
                // interpreter hoists per loop
                self.begin_scope();
                if let Some(init) = initializer {
                    self.resolve_stmt(init);
                }
                if let Some(condition) = condition {
                    self.resolve_expr(condition);
                }
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
                self.resolve_loop_body(body);
                self.end_scope();
            }

            Stmt::ForEach {
                initializer,
                iterable,
                body,
            } => {
                // the iterable is evaluated outside the per-iteration scope
                self.resolve_expr(iterable);

                self.begin_scope();
                match &**initializer {
                    Stmt::Var { name, .. } => {
                        self.declare(name, false);
                        self.define(name);
                    }
                    Stmt::Val { name, .. } => {
                        self.declare(name, true);
                        self.define(name);
                    }
                    other => self.resolve_stmt(other),
                }
                self.resolve_loop_body(body);
                self.end_scope();
            }

            Stmt::Break { keyword } | Stmt::Continue { keyword } => {
                if self.current_loop == LoopType::None {
                    self.errors.push(QanunError::invalid_break_continue(keyword));
                }
            }

            Stmt::Switch {
                subject,
                values,
                actions,
            } => {
                self.resolve_expr(subject);
                for value in values.iter().flatten() {
                    self.resolve_expr(value);
                }
                for action in actions {
                    self.begin_scope();
                    for statement in action {
                        self.resolve_stmt(statement);
                    }
                    self.end_scope();
                }
            }

            Stmt::Import { keyword: _, path } => {
                self.resolve_expr(path);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
        static_methods: &[Stmt],
    ) {
        self.declare(name, false);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.errors.push(QanunError::type_mismatch(
                        super_name.line,
                        "A class can't inherit from itself.",
                    ));
                }
            }
            self.resolve_expr(superclass);
        }

        let enclosing_class = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        if superclass.is_some() {
            self.begin_scope();
            self.insert_binding("super", true);
        }

        // static methods close over the class scope directly — no `this`
        // frame between their bodies and the surrounding code
        for static_method in static_methods {
            if let Stmt::Function { fun, .. } = static_method {
                self.resolve_function(fun, FunctionType::StaticMethod);
            }
        }

        self.begin_scope();
        self.insert_binding("this", true);

        for method in methods {
            if let Stmt::Function {
                name: method_name,
                fun,
            } = method
            {
                let function_type = if method_name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };
                self.resolve_function(fun, function_type);
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        debug!("Resolving expr: {:?}", expr);

        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary {
                operator,
                operand,
                is_postfix: _,
            } => {
                // '++'/'--' mutate their operand; a constant target is a
                // statically detectable error when the operand is a variable
                let mutating = matches!(
                    operator.token_type,
                    TokenType::PLUS_PLUS | TokenType::MINUS_MINUS
                );

                if let (true, Expr::Variable { id, name }) = (mutating, &**operand) {
                    self.resolve_local(*id, name, true);
                } else {
                    self.resolve_expr(operand);
                }
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                when_true,
                when_false,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(when_true);
                self.resolve_expr(when_false);
            }

            Expr::Variable { id, name } => {
                // cannot read a local in its own initializer
                if let Some(scope) = self.scopes.last() {
                    if let Some(binding) = scope.get(&name.lexeme) {
                        if !binding.defined {
                            self.errors.push(QanunError::type_mismatch(
                                name.line,
                                format!(
                                    "Can't read local variable '{}' in its own initializer.",
                                    name.lexeme
                                ),
                            ));
                        }
                    }
                }

                self.resolve_local(*id, name, false);
            }

            Expr::Assign { id, name, value } => {
                // resolve the right-hand side first, then bind the target
                self.resolve_expr(value);
                self.resolve_local(*id, name, true);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.errors.push(QanunError::invalid_this_super(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                    return;
                }
                if self.current_function == FunctionType::StaticMethod {
                    self.errors.push(QanunError::invalid_this_super(
                        keyword,
                        "Can't use 'this' in a static method.",
                    ));
                    return;
                }

                self.resolve_local(*id, keyword, false);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.errors.push(QanunError::invalid_this_super(
                            keyword,
                            "Can't use 'super' outside of a class.",
                        ));
                        return;
                    }
                    ClassType::Class => {
                        self.errors.push(QanunError::invalid_this_super(
                            keyword,
                            "Can't use 'super' in a class with no superclass.",
                        ));
                        return;
                    }
                    ClassType::Subclass => {}
                }
                if self.current_function == FunctionType::StaticMethod {
                    self.errors.push(QanunError::invalid_this_super(
                        keyword,
                        "Can't use 'super' in a static method.",
                    ));
                    return;
                }

                self.resolve_local(*id, keyword, false);
            }

            Expr::List { elements, .. } => {
                for element in elements {
                    self.resolve_expr(element);
                }
            }

            Expr::ListAccessor { object, index, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(index);
            }

            Expr::ListMutator { target, value } => {
                self.resolve_expr(target);
                self.resolve_expr(value);
            }

            Expr::AnonymousFun(fun) => {
                self.resolve_function(fun, FunctionType::Function);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────

    /// One fresh frame for a function's parameters and body statements.
    /// `break`/`continue` cannot cross a function boundary, so the loop
    /// context resets along with the function context.
    fn resolve_function(&mut self, fun: &FunctionBody, function_type: FunctionType) {
        let enclosing_function = self.current_function;
        let enclosing_loop = self.current_loop;
        self.current_function = function_type;
        self.current_loop = LoopType::None;

        self.begin_scope();
        for param in &fun.params {
            self.declare(param, false);
            self.define(param);
        }
        for statement in &fun.body {
            self.resolve_stmt(statement);
        }
        self.end_scope();

        self.current_function = enclosing_function;
        self.current_loop = enclosing_loop;
    }

    /// Resolve a loop body with `break`/`continue` permitted.
    fn resolve_loop_body(&mut self, body: &Stmt) {
        let enclosing_loop = self.current_loop;
        self.current_loop = LoopType::Loop;

        self.resolve_stmt(body);

        self.current_loop = enclosing_loop;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Record a declaration in the current frame.  The global frame is not
    /// tracked statically; its conflicts surface at run time through the
    /// environment's own check.
    fn declare(&mut self, name: &Token, constant: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(QanunError::redeclaration(name));
                return;
            }
            scope.insert(
                name.lexeme.clone(),
                Binding {
                    defined: false,
                    constant,
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                binding.defined = true;
            }
        }
    }

    /// Insert an implicitly defined name (`this`, `super`) into the current
    /// frame.
    fn insert_binding(&mut self, name: &str, constant: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    defined: true,
                    constant,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this reference as a local at the depth of the innermost frame
    /// containing the name, or leave it for dynamic global lookup.  Writes to
    /// a statically visible constant are reported here.
    fn resolve_local(&mut self, id: ReferenceId, name: &Token, is_assignment: bool) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(binding) = scope.get(&name.lexeme) {
                if is_assignment && binding.constant {
                    self.errors.push(QanunError::constant_assignment(name));
                }

                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.resolutions.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
