//! Tree-walking evaluator for the **Qanun** AST.
//!
//! Statement execution returns `Result<Signal, QanunError>`: the `Ok` channel
//! carries the non-local exit signals (`break`/`continue`/`return`) that
//! unwind to the nearest loop or call frame, while the `Err` channel carries
//! runtime errors that abort the whole execution unit.  The two must never be
//! mixed — signals are routine control flow, errors are fatal.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::Environment;
use crate::error::{QanunError, Result};
use crate::expr::{Expr, ReferenceId};
use crate::resolver::Resolutions;
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::{Class, Function, Instance, Module, NativeFunction, Value};

/// Non-local exit signals produced by statement execution.
///
/// Distinct from [`QanunError`] by design: a stray signal is consumed by the
/// nearest matching construct (loop for break/continue, call frame for
/// return), whereas an error propagates to the top-level caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Execution ran off the end of the statement.
    Normal,

    /// Unwind to the nearest enclosing loop and leave it.
    Break,

    /// Unwind to the nearest enclosing loop and start its next iteration.
    Continue,

    /// Unwind to the nearest enclosing call frame, carrying the return value
    /// (`nil` when the `return` had no operand).
    Return(Value),
}

/// A compilation unit delivered by a [`ModuleLoader`]: parsed statements plus
/// the resolver output for them.
pub struct LoadedModule {
    pub statements: Vec<Stmt>,
    pub resolutions: Resolutions,
}

/// Capability boundary for `import`: the host decides how paths map to
/// source (files, embedded scripts, ...) and hands back ready-to-run units.
pub trait ModuleLoader {
    fn load(&self, path: &str) -> Result<LoadedModule>;
}

pub struct Interpreter {
    /// Root of every scope chain; native functions and top-level declarations
    /// live here.
    globals: Rc<RefCell<Environment>>,

    /// Scope active for the statement currently executing.
    environment: Rc<RefCell<Environment>>,

    /// Scope distances recorded by the resolver.  References absent from the
    /// table fall back to dynamic lookup against `globals`.
    locals: Resolutions,

    /// Module values memoized by name: re-executing `module M { ... }` (or
    /// importing it again) rebinds the existing value without re-running the
    /// body.
    modules: HashMap<String, Value>,

    /// Import paths already executed.
    imported: HashSet<String>,

    loader: Option<Rc<dyn ModuleLoader>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter and defines native functions such as
    /// `clock`.
    pub fn new() -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        let mut interpreter = Self {
            environment: globals.clone(),
            globals,
            locals: Resolutions::new(),
            modules: HashMap::new(),
            imported: HashSet::new(),
            loader: None,
        };

        interpreter.define_native("clock", 0, |_args: &[Value]| {
            debug!("Calling native function 'clock'");
            let timestamp: f64 = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e: SystemTimeError| format!("clock error: {}", e))?
                .as_secs_f64();
            Ok(Value::Number(timestamp))
        });

        interpreter
    }

    /// Register a native function in the global scope.  The evaluator treats
    /// natives identically to user-defined functions at call sites.
    pub fn define_native<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + 'static,
    {
        debug!("Defining native function '{}'", name);

        let native = Value::NativeFunction(Rc::new(NativeFunction {
            name: name.to_string(),
            arity,
            func: Box::new(func),
        }));

        self.globals.borrow_mut().define_unchecked(name, native);
    }

    /// Merge resolver output into the interpreter's distance table.  Called
    /// once for the main unit and again for every imported unit.
    pub fn extend_resolutions(&mut self, resolutions: Resolutions) {
        debug!("Merging {} resolution(s)", resolutions.len());

        self.locals.extend(resolutions);
    }

    /// Install the import capability.
    pub fn set_module_loader(&mut self, loader: Rc<dyn ModuleLoader>) {
        self.loader = Some(loader);
    }

    /// The global scope, shared with every chain the interpreter builds.
    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    /// Interprets a list of statements (a "program").  Must only be called
    /// after the resolver accepted the same statements.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            // the resolver rejects top-level break/continue/return, so no
            // signal can escape here
            self.execute(stmt)?;
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        debug!("Executing statement: {:?}", stmt);

        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name, value)?;
                Ok(Signal::Normal)
            }

            Stmt::Val { name, initializer } => {
                let value = self.evaluate(initializer)?;
                self.environment.borrow_mut().define_constant(name, value)?;
                Ok(Signal::Normal)
            }

            Stmt::Block(statements) => {
                let env = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));
                self.execute_block(statements, env)
            }

            Stmt::Function { name, fun } => {
                debug!("Defining function '{}'", name.lexeme);
                // capture the environment active at the definition site
                let function = Value::Function(Rc::new(Function {
                    name: Some(name.lexeme.clone()),
                    declaration: fun.clone(),
                    closure: self.environment.clone(),
                    is_initializer: false,
                }));
                self.environment.borrow_mut().define(name, function)?;
                Ok(Signal::Normal)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                static_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, static_methods),

            Stmt::Module {
                name,
                classes,
                functions,
                variables,
                constants,
            } => self.execute_module(name, variables, constants, functions, classes),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Return signal carrying: {}", value);
                Ok(Signal::Return(value))
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Break => break,
                        Signal::Normal | Signal::Continue => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // one header scope per loop: closures created in different
                // iterations share the loop variable
                let header = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));
                let previous = std::mem::replace(&mut self.environment, header);
                let result = self.run_for(
                    initializer.as_deref(),
                    condition.as_ref(),
                    increment.as_ref(),
                    body,
                );
                self.environment = previous;
                result
            }

            Stmt::ForEach {
                initializer,
                iterable,
                body,
            } => self.execute_foreach(initializer, iterable, body),

            Stmt::Break { .. } => Ok(Signal::Break),

            Stmt::Continue { .. } => Ok(Signal::Continue),

            Stmt::Switch {
                subject,
                values,
                actions,
            } => self.execute_switch(subject, values, actions),

            Stmt::Import { keyword, path } => self.execute_import(keyword, path),
        }
    }

    /// Run statements in the current scope, bubbling the first non-normal
    /// signal without executing the rest.
    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<Signal> {
        for statement in statements {
            let signal = self.execute(statement)?;
            if signal != Signal::Normal {
                return Ok(signal);
            }
        }
        Ok(Signal::Normal)
    }

    /// Run statements with `environment` installed, restoring the previous
    /// scope afterwards even on error.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_statements(statements);
        self.environment = previous;
        result
    }

    /// Run a single statement with `environment` installed.
    fn execute_in(&mut self, stmt: &Stmt, environment: Rc<RefCell<Environment>>) -> Result<Signal> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute(stmt);
        self.environment = previous;
        result
    }

    fn run_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Signal> {
        if let Some(init) = initializer {
            self.execute(init)?;
        }

        loop {
            let keep_going = match condition {
                Some(condition) => self.evaluate(condition)?.is_truthy(),
                None => true,
            };
            if !keep_going {
                break;
            }

            match self.execute(body)? {
                Signal::Break => break,
                // continue still runs the increment clause
                Signal::Normal | Signal::Continue => {}
                signal @ Signal::Return(_) => return Ok(signal),
            }

            if let Some(increment) = increment {
                self.evaluate(increment)?;
            }
        }

        Ok(Signal::Normal)
    }

    fn execute_foreach(
        &mut self,
        initializer: &Stmt,
        iterable: &Expr,
        body: &Stmt,
    ) -> Result<Signal> {
        // the iterable is evaluated once, in the surrounding scope, and
        // snapshotted: mutating the list inside the body does not affect the
        // iteration
        let iterable_val = self.evaluate(iterable)?;
        let items: Vec<Value> = match &iterable_val {
            Value::List(list) => list.borrow().clone(),
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            _ => {
                return Err(QanunError::type_mismatch(
                    iterable.line(),
                    "Can only iterate over lists and strings.",
                ))
            }
        };

        let (name, constant) = match initializer {
            Stmt::Var { name, .. } => (name, false),
            Stmt::Val { name, .. } => (name, true),
            _ => {
                return Err(QanunError::type_mismatch(
                    iterable.line(),
                    "foreach initializer must declare the loop variable.",
                ))
            }
        };

        for item in items {
            // fresh binding per iteration: closures created in different
            // iterations observe different values
            let iteration = Rc::new(RefCell::new(Environment::with_enclosing(
                self.environment.clone(),
            )));
            if constant {
                iteration.borrow_mut().define_constant(name, item)?;
            } else {
                iteration.borrow_mut().define(name, item)?;
            }

            match self.execute_in(body, iteration)? {
                Signal::Break => break,
                Signal::Normal | Signal::Continue => {}
                signal @ Signal::Return(_) => return Ok(signal),
            }
        }

        Ok(Signal::Normal)
    }

    fn execute_switch(
        &mut self,
        subject: &Expr,
        values: &[Option<Expr>],
        actions: &[Vec<Stmt>],
    ) -> Result<Signal> {
        // the subject is evaluated exactly once; candidates are compared in
        // order and the first match wins, with no fallthrough.  The default
        // arm (no candidate value) only runs when nothing matched.
        let subject_val = self.evaluate(subject)?;

        let mut default_action: Option<&Vec<Stmt>> = None;

        for (value, action) in values.iter().zip(actions) {
            match value {
                Some(candidate) => {
                    if subject_val == self.evaluate(candidate)? {
                        debug!("Switch matched candidate: {}", subject_val);
                        let env = Rc::new(RefCell::new(Environment::with_enclosing(
                            self.environment.clone(),
                        )));
                        return self.execute_block(action, env);
                    }
                }
                None => default_action = Some(action),
            }
        }

        if let Some(action) = default_action {
            debug!("Switch fell through to default arm");
            let env = Rc::new(RefCell::new(Environment::with_enclosing(
                self.environment.clone(),
            )));
            return self.execute_block(action, env);
        }

        Ok(Signal::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
        static_methods: &[Stmt],
    ) -> Result<Signal> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass_value: Option<Rc<Class>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(QanunError::type_mismatch(
                        expr.line(),
                        "Superclass must be a class.",
                    ))
                }
            },
            None => None,
        };

        // bind the class name before evaluating method bodies, so methods can
        // reference the class itself and its siblings
        self.environment.borrow_mut().define(name, Value::Nil)?;

        let mut method_env = self.environment.clone();
        if let Some(superclass) = &superclass_value {
            method_env = Rc::new(RefCell::new(Environment::with_enclosing(method_env)));
            method_env
                .borrow_mut()
                .define_unchecked("super", Value::Class(superclass.clone()));
        }

        let methods_table = Self::method_table(methods, &method_env, true);
        let statics_table = Self::method_table(static_methods, &method_env, false);

        let class = Value::Class(Rc::new(Class {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: methods_table,
            static_methods: statics_table,
        }));

        self.environment.borrow_mut().assign(name, class)?;

        info!("Class '{}' declared", name.lexeme);

        Ok(Signal::Normal)
    }

    fn method_table(
        declarations: &[Stmt],
        closure: &Rc<RefCell<Environment>>,
        allow_initializer: bool,
    ) -> HashMap<String, Rc<Function>> {
        let mut table = HashMap::new();

        for declaration in declarations {
            if let Stmt::Function { name, fun } = declaration {
                let is_initializer = allow_initializer && name.lexeme == "init";
                table.insert(
                    name.lexeme.clone(),
                    Rc::new(Function {
                        name: Some(name.lexeme.clone()),
                        declaration: fun.clone(),
                        closure: closure.clone(),
                        is_initializer,
                    }),
                );
            }
        }

        table
    }

    fn execute_module(
        &mut self,
        name: &Token,
        variables: &[Stmt],
        constants: &[Stmt],
        functions: &[Stmt],
        classes: &[Stmt],
    ) -> Result<Signal> {
        if let Some(existing) = self.modules.get(&name.lexeme).cloned() {
            debug!("Module '{}' already evaluated; rebinding", name.lexeme);
            // re-declaration in the scope that already holds the binding
            // rebinds it in place instead of raising a conflict
            let mut scope = self.environment.borrow_mut();
            if scope.get_here(&name.lexeme).is_some() {
                scope.assign(name, existing)?;
            } else {
                scope.define(name, existing)?;
            }
            return Ok(Signal::Normal);
        }

        debug!("Evaluating module '{}'", name.lexeme);

        // bind the name before the body runs, mirroring class declaration, so
        // member code reaches the module through its recorded distance
        self.environment.borrow_mut().define(name, Value::Nil)?;

        let members = Rc::new(RefCell::new(Environment::with_enclosing(
            self.environment.clone(),
        )));

        // values first, then code — the resolver walks members in the same
        // order
        let previous = std::mem::replace(&mut self.environment, members.clone());
        let mut result: Result<()> = Ok(());
        for member in variables
            .iter()
            .chain(constants)
            .chain(functions)
            .chain(classes)
        {
            if let Err(error) = self.execute(member) {
                result = Err(error);
                break;
            }
        }
        self.environment = previous;
        result?;

        let module = Value::Module(Rc::new(Module {
            name: name.lexeme.clone(),
            members,
        }));
        self.modules.insert(name.lexeme.clone(), module.clone());
        self.environment.borrow_mut().assign(name, module)?;

        info!("Module '{}' evaluated", name.lexeme);

        Ok(Signal::Normal)
    }

    fn execute_import(&mut self, keyword: &Token, path: &Expr) -> Result<Signal> {
        let path_val = self.evaluate(path)?;
        let path_str = match path_val {
            Value::String(s) => s,
            _ => {
                return Err(QanunError::import(
                    path.line(),
                    "import path must be a string.",
                ))
            }
        };

        if self.imported.contains(&path_str) {
            debug!("Import '{}' already executed; skipping", path_str);
            return Ok(Signal::Normal);
        }

        let loader = match &self.loader {
            Some(loader) => loader.clone(),
            None => {
                return Err(QanunError::import(
                    keyword.line,
                    "no module loader installed.",
                ))
            }
        };

        info!("Importing '{}'", path_str);
        let loaded = loader.load(&path_str)?;
        self.locals.extend(loaded.resolutions);

        // imported units execute against the global scope
        let previous = std::mem::replace(&mut self.environment, self.globals.clone());
        let mut result = Ok(Signal::Normal);
        for statement in &loaded.statements {
            if let Err(error) = self.execute(statement) {
                result = Err(error);
                break;
            }
        }
        self.environment = previous;

        // a unit that failed part-way is not marked done; a later import of
        // the same path retries it
        let signal = result?;
        self.imported.insert(path_str);
        Ok(signal)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        let value = match expr {
            Expr::Literal(token) => self.evaluate_literal(token)?,

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary {
                operator,
                operand,
                is_postfix,
            } => self.evaluate_unary(operator, operand, *is_postfix)?,

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right)?,

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right)?,

            Expr::Ternary {
                condition,
                when_true,
                when_false,
            } => {
                // exactly one branch is evaluated
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(when_true)?
                } else {
                    self.evaluate(when_false)?
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name)?,

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                value
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                debug!("Evaluating call");
                let callee_val = self.evaluate(callee)?;
                let mut arg_values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    arg_values.push(self.evaluate(argument)?);
                }
                self.invoke_callable(&callee_val, paren, &arg_values)?
            }

            Expr::Get { object, name } => self.evaluate_get(object, name)?,

            Expr::Set {
                object,
                name,
                value,
            } => self.evaluate_set(object, name, value)?,

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword)?,

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method)?,

            Expr::List { elements, .. } => {
                let mut list = Vec::with_capacity(elements.len());
                for element in elements {
                    list.push(self.evaluate(element)?);
                }
                Value::List(Rc::new(RefCell::new(list)))
            }

            Expr::ListAccessor {
                object,
                bracket,
                index,
            } => self.evaluate_list_access(object, bracket, index)?,

            Expr::ListMutator { target, value } => self.evaluate_list_mutation(target, value)?,

            Expr::AnonymousFun(fun) => Value::Function(Rc::new(Function {
                name: None,
                declaration: fun.clone(),
                closure: self.environment.clone(),
                is_initializer: false,
            })),
        };

        debug!("Expression evaluated to: {}", value);

        Ok(value)
    }

    /// Evaluates a literal token.
    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        let value = match &token.token_type {
            TokenType::NUMBER(n) => Value::Number(*n),
            TokenType::STRING(s) => Value::String(s.clone()),
            TokenType::TRUE => Value::Bool(true),
            TokenType::FALSE => Value::Bool(false),
            TokenType::NIL => Value::Nil,
            _ => {
                return Err(QanunError::type_mismatch(
                    token.line,
                    format!("Invalid literal '{}'.", token.lexeme),
                ))
            }
        };
        Ok(value)
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, operator: &Token, operand: &Expr, is_postfix: bool) -> Result<Value> {
        match operator.token_type {
            TokenType::MINUS => {
                let value = self.evaluate(operand)?;
                match value {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    _ => Err(QanunError::type_mismatch(
                        operator.line,
                        "Operand must be a number.",
                    )),
                }
            }

            TokenType::BANG => {
                let value = self.evaluate(operand)?;
                Ok(Value::Bool(!value.is_truthy()))
            }

            TokenType::PLUS_PLUS | TokenType::MINUS_MINUS => {
                self.evaluate_increment(operator, operand, is_postfix)
            }

            _ => Err(QanunError::type_mismatch(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    /// Prefix/postfix `++`/`--` on an assignable target: a variable, a
    /// field, or a list slot.  Postfix yields the pre-mutation value, prefix
    /// the post-mutation value.
    fn evaluate_increment(
        &mut self,
        operator: &Token,
        operand: &Expr,
        is_postfix: bool,
    ) -> Result<Value> {
        let delta = if operator.token_type == TokenType::PLUS_PLUS {
            1.0
        } else {
            -1.0
        };

        let step = |old: Value| -> Result<(Value, Value)> {
            match old {
                Value::Number(n) => Ok((Value::Number(n), Value::Number(n + delta))),
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    format!("Operand of '{}' must be a number.", operator.lexeme),
                )),
            }
        };

        match operand {
            Expr::Variable { id, name } => {
                let (old, new) = step(self.look_up_variable(*id, name)?)?;
                self.assign_variable(*id, name, new.clone())?;
                Ok(if is_postfix { old } else { new })
            }

            Expr::Get { object, name } => {
                let object_val = self.evaluate(object)?;
                let instance = match &object_val {
                    Value::Instance(instance) => instance.clone(),
                    _ => {
                        return Err(QanunError::type_mismatch(
                            name.line,
                            "Only instances have fields.",
                        ))
                    }
                };
                let old = instance
                    .borrow()
                    .fields
                    .get(&name.lexeme)
                    .cloned()
                    .ok_or_else(|| QanunError::undefined_name(name))?;
                let (old, new) = step(old)?;
                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), new.clone());
                Ok(if is_postfix { old } else { new })
            }

            Expr::ListAccessor {
                object,
                bracket,
                index,
            } => {
                let list = self.evaluate_list_operand(object, bracket)?;
                let index_val = self.evaluate(index)?;
                let slot = self.list_index(&index_val, bracket, list.borrow().len())?;
                let (old, new) = step(list.borrow()[slot].clone())?;
                list.borrow_mut()[slot] = new.clone();
                Ok(if is_postfix { old } else { new })
            }

            _ => Err(QanunError::type_mismatch(
                operator.line,
                format!("Invalid target for '{}'.", operator.lexeme),
            )),
        }
    }

    /// Evaluates a binary expression.
    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            // '+' is overloaded: numeric addition, or string concatenation
            // when either operand is a string (the other is converted to its
            // textual form)
            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
                (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    "Operands of '+' must be numbers or include a string.",
                )),
            },

            TokenType::MINUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::STAR => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::SLASH => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(QanunError::division_by_zero(operator.line))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::PERCENT => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => {
                    if *b == 0.0 {
                        Err(QanunError::division_by_zero(operator.line))
                    } else {
                        Ok(Value::Number(a % b))
                    }
                }
                _ => Err(QanunError::type_mismatch(
                    operator.line,
                    "Operands must be numbers.",
                )),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => self.compare(&left_val, &right_val, operator, |a, b| a < b),

            TokenType::LESS_EQUAL => self.compare(&left_val, &right_val, operator, |a, b| a <= b),

            TokenType::GREATER => self.compare(&left_val, &right_val, operator, |a, b| a > b),

            TokenType::GREATER_EQUAL => self.compare(&left_val, &right_val, operator, |a, b| a >= b),

            _ => Err(QanunError::type_mismatch(
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn compare(
        &self,
        left: &Value,
        right: &Value,
        operator: &Token,
        cmp: fn(f64, f64) -> bool,
    ) -> Result<Value> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(cmp(*a, *b))),
            _ => Err(QanunError::type_mismatch(
                operator.line,
                "Operands must be numbers.",
            )),
        }
    }

    /// `and`/`or` short-circuit and yield whichever operand decided the
    /// outcome, not a coerced boolean.
    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val = self.evaluate(left)?;

        match operator.token_type {
            TokenType::OR => {
                if left_val.is_truthy() {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            TokenType::AND => {
                if !left_val.is_truthy() {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            _ => Err(QanunError::type_mismatch(
                operator.line,
                format!("Invalid logical operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> Result<Value> {
        let object_val = self.evaluate(object)?;

        match &object_val {
            Value::Instance(instance) => {
                // fields shadow methods; methods come back bound to the
                // receiver
                let field = instance.borrow().fields.get(&name.lexeme).cloned();
                if let Some(field) = field {
                    return Ok(field);
                }

                let class = instance.borrow().class.clone();
                match class.find_method(&name.lexeme) {
                    Some(method) => Ok(Value::Function(Rc::new(method.bind(object_val.clone())))),
                    None => Err(QanunError::undefined_name(name)),
                }
            }

            Value::Class(class) => match class.find_static(&name.lexeme) {
                Some(method) => Ok(Value::Function(method)),
                None => Err(QanunError::undefined_name(name)),
            },

            Value::Module(module) => match module.get_member(&name.lexeme) {
                Some(member) => Ok(member),
                None => Err(QanunError::undefined_name(name)),
            },

            _ => Err(QanunError::type_mismatch(
                name.line,
                "Only instances, classes and modules have properties.",
            )),
        }
    }

    fn evaluate_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value> {
        let object_val = self.evaluate(object)?;

        match object_val {
            Value::Instance(instance) => {
                // fields are not pre-declared: assignment creates them
                let value = self.evaluate(value)?;
                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), value.clone());
                Ok(value)
            }
            _ => Err(QanunError::type_mismatch(
                name.line,
                "Only instances have fields.",
            )),
        }
    }

    /// `super.method` starts the lookup one level above the class the
    /// currently executing method was *defined* in, not above the receiver's
    /// runtime class.
    fn evaluate_super(&mut self, id: ReferenceId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = self
            .locals
            .get(id)
            .ok_or_else(|| QanunError::undefined_name(keyword))?;

        let superclass = match self.environment.borrow().get_at(distance, keyword)? {
            Value::Class(class) => class,
            _ => {
                return Err(QanunError::type_mismatch(
                    keyword.line,
                    "'super' did not resolve to a class.",
                ))
            }
        };

        // 'this' lives one scope inside the 'super' scope
        let this_token = Token::new(TokenType::THIS, "this", keyword.line);
        let instance = self
            .environment
            .borrow()
            .get_at(distance - 1, &this_token)?;

        match superclass.find_method(&method.lexeme) {
            Some(resolved) => Ok(Value::Function(Rc::new(resolved.bind(instance)))),
            None => Err(QanunError::undefined_name(method)),
        }
    }

    fn evaluate_list_operand(
        &mut self,
        object: &Expr,
        bracket: &Token,
    ) -> Result<Rc<RefCell<Vec<Value>>>> {
        match self.evaluate(object)? {
            Value::List(list) => Ok(list),
            _ => Err(QanunError::type_mismatch(
                bracket.line,
                "Only lists can be indexed.",
            )),
        }
    }

    fn list_index(&self, index: &Value, bracket: &Token, length: usize) -> Result<usize> {
        match index {
            Value::Number(n) if n.fract() == 0.0 => {
                let slot = *n as i64;
                if slot < 0 || slot as usize >= length {
                    Err(QanunError::index_out_of_bounds(bracket.line, slot, length))
                } else {
                    Ok(slot as usize)
                }
            }
            _ => Err(QanunError::type_mismatch(
                bracket.line,
                "List index must be an integer.",
            )),
        }
    }

    fn evaluate_list_access(
        &mut self,
        object: &Expr,
        bracket: &Token,
        index: &Expr,
    ) -> Result<Value> {
        let list = self.evaluate_list_operand(object, bracket)?;
        let index_val = self.evaluate(index)?;
        let slot = self.list_index(&index_val, bracket, list.borrow().len())?;
        let value = list.borrow()[slot].clone();
        Ok(value)
    }

    /// The mutator node carries no index of its own; it writes through the
    /// ListAccessor it targets, reusing that accessor's index expression.
    fn evaluate_list_mutation(&mut self, target: &Expr, value: &Expr) -> Result<Value> {
        let (object, bracket, index) = match target {
            Expr::ListAccessor {
                object,
                bracket,
                index,
            } => (object, bracket, index),
            _ => {
                return Err(QanunError::type_mismatch(
                    target.line(),
                    "Invalid list mutation target.",
                ))
            }
        };

        let list = self.evaluate_list_operand(object, bracket)?;
        let index_val = self.evaluate(index)?;
        let value = self.evaluate(value)?;
        let slot = self.list_index(&index_val, bracket, list.borrow().len())?;
        list.borrow_mut()[slot] = value.clone();
        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Variable access
    // ─────────────────────────────────────────────────────────────────────

    /// Resolved references jump straight to their recorded scope; everything
    /// else is a dynamic lookup against the global scope.
    fn look_up_variable(&self, id: ReferenceId, name: &Token) -> Result<Value> {
        match self.locals.get(id) {
            Some(distance) => self.environment.borrow().get_at(distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn assign_variable(&mut self, id: ReferenceId, name: &Token, value: Value) -> Result<()> {
        match self.locals.get(id) {
            Some(distance) => self.environment.borrow_mut().assign_at(distance, name, value),
            None => self.globals.borrow_mut().assign(name, value),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Call protocol
    // ─────────────────────────────────────────────────────────────────────

    /// Invokes a callable: a user-defined function, a class constructor, or
    /// a native function.
    fn invoke_callable(
        &mut self,
        callee: &Value,
        paren: &Token,
        arguments: &[Value],
    ) -> Result<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, paren, arguments),

            Value::NativeFunction(native) => {
                debug!("Calling native function '{}'", native.name);
                if arguments.len() != native.arity {
                    return Err(QanunError::arity_mismatch(
                        paren.line,
                        native.arity,
                        arguments.len(),
                    ));
                }
                (native.func)(arguments)
                    .map_err(|message| QanunError::native(&native.name, paren.line, message))
            }

            Value::Class(class) => self.instantiate(class, paren, arguments),

            _ => Err(QanunError::type_mismatch(
                paren.line,
                "Can only call functions and classes.",
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        paren: &Token,
        arguments: &[Value],
    ) -> Result<Value> {
        if arguments.len() != function.arity() {
            return Err(QanunError::arity_mismatch(
                paren.line,
                function.arity(),
                arguments.len(),
            ));
        }

        // every invocation chains a fresh scope onto the environment captured
        // at the definition site
        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            function.closure.clone(),
        )));
        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            env.borrow_mut().define(param, argument.clone())?;
        }

        let signal = self.execute_block(&function.declaration.body, env)?;

        // an initializer invocation yields the instance, even on an early
        // bare 'return'
        if function.is_initializer {
            if let Some(this) = function.closure.borrow().get_here("this") {
                return Ok(this);
            }
        }

        match signal {
            Signal::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    fn instantiate(&mut self, class: &Rc<Class>, paren: &Token, arguments: &[Value]) -> Result<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Value::Instance(Rc::new(RefCell::new(Instance::new(class.clone()))));

        match class.find_method("init") {
            Some(initializer) => {
                let bound = Rc::new(initializer.bind(instance.clone()));
                self.call_function(&bound, paren, arguments)?;
            }
            None => {
                if !arguments.is_empty() {
                    return Err(QanunError::arity_mismatch(paren.line, 0, arguments.len()));
                }
            }
        }

        Ok(instance)
    }
}
