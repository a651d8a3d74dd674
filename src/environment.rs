use std::collections::HashMap;
use std::rc::Rc;

use std::cell::RefCell;

use log::debug;

use crate::error::{QanunError, Result};
use crate::token::Token;
use crate::value::Value;

/// One lexical scope: two disjoint name→value maps (mutable `var` bindings
/// and immutable `val` bindings) plus a shared reference to the directly
/// enclosing scope.
///
/// Scopes are created in lock-step with the static block structure, so a
/// distance computed by the resolver is valid against the chain the
/// interpreter builds at run time.
#[derive(Debug)]
pub struct Environment {
    variables: HashMap<String, Value>,
    constants: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    /// The root (global) scope.
    pub fn new() -> Self {
        Environment {
            variables: HashMap::new(),
            constants: HashMap::new(),
            enclosing: None,
        }
    }

    /// A child scope chained onto `enclosing`.
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            variables: HashMap::new(),
            constants: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Declare a mutable binding in *this* scope.
    ///
    /// Shadowing an outer scope is allowed; redefining a name already present
    /// in either map of this scope is a [`QanunError::Redeclaration`].
    pub fn define(&mut self, name: &Token, value: Value) -> Result<()> {
        self.check_declaration_conflict(name)?;

        debug!("Defining variable '{}'", name.lexeme);

        self.variables.insert(name.lexeme.clone(), value);

        Ok(())
    }

    /// Declare an immutable binding in *this* scope. Same conflict check as
    /// [`Environment::define`].
    pub fn define_constant(&mut self, name: &Token, value: Value) -> Result<()> {
        self.check_declaration_conflict(name)?;

        debug!("Defining constant '{}'", name.lexeme);

        self.constants.insert(name.lexeme.clone(), value);

        Ok(())
    }

    /// Insert a binding the runtime itself creates (`this`, `super`, native
    /// functions, loop variables already vetted by the resolver).  Skips the
    /// conflict check; the caller guarantees the scope is fresh.
    pub fn define_unchecked(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    /// Dynamic lookup: this scope's variables, then constants, then the
    /// enclosing chain.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.variables.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(value) = self.constants.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(QanunError::undefined_name(name)),
        }
    }

    /// Lookup restricted to this scope — used for module member access, which
    /// never falls through to enclosing scopes.
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.variables
            .get(name)
            .or_else(|| self.constants.get(name))
            .cloned()
    }

    /// Dynamic assignment: a constant in this scope rejects the write, a
    /// variable in this scope takes it, otherwise the enclosing chain is
    /// consulted.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.constants.contains_key(&name.lexeme) {
            return Err(QanunError::constant_assignment(name));
        }

        if let Some(slot) = self.variables.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(QanunError::undefined_name(name)),
        }
    }

    /// Resolved lookup: jump exactly `distance` scopes outward, then search
    /// that scope only.  A miss there is a resolver/environment mismatch and
    /// surfaces as the same [`QanunError::UndefinedName`] the slow path
    /// raises — there is no fallback to dynamic search.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value> {
        if distance == 0 {
            if let Some(value) = self.variables.get(&name.lexeme) {
                return Ok(value.clone());
            }

            if let Some(value) = self.constants.get(&name.lexeme) {
                return Ok(value.clone());
            }

            return Err(QanunError::undefined_name(name));
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name),
            None => Err(QanunError::undefined_name(name)),
        }
    }

    /// Resolved assignment, mirroring [`Environment::get_at`]: exactly
    /// `distance` hops, constant check first, same errors as the slow path.
    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Value) -> Result<()> {
        if distance == 0 {
            if self.constants.contains_key(&name.lexeme) {
                return Err(QanunError::constant_assignment(name));
            }

            if let Some(slot) = self.variables.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }

            return Err(QanunError::undefined_name(name));
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_at(distance - 1, name, value),
            None => Err(QanunError::undefined_name(name)),
        }
    }

    fn check_declaration_conflict(&self, name: &Token) -> Result<()> {
        if self.variables.contains_key(&name.lexeme) || self.constants.contains_key(&name.lexeme) {
            return Err(QanunError::redeclaration(name));
        }

        Ok(())
    }
}
