use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::expr::FunctionBody;

/// Runtime values of the Qanun language.
///
/// Ownership is reference-counted throughout: closures, classes and instances
/// form shared (and potentially cyclic) graphs that can outlive the call frame
/// that created them, so `Rc` is the only workable model here.  Cycles leak,
/// which the runtime accepts by design.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    NativeFunction(Rc<NativeFunction>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    Module(Rc<Module>),
}

impl Value {
    /// Qanun truthiness: nil and false are falsy, every other value
    /// (including 0, "" and []) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }
}

/// Qanun equality: structural for primitives and lists, reference identity
/// for functions, classes, instances and modules.
///
/// List comparison recurses element-wise after an identity shortcut, with no
/// cycle detection: comparing two *distinct* lists that reach each other
/// recurses without bound.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    let mut buf: itoa::Buffer = itoa::Buffer::new();
                    f.write_str(buf.format(*n as i64))
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }

            Value::Function(function) => match &function.name {
                Some(name) => write!(f, "<fn {}>", name),
                None => write!(f, "<anonymous fn>"),
            },

            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class.name),

            Value::Module(module) => write!(f, "<module {}>", module.name),
        }
    }
}

/// A user-defined function or method: the shared declaration plus the
/// environment captured at its definition site.
#[derive(Clone)]
pub struct Function {
    /// Declared name; `None` for anonymous function expressions.
    pub name: Option<String>,

    pub declaration: Rc<FunctionBody>,

    /// Environment active where the function was defined — *not* where it is
    /// called.  Every invocation chains a fresh scope onto this one.
    pub closure: Rc<RefCell<Environment>>,

    /// True for methods named `init`; their invocations yield the instance.
    pub is_initializer: bool,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a bound method: a copy of this function whose closure chain is
    /// extended with a scope carrying `this` = `instance`.
    pub fn bind(&self, instance: Value) -> Function {
        let env = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        env.borrow_mut().define_unchecked("this", instance);

        Function {
            name: self.name.clone(),
            declaration: self.declaration.clone(),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

impl fmt::Debug for Function {
    // Closures may be cyclic through their captured environment; never print
    // the chain.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<anonymous fn>"),
        }
    }
}

/// A native function supplied by the host across the capability boundary:
/// a declared arity plus an opaque invocation entry point.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: Box<dyn Fn(&[Value]) -> std::result::Result<Value, String>>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A class: name, optional superclass, and method tables.
///
/// The superclass link is shared, not owned — many subclasses may reference
/// one class value.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
    pub static_methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Look up an instance method here, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// Look up a static method here, then up the superclass chain.
    pub fn find_static(&self, name: &str) -> Option<Rc<Function>> {
        self.static_methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_static(name))
        })
    }
}

/// An instance: a shared reference to its class plus its own mutable field
/// map, created empty and populated by assignment (fields are not
/// pre-declared in Qanun).
#[derive(Clone)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: HashMap::new(),
        }
    }
}

impl fmt::Debug for Instance {
    // Fields may reference the instance itself; never print them.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

/// A module: a named sub-scope holding the classes, functions, variables and
/// constants declared inside it.
#[derive(Clone)]
pub struct Module {
    pub name: String,
    pub members: Rc<RefCell<Environment>>,
}

impl Module {
    /// Look up a member in the module's own scope only — module access never
    /// falls through to enclosing scopes.
    pub fn get_member(&self, name: &str) -> Option<Value> {
        self.members.borrow().get_here(name)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<module {}>", self.name)
    }
}
