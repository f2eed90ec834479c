/// The SOM value model.
///
/// Small immutable values (`nil`, booleans, integers, doubles, symbols) are
/// stored inline in [`Value`]. Everything with identity or mutable state is
/// reference counted: strings, arrays, plain objects, classes, blocks and
/// invokables. The runtime is single-threaded, so sharing is `Rc` and
/// mutation goes through `RefCell`/`Cell`.
use std::cell::RefCell;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::class::Class;
use crate::frame::Frame;
use crate::interning::Interned;
use crate::invokable::Invokable;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    /// Integers that do not fit a machine word, and literals outside the
    /// 32-bit range.
    BigInteger(Rc<BigInt>),
    Double(f64),
    String(Rc<str>),
    Symbol(Interned),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<Instance>),
    Class(Rc<Class>),
    Block(Rc<Block>),
    Invokable(Rc<Invokable>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Self::String(Rc::from(s))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(values)))
    }

    /// An integer, demoted to a machine word when it fits.
    pub fn from_bigint(value: BigInt) -> Self {
        match value.to_i64() {
            Some(i) => Self::Integer(i),
            None => Self::BigInteger(Rc::new(value)),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_block(&self) -> Option<&Rc<Block>> {
        match self {
            Self::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<Class>> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Identity as observed by `==`.
    ///
    /// Immediates compare by value, everything else by reference.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::BigInteger(a), Self::BigInteger(b)) => Rc::ptr_eq(a, b),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Block(a), Self::Block(b)) => Rc::ptr_eq(a, b),
            (Self::Invokable(a), Self::Invokable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) | Self::BigInteger(_) => "Integer",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::Symbol(_) => "Symbol",
            Self::Array(_) => "Array",
            Self::Object(_) => "Object",
            Self::Class(_) => "Class",
            Self::Block(_) => "Block",
            Self::Invokable(_) => "Invokable",
        }
    }

    /// Read an instance variable. Class objects expose their class-side
    /// fields; values without fields answer `nil`.
    pub fn field(&self, index: usize) -> Value {
        match self {
            Self::Object(o) => o.field(index),
            Self::Class(c) => c.field(index),
            _ => Value::Nil,
        }
    }

    pub fn set_field(&self, index: usize, value: Value) {
        match self {
            Self::Object(o) => o.set_field(index, value),
            Self::Class(c) => c.set_field(index, value),
            _ => {}
        }
    }

    pub fn number_of_fields(&self) -> usize {
        match self {
            Self::Object(o) => o.number_of_fields(),
            Self::Array(a) => a.borrow().len(),
            _ => 0,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::BigInteger(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(s) => write!(f, "#<symbol {}>", s.index()),
            Self::Array(a) => f.debug_list().entries(a.borrow().iter()).finish(),
            Self::Object(o) => write!(f, "a {}", o.class().name_string()),
            Self::Class(c) => f.write_str(&c.name_string()),
            Self::Block(b) => write!(f, "[{}]", b.method().signature_string()),
            Self::Invokable(i) => write!(f, "<{}>", i.signature_string()),
        }
    }
}

/// An instance of a class defined in SOM.
pub struct Instance {
    class: RefCell<Rc<Class>>,
    fields: RefCell<Vec<Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        let fields = vec![Value::Nil; class.number_of_instance_fields()];
        Self {
            class: RefCell::new(class),
            fields: RefCell::new(fields),
        }
    }

    pub fn class(&self) -> Rc<Class> {
        self.class.borrow().clone()
    }

    /// Swap the class of a live object. Fields are kept as they are.
    pub fn set_class(&self, class: Rc<Class>) {
        *self.class.borrow_mut() = class;
    }

    pub fn field(&self, index: usize) -> Value {
        self.fields.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn set_field(&self, index: usize, value: Value) {
        let mut fields = self.fields.borrow_mut();
        if index >= fields.len() {
            fields.resize(index + 1, Value::Nil);
        }
        fields[index] = value;
    }

    pub fn number_of_fields(&self) -> usize {
        self.fields.borrow().len()
    }
}

/// A closure: a block method plus the activation it was created in.
pub struct Block {
    method: Rc<Invokable>,
    context: Rc<Frame>,
}

impl Block {
    pub fn new(method: Rc<Invokable>, context: Rc<Frame>) -> Self {
        Self { method, context }
    }

    pub fn method(&self) -> &Rc<Invokable> {
        &self.method
    }

    pub fn context(&self) -> &Rc<Frame> {
        &self.context
    }

    /// The receiver of the enclosing activation: `self` for a block written
    /// directly in a method, the enclosing block for nested blocks.
    pub fn outer_self(&self) -> Value {
        self.context.receiver()
    }

    /// Arguments including the block itself.
    pub fn number_of_arguments(&self) -> usize {
        self.method.number_of_arguments()
    }
}
