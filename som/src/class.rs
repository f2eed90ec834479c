use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use log::warn;

use crate::interning::Interned;
use crate::invokable::Invokable;
use crate::object::Value;

/// A class or metaclass.
///
/// Classes are objects too: `class` is the metaclass, and `fields` holds
/// the values of the class-side variables declared after the separator.
/// The metaclass link is filled in after allocation because the bootstrap
/// classes refer to each other in a cycle.
pub struct Class {
    name: Cell<Interned>,
    name_text: RefCell<Arc<str>>,
    class: RefCell<Option<Rc<Class>>>,
    superclass: RefCell<Option<Rc<Class>>>,
    instance_fields: RefCell<Vec<Interned>>,
    pub(crate) invokables: RefCell<Vec<Rc<Invokable>>>,
    /// Selector to invokable, filled by lookups; see `lookup.rs`.
    pub(crate) cache: RefCell<HashMap<Interned, Rc<Invokable>>>,
    fields: RefCell<Vec<Value>>,
}

impl Class {
    pub fn new(name: Interned, name_text: Arc<str>) -> Rc<Self> {
        Rc::new(Self {
            name: Cell::new(name),
            name_text: RefCell::new(name_text),
            class: RefCell::new(None),
            superclass: RefCell::new(None),
            instance_fields: RefCell::new(Vec::new()),
            invokables: RefCell::new(Vec::new()),
            cache: RefCell::new(HashMap::new()),
            fields: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> Interned {
        self.name.get()
    }

    pub fn name_string(&self) -> Arc<str> {
        self.name_text.borrow().clone()
    }

    pub fn set_name(&self, name: Interned, text: Arc<str>) {
        self.name.set(name);
        *self.name_text.borrow_mut() = text;
    }

    /// The metaclass. `None` only while bootstrapping.
    pub fn class(&self) -> Option<Rc<Class>> {
        self.class.borrow().clone()
    }

    pub fn set_class(&self, class: Rc<Class>) {
        *self.class.borrow_mut() = Some(class);
    }

    pub fn superclass(&self) -> Option<Rc<Class>> {
        self.superclass.borrow().clone()
    }

    pub fn set_superclass(&self, superclass: Option<Rc<Class>>) {
        *self.superclass.borrow_mut() = superclass;
        self.cache.borrow_mut().clear();
    }

    pub fn has_superclass(&self) -> bool {
        self.superclass.borrow().is_some()
    }

    pub fn instance_fields(&self) -> Vec<Interned> {
        self.instance_fields.borrow().clone()
    }

    pub fn set_instance_fields(&self, fields: Vec<Interned>) {
        *self.instance_fields.borrow_mut() = fields;
    }

    pub fn number_of_instance_fields(&self) -> usize {
        self.instance_fields.borrow().len()
    }

    /// Later declarations shadow earlier ones, so search from the end.
    pub fn lookup_field_index(&self, name: Interned) -> Option<usize> {
        self.instance_fields.borrow().iter().rposition(|&f| f == name)
    }

    pub fn invokables(&self) -> Vec<Rc<Invokable>> {
        self.invokables.borrow().clone()
    }

    pub fn number_of_invokables(&self) -> usize {
        self.invokables.borrow().len()
    }

    /// Replace the method table, taking ownership of every entry.
    pub fn set_instance_invokables(self: &Rc<Self>, invokables: Vec<Rc<Invokable>>) {
        for invokable in &invokables {
            invokable.set_holder(self);
        }
        *self.invokables.borrow_mut() = invokables;
        self.cache.borrow_mut().clear();
    }

    /// Replace the entry with the same signature, or append.
    ///
    /// Returns `true` if the invokable was appended.
    pub fn add_instance_invokable(self: &Rc<Self>, value: Rc<Invokable>) -> bool {
        value.set_holder(self);
        self.cache.borrow_mut().clear();

        let mut invokables = self.invokables.borrow_mut();
        let signature = value.signature();
        if let Some(slot) =
            invokables.iter_mut().find(|i| i.signature() == signature)
        {
            *slot = value;
            return false;
        }
        invokables.push(value);
        true
    }

    pub fn add_instance_primitive(self: &Rc<Self>, value: Rc<Invokable>) {
        let signature = value.signature_string();
        if self.add_instance_invokable(value) {
            warn!(
                "primitive {} is not in class definition for class {}",
                signature,
                self.name_string()
            );
        }
    }

    fn includes_primitives(&self) -> bool {
        self.invokables.borrow().iter().any(|i| i.is_primitive())
    }

    /// Declares `primitive` methods on either side.
    pub fn has_primitives(&self) -> bool {
        self.includes_primitives()
            || self.class().is_some_and(|c| c.includes_primitives())
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
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Class({})", self.name_string())
    }
}
