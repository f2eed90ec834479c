use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::object::Value;

/// One method or block activation.
///
/// Frames are heap allocated and shared: a block created in an activation
/// keeps that frame alive, which is how closures see (and update) the
/// temporaries of their enclosing method. There is no parent pointer; the
/// lexical chain runs through the receivers of block activations.
pub struct Frame {
    /// Receiver at index 0, then the message arguments.
    args: Vec<Value>,
    temps: RefCell<Vec<Value>>,
    on_stack: Cell<bool>,
}

impl Frame {
    pub fn new(args: Vec<Value>, number_of_temps: usize) -> Rc<Self> {
        Rc::new(Self {
            args,
            temps: RefCell::new(vec![Value::Nil; number_of_temps]),
            on_stack: Cell::new(true),
        })
    }

    pub fn receiver(&self) -> Value {
        self.args.first().cloned().unwrap_or_default()
    }

    pub fn argument(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    pub fn number_of_arguments(&self) -> usize {
        self.args.len()
    }

    pub fn temp(&self, index: usize) -> Value {
        self.temps.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn set_temp(&self, index: usize, value: Value) {
        let mut temps = self.temps.borrow_mut();
        if index >= temps.len() {
            temps.resize(index + 1, Value::Nil);
        }
        temps[index] = value;
    }

    /// Still a valid target for a non-local return?
    pub fn is_on_stack(&self) -> bool {
        self.on_stack.get()
    }

    pub fn drop_from_stack(&self) {
        self.on_stack.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_start_as_nil() {
        let frame = Frame::new(vec![Value::Integer(7)], 2);
        assert!(frame.temp(0).is_nil());
        assert!(frame.temp(1).is_nil());
        assert_eq!(frame.receiver().as_integer(), Some(7));
    }

    #[test]
    fn dropping_is_sticky() {
        let frame = Frame::new(vec![Value::Nil], 0);
        assert!(frame.is_on_stack());
        frame.drop_from_stack();
        assert!(!frame.is_on_stack());
    }

    #[test]
    fn temps_are_shared_through_the_rc() {
        let frame = Frame::new(vec![Value::Nil], 1);
        let captured = frame.clone();
        captured.set_temp(0, Value::Integer(3));
        assert_eq!(frame.temp(0).as_integer(), Some(3));
    }
}
