/// Native method tables.
///
/// Each core class with native behaviour has a table of
/// [`PrimitiveMessage`]s. Loading such a class replaces the methods it
/// declared `primitive` with the native functions listed here; from the
/// dispatcher's point of view the result is an ordinary method table entry.
use std::rc::Rc;

use log::warn;

use crate::class::Class;
use crate::error::{Exec, VmError};
use crate::frame::Frame;
use crate::interning::Interned;
use crate::invokable::{Invokable, InvokableKind, PrimitiveFn};
use crate::object::{Block, Value};
use crate::universe::Universe;

mod array;
mod block;
mod class;
mod double;
mod integer;
mod method;
mod object;
mod string;
mod system;

#[derive(Debug, Copy, Clone)]
pub struct PrimitiveMessage {
    pub selector: &'static str,
    /// Installed in the metaclass rather than the class.
    pub class_side: bool,
    pub ptr: PrimitiveFn,
}

impl PrimitiveMessage {
    pub const fn new(selector: &'static str, ptr: PrimitiveFn) -> Self {
        Self {
            selector,
            class_side: false,
            ptr,
        }
    }

    pub const fn class_side(selector: &'static str, ptr: PrimitiveFn) -> Self {
        Self {
            selector,
            class_side: true,
            ptr,
        }
    }
}

pub fn primitives_for(class_name: &str) -> Option<&'static [PrimitiveMessage]> {
    Some(match class_name {
        "Object" => object::PRIMITIVES,
        "Class" => class::PRIMITIVES,
        "Integer" => integer::PRIMITIVES,
        "Double" => double::PRIMITIVES,
        "String" => string::PRIMITIVES,
        "Symbol" => string::SYMBOL_PRIMITIVES,
        "Array" => array::PRIMITIVES,
        "Block" => block::PRIMITIVES,
        "Block1" => block::VALUE_PRIMITIVES,
        "Block2" => block::VALUE_WITH_PRIMITIVES,
        "Block3" => block::VALUE_WITH_WITH_PRIMITIVES,
        "Method" | "Primitive" => method::PRIMITIVES,
        "System" => system::PRIMITIVES,
        _ => return None,
    })
}

/// Install the native functions registered for `class`.
///
/// Classes outside the core library only get here when they declare
/// primitives, so a missing table is worth a warning for them.
pub fn install(u: &Universe, class: &Rc<Class>, is_system_class: bool) {
    let name = class.name_string();
    let Some(table) = primitives_for(&name) else {
        if !is_system_class {
            warn!("no primitives known for class {}", name);
        }
        return;
    };

    for primitive in table {
        let target = if primitive.class_side {
            match class.class() {
                Some(meta) => meta,
                None => continue,
            }
        } else {
            class.clone()
        };
        let signature = u.symbol(primitive.selector);
        target.add_instance_primitive(Invokable::new(
            signature,
            u.symbol_text(signature),
            InvokableKind::Primitive(primitive.ptr),
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Argument helpers shared by the primitive libraries
// ═══════════════════════════════════════════════════════════════════

fn argument_error(selector: &str, message: impl Into<String>) -> VmError {
    VmError::PrimitiveArgument {
        selector: selector.to_string(),
        message: message.into(),
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn expect_integer(u: &Universe, selector: &str, value: &Value) -> Exec<i64> {
    value.as_integer().ok_or_else(|| {
        argument_error(
            selector,
            format!("expected an Integer, got {}", u.print_string(value)),
        )
        .into()
    })
}

fn expect_symbol(u: &Universe, selector: &str, value: &Value) -> Exec<Interned> {
    match value {
        Value::Symbol(s) => Ok(*s),
        Value::String(s) => Ok(u.symbol(s)),
        other => Err(argument_error(
            selector,
            format!("expected a Symbol, got {}", u.print_string(other)),
        )
        .into()),
    }
}

fn expect_block(u: &Universe, selector: &str, value: &Value) -> Exec<Rc<Block>> {
    value.as_block().cloned().ok_or_else(|| {
        argument_error(
            selector,
            format!("expected a Block, got {}", u.print_string(value)),
        )
        .into()
    })
}

/// Text of a String or Symbol.
fn text_of(u: &Universe, value: &Value) -> Option<Rc<str>> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Symbol(s) => Some(Rc::from(&*u.symbol_text(*s))),
        _ => None,
    }
}

fn expect_text(u: &Universe, selector: &str, value: &Value) -> Exec<Rc<str>> {
    text_of(u, value).ok_or_else(|| {
        argument_error(
            selector,
            format!("expected a String, got {}", u.print_string(value)),
        )
        .into()
    })
}

/// Elements of an Array argument; `nil` counts as empty.
fn array_elements(u: &Universe, selector: &str, value: &Value) -> Exec<Vec<Value>> {
    match value {
        Value::Array(a) => Ok(a.borrow().clone()),
        Value::Nil => Ok(Vec::new()),
        other => Err(argument_error(
            selector,
            format!("expected an Array, got {}", u.print_string(other)),
        )
        .into()),
    }
}

fn invoke_block(
    u: &Universe,
    caller: Option<&Rc<Frame>>,
    block: &Rc<Block>,
    mut args: Vec<Value>,
) -> Exec<Value> {
    args.insert(0, Value::Block(block.clone()));
    block.method().invoke(u, caller, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::tests::test_universe;

    #[test]
    fn tables_resolve_by_class_name() {
        assert!(primitives_for("Integer").is_some());
        assert!(primitives_for("Block2").is_some());
        assert!(primitives_for("Foo").is_none());
    }

    #[test]
    fn class_side_primitives_land_in_the_metaclass() {
        let u = test_universe();
        let array_meta = u.core().array.class().expect("Array class");
        let found = array_meta
            .lookup_invokable(u.symbol("new:"))
            .expect("Array class>>new:");
        assert!(matches!(found.kind(), InvokableKind::Primitive(_)));
        assert!(u.core().array.lookup_invokable(u.symbol("new:")).is_none());
    }

    #[test]
    fn declared_primitives_are_replaced() {
        let u = test_universe();
        let plus = u
            .core()
            .integer
            .lookup_invokable(u.symbol("+"))
            .expect("Integer>>+");
        assert!(matches!(plus.kind(), InvokableKind::Primitive(_)));
        assert!(Rc::ptr_eq(&plus.holder().expect("holder"), &u.core().integer));
    }
}
