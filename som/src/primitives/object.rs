use std::rc::Rc;

use super::{PrimitiveMessage, arg, argument_error, array_elements, expect_integer, expect_symbol};
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("==", identical),
    PrimitiveMessage::new("hashcode", hashcode),
    PrimitiveMessage::new("objectSize", object_size),
    PrimitiveMessage::new("perform:", perform),
    PrimitiveMessage::new("perform:inSuperclass:", perform_in_superclass),
    PrimitiveMessage::new("perform:withArguments:", perform_with_arguments),
    PrimitiveMessage::new("instVarAt:", inst_var_at),
    PrimitiveMessage::new("instVarAt:put:", inst_var_at_put),
    PrimitiveMessage::new("instVarNamed:", inst_var_named),
    PrimitiveMessage::new("halt", halt),
    PrimitiveMessage::new("class", class),
];

fn identical(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Boolean(arg(&args, 0).identical(&arg(&args, 1))))
}

/// Immediates hash by value, everything else by address.
pub(super) fn identity_hash(value: &Value) -> i64 {
    let address = match value {
        Value::Nil => 0,
        Value::Boolean(b) => return i64::from(*b) + 1,
        Value::Integer(i) => return *i,
        Value::BigInteger(i) => Rc::as_ptr(i) as *const () as usize,
        Value::Double(d) => return (d.to_bits() & 0x7fff_ffff) as i64,
        Value::String(s) => Rc::as_ptr(s) as *const () as usize,
        Value::Symbol(s) => return i64::from(s.index()),
        Value::Array(a) => Rc::as_ptr(a) as *const () as usize,
        Value::Object(o) => Rc::as_ptr(o) as *const () as usize,
        Value::Class(c) => Rc::as_ptr(c) as *const () as usize,
        Value::Block(b) => Rc::as_ptr(b) as *const () as usize,
        Value::Invokable(i) => Rc::as_ptr(i) as *const () as usize,
    };
    ((address >> 3) & 0x7fff_ffff) as i64
}

fn hashcode(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Integer(identity_hash(&arg(&args, 0))))
}

fn object_size(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Integer(arg(&args, 0).number_of_fields() as i64))
}

fn perform(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let selector = expect_symbol(u, "perform:", &arg(&args, 1))?;
    u.dispatch(selector, vec![arg(&args, 0)], caller)
}

fn perform_in_superclass(
    u: &Universe,
    caller: Option<&Rc<Frame>>,
    args: Vec<Value>,
) -> Exec<Value> {
    let selector = expect_symbol(u, "perform:inSuperclass:", &arg(&args, 1))?;
    let Value::Class(class) = arg(&args, 2) else {
        return Err(argument_error("perform:inSuperclass:", "expected a Class").into());
    };
    let receiver = arg(&args, 0);
    match class.lookup_invokable(selector) {
        Some(method) => method.invoke(u, caller, vec![receiver]),
        None => u.send_does_not_understand(selector, vec![receiver]),
    }
}

fn perform_with_arguments(
    u: &Universe,
    caller: Option<&Rc<Frame>>,
    args: Vec<Value>,
) -> Exec<Value> {
    let selector = expect_symbol(u, "perform:withArguments:", &arg(&args, 1))?;
    let mut send_args = vec![arg(&args, 0)];
    send_args.extend(array_elements(u, "perform:withArguments:", &arg(&args, 2))?);
    u.dispatch(selector, send_args, caller)
}

fn field_index(u: &Universe, selector: &str, value: &Value) -> Exec<usize> {
    let index = expect_integer(u, selector, value)?;
    if index < 1 {
        return Err(argument_error(selector, format!("field index {} out of range", index)).into());
    }
    Ok((index - 1) as usize)
}

fn inst_var_at(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let index = field_index(u, "instVarAt:", &arg(&args, 1))?;
    Ok(arg(&args, 0).field(index))
}

fn inst_var_at_put(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let index = field_index(u, "instVarAt:put:", &arg(&args, 1))?;
    let value = arg(&args, 2);
    arg(&args, 0).set_field(index, value.clone());
    Ok(value)
}

fn inst_var_named(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let receiver = arg(&args, 0);
    let name = expect_symbol(u, "instVarNamed:", &arg(&args, 1))?;
    match u.class_of(&receiver).lookup_field_index(name) {
        Some(index) => Ok(receiver.field(index)),
        None => Err(argument_error(
            "instVarNamed:",
            format!("no field named {}", u.symbol_text(name)),
        )
        .into()),
    }
}

fn halt(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    u.println("BREAKPOINT")?;
    Ok(arg(&args, 0))
}

fn class(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Class(u.class_of(&arg(&args, 0))))
}
