use std::rc::Rc;

use super::{PrimitiveMessage, arg, argument_error};
use crate::class::Class;
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("new", new),
    PrimitiveMessage::new("name", name),
    PrimitiveMessage::new("superclass", superclass),
    PrimitiveMessage::new("methods", methods),
    PrimitiveMessage::new("fields", fields),
];

fn receiver(selector: &str, args: &[Value]) -> Exec<Rc<Class>> {
    match arg(args, 0) {
        Value::Class(class) => Ok(class),
        _ => Err(argument_error(selector, "receiver is not a class").into()),
    }
}

fn new(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let class = receiver("new", &args)?;
    Ok(u.new_instance(&class))
}

fn name(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Symbol(receiver("name", &args)?.name()))
}

fn superclass(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(receiver("superclass", &args)?
        .superclass()
        .map(Value::Class)
        .unwrap_or_default())
}

fn methods(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let class = receiver("methods", &args)?;
    Ok(Value::array(
        class.invokables().into_iter().map(Value::Invokable).collect(),
    ))
}

fn fields(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let class = receiver("fields", &args)?;
    Ok(Value::array(
        class.instance_fields().into_iter().map(Value::Symbol).collect(),
    ))
}
