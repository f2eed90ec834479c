use std::rc::Rc;

use super::{PrimitiveMessage, arg, argument_error, array_elements};
use crate::error::Exec;
use crate::frame::Frame;
use crate::invokable::Invokable;
use crate::object::Value;
use crate::universe::Universe;

/// Shared by `Method` and `Primitive`.
pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("holder", holder),
    PrimitiveMessage::new("signature", signature),
    PrimitiveMessage::new("invokeOn:with:", invoke_on_with),
];

fn receiver(selector: &str, args: &[Value]) -> Exec<Rc<Invokable>> {
    match arg(args, 0) {
        Value::Invokable(invokable) => Ok(invokable),
        _ => Err(argument_error(selector, "receiver is not a method").into()),
    }
}

fn holder(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(receiver("holder", &args)?
        .holder()
        .map(Value::Class)
        .unwrap_or_default())
}

fn signature(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Symbol(receiver("signature", &args)?.signature()))
}

/// `aMethod invokeOn: receiver with: argumentsOrNil`
fn invoke_on_with(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let method = receiver("invokeOn:with:", &args)?;
    let mut call_args = vec![arg(&args, 1)];
    call_args.extend(array_elements(u, "invokeOn:with:", &arg(&args, 2))?);
    method.invoke(u, caller, call_args)
}
