use std::cell::RefCell;
use std::rc::Rc;

use super::{PrimitiveMessage, arg, argument_error, expect_block, expect_integer, invoke_block};
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("at:", at),
    PrimitiveMessage::new("at:put:", at_put),
    PrimitiveMessage::new("length", length),
    PrimitiveMessage::new("doIndexes:", do_indexes),
    PrimitiveMessage::new("do:", each),
    PrimitiveMessage::class_side("new:", new),
];

fn receiver(selector: &str, args: &[Value]) -> Exec<Rc<RefCell<Vec<Value>>>> {
    match arg(args, 0) {
        Value::Array(elements) => Ok(elements),
        _ => Err(argument_error(selector, "receiver is not an Array").into()),
    }
}

/// Zero-based slot for a 1-based SOM index.
fn slot(u: &Universe, selector: &str, index: &Value, length: usize) -> Exec<usize> {
    let index = expect_integer(u, selector, index)?;
    if index < 1 || index as u64 > length as u64 {
        return Err(argument_error(
            selector,
            format!("index {} out of bounds for length {}", index, length),
        )
        .into());
    }
    Ok((index - 1) as usize)
}

fn at(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let elements = receiver("at:", &args)?;
    let elements = elements.borrow();
    let index = slot(u, "at:", &arg(&args, 1), elements.len())?;
    Ok(elements[index].clone())
}

fn at_put(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let elements = receiver("at:put:", &args)?;
    let mut elements = elements.borrow_mut();
    let index = slot(u, "at:put:", &arg(&args, 1), elements.len())?;
    let value = arg(&args, 2);
    elements[index] = value.clone();
    Ok(value)
}

fn length(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Integer(receiver("length", &args)?.borrow().len() as i64))
}

/// The array may change while the block runs, so the length is read on
/// every step and no borrow is held across the call.
fn do_indexes(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let elements = receiver("doIndexes:", &args)?;
    let block = expect_block(u, "doIndexes:", &arg(&args, 1))?;
    let mut i = 0;
    while i < elements.borrow().len() {
        invoke_block(u, caller, &block, vec![Value::Integer(i as i64 + 1)])?;
        i += 1;
    }
    Ok(arg(&args, 0))
}

fn each(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let elements = receiver("do:", &args)?;
    let block = expect_block(u, "do:", &arg(&args, 1))?;
    let mut i = 0;
    loop {
        let Some(element) = elements.borrow().get(i).cloned() else {
            break;
        };
        invoke_block(u, caller, &block, vec![element])?;
        i += 1;
    }
    Ok(arg(&args, 0))
}

fn new(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let length = expect_integer(u, "new:", &arg(&args, 1))?;
    if length < 0 {
        return Err(argument_error("new:", format!("negative length {}", length)).into());
    }
    Ok(Value::array(vec![Value::Nil; length as usize]))
}

#[cfg(test)]
mod tests {
    use crate::universe::tests::{run, test_universe};

    fn eval(body: &str) -> String {
        let u = test_universe();
        let source = format!("EvalA = ( run = ( | a sum | {} ) )", body);
        let result = run(&u, &source, "run");
        u.print_string(&result)
    }

    #[test]
    fn new_fills_with_nil() {
        assert_eq!(eval("a := Array new: 3. ^ a"), "(nil nil nil)");
        assert_eq!(eval("^ (Array new: 0) length"), "0");
    }

    #[test]
    fn indexing_is_one_based() {
        assert_eq!(eval("a := Array new: 2. a at: 1 put: 10. a at: 2 put: 20. ^ (a at: 1) + (a at: 2)"), "30");
        assert_eq!(eval("a := Array new: 2. ^ a at: 2 put: #x"), "#x");
    }

    #[test]
    fn iteration() {
        assert_eq!(
            eval("sum := 0. a := Array new: 3. a at: 1 put: 1. a at: 2 put: 2. a at: 3 put: 3. a do: [:e | sum := sum + e]. ^ sum"),
            "6"
        );
        assert_eq!(eval("sum := 0. (Array new: 4) doIndexes: [:i | sum := sum + i]. ^ sum"), "10");
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let u = test_universe();
        let class = u
            .load_class_from_string("Oob = ( run = ( ^ (Array new: 2) at: 3 ) )")
            .expect("compile");
        let result = u.dispatch(u.symbol("run"), vec![u.new_instance(&class)], None);
        assert!(result.is_err());
    }
}
