use std::cmp::Ordering;
use std::rc::Rc;

use super::integer::{Number, compare, floor_to_integer, operands};
use super::{PrimitiveMessage, arg, argument_error};
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("asString", as_string),
    PrimitiveMessage::new("round", round),
    PrimitiveMessage::new("sqrt", sqrt),
    PrimitiveMessage::new("+", plus),
    PrimitiveMessage::new("-", minus),
    PrimitiveMessage::new("*", multiply),
    PrimitiveMessage::new("//", divide),
    PrimitiveMessage::new("%", modulo),
    PrimitiveMessage::new("=", equals),
    PrimitiveMessage::new("<", less_than),
];

fn receiver(u: &Universe, selector: &str, args: &[Value]) -> Exec<f64> {
    match Number::of(&arg(args, 0)) {
        Some(n) => Ok(n.to_f64()),
        None => Err(argument_error(
            selector,
            format!("not a number: {}", u.print_string(&arg(args, 0))),
        )
        .into()),
    }
}

fn binary(u: &Universe, selector: &str, args: &[Value], op: fn(f64, f64) -> f64) -> Exec<Value> {
    let (left, right) = operands(u, selector, args)?;
    Ok(Value::Double(op(left.to_f64(), right.to_f64())))
}

fn as_string(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::string(&format!("{:?}", receiver(u, "asString", &args)?)))
}

/// Rounds halves upwards.
fn round(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let value = receiver(u, "round", &args)?;
    floor_to_integer("round", value + 0.5)
}

fn sqrt(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::Double(receiver(u, "sqrt", &args)?.sqrt()))
}

fn plus(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    binary(u, "+", &args, |l, r| l + r)
}

fn minus(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    binary(u, "-", &args, |l, r| l - r)
}

fn multiply(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    binary(u, "*", &args, |l, r| l * r)
}

fn divide(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    binary(u, "//", &args, |l, r| l / r)
}

fn modulo(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    binary(u, "%", &args, |l, r| l % r)
}

fn equals(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let equal = match (Number::of(&arg(&args, 0)), Number::of(&arg(&args, 1))) {
        (Some(l), Some(r)) => compare(&l, &r) == Some(Ordering::Equal),
        _ => false,
    };
    Ok(Value::Boolean(equal))
}

fn less_than(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (left, right) = operands(u, "<", &args)?;
    Ok(Value::Boolean(compare(&left, &right) == Some(Ordering::Less)))
}

#[cfg(test)]
mod tests {
    use crate::universe::tests::{run, test_universe};

    fn eval(expression: &str) -> String {
        let u = test_universe();
        let source = format!("EvalD = ( run = ( ^ {} ) )", expression);
        let result = run(&u, &source, "run");
        u.print_string(&result)
    }

    #[test]
    fn arithmetic_coerces_integers() {
        assert_eq!(eval("1.5 + 1"), "2.5");
        assert_eq!(eval("3.0 * 2"), "6.0");
        assert_eq!(eval("1.0 // 4"), "0.25");
        assert_eq!(eval("5.5 % 2"), "1.5");
    }

    #[test]
    fn rounding_and_printing() {
        assert_eq!(eval("2.5 round"), "3");
        assert_eq!(eval("-2.5 round"), "-2");
        assert_eq!(eval("3.0 asString"), "3.0");
        assert_eq!(eval("2.25 sqrt"), "1.5");
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("1.5 < 2"), "true");
        assert_eq!(eval("2.0 = 2"), "true");
        assert_eq!(eval("2.0 = 'two'"), "false");
    }
}
