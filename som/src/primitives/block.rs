use std::rc::Rc;

use super::{PrimitiveMessage, arg, argument_error, expect_block};
use crate::error::{Exec, VmError};
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("whileTrue:", while_true),
    PrimitiveMessage::new("restart", restart),
];

pub const VALUE_PRIMITIVES: &[PrimitiveMessage] = &[PrimitiveMessage::new("value", value)];

pub const VALUE_WITH_PRIMITIVES: &[PrimitiveMessage] = &[PrimitiveMessage::new("value:", value)];

pub const VALUE_WITH_WITH_PRIMITIVES: &[PrimitiveMessage] =
    &[PrimitiveMessage::new("value:with:", value)];

fn value(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let block = expect_block(u, "value", &arg(&args, 0))?;
    if args.len() != block.number_of_arguments() {
        return Err(argument_error(
            "value",
            format!(
                "block takes {} arguments, got {}",
                block.number_of_arguments() - 1,
                args.len() - 1
            ),
        )
        .into());
    }
    block.method().invoke(u, caller, args)
}

/// Loops while the receiver evaluates to `true`; anything else ends the
/// loop.
fn while_true(u: &Universe, caller: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let condition = arg(&args, 0);
    let body = arg(&args, 1);
    let value = u.symbol("value");
    while let Value::Boolean(true) = u.dispatch(value, vec![condition.clone()], caller)? {
        u.dispatch(value, vec![body.clone()], caller)?;
    }
    Ok(Value::Nil)
}

fn restart(_: &Universe, _: Option<&Rc<Frame>>, _: Vec<Value>) -> Exec<Value> {
    Err(VmError::UndefinedPrimitive("restart".to_string()).into())
}

#[cfg(test)]
mod tests {
    use crate::error::{Unwind, VmError};
    use crate::object::Value;
    use crate::universe::tests::{run, test_universe};

    #[test]
    fn while_true_loops_until_false() {
        let u = test_universe();
        let result = run(
            &u,
            "Loop = ( run = ( | i | i := 0. [ i < 5 ] whileTrue: [ i := i + 1 ]. ^ i ) )",
            "run",
        );
        assert_eq!(result.as_integer(), Some(5));
    }

    #[test]
    fn while_true_answers_nil() {
        let u = test_universe();
        let result = run(&u, "Loop = ( run = ( ^ [ false ] whileTrue: [ 1 ] ) )", "run");
        assert!(result.is_nil());
    }

    #[test]
    fn values_by_arity() {
        let u = test_universe();
        let result = run(
            &u,
            "Vals = ( run = ( ^ [ 1 ] value + ([:a | a ] value: 2) + ([:a :b | a * b ] value: 3 with: 4) ) )",
            "run",
        );
        assert_eq!(result.as_integer(), Some(15));
    }

    #[test]
    fn non_local_return_leaves_the_loop() {
        let u = test_universe();
        let result = run(
            &u,
            "Loop = ( run = ( | i | i := 0. [ true ] whileTrue: [ i := i + 1. i = 3 ifTrue: [ ^ i ] ] ) )",
            "run",
        );
        assert_eq!(result.as_integer(), Some(3));
    }

    #[test]
    fn restart_is_not_supported() {
        let u = test_universe();
        let class = u
            .load_class_from_string("Rs = ( run = ( ^ [ 1 ] restart ) )")
            .expect("compile");
        let err = u
            .dispatch(u.symbol("run"), vec![u.new_instance(&class)], None)
            .map(|_: Value| ())
            .unwrap_err();
        assert!(matches!(err, Unwind::Error(VmError::UndefinedPrimitive(_))));
    }
}
