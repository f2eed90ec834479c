/// Tree-walking evaluation of method bodies.
///
/// [`execute`] evaluates one node of an [`Ast`] against an activation
/// [`Frame`]. Everything that is not a plain value travels through the
/// error channel of [`Exec`]: non-local returns, `system exit:` and fatal
/// VM errors. Only `CatchNonLocalReturn` looks at non-local returns; every
/// other node passes them on with `?`.
///
/// # Context levels
///
/// Variable nodes carry the number of block boundaries between the use and
/// the declaring scope. [`determine_context`] turns that into a frame by
/// following block receivers outwards: a block activation's receiver is the
/// block, and the block remembers the frame it was created in.
use std::rc::Rc;

use log::trace;

use crate::ast::{Ast, Node, NodeId};
use crate::error::{Exec, Unwind, VmError};
use crate::frame::Frame;
use crate::lookup::lookup_super;
use crate::object::{Block, Value};
use crate::universe::Universe;

pub fn execute(u: &Universe, ast: &Ast, id: NodeId, frame: &Rc<Frame>) -> Exec<Value> {
    let node = ast.node(id);
    match &*node {
        Node::Literal(value) => Ok(value.clone()),

        Node::ArgumentRead {
            index,
            context_level,
        } => Ok(determine_context(u, frame, *context_level)?.argument(*index)),

        Node::VariableRead {
            index,
            context_level,
        } => Ok(determine_context(u, frame, *context_level)?.temp(*index)),

        Node::VariableWrite {
            index,
            context_level,
            value,
        } => {
            let value = execute(u, ast, *value, frame)?;
            determine_context(u, frame, *context_level)?.set_temp(*index, value.clone());
            Ok(value)
        }

        Node::SuperRead { context_level, .. } => {
            Ok(determine_context(u, frame, *context_level)?.receiver())
        }

        Node::FieldRead { receiver, index } => {
            let this = execute(u, ast, *receiver, frame)?;
            Ok(this.field(*index))
        }

        Node::FieldWrite {
            receiver,
            value,
            index,
        } => {
            let this = execute(u, ast, *receiver, frame)?;
            let value = execute(u, ast, *value, frame)?;
            this.set_field(*index, value.clone());
            Ok(value)
        }

        Node::UninitializedGlobalRead { name } => match u.global_binding(*name) {
            Some(binding) => {
                trace!("specializing global read of {}", u.symbol_text(*name));
                let value = binding.value();
                ast.replace(id, Node::CachedGlobalRead { binding });
                Ok(value)
            }
            None => u.send_unknown_global(frame.receiver(), *name),
        },

        Node::CachedGlobalRead { binding } => Ok(binding.value()),

        Node::Block { method } => Ok(Value::Block(Rc::new(Block::new(
            method.clone(),
            frame.clone(),
        )))),

        Node::Sequence(expressions) => {
            let mut result = Value::Nil;
            for expression in expressions {
                result = execute(u, ast, *expression, frame)?;
            }
            Ok(result)
        }

        Node::MessageSend {
            arguments,
            dispatch,
            ..
        } => {
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                args.push(execute(u, ast, *argument, frame)?);
            }
            execute_dispatch(u, ast, *dispatch, frame, args)
        }

        Node::NonLocalReturn {
            value,
            context_level,
        } => {
            let result = execute(u, ast, *value, frame)?;
            let ctx = determine_context(u, frame, *context_level)?;
            if ctx.is_on_stack() {
                Err(Unwind::NonLocalReturn {
                    target: ctx,
                    value: result,
                })
            } else {
                u.send_escaped_block(ctx.receiver(), frame.receiver())
            }
        }

        Node::CatchNonLocalReturn { body } => {
            let result = execute(u, ast, *body, frame);
            frame.drop_from_stack();
            match result {
                Err(Unwind::NonLocalReturn { target, value }) if Rc::ptr_eq(&target, frame) => {
                    Ok(value)
                }
                other => other,
            }
        }

        Node::GenericDispatch { .. }
        | Node::UninitializedSuperDispatch { .. }
        | Node::CachedSuperDispatch { .. } => {
            unreachable!("dispatch nodes only run on behalf of a message send")
        }
    }
}

/// Send the already evaluated `args` (receiver first) through a dispatch
/// node.
fn execute_dispatch(
    u: &Universe,
    ast: &Ast,
    id: NodeId,
    frame: &Rc<Frame>,
    args: Vec<Value>,
) -> Exec<Value> {
    let node = ast.node(id);
    match &*node {
        Node::GenericDispatch { selector } => u.dispatch(*selector, args, Some(frame)),

        Node::UninitializedSuperDispatch {
            selector,
            holder,
            class_side,
        } => {
            let invokable = lookup_super(u, *selector, *holder, *class_side)?;
            ast.replace(
                id,
                Node::CachedSuperDispatch {
                    invokable: invokable.clone(),
                },
            );
            invokable.invoke(u, Some(frame), args)
        }

        Node::CachedSuperDispatch { invokable } => invokable.invoke(u, Some(frame), args),

        _ => unreachable!("message send without a dispatch node"),
    }
}

/// The frame `context_level` lexical scopes out from `frame`.
pub fn determine_context(u: &Universe, frame: &Rc<Frame>, context_level: usize) -> Exec<Rc<Frame>> {
    if context_level == 0 {
        return Ok(frame.clone());
    }

    let mut block = expect_block(u, frame.receiver())?;
    for _ in 1..context_level {
        block = expect_block(u, block.outer_self())?;
    }
    Ok(block.context().clone())
}

fn expect_block(u: &Universe, value: Value) -> Exec<Rc<Block>> {
    match value {
        Value::Block(block) => Ok(block),
        other => Err(VmError::MalformedContext(u.print_string(&other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::tests::{run, test_universe};
    use pretty_assertions::assert_eq;

    fn int(value: Value) -> i64 {
        match value {
            Value::Integer(i) => i,
            other => panic!("expected an integer, got {:?}", other),
        }
    }

    #[test]
    fn method_returns_sum() {
        let u = test_universe();
        let result = run(&u, "Foo = ( bar = ( ^ 1 + 2 ) )", "bar");
        assert_eq!(int(result), 3);
    }

    #[test]
    fn block_with_argument() {
        let u = test_universe();
        let result = run(&u, "Foo = ( run = ( ^ [:x | x + 1] value: 41 ) )", "run");
        assert_eq!(int(result), 42);
    }

    #[test]
    fn non_local_return_skips_rest_of_method() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = ( run = ( | a | a := 1. [ ^a ] value. a := 2. ^a ) )",
            "run",
        );
        assert_eq!(int(result), 1);
    }

    #[test]
    fn deeply_nested_non_local_return() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = ( run = ( [ [ [ ^ 7 ] value. 1 ] value. 2 ] value. ^ 3 ) )",
            "run",
        );
        assert_eq!(int(result), 7);
    }

    #[test]
    fn non_local_return_unwinds_through_other_methods() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = (
                call: aBlock = ( aBlock value. ^ 0 )
                run = ( self call: [ ^ 5 ]. ^ 6 )
            )",
            "run",
        );
        assert_eq!(int(result), 5);
    }

    #[test]
    fn block_argument_shadows_method_argument() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = (
                pick: x = ( ^ [:x | x ] value: 2 )
                run = ( ^ self pick: 1 )
            )",
            "run",
        );
        assert_eq!(int(result), 2);
    }

    #[test]
    fn blocks_write_outer_locals() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = ( run = ( | sum | sum := 0. 1 to: 4 do: [:i | sum := sum + i ]. ^ sum ) )",
            "run",
        );
        assert_eq!(int(result), 10);
    }

    #[test]
    fn fields_are_per_instance() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = ( | count |
                bump = ( count isNil ifTrue: [ count := 0 ]. count := count + 1 )
                count = ( ^ count )
                run = ( | other | self bump. self bump. other := Foo new. other bump. ^ count * 10 + other count )
            )",
            "run",
        );
        assert_eq!(int(result), 21);
    }

    #[test]
    fn implicit_self_return() {
        let u = test_universe();
        let result = run(&u, "Foo = ( run = ( 1 + 1 ) )", "run");
        assert!(matches!(result, Value::Object(_)));
    }

    #[test]
    fn empty_block_answers_nil() {
        let u = test_universe();
        let result = run(&u, "Foo = ( run = ( ^ [] value ) )", "run");
        assert!(result.is_nil());
    }

    #[test]
    fn escaped_block_is_reported_to_the_outer_receiver() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = (
                make = ( ^ [ ^ 1 ] )
                escapedBlock: aBlock = ( ^ #escaped )
                run = ( ^ self make value )
            )",
            "run",
        );
        assert_eq!(u.print_string(&result), "#escaped");
    }

    #[test]
    fn does_not_understand_receives_selector_and_arguments() {
        let u = test_universe();
        let result = run(
            &u,
            "Foo = (
                doesNotUnderstand: selector arguments: args = (
                    ^ (selector == #foo:bar:) & ((args at: 1) = 3) & ((args at: 2) = 4) & (args length = 2) )
                run = ( ^ self foo: 3 bar: 4 )
            )",
            "run",
        );
        assert!(matches!(result, Value::Boolean(true)));
    }

    #[test]
    fn super_send_from_a_block() {
        let u = test_universe();
        u.load_class_from_string("BlkA = ( foo = ( ^ 'A' ) )").expect("A");
        let result = run(
            &u,
            "BlkB = BlkA ( foo = ( ^ 'B' ) run = ( ^ [ super foo ] value ) )",
            "run",
        );
        assert_eq!(u.print_string(&result), "A");
    }

    #[test]
    fn super_send_from_a_nested_block_sees_the_method_self() {
        let u = test_universe();
        u.load_class_from_string("NstA = ( | tag | tag = ( ^ tag ) tag: t = ( tag := t ) )")
            .expect("A");
        let result = run(
            &u,
            "NstB = NstA (
                tag = ( ^ 'shadowed' )
                run = ( super tag: 'set'. ^ [ [ super tag ] value ] value )
            )",
            "run",
        );
        assert_eq!(u.print_string(&result), "set");
    }

    #[test]
    fn class_side_super_send_from_a_block() {
        let u = test_universe();
        u.load_class_from_string("MetaQ = ( ---- foo = ( ^ 'Q' ) )").expect("Q");
        let class = u
            .load_class_from_string("MetaB = MetaQ ( ---- foo = ( ^ [ super foo ] value + 'B' ) )")
            .expect("B");
        let result = u
            .dispatch(u.symbol("foo"), vec![Value::Class(class)], None)
            .expect("foo");
        assert_eq!(u.print_string(&result), "QB");
    }

    #[test]
    fn empty_blocks_answer_nil_for_any_arity() {
        let u = test_universe();
        let result = run(
            &u,
            "Empty = (
                zero = ( ^ [] value )
                one = ( ^ [:x | ] value: 4 )
                two = ( ^ [:x :y | ] value: 4 with: 5 )
            )",
            "zero",
        );
        assert!(result.is_nil());
        let class = u.load_class(u.symbol("Empty")).expect("Empty");
        for selector in ["one", "two"] {
            let result = u
                .dispatch(u.symbol(selector), vec![u.new_instance(&class)], None)
                .expect(selector);
            assert!(result.is_nil(), "{} answered {:?}", selector, result);
        }
    }

    #[test]
    fn methods_without_return_answer_self() {
        let u = test_universe();
        let class = u
            .load_class_from_string(
                "Ret = (
                    returnSelf = ( ^ self )
                    returnSelfImplicitly = ( self )
                    noReturnReturnsSelf = ( )
                    blockReturnsImplicitlyLastValue = ( ^ [ 4 ] value )
                )",
            )
            .expect("Ret");
        let receiver = u.new_instance(&class);
        for selector in ["returnSelf", "returnSelfImplicitly", "noReturnReturnsSelf"] {
            let result = u
                .dispatch(u.symbol(selector), vec![receiver.clone()], None)
                .expect(selector);
            assert!(result.identical(&receiver), "{} did not answer self", selector);
        }
        let last = u
            .dispatch(u.symbol("blockReturnsImplicitlyLastValue"), vec![receiver], None)
            .expect("block");
        assert_eq!(int(last), 4);
    }

    #[test]
    fn non_local_return_out_of_a_loop() {
        let u = test_universe();
        let result = run(
            &u,
            "Nlr3 = ( run = ( 1 to: 10 do: [:i | i = 3 ifTrue: [ ^ i ] ]. ^ 0 ) )",
            "run",
        );
        assert_eq!(int(result), 3);
    }

    #[test]
    fn non_local_return_through_a_block_argument() {
        let u = test_universe();
        let result = run(
            &u,
            "Nlr5 = (
                at: i with: aBlock = ( ^ aBlock value: i + 2 )
                run = ( self at: 20 with: [:x | ^ x ]. ^ 1 )
            )",
            "run",
        );
        assert_eq!(int(result), 22);
    }

    #[test]
    fn fields_set_and_read_through_accessors() {
        let u = test_universe();
        let result = run(
            &u,
            "Simple = ( | field |
                field: value = ( field := value )
                field = ( ^ field )
                run = ( self field: #foo. ^ field )
            )",
            "run",
        );
        assert_eq!(u.print_string(&result), "#foo");

        let result = run(
            &u,
            "SimpleGet = ( | field |
                getField = ( ^ field )
                run = ( field := 40. ^ self getField )
            )",
            "run",
        );
        assert_eq!(int(result), 40);
    }

    #[test]
    fn malformed_context_is_fatal() {
        let u = test_universe();
        let frame = Frame::new(vec![Value::Integer(1)], 0);
        let err = determine_context(&u, &frame, 1).map(|_| ()).unwrap_err();
        assert!(matches!(err, Unwind::Error(VmError::MalformedContext(_))));
    }
}
