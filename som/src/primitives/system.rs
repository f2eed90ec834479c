use std::rc::Rc;

use log::debug;

use super::{PrimitiveMessage, arg, expect_integer, expect_symbol, expect_text};
use crate::error::{Exec, Unwind, VmError};
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("load:", load),
    PrimitiveMessage::new("exit:", exit),
    PrimitiveMessage::new("hasGlobal:", has_global),
    PrimitiveMessage::new("global:", global),
    PrimitiveMessage::new("global:put:", global_put),
    PrimitiveMessage::new("printString:", print_string),
    PrimitiveMessage::new("printNewline", print_newline),
    PrimitiveMessage::new("time", time),
    PrimitiveMessage::new("ticks", ticks),
    PrimitiveMessage::new("fullGC", full_gc),
];

/// Answers `nil` when no class of that name can be found. Any other
/// failure, such as a parse error, is fatal.
fn load(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let name = expect_symbol(u, "load:", &arg(&args, 1))?;
    match u.load_class(name) {
        Ok(class) => Ok(Value::Class(class)),
        Err(VmError::ClassNotFound(missing)) => {
            debug!("load: found no class {}", missing);
            Ok(Value::Nil)
        }
        Err(err) => Err(err.into()),
    }
}

fn exit(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let code = expect_integer(u, "exit:", &arg(&args, 1))?;
    Err(Unwind::Exit(code as i32))
}

fn has_global(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let name = expect_symbol(u, "hasGlobal:", &arg(&args, 1))?;
    Ok(Value::Boolean(u.has_global(name)))
}

fn global(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let name = expect_symbol(u, "global:", &arg(&args, 1))?;
    Ok(u.get_global(name).unwrap_or_default())
}

fn global_put(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let name = expect_symbol(u, "global:put:", &arg(&args, 1))?;
    let value = arg(&args, 2);
    u.set_global(name, value.clone());
    Ok(value)
}

fn print_string(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "printString:", &arg(&args, 1))?;
    u.print(&text)?;
    Ok(arg(&args, 0))
}

fn print_newline(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    u.println("")?;
    Ok(arg(&args, 0))
}

/// Milliseconds since startup.
fn time(u: &Universe, _: Option<&Rc<Frame>>, _: Vec<Value>) -> Exec<Value> {
    Ok(Value::Integer(u.elapsed().as_millis() as i64))
}

/// Microseconds since startup.
fn ticks(u: &Universe, _: Option<&Rc<Frame>>, _: Vec<Value>) -> Exec<Value> {
    Ok(Value::Integer(u.elapsed().as_micros() as i64))
}

/// Memory is reference counted; there is no collector to run.
fn full_gc(_: &Universe, _: Option<&Rc<Frame>>, _: Vec<Value>) -> Exec<Value> {
    Ok(Value::Boolean(false))
}

#[cfg(test)]
mod tests {
    use crate::error::Unwind;
    use crate::loader::InMemoryLoader;
    use crate::universe::tests::{capturing_universe, run, test_universe};

    #[test]
    fn globals_round_trip() {
        let u = test_universe();
        let result = run(
            &u,
            "Glob = ( run = (
                system global: #Answer put: 42.
                ^ (system hasGlobal: #Answer) & ((system global: #Answer) = 42)
                    & (system global: #Missing) isNil & (system hasGlobal: #Missing) not ) )",
            "run",
        );
        assert_eq!(u.print_string(&result), "true");
    }

    #[test]
    fn load_answers_nil_for_missing_classes() {
        let (u, _) = capturing_universe(vec![Box::new(
            InMemoryLoader::new().with("Extra", "Extra = ( answer = ( ^ 7 ) )"),
        )]);
        let result = run(
            &u,
            "Ld = ( run = ( ^ ((system load: #Extra) new answer = 7) & (system load: #Nowhere) isNil ) )",
            "run",
        );
        assert_eq!(u.print_string(&result), "true");
    }

    #[test]
    fn printing_goes_to_the_output() {
        let (u, out) = capturing_universe(Vec::new());
        run(
            &u,
            "Pr = ( run = ( system printString: 'a'. system printString: #b. system printNewline ) )",
            "run",
        );
        assert_eq!(out.text(), "ab\n");
    }

    #[test]
    fn exit_unwinds_with_the_code() {
        let u = test_universe();
        let class = u
            .load_class_from_string("Ex = ( run = ( system exit: 4. ^ 1 ) )")
            .expect("compile");
        let result = u.dispatch(u.symbol("run"), vec![u.new_instance(&class)], None);
        assert!(matches!(result, Err(Unwind::Exit(4))));
    }

    #[test]
    fn clock_and_gc() {
        let u = test_universe();
        let result = run(
            &u,
            "Clk = ( run = ( ^ (system ticks >= 0) & (system time >= 0) & system fullGC not ) )",
            "run",
        );
        assert_eq!(u.print_string(&result), "true");
    }
}
