/// Interactive read-eval-print loop.
///
/// Each line is wrapped in a throwaway class whose `run:` method evaluates
/// it, prints the result and answers it. The answer is passed to the next
/// line as `it`.
use std::io::BufRead;

use log::{debug, warn};

use crate::compiler;
use crate::error::{Exec, Unwind};
use crate::object::Value;
use crate::universe::Universe;

const PROMPT: &str = "---> ";

pub struct Shell<'u> {
    u: &'u Universe,
    counter: usize,
    it: Value,
}

impl<'u> Shell<'u> {
    pub fn new(u: &'u Universe) -> Self {
        Self {
            u,
            counter: 0,
            it: Value::Nil,
        }
    }

    /// The value of the last successful line.
    pub fn it(&self) -> &Value {
        &self.it
    }

    /// Read lines from `input` until it is exhausted or a line reads `quit`.
    /// `system exit:` ends the loop with [`Unwind::Exit`]; every other
    /// failure is reported and the loop goes on.
    pub fn start(&mut self, input: impl BufRead) -> Exec<Value> {
        self.u.println("SOM Shell. Type \"quit\" to exit.\n")?;
        self.u.print(PROMPT)?;

        for line in input.lines() {
            let line = line.map_err(|err| Unwind::Error(err.into()))?;
            let statement = line.trim();
            if statement == "quit" {
                break;
            }
            if !statement.is_empty() {
                match self.eval(statement) {
                    Ok(value) => self.it = value,
                    Err(Unwind::Exit(code)) => return Err(Unwind::Exit(code)),
                    Err(err) => {
                        warn!("shell statement failed: {}", err);
                        self.u.println(&format!("Caught exception: {}", err))?;
                    }
                }
            }
            self.u.print(PROMPT)?;
        }
        Ok(self.it.clone())
    }

    fn eval(&mut self, statement: &str) -> Exec<Value> {
        self.counter += 1;
        let source = format!(
            "Shell_Class_{} = ( run: it = ( | tmp | tmp := ( {} ). 'it = ' print. ^tmp println ) )",
            self.counter, statement
        );
        debug!("shell compiles {}", source);

        let class = compiler::compile_class_string(self.u, &source, None)?;
        let receiver = self.u.new_instance(&class);
        self.u
            .dispatch(self.u.symbol("run:"), vec![receiver, self.it.clone()], None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::tests::capturing_universe;
    use pretty_assertions::assert_eq;

    fn session(input: &str) -> (String, Exec<Value>) {
        let (u, out) = capturing_universe(Vec::new());
        let result = Shell::new(&u).start(input.as_bytes());
        (out.text(), result)
    }

    #[test]
    fn prints_each_result() {
        let (out, result) = session("3 + 4\n");
        assert_eq!(out, "SOM Shell. Type \"quit\" to exit.\n\n---> it = 7\n---> ");
        assert_eq!(result.ok().and_then(|v| v.as_integer()), Some(7));
    }

    #[test]
    fn it_carries_the_previous_result() {
        let (out, _) = session("20\nit * 2\n");
        assert!(out.contains("it = 20\n"));
        assert!(out.contains("it = 40\n"));
    }

    #[test]
    fn quit_stops_reading() {
        let (out, _) = session("1\nquit\n2\n");
        assert!(out.contains("it = 1\n"));
        assert!(!out.contains("it = 2"));
    }

    #[test]
    fn errors_are_reported_and_the_loop_continues() {
        let (out, result) = session("1 +\n5\n");
        assert!(out.contains("Caught exception: "));
        assert!(out.contains("it = 5\n"));
        assert_eq!(result.ok().and_then(|v| v.as_integer()), Some(5));
    }

    #[test]
    fn exit_ends_the_session() {
        let (_, result) = session("system exit: 2\n7\n");
        assert!(matches!(result, Err(Unwind::Exit(2))));
    }
}
