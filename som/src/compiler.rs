/// Entry points from source text to assembled classes.
use std::rc::Rc;

use log::debug;

use crate::class::Class;
use crate::error::VmError;
use crate::loader::ClassSource;
use crate::parser::Parser;
use crate::universe::Universe;

/// Compile a class definition that did not come from a file. The result is
/// not registered as a global.
pub fn compile_class_string(
    u: &Universe,
    source: &str,
    system_class: Option<&Rc<Class>>,
) -> Result<Rc<Class>, VmError> {
    let parser = Parser::new(source, "$string", u)?;
    compile(u, parser, system_class)
}

/// Compile the source a loader found for `expected_name`.
///
/// The class defined in the file must carry the name it was looked up by.
pub fn compile_class_file(
    u: &Universe,
    source: &ClassSource,
    expected_name: &str,
    system_class: Option<&Rc<Class>>,
) -> Result<Rc<Class>, VmError> {
    debug!("compiling {}", source.file_name);
    let parser = Parser::new(&source.text, &source.file_name, u)?;
    let result = compile(u, parser, system_class)?;

    let found = result.name_string();
    if &*found != expected_name {
        return Err(VmError::FileClassMismatch {
            expected: expected_name.to_string(),
            found: found.to_string(),
        });
    }
    Ok(result)
}

fn compile(
    u: &Universe,
    mut parser: Parser<'_>,
    system_class: Option<&Rc<Class>>,
) -> Result<Rc<Class>, VmError> {
    let cgenc = parser.classdef()?;
    match system_class {
        None => cgenc.assemble(u),
        Some(system_class) => {
            cgenc.assemble_system_class(system_class);
            Ok(system_class.clone())
        }
    }
}
