mod ast;
mod class;
mod compiler;
mod error;
mod frame;
mod interning;
mod interpreter;
mod invokable;
mod lexer;
mod loader;
mod lookup;
mod node_factory;
mod object;
mod parser;
mod primitives;
mod scope;
mod shell;
mod span;
mod token;
mod universe;

pub use ast::{Ast, Node, NodeId};
pub use class::Class;
pub use compiler::{compile_class_file, compile_class_string};
pub use error::{Exec, Unwind, VmError};
pub use frame::Frame;
pub use interning::{Interned, InternedStrings};
pub use invokable::{Invokable, InvokableKind, PrimitiveFn};
pub use lexer::Lexer;
pub use loader::{ClassPathLoader, ClassSource, CoreLibLoader, InMemoryLoader, SourceLoader};
pub use object::{Block, Instance, Value};
pub use parser::{ParseError, Parser};
pub use shell::Shell;
pub use span::{SourceCoordinate, SourceSection};
pub use token::{Token, TokenKind};
pub use universe::{Binding, CoreClasses, Universe, UniverseCreateInfo};
