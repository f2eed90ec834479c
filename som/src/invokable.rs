use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::warn;

use crate::ast::Ast;
use crate::class::Class;
use crate::error::Exec;
use crate::frame::Frame;
use crate::interning::Interned;
use crate::interpreter;
use crate::object::Value;
use crate::span::SourceSection;
use crate::universe::Universe;

/// Native implementation of a primitive.
///
/// `args[0]` is the receiver. `caller` is the activation that sent the
/// message, or `None` when invoked from the host.
pub type PrimitiveFn =
    fn(&Universe, Option<&Rc<Frame>>, Vec<Value>) -> Exec<Value>;

pub enum InvokableKind {
    /// A compiled method or block body.
    Method {
        source: SourceSection,
        ast: Ast,
        number_of_locals: usize,
        embedded_blocks: Vec<Rc<Invokable>>,
    },
    Primitive(PrimitiveFn),
    /// Declared `primitive` in source, but no native code registered.
    EmptyPrimitive,
}

/// Anything that can sit in a method table.
pub struct Invokable {
    signature: Interned,
    signature_text: Arc<str>,
    holder: RefCell<Weak<Class>>,
    kind: InvokableKind,
}

impl Invokable {
    pub fn new(
        signature: Interned,
        signature_text: Arc<str>,
        kind: InvokableKind,
    ) -> Rc<Self> {
        Rc::new(Self {
            signature,
            signature_text,
            holder: RefCell::new(Weak::new()),
            kind,
        })
    }

    pub fn signature(&self) -> Interned {
        self.signature
    }

    pub fn signature_string(&self) -> Arc<str> {
        self.signature_text.clone()
    }

    pub fn kind(&self) -> &InvokableKind {
        &self.kind
    }

    pub fn holder(&self) -> Option<Rc<Class>> {
        self.holder.borrow().upgrade()
    }

    /// Blocks belong to the class of the method they are written in.
    pub fn set_holder(&self, holder: &Rc<Class>) {
        *self.holder.borrow_mut() = Rc::downgrade(holder);
        if let InvokableKind::Method {
            embedded_blocks, ..
        } = &self.kind
        {
            for block in embedded_blocks {
                block.set_holder(holder);
            }
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self.kind, InvokableKind::Method { .. })
    }

    pub fn source_section(&self) -> Option<&SourceSection> {
        match &self.kind {
            InvokableKind::Method { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Arguments including the receiver.
    pub fn number_of_arguments(&self) -> usize {
        number_of_signature_arguments(&self.signature_text)
    }

    pub fn invoke(
        &self,
        u: &Universe,
        caller: Option<&Rc<Frame>>,
        args: Vec<Value>,
    ) -> Exec<Value> {
        match &self.kind {
            InvokableKind::Method {
                ast,
                number_of_locals,
                ..
            } => {
                let frame = Frame::new(args, *number_of_locals);
                interpreter::execute(u, ast, ast.root(), &frame)
            }
            InvokableKind::Primitive(function) => function(u, caller, args),
            InvokableKind::EmptyPrimitive => {
                warn!("undefined primitive {} called", self.signature_text);
                Ok(Value::Nil)
            }
        }
    }
}

/// Receiver plus arguments a selector takes: binary selectors take one
/// argument, keyword selectors one per colon.
pub fn number_of_signature_arguments(signature: &str) -> usize {
    let first = signature.chars().next().unwrap_or('a');
    if !first.is_alphabetic() && first != '$' && first != '_' {
        return 2;
    }
    1 + signature.chars().filter(|&c| c == ':').count()
}
