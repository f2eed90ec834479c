use std::rc::Rc;

use crate::frame::Frame;
use crate::object::Value;
use crate::parser::ParseError;

/// Errors that end evaluation. None of these can be caught by SOM code.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(
        "{0} class could not be loaded. It is likely that the class path has \
         not been initialized properly"
    )]
    ClassNotFound(String),
    #[error("file name {expected} does not match class name {found}")]
    FileClassMismatch { expected: String, found: String },
    #[error("#{selector} sent to super, but {holder} has no such method")]
    SuperSendNotUnderstood { selector: String, holder: String },
    #[error("super send from {0}, which is not a loaded class")]
    UnknownHolderClass(String),
    #[error("expected a block while walking the context chain, found {0}")]
    MalformedContext(String),
    #[error("#{0} sent without a receiver")]
    MissingSendTarget(String),
    #[error("{class} does not understand the runtime protocol message #{selector}")]
    ProtocolNotUnderstood { selector: String, class: String },
    #[error("primitive #{selector}: {message}")]
    PrimitiveArgument { selector: String, message: String },
    #[error("primitive #{0} is not supported")]
    UndefinedPrimitive(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything that can interrupt normal evaluation of a node.
pub enum Unwind {
    /// `^expr` inside a block, travelling to the method activation `target`.
    NonLocalReturn { target: Rc<Frame>, value: Value },
    /// `system exit: code`.
    Exit(i32),
    Error(VmError),
}

impl std::fmt::Debug for Unwind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonLocalReturn { target, value } => f
                .debug_struct("NonLocalReturn")
                .field("target", &Rc::as_ptr(target))
                .field("value", value)
                .finish(),
            Self::Exit(code) => f.debug_tuple("Exit").field(code).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

impl std::fmt::Display for Unwind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonLocalReturn { .. } => {
                f.write_str("non-local return escaped its method")
            }
            Self::Exit(code) => write!(f, "exit with code {code}"),
            Self::Error(err) => err.fmt(f),
        }
    }
}

impl From<VmError> for Unwind {
    fn from(err: VmError) -> Self {
        Self::Error(err)
    }
}

impl From<ParseError> for Unwind {
    fn from(err: ParseError) -> Self {
        Self::Error(VmError::Parse(err))
    }
}

/// Result of evaluating anything on the interpreter's control path.
pub type Exec<T> = Result<T, Unwind>;
