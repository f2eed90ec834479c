/// Executable method trees.
///
/// Every compiled method or block owns one [`Ast`]: a flat arena of nodes
/// addressed by [`NodeId`]. Parents refer to children by id, never by
/// pointer, which makes in-place specialization a slot update:
/// [`Ast::replace`] swaps the node stored under an id and every parent
/// holding that id sees the replacement on its next execution.
///
/// # Self-specializing nodes
///
/// | Initial node                  | Becomes                         |
/// |-------------------------------|---------------------------------|
/// | `UninitializedGlobalRead`     | `CachedGlobalRead` once defined |
/// | `UninitializedSuperDispatch`  | `CachedSuperDispatch` on first send |
///
/// Nodes are stored as `Rc<Node>` so the interpreter can clone one out and
/// release the slot before evaluating it; evaluation may recurse into the
/// same tree and replace nodes while a parent is still running.
use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use crate::interning::{Interned, InternedStrings};
use crate::invokable::Invokable;
use crate::object::Value;
use crate::span::Span;
use crate::universe::Binding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub enum Node {
    Literal(Value),
    /// Argument `index` of the activation `context_level` blocks out.
    ArgumentRead {
        index: usize,
        context_level: usize,
    },
    VariableRead {
        index: usize,
        context_level: usize,
    },
    VariableWrite {
        index: usize,
        context_level: usize,
        value: NodeId,
    },
    /// `super` as a value is just `self`; the holder is kept for the
    /// message send built on top of it.
    SuperRead {
        context_level: usize,
        holder: Interned,
        class_side: bool,
    },
    FieldRead {
        receiver: NodeId,
        index: usize,
    },
    FieldWrite {
        receiver: NodeId,
        value: NodeId,
        index: usize,
    },
    UninitializedGlobalRead {
        name: Interned,
    },
    CachedGlobalRead {
        binding: Rc<Binding>,
    },
    Block {
        method: Rc<Invokable>,
    },
    Sequence(Vec<NodeId>),
    /// `arguments[0]` is the receiver.
    MessageSend {
        selector: Interned,
        arguments: Vec<NodeId>,
        dispatch: NodeId,
    },
    GenericDispatch {
        selector: Interned,
    },
    UninitializedSuperDispatch {
        selector: Interned,
        holder: Interned,
        class_side: bool,
    },
    CachedSuperDispatch {
        invokable: Rc<Invokable>,
    },
    NonLocalReturn {
        value: NodeId,
        context_level: usize,
    },
    CatchNonLocalReturn {
        body: NodeId,
    },
}

impl Node {
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            Self::GenericDispatch { .. }
                | Self::UninitializedSuperDispatch { .. }
                | Self::CachedSuperDispatch { .. }
        )
    }

    fn children(&self) -> Vec<(NodeId, String)> {
        match self {
            Self::VariableWrite { value, .. } => vec![(*value, "value".into())],
            Self::FieldRead { receiver, .. } => vec![(*receiver, "self".into())],
            Self::FieldWrite {
                receiver, value, ..
            } => vec![(*receiver, "self".into()), (*value, "value".into())],
            Self::Sequence(exprs) => exprs
                .iter()
                .enumerate()
                .map(|(i, e)| (*e, format!("expr[{}]", i)))
                .collect(),
            Self::MessageSend {
                arguments,
                dispatch,
                ..
            } => {
                let mut children: Vec<_> = arguments
                    .iter()
                    .enumerate()
                    .map(|(i, a)| (*a, format!("arg[{}]", i)))
                    .collect();
                children.push((*dispatch, "dispatch".into()));
                children
            }
            Self::NonLocalReturn { value, .. } => vec![(*value, "value".into())],
            Self::CatchNonLocalReturn { body } => vec![(*body, "body".into())],
            _ => Vec::new(),
        }
    }

    fn label(&self, symbols: &InternedStrings) -> String {
        match self {
            Self::Literal(v) => match v {
                Value::Symbol(s) => format!("Literal(#{})", symbols.get(*s)),
                other => format!("Literal({:?})", other),
            },
            Self::ArgumentRead {
                index,
                context_level,
            } => format!("ArgumentRead({}, level {})", index, context_level),
            Self::VariableRead {
                index,
                context_level,
            } => format!("VariableRead({}, level {})", index, context_level),
            Self::VariableWrite {
                index,
                context_level,
                ..
            } => format!("VariableWrite({}, level {})", index, context_level),
            Self::SuperRead { holder, .. } => {
                format!("SuperRead({})", symbols.get(*holder))
            }
            Self::FieldRead { index, .. } => format!("FieldRead({})", index),
            Self::FieldWrite { index, .. } => format!("FieldWrite({})", index),
            Self::UninitializedGlobalRead { name } => {
                format!("GlobalRead({})", symbols.get(*name))
            }
            Self::CachedGlobalRead { binding } => {
                format!("CachedGlobalRead({})", symbols.get(binding.name()))
            }
            Self::Block { method } => {
                format!("Block({})", method.signature_string())
            }
            Self::Sequence(_) => "Sequence".to_string(),
            Self::MessageSend { selector, .. } => {
                format!("MessageSend(#{})", symbols.get(*selector))
            }
            Self::GenericDispatch { .. } => "GenericDispatch".to_string(),
            Self::UninitializedSuperDispatch { holder, .. } => {
                format!("SuperDispatch({})", symbols.get(*holder))
            }
            Self::CachedSuperDispatch { invokable } => {
                format!("CachedSuperDispatch({})", invokable.signature_string())
            }
            Self::NonLocalReturn { context_level, .. } => {
                format!("NonLocalReturn(level {})", context_level)
            }
            Self::CatchNonLocalReturn { .. } => "CatchNonLocalReturn".to_string(),
        }
    }
}

/// An assembled method tree.
pub struct Ast {
    nodes: Vec<RefCell<Rc<Node>>>,
    spans: Vec<Span>,
    root: NodeId,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Rc<Node> {
        self.nodes[id.index()].borrow().clone()
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.spans[id.index()]
    }

    /// Splice `node` in under `id`. Parents are not touched.
    pub fn replace(&self, id: NodeId, node: Node) {
        *self.nodes[id.index()].borrow_mut() = Rc::new(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render the tree reachable from the root as a Graphviz digraph.
    ///
    /// Graph nodes are named after their arena id, so a node shared by two
    /// parents is drawn once with two incoming edges. Labels carry the
    /// node's source position.
    pub fn to_dot(&self, title: &str, symbols: &InternedStrings) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph {:?} {{", title);
        out.push_str("  node [shape=box];\n");
        let _ = writeln!(out, "  method [shape=ellipse, label={:?}];", title);
        let _ = writeln!(out, "  method -> n{};", self.root.index());

        let mut seen = vec![false; self.nodes.len()];
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            let node = self.node(id);
            let label = node
                .label(symbols)
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            let _ = writeln!(
                out,
                "  n{} [label=\"{}\\n{}\"];",
                id.index(),
                label,
                self.span(id).start
            );
            for (child, edge) in node.children() {
                let _ = writeln!(out, "  n{} -> n{} [label={:?}];", id.index(), child.index(), edge);
                pending.push(child);
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Collects nodes while a method is being parsed.
#[derive(Default)]
pub struct AstBuilder {
    nodes: Vec<Node>,
    spans: Vec<Span>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.spans.push(span);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn finish(self, root: NodeId) -> Ast {
        Ast {
            nodes: self
                .nodes
                .into_iter()
                .map(|n| RefCell::new(Rc::new(n)))
                .collect(),
            spans: self.spans,
            root,
        }
    }
}
