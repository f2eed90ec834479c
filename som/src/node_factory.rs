use std::rc::Rc;

use crate::ast::{AstBuilder, Node, NodeId};
use crate::interning::Interned;
use crate::invokable::Invokable;
use crate::object::Value;
use crate::span::Span;

/// Node construction used by the parser.
impl AstBuilder {
    pub fn create_literal(&mut self, value: Value, span: Span) -> NodeId {
        self.push(Node::Literal(value), span)
    }

    pub fn create_argument_read(
        &mut self,
        index: usize,
        context_level: usize,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::ArgumentRead {
                index,
                context_level,
            },
            span,
        )
    }

    pub fn create_variable_read(
        &mut self,
        index: usize,
        context_level: usize,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::VariableRead {
                index,
                context_level,
            },
            span,
        )
    }

    pub fn create_variable_write(
        &mut self,
        index: usize,
        context_level: usize,
        value: NodeId,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::VariableWrite {
                index,
                context_level,
                value,
            },
            span,
        )
    }

    pub fn create_super_read(
        &mut self,
        context_level: usize,
        holder: Interned,
        class_side: bool,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::SuperRead {
                context_level,
                holder,
                class_side,
            },
            span,
        )
    }

    pub fn create_field_read(&mut self, receiver: NodeId, index: usize, span: Span) -> NodeId {
        self.push(Node::FieldRead { receiver, index }, span)
    }

    pub fn create_field_write(
        &mut self,
        receiver: NodeId,
        value: NodeId,
        index: usize,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::FieldWrite {
                receiver,
                value,
                index,
            },
            span,
        )
    }

    pub fn create_global_read(&mut self, name: Interned, span: Span) -> NodeId {
        self.push(Node::UninitializedGlobalRead { name }, span)
    }

    pub fn create_block(&mut self, method: Rc<Invokable>, span: Span) -> NodeId {
        self.push(Node::Block { method }, span)
    }

    pub fn create_sequence(&mut self, expressions: Vec<NodeId>, span: Span) -> NodeId {
        self.push(Node::Sequence(expressions), span)
    }

    /// A send whose receiver is `super` gets a super dispatch bound to the
    /// lexical holder; everything else dispatches on the receiver's class.
    pub fn create_message_send(
        &mut self,
        selector: Interned,
        arguments: Vec<NodeId>,
        span: Span,
    ) -> NodeId {
        let dispatch = match arguments.first().map(|&r| self.get(r)) {
            Some(Node::SuperRead {
                holder, class_side, ..
            }) => Node::UninitializedSuperDispatch {
                selector,
                holder: *holder,
                class_side: *class_side,
            },
            _ => Node::GenericDispatch { selector },
        };
        let dispatch = self.push(dispatch, span);
        self.push(
            Node::MessageSend {
                selector,
                arguments,
                dispatch,
            },
            span,
        )
    }

    pub fn create_non_local_return(
        &mut self,
        value: NodeId,
        context_level: usize,
        span: Span,
    ) -> NodeId {
        self.push(
            Node::NonLocalReturn {
                value,
                context_level,
            },
            span,
        )
    }

    pub fn create_catch_non_local_return(&mut self, body: NodeId, span: Span) -> NodeId {
        self.push(Node::CatchNonLocalReturn { body }, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interning::InternedStrings;
    use crate::span::SourceCoordinate;

    fn span() -> Span {
        Span::point(SourceCoordinate::origin())
    }

    #[test]
    fn super_receiver_selects_super_dispatch() {
        let symbols = InternedStrings::new();
        let foo = symbols.add("foo");
        let holder = symbols.add("Bar");
        let mut builder = AstBuilder::new();

        let sup = builder.create_super_read(0, holder, true, span());
        let send = builder.create_message_send(foo, vec![sup], span());
        let Node::MessageSend { dispatch, .. } = builder.get(send) else {
            panic!("expected a message send");
        };
        assert!(matches!(
            builder.get(*dispatch),
            Node::UninitializedSuperDispatch { class_side: true, .. }
        ));

        let this = builder.create_argument_read(0, 0, span());
        let send = builder.create_message_send(foo, vec![this], span());
        let Node::MessageSend { dispatch, .. } = builder.get(send) else {
            panic!("expected a message send");
        };
        assert!(matches!(builder.get(*dispatch), Node::GenericDispatch { .. }));
    }
}
