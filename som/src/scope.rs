/// Compile-time scopes.
///
/// A [`ClassScope`] collects the fields and methods of one class definition
/// and assembles them into a class/metaclass pair. A [`MethodScope`] does the
/// same for one method or block: arguments, locals, embedded blocks and the
/// tree under construction.
///
/// Blocks nest, so method scopes form a chain. The parser keeps the chain as
/// a [`ScopeChain`], a stack whose bottom entry is the method and whose top
/// entry is the innermost block being parsed; "the enclosing scope" is
/// simply the entry below.
use std::rc::Rc;

use crate::ast::{AstBuilder, NodeId};
use crate::class::Class;
use crate::error::VmError;
use crate::interning::Interned;
use crate::invokable::{Invokable, InvokableKind};
use crate::span::{SourceSection, Span};
use crate::universe::Universe;

pub const SELF: &str = "self";
pub const BLOCK_SELF: &str = "$blockSelf";

// ═══════════════════════════════════════════════════════════════════
// Class scope
// ═══════════════════════════════════════════════════════════════════

pub struct ClassScope {
    pub name: Interned,
    pub super_name: Interned,
    class_side: bool,
    instance_fields: Vec<Interned>,
    instance_methods: Vec<Rc<Invokable>>,
    class_fields: Vec<Interned>,
    class_methods: Vec<Rc<Invokable>>,
}

impl ClassScope {
    pub fn new(name: Interned, super_name: Interned) -> Self {
        Self {
            name,
            super_name,
            class_side: false,
            instance_fields: Vec::new(),
            instance_methods: Vec::new(),
            class_fields: Vec::new(),
            class_methods: Vec::new(),
        }
    }

    pub fn is_class_side(&self) -> bool {
        self.class_side
    }

    pub fn set_class_side(&mut self, class_side: bool) {
        self.class_side = class_side;
    }

    /// Inherited fields come first so indices line up with the superclass.
    pub fn set_instance_fields_of_super(&mut self, fields: Vec<Interned>) {
        self.instance_fields.splice(0..0, fields);
    }

    pub fn set_class_fields_of_super(&mut self, fields: Vec<Interned>) {
        self.class_fields.splice(0..0, fields);
    }

    pub fn add_instance_field(&mut self, name: Interned) {
        self.instance_fields.push(name);
    }

    pub fn add_class_field(&mut self, name: Interned) {
        self.class_fields.push(name);
    }

    pub fn add_instance_method(&mut self, method: Rc<Invokable>) {
        self.instance_methods.push(method);
    }

    pub fn add_class_method(&mut self, method: Rc<Invokable>) {
        self.class_methods.push(method);
    }

    fn fields(&self) -> &[Interned] {
        if self.class_side {
            &self.class_fields
        } else {
            &self.instance_fields
        }
    }

    /// Index of a field on the side currently being parsed.
    pub fn field_index(&self, name: Interned) -> Option<usize> {
        self.fields().iter().position(|&f| f == name)
    }

    pub fn has_field(&self, name: Interned) -> bool {
        self.field_index(name).is_some()
    }

    /// Build a fresh class and its metaclass.
    ///
    /// A superclass named `nil` makes a root class; its metaclass still
    /// inherits from `Class`.
    pub fn assemble(self, u: &Universe) -> Result<Rc<Class>, VmError> {
        let superclass = if self.super_name == u.symbol("nil") {
            None
        } else {
            Some(u.load_class(self.super_name)?)
        };

        let name_text = u.symbol_text(self.name);
        let meta_name = u.symbol(&format!("{} class", name_text));
        let metaclass = Class::new(meta_name, u.symbol_text(meta_name));
        metaclass.set_class(u.core().metaclass.clone());
        metaclass.set_instance_fields(self.class_fields);
        metaclass.set_instance_invokables(self.class_methods);
        let super_meta = match &superclass {
            Some(superclass) => superclass.class(),
            None => Some(u.core().class.clone()),
        };
        metaclass.set_superclass(super_meta);

        let result = Class::new(self.name, name_text);
        result.set_class(metaclass);
        result.set_superclass(superclass);
        result.set_instance_fields(self.instance_fields);
        result.set_instance_invokables(self.instance_methods);
        Ok(result)
    }

    /// Fill a preallocated bootstrap class instead of creating a new one.
    pub fn assemble_system_class(self, system_class: &Rc<Class>) {
        system_class.set_instance_invokables(self.instance_methods);
        system_class.set_instance_fields(self.instance_fields);

        if let Some(metaclass) = system_class.class() {
            metaclass.set_instance_invokables(self.class_methods);
            metaclass.set_instance_fields(self.class_fields);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Method scope
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Argument,
    Local,
}

/// A variable resolved from a use site: which slot, and how many block
/// boundaries out it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVariable {
    pub kind: VariableKind,
    pub index: usize,
    pub context_level: usize,
}

pub struct MethodScope {
    pub signature: Option<Interned>,
    primitive: bool,
    block_method: bool,
    arguments: Vec<String>,
    locals: Vec<String>,
    needs_to_catch_non_local_return: bool,
    embedded_blocks: Vec<Rc<Invokable>>,
    pub ast: AstBuilder,
}

impl MethodScope {
    pub fn new(block_method: bool) -> Self {
        Self {
            signature: None,
            primitive: false,
            block_method,
            arguments: Vec::new(),
            locals: Vec::new(),
            needs_to_catch_non_local_return: false,
            embedded_blocks: Vec::new(),
            ast: AstBuilder::new(),
        }
    }

    pub fn is_block_method(&self) -> bool {
        self.block_method
    }

    pub fn mark_as_primitive(&mut self) {
        self.primitive = true;
    }

    pub fn needs_to_catch_non_local_return(&self) -> bool {
        self.needs_to_catch_non_local_return
    }

    /// # Panics
    ///
    /// Panics if `self` or the block self is added anywhere but first; the
    /// parser always adds it before anything else.
    pub fn add_argument_if_absent(&mut self, name: &str) {
        if self.arguments.iter().any(|a| a == name) {
            return;
        }
        assert!(
            !((name == SELF || name == BLOCK_SELF) && !self.arguments.is_empty()),
            "the self argument always has to be the first argument of a method"
        );
        self.arguments.push(name.to_string());
    }

    pub fn add_local_if_absent(&mut self, name: &str) {
        if !self.locals.iter().any(|l| l == name) {
            self.locals.push(name.to_string());
        }
    }

    pub fn number_of_arguments(&self) -> usize {
        self.arguments.len()
    }

    pub fn number_of_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn add_embedded_block(&mut self, block: Rc<Invokable>) {
        self.embedded_blocks.push(block);
    }

    fn own_variable(&self, name: &str) -> Option<(VariableKind, usize)> {
        if let Some(i) = self.locals.iter().position(|l| l == name) {
            return Some((VariableKind::Local, i));
        }
        self.arguments
            .iter()
            .position(|a| a == name)
            .map(|i| (VariableKind::Argument, i))
    }

    /// Turn the finished scope into an invokable.
    ///
    /// Methods declared `primitive` have no body and become an empty
    /// primitive until native code is installed over them. `holder` is only
    /// used to label the source section.
    pub fn assemble(
        mut self,
        u: &Universe,
        holder: &str,
        body: Option<NodeId>,
        span: Span,
    ) -> Rc<Invokable> {
        let signature = self.signature.unwrap_or_else(|| u.symbol("$unnamed"));
        let signature_text = u.symbol_text(signature);

        let body = match body {
            Some(body) if !self.primitive => body,
            _ => {
                return Invokable::new(
                    signature,
                    signature_text,
                    InvokableKind::EmptyPrimitive,
                );
            }
        };

        let body = if self.needs_to_catch_non_local_return() {
            self.ast.create_catch_non_local_return(body, span)
        } else {
            body
        };

        let source = SourceSection::new(format!("{}>>{}", holder, signature_text), span);
        let number_of_locals = self.number_of_locals();
        Invokable::new(
            signature,
            signature_text,
            InvokableKind::Method {
                source,
                ast: self.ast.finish(body),
                number_of_locals,
                embedded_blocks: self.embedded_blocks,
            },
        )
    }
}

/// The chain of method scopes enclosing the code being parsed.
#[derive(Default)]
pub struct ScopeChain {
    scopes: Vec<MethodScope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: MethodScope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<MethodScope> {
        self.scopes.pop()
    }

    /// # Panics
    ///
    /// Panics when no method is being parsed.
    pub fn current(&self) -> &MethodScope {
        self.scopes.last().expect("no method scope")
    }

    pub fn current_mut(&mut self) -> &mut MethodScope {
        self.scopes.last_mut().expect("no method scope")
    }

    /// Number of blocks the current scope is nested in.
    pub fn outer_self_context_level(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    /// Resolve `name` to the nearest enclosing argument or local.
    pub fn variable(&self, name: &str) -> Option<ResolvedVariable> {
        self.scopes
            .iter()
            .rev()
            .enumerate()
            .find_map(|(context_level, scope)| {
                scope.own_variable(name).map(|(kind, index)| ResolvedVariable {
                    kind,
                    index,
                    context_level,
                })
            })
    }

    /// Like [`variable`](Self::variable), but arguments are not assignable.
    ///
    /// A local shadowed by a nearer argument of the same name is not
    /// visible either.
    pub fn local(&self, name: &str) -> Option<ResolvedVariable> {
        self.variable(name)
            .filter(|v| v.kind == VariableKind::Local)
    }

    /// Record a `^` inside a block. Only the outermost scope, the method
    /// itself, gets to catch the return.
    pub fn make_catch_non_local_return(&mut self) {
        if let Some(method) = self.scopes.first_mut() {
            method.needs_to_catch_non_local_return = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::object::Value;

    fn chain() -> ScopeChain {
        let mut method = MethodScope::new(false);
        method.add_argument_if_absent(SELF);
        method.add_argument_if_absent("x");
        method.add_local_if_absent("a");

        let mut block = MethodScope::new(true);
        block.add_argument_if_absent(BLOCK_SELF);
        block.add_argument_if_absent("y");

        let mut inner = MethodScope::new(true);
        inner.add_argument_if_absent(BLOCK_SELF);
        inner.add_local_if_absent("x");

        let mut chain = ScopeChain::new();
        chain.push(method);
        chain.push(block);
        chain.push(inner);
        chain
    }

    #[test]
    fn resolves_through_block_boundaries() {
        let chain = chain();
        assert_eq!(
            chain.variable("a"),
            Some(ResolvedVariable {
                kind: VariableKind::Local,
                index: 0,
                context_level: 2
            })
        );
        assert_eq!(
            chain.variable("y"),
            Some(ResolvedVariable {
                kind: VariableKind::Argument,
                index: 1,
                context_level: 1
            })
        );
        assert_eq!(chain.variable(SELF).map(|v| v.context_level), Some(2));
        assert_eq!(chain.variable("nope"), None);
    }

    #[test]
    fn nearest_declaration_wins() {
        let chain = chain();
        assert_eq!(
            chain.variable("x"),
            Some(ResolvedVariable {
                kind: VariableKind::Local,
                index: 0,
                context_level: 0
            })
        );
    }

    #[test]
    fn arguments_are_not_assignable() {
        let chain = chain();
        assert_eq!(chain.local("y"), None);
        assert!(chain.local("a").is_some());
    }

    #[test]
    fn only_the_method_catches() {
        let mut chain = chain();
        chain.make_catch_non_local_return();
        assert!(!chain.current().needs_to_catch_non_local_return());
        let inner = chain.pop().expect("inner");
        let block = chain.pop().expect("block");
        assert!(!inner.needs_to_catch_non_local_return());
        assert!(!block.needs_to_catch_non_local_return());
        assert!(chain.current().needs_to_catch_non_local_return());
        assert_eq!(chain.outer_self_context_level(), 0);
    }

    #[test]
    fn marked_method_wraps_its_body_in_a_catch() {
        let u = crate::universe::tests::test_universe();
        let span = Span::point(crate::span::SourceCoordinate::origin());
        let catches = |marked: bool| {
            let mut chain = ScopeChain::new();
            let mut method = MethodScope::new(false);
            method.add_argument_if_absent(SELF);
            method.add_local_if_absent("a");
            chain.push(method);
            if marked {
                chain.push(MethodScope::new(true));
                chain.make_catch_non_local_return();
                chain.pop();
            }
            let mut method = chain.pop().expect("method");
            assert_eq!(method.number_of_locals(), 1);
            let body = method.ast.push(Node::Literal(Value::Nil), span);
            let invokable = method.assemble(&u, "Test", Some(body), span);
            match invokable.kind() {
                InvokableKind::Method { ast, .. } => {
                    matches!(*ast.node(ast.root()), Node::CatchNonLocalReturn { .. })
                }
                _ => panic!("expected a method"),
            }
        };
        assert!(catches(true));
        assert!(!catches(false));
    }

    #[test]
    #[should_panic(expected = "self argument always has to be the first")]
    fn self_must_come_first() {
        let mut scope = MethodScope::new(false);
        scope.add_argument_if_absent("x");
        scope.add_argument_if_absent(SELF);
    }
}
