/// Recursive-descent parser for SOM class definitions.
///
/// The [`Parser`] pulls symbols from a [`Lexer`] and builds method trees
/// directly, without an intermediate syntax tree: every grammar rule that
/// produces an expression returns the [`NodeId`] of the node it pushed into
/// the current [`MethodScope`]'s arena. Names are resolved as soon as they
/// are read, so the trees it emits already carry context levels and slot
/// indices.
///
/// # Grammar
///
/// ```text
/// classdef   ::= Identifier '=' [superclass] '(' fields method*
///                ['----' fields method*] ')'
/// method     ::= pattern '=' ('primitive' | '(' blockContents ')')
/// pattern    ::= unary | binaryOp argument | (keyword argument)+
/// blockContents ::= ['|' locals '|'] blockBody
/// blockBody  ::= (expression ['.'])* ['^' expression ['.']]
/// expression ::= (variable ':=')* evaluation
/// evaluation ::= primary [messages]
/// primary    ::= variable | '(' expression ')' | block | literal
/// block      ::= '[' [(':' argument)+ '|'] blockContents ']'
/// ```
///
/// Unary sends bind tightest, then binary sends (all operators share one
/// precedence level, left to right), then a single keyword send.
///
/// # Errors
///
/// There is no recovery: the first problem ends the parse with a
/// [`ParseError`] describing what was expected, what was found and where.
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::ast::NodeId;
use crate::interning::Interned;
use crate::invokable::Invokable;
use crate::lexer::{LexError, Lexer};
use crate::object::Value;
use crate::scope::{BLOCK_SELF, ClassScope, MethodScope, SELF, ScopeChain, VariableKind};
use crate::span::{SourceCoordinate, Span};
use crate::token::TokenKind;
use crate::universe::Universe;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "{file}:{}:{}: error: {message}: {line_text}",
    .coordinate.line,
    .coordinate.column
)]
pub struct ParseError {
    pub message: String,
    /// Description of what the grammar wanted at this point.
    pub expected: String,
    pub found: TokenKind,
    pub found_text: String,
    /// The source line the lexer was on.
    pub line_text: String,
    pub coordinate: SourceCoordinate,
    pub file: String,
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'u> {
    u: &'u Universe,
    lexer: Lexer,
    sym: TokenKind,
    text: String,
    next_sym: TokenKind,
    file_name: String,
    scopes: ScopeChain,
    last_methods_span: Span,
}

impl<'u> Parser<'u> {
    pub fn new(source: &str, file_name: &str, u: &'u Universe) -> ParseResult<Self> {
        let mut parser = Self {
            u,
            lexer: Lexer::new(source),
            sym: TokenKind::None,
            text: String::new(),
            next_sym: TokenKind::None,
            file_name: file_name.to_string(),
            scopes: ScopeChain::new(),
            last_methods_span: Span::point(SourceCoordinate::origin()),
        };
        parser.get_symbol_from_lexer()?;
        Ok(parser)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    // ═══════════════════════════════════════════════════════════════════
    // Errors
    // ═══════════════════════════════════════════════════════════════════

    fn found_string(&self) -> String {
        if self.sym.is_printable() {
            format!("{} ({})", self.sym, self.text)
        } else {
            self.sym.to_string()
        }
    }

    fn error(&self, message: impl Into<String>, expected: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            expected: expected.into(),
            found: self.sym,
            found_text: self.text.clone(),
            line_text: self.lexer.current_line(),
            coordinate: self.lexer.start_coordinate(),
            file: self.file_name.clone(),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        self.error(
            format!(
                "Unexpected symbol. Expected {}, but found {}",
                expected,
                self.found_string()
            ),
            expected,
        )
    }

    fn lex_error(&self, err: LexError) -> ParseError {
        self.error(err.to_string(), "a valid symbol")
    }

    // ═══════════════════════════════════════════════════════════════════
    // Symbol stream
    // ═══════════════════════════════════════════════════════════════════

    fn get_symbol_from_lexer(&mut self) -> ParseResult<()> {
        let sym = match self.lexer.next_symbol() {
            Ok(sym) => sym,
            Err(err) => return Err(self.lex_error(err)),
        };
        self.sym = sym;
        self.text = self.lexer.text().to_string();
        Ok(())
    }

    fn peek_for_next_symbol_from_lexer(&mut self) -> ParseResult<()> {
        self.next_sym = match self.lexer.peek() {
            Ok(sym) => sym,
            Err(err) => return Err(self.lex_error(err)),
        };
        Ok(())
    }

    fn accept(&mut self, sym: TokenKind) -> ParseResult<bool> {
        if self.sym == sym {
            self.get_symbol_from_lexer()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, sym: TokenKind) -> ParseResult<()> {
        if self.accept(sym)? {
            return Ok(());
        }
        Err(self.unexpected(sym.name()))
    }

    fn expect_one_of(&mut self, syms: &[TokenKind]) -> ParseResult<()> {
        if syms.contains(&self.sym) {
            return self.get_symbol_from_lexer();
        }
        let expected = syms
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ");
        Err(self.error(
            format!(
                "Unexpected symbol. Expected one of {}, but found {}",
                expected,
                self.found_string()
            ),
            expected,
        ))
    }

    fn coordinate(&self) -> SourceCoordinate {
        self.lexer.start_coordinate()
    }

    fn source(&self, start: SourceCoordinate) -> Span {
        Span::new(
            start,
            self.lexer
                .number_of_characters_read()
                .saturating_sub(start.char_index),
        )
    }

    fn symbol(&self, text: &str) -> Interned {
        self.u.symbol(text)
    }

    fn is_message_start(&self) -> bool {
        self.sym.is_identifier()
            || self.sym == TokenKind::Keyword
            || self.sym.is_binary_op()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Class definitions
    // ═══════════════════════════════════════════════════════════════════

    pub fn classdef(&mut self) -> ParseResult<ClassScope> {
        let name = self.symbol(&self.text);
        self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::Equal)?;

        let mut cgenc = self.superclass(name)?;

        self.expect(TokenKind::NewTerm)?;
        self.instance_fields(&mut cgenc)?;

        while self.is_message_start() {
            let method = self.method(&cgenc)?;
            cgenc.add_instance_method(method);
        }

        if self.accept(TokenKind::Separator)? {
            cgenc.set_class_side(true);
            self.class_fields(&mut cgenc)?;
            while self.is_message_start() {
                let method = self.method(&cgenc)?;
                cgenc.add_class_method(method);
            }
        }
        self.expect(TokenKind::EndTerm)?;
        Ok(cgenc)
    }

    fn superclass(&mut self, name: Interned) -> ParseResult<ClassScope> {
        let super_name = if self.sym == TokenKind::Identifier {
            let super_name = self.symbol(&self.text);
            self.accept(TokenKind::Identifier)?;
            super_name
        } else {
            self.symbol("Object")
        };
        let mut cgenc = ClassScope::new(name, super_name);

        // `nil` breaks the dependency cycle when bootstrapping
        if super_name != self.symbol("nil") {
            let superclass = self.u.load_class(super_name).map_err(|err| {
                self.error(
                    format!(
                        "Super class {} could not be loaded: {}",
                        self.u.symbol_text(super_name),
                        err
                    ),
                    TokenKind::None.name(),
                )
            })?;
            cgenc.set_instance_fields_of_super(superclass.instance_fields());
            if let Some(metaclass) = superclass.class() {
                cgenc.set_class_fields_of_super(metaclass.instance_fields());
            }
        }
        Ok(cgenc)
    }

    fn instance_fields(&mut self, cgenc: &mut ClassScope) -> ParseResult<()> {
        if self.accept(TokenKind::Or)? {
            while self.sym.is_identifier() {
                let field = self.variable()?;
                cgenc.add_instance_field(self.symbol(&field));
            }
            self.expect(TokenKind::Or)?;
        }
        Ok(())
    }

    fn class_fields(&mut self, cgenc: &mut ClassScope) -> ParseResult<()> {
        if self.accept(TokenKind::Or)? {
            while self.sym.is_identifier() {
                let field = self.variable()?;
                cgenc.add_class_field(self.symbol(&field));
            }
            self.expect(TokenKind::Or)?;
        }
        Ok(())
    }

    fn holder_label(&self, cgenc: &ClassScope) -> String {
        let name = self.u.symbol_text(cgenc.name);
        if cgenc.is_class_side() {
            format!("{} class", name)
        } else {
            name.to_string()
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Methods
    // ═══════════════════════════════════════════════════════════════════

    fn method(&mut self, cgenc: &ClassScope) -> ParseResult<Rc<Invokable>> {
        self.scopes.push(MethodScope::new(false));
        self.pattern()?;
        self.expect(TokenKind::Equal)?;

        let body = if self.sym == TokenKind::Primitive {
            self.scopes.current_mut().mark_as_primitive();
            self.expect(TokenKind::Primitive)?;
            None
        } else {
            Some(self.method_block(cgenc)?)
        };

        let holder = self.holder_label(cgenc);
        let span = self.last_methods_span;
        let mgenc = self.pop_scope()?;
        Ok(mgenc.assemble(self.u, &holder, body, span))
    }

    fn pop_scope(&mut self) -> ParseResult<MethodScope> {
        self.scopes
            .pop()
            .ok_or_else(|| self.error("method scope stack underflow", "a method"))
    }

    fn pattern(&mut self) -> ParseResult<()> {
        self.scopes.current_mut().add_argument_if_absent(SELF);
        match self.sym {
            TokenKind::Identifier | TokenKind::Primitive => self.unary_pattern(),
            TokenKind::Keyword => self.keyword_pattern(),
            _ => self.binary_pattern(),
        }
    }

    fn unary_pattern(&mut self) -> ParseResult<()> {
        let selector = self.unary_selector()?;
        self.scopes.current_mut().signature = Some(selector);
        Ok(())
    }

    fn binary_pattern(&mut self) -> ParseResult<()> {
        let selector = self.binary_selector()?;
        self.scopes.current_mut().signature = Some(selector);
        let argument = self.argument()?;
        self.scopes.current_mut().add_argument_if_absent(&argument);
        Ok(())
    }

    fn keyword_pattern(&mut self) -> ParseResult<()> {
        let mut kw = String::new();
        loop {
            kw.push_str(&self.keyword()?);
            let argument = self.argument()?;
            self.scopes.current_mut().add_argument_if_absent(&argument);
            if self.sym != TokenKind::Keyword {
                break;
            }
        }
        self.scopes.current_mut().signature = Some(self.symbol(&kw));
        Ok(())
    }

    fn method_block(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        self.expect(TokenKind::NewTerm)?;
        let coord = self.coordinate();
        let body = self.block_contents(cgenc)?;
        self.last_methods_span = self.source(coord);
        self.expect(TokenKind::EndTerm)?;
        Ok(body)
    }

    fn unary_selector(&mut self) -> ParseResult<Interned> {
        let name = self.identifier()?;
        Ok(self.symbol(&name))
    }

    fn binary_selector(&mut self) -> ParseResult<Interned> {
        let selector = self.text.clone();
        if !self.sym.is_binary_op() {
            return Err(self.unexpected("a binary selector"));
        }
        self.get_symbol_from_lexer()?;
        Ok(self.symbol(&selector))
    }

    fn identifier(&mut self) -> ParseResult<String> {
        let name = self.text.clone();
        if !self.accept(TokenKind::Primitive)? {
            self.expect(TokenKind::Identifier)?;
        }
        Ok(name)
    }

    fn keyword(&mut self) -> ParseResult<String> {
        let kw = self.text.clone();
        self.expect(TokenKind::Keyword)?;
        Ok(kw)
    }

    fn argument(&mut self) -> ParseResult<String> {
        self.variable()
    }

    fn variable(&mut self) -> ParseResult<String> {
        self.identifier()
    }

    fn block_contents(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        if self.accept(TokenKind::Or)? {
            self.locals()?;
            self.expect(TokenKind::Or)?;
        }
        self.block_body(cgenc)
    }

    fn locals(&mut self) -> ParseResult<()> {
        while self.sym.is_identifier() {
            let local = self.variable()?;
            self.scopes.current_mut().add_local_if_absent(&local);
        }
        Ok(())
    }

    fn block_body(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let mut expressions = Vec::new();

        loop {
            if self.accept(TokenKind::Exit)? {
                expressions.push(self.result(cgenc)?);
                return Ok(self.create_sequence_node(coord, expressions));
            } else if self.sym == TokenKind::EndBlock {
                return Ok(self.create_sequence_node(coord, expressions));
            } else if self.sym == TokenKind::EndTerm {
                // end of a method body: answer self
                let span = self.source(self.coordinate());
                expressions.push(self.variable_read(cgenc, SELF, span)?);
                return Ok(self.create_sequence_node(coord, expressions));
            }

            expressions.push(self.expression(cgenc)?);
            self.accept(TokenKind::Period)?;
        }
    }

    fn create_sequence_node(&mut self, coord: SourceCoordinate, expressions: Vec<NodeId>) -> NodeId {
        let span = self.source(coord);
        match expressions.len() {
            0 => {
                let nil = self.symbol("nil");
                self.scopes.current_mut().ast.create_global_read(nil, span)
            }
            1 => expressions[0],
            _ => self.scopes.current_mut().ast.create_sequence(expressions, span),
        }
    }

    fn result(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let exp = self.expression(cgenc)?;
        self.accept(TokenKind::Period)?;

        if self.scopes.current().is_block_method() {
            let span = self.source(coord);
            self.scopes.make_catch_non_local_return();
            let level = self.scopes.outer_self_context_level();
            Ok(self
                .scopes
                .current_mut()
                .ast
                .create_non_local_return(exp, level, span))
        } else {
            Ok(exp)
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn expression(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        self.peek_for_next_symbol_from_lexer()?;
        if self.next_sym == TokenKind::Assign {
            self.assignments(cgenc)
        } else {
            self.evaluation(cgenc)
        }
    }

    fn assignments(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let coord = self.coordinate();

        if !self.sym.is_identifier() {
            return Err(self.error(
                format!(
                    "Assignments should always target variables or fields, but found instead a {}",
                    self.found_string()
                ),
                TokenKind::Identifier.name(),
            ));
        }
        let variable = self.assignment()?;

        self.peek_for_next_symbol_from_lexer()?;
        let value = if self.next_sym == TokenKind::Assign {
            self.assignments(cgenc)?
        } else {
            self.evaluation(cgenc)?
        };

        let span = self.source(coord);
        self.variable_write(cgenc, &variable, value, span)
    }

    fn assignment(&mut self) -> ParseResult<String> {
        let variable = self.variable()?;
        self.expect(TokenKind::Assign)?;
        Ok(variable)
    }

    fn evaluation(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let exp = self.primary(cgenc)?;
        if self.is_message_start() {
            return self.messages(cgenc, exp);
        }
        Ok(exp)
    }

    fn primary(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        match self.sym {
            TokenKind::Identifier | TokenKind::Primitive => {
                let coord = self.coordinate();
                let name = self.variable()?;
                let span = self.source(coord);
                self.variable_read(cgenc, &name, span)
            }
            TokenKind::NewTerm => self.nested_term(cgenc),
            TokenKind::NewBlock => {
                let coord = self.coordinate();
                self.scopes.push(MethodScope::new(true));
                let body = self.nested_block(cgenc)?;
                let bgenc = self.pop_scope()?;

                let holder = self.holder_label(cgenc);
                let block_method =
                    bgenc.assemble(self.u, &holder, Some(body), self.last_methods_span);
                let span = self.source(coord);
                let mgenc = self.scopes.current_mut();
                mgenc.add_embedded_block(block_method.clone());
                Ok(mgenc.ast.create_block(block_method, span))
            }
            _ => self.literal(),
        }
    }

    fn messages(&mut self, cgenc: &ClassScope, receiver: NodeId) -> ParseResult<NodeId> {
        let mut msg = receiver;
        if self.sym.is_identifier() {
            while self.sym.is_identifier() {
                msg = self.unary_message(msg)?;
            }
            while self.sym.is_binary_op() {
                msg = self.binary_message(cgenc, msg)?;
            }
            if self.sym == TokenKind::Keyword {
                msg = self.keyword_message(cgenc, msg)?;
            }
        } else if self.sym.is_binary_op() {
            while self.sym.is_binary_op() {
                msg = self.binary_message(cgenc, msg)?;
            }
            if self.sym == TokenKind::Keyword {
                msg = self.keyword_message(cgenc, msg)?;
            }
        } else {
            msg = self.keyword_message(cgenc, msg)?;
        }
        Ok(msg)
    }

    fn send(&mut self, selector: Interned, arguments: Vec<NodeId>, span: Span) -> NodeId {
        self.scopes
            .current_mut()
            .ast
            .create_message_send(selector, arguments, span)
    }

    fn unary_message(&mut self, receiver: NodeId) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let selector = self.unary_selector()?;
        let span = self.source(coord);
        Ok(self.send(selector, vec![receiver], span))
    }

    fn binary_message(&mut self, cgenc: &ClassScope, receiver: NodeId) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let selector = self.binary_selector()?;
        let operand = self.binary_operand(cgenc)?;
        let span = self.source(coord);
        Ok(self.send(selector, vec![receiver, operand], span))
    }

    /// A binary operand takes unary sends: `2 * 3 asString` is
    /// `2 * (3 asString)`.
    fn binary_operand(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let mut operand = self.primary(cgenc)?;
        while self.sym.is_identifier() {
            operand = self.unary_message(operand)?;
        }
        Ok(operand)
    }

    fn keyword_message(&mut self, cgenc: &ClassScope, receiver: NodeId) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let mut arguments = vec![receiver];
        let mut kw = String::new();

        loop {
            kw.push_str(&self.keyword()?);
            arguments.push(self.formula(cgenc)?);
            if self.sym != TokenKind::Keyword {
                break;
            }
        }

        let selector = self.symbol(&kw);
        let span = self.source(coord);
        Ok(self.send(selector, arguments, span))
    }

    fn formula(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        let mut operand = self.binary_operand(cgenc)?;
        while self.sym.is_binary_op() {
            operand = self.binary_message(cgenc, operand)?;
        }
        Ok(operand)
    }

    fn nested_term(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        self.expect(TokenKind::NewTerm)?;
        let exp = self.expression(cgenc)?;
        self.expect(TokenKind::EndTerm)?;
        Ok(exp)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════

    fn literal(&mut self) -> ParseResult<NodeId> {
        match self.sym {
            TokenKind::Pound => self.literal_symbol(),
            TokenKind::String => self.literal_string(),
            _ => self.literal_number(),
        }
    }

    fn push_literal(&mut self, value: Value, coord: SourceCoordinate) -> NodeId {
        let span = self.source(coord);
        self.scopes.current_mut().ast.create_literal(value, span)
    }

    fn literal_number(&mut self) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let negative = self.accept(TokenKind::Minus)?;
        let value = match self.sym {
            TokenKind::Integer => self.literal_integer(negative)?,
            TokenKind::Double => self.literal_double(negative)?,
            _ => return Err(self.unexpected("a literal")),
        };
        Ok(self.push_literal(value, coord))
    }

    /// Integers beyond 32 bits become arbitrary precision right away.
    fn literal_integer(&mut self, negative: bool) -> ParseResult<Value> {
        let mut value: BigInt = self.text.parse().map_err(|_| {
            self.error(
                format!(
                    "Could not parse integer. Expected a number but got '{}'",
                    self.text
                ),
                TokenKind::Integer.name(),
            )
        })?;
        if negative {
            value = -value;
        }
        self.expect(TokenKind::Integer)?;

        Ok(match value.to_i32() {
            Some(small) => Value::Integer(i64::from(small)),
            None => Value::BigInteger(Rc::new(value)),
        })
    }

    fn literal_double(&mut self, negative: bool) -> ParseResult<Value> {
        let value: f64 = self.text.parse().map_err(|_| {
            self.error(
                format!(
                    "Could not parse double. Expected a number but got '{}'",
                    self.text
                ),
                TokenKind::Double.name(),
            )
        })?;
        self.expect(TokenKind::Double)?;
        Ok(Value::Double(if negative { -value } else { value }))
    }

    fn literal_symbol(&mut self) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        self.expect(TokenKind::Pound)?;
        let symbol = if self.sym == TokenKind::String {
            let s = self.string()?;
            self.symbol(&s)
        } else {
            self.selector()?
        };
        Ok(self.push_literal(Value::Symbol(symbol), coord))
    }

    fn literal_string(&mut self) -> ParseResult<NodeId> {
        let coord = self.coordinate();
        let s = self.string()?;
        Ok(self.push_literal(Value::string(&s), coord))
    }

    fn selector(&mut self) -> ParseResult<Interned> {
        if self.sym.is_binary_op() {
            self.binary_selector()
        } else if matches!(self.sym, TokenKind::Keyword | TokenKind::KeywordSequence) {
            self.keyword_selector()
        } else {
            self.unary_selector()
        }
    }

    fn keyword_selector(&mut self) -> ParseResult<Interned> {
        let selector = self.text.clone();
        self.expect_one_of(&[TokenKind::Keyword, TokenKind::KeywordSequence])?;
        Ok(self.symbol(&selector))
    }

    fn string(&mut self) -> ParseResult<String> {
        let s = self.text.clone();
        self.expect(TokenKind::String)?;
        Ok(s)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Blocks
    // ═══════════════════════════════════════════════════════════════════

    fn nested_block(&mut self, cgenc: &ClassScope) -> ParseResult<NodeId> {
        self.expect(TokenKind::NewBlock)?;
        let coord = self.coordinate();

        self.scopes.current_mut().add_argument_if_absent(BLOCK_SELF);

        if self.sym == TokenKind::Colon {
            self.block_pattern()?;
        }

        // never callable by name, only identifies the block
        let mut signature = format!(
            "$blockMethod@{}@{}",
            self.lexer.current_line_number(),
            self.lexer.current_column()
        );
        for _ in 1..self.scopes.current().number_of_arguments() {
            signature.push(':');
        }
        self.scopes.current_mut().signature = Some(self.symbol(&signature));

        let expressions = self.block_contents(cgenc)?;
        self.last_methods_span = self.source(coord);
        self.expect(TokenKind::EndBlock)?;
        Ok(expressions)
    }

    fn block_pattern(&mut self) -> ParseResult<()> {
        self.block_arguments()?;
        self.expect(TokenKind::Or)
    }

    fn block_arguments(&mut self) -> ParseResult<()> {
        loop {
            self.expect(TokenKind::Colon)?;
            let argument = self.argument()?;
            self.scopes.current_mut().add_argument_if_absent(&argument);
            if self.sym != TokenKind::Colon {
                return Ok(());
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Name resolution
    // ═══════════════════════════════════════════════════════════════════

    fn self_read(&mut self, span: Span) -> ParseResult<NodeId> {
        let this = self
            .scopes
            .variable(SELF)
            .ok_or_else(|| self.error("self is not in scope", SELF))?;
        Ok(self
            .scopes
            .current_mut()
            .ast
            .create_argument_read(this.index, this.context_level, span))
    }

    /// `super`, then arguments and locals from the innermost scope out,
    /// then fields of the holder, then globals.
    fn variable_read(&mut self, cgenc: &ClassScope, name: &str, span: Span) -> ParseResult<NodeId> {
        if name == "super" {
            let level = self.scopes.outer_self_context_level();
            return Ok(self.scopes.current_mut().ast.create_super_read(
                level,
                cgenc.name,
                cgenc.is_class_side(),
                span,
            ));
        }

        if let Some(variable) = self.scopes.variable(name) {
            let ast = &mut self.scopes.current_mut().ast;
            return Ok(match variable.kind {
                VariableKind::Argument => {
                    ast.create_argument_read(variable.index, variable.context_level, span)
                }
                VariableKind::Local => {
                    ast.create_variable_read(variable.index, variable.context_level, span)
                }
            });
        }

        let symbol = self.symbol(name);
        if let Some(index) = cgenc.field_index(symbol) {
            let this = self.self_read(span)?;
            return Ok(self.scopes.current_mut().ast.create_field_read(this, index, span));
        }

        Ok(self.scopes.current_mut().ast.create_global_read(symbol, span))
    }

    fn variable_write(
        &mut self,
        cgenc: &ClassScope,
        name: &str,
        value: NodeId,
        span: Span,
    ) -> ParseResult<NodeId> {
        if let Some(local) = self.scopes.local(name) {
            return Ok(self.scopes.current_mut().ast.create_variable_write(
                local.index,
                local.context_level,
                value,
                span,
            ));
        }

        let symbol = self.symbol(name);
        if let Some(index) = cgenc.field_index(symbol) {
            let this = self.self_read(span)?;
            return Ok(self
                .scopes
                .current_mut()
                .ast
                .create_field_write(this, value, index, span));
        }

        Err(self.error(
            format!(
                "Neither a variable nor a field found in current scope that is named {}. \
                 Arguments are read-only.",
                name
            ),
            "a local variable or field",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::invokable::InvokableKind;
    use crate::universe::tests::test_universe;
    use pretty_assertions::assert_eq;

    fn parse(u: &Universe, source: &str) -> ParseResult<ClassScope> {
        Parser::new(source, "test.som", u)?.classdef()
    }

    fn methods(u: &Universe, source: &str) -> Vec<Rc<Invokable>> {
        let cgenc = parse(u, source).expect("parse error");
        cgenc.assemble(u).expect("assemble error").invokables()
    }

    fn signatures(u: &Universe, source: &str) -> Vec<String> {
        methods(u, source)
            .iter()
            .map(|m| m.signature_string().to_string())
            .collect()
    }

    #[test]
    fn selectors_round_trip() {
        let u = test_universe();
        assert_eq!(
            signatures(
                &u,
                "Foo = (
                    foo = ( )
                    + other = ( )
                    <= other = ( )
                    - other = ( )
                    at: i put: v = ( )
                    primitive = ( )
                )"
            ),
            vec!["foo", "+", "<=", "-", "at:put:", "primitive"]
        );
    }

    #[test]
    fn class_side_and_fields() {
        let u = test_universe();
        let cgenc = parse(
            &u,
            "Foo = Object ( | a b | a = ( ^ a ) ---- | count | new = ( count := 1 ) )",
        )
        .expect("parse error");
        let class = cgenc.assemble(&u).expect("assemble error");
        assert_eq!(class.number_of_instance_fields(), 2);
        let metaclass = class.class().expect("metaclass");
        assert_eq!(&*metaclass.name_string(), "Foo class");
        assert_eq!(metaclass.number_of_instance_fields(), 1);
        assert_eq!(metaclass.number_of_invokables(), 1);
    }

    #[test]
    fn primitive_methods_are_empty_primitives() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( bar = primitive )");
        assert!(matches!(methods[0].kind(), InvokableKind::EmptyPrimitive));
    }

    fn root(method: &Invokable) -> Rc<Node> {
        match method.kind() {
            InvokableKind::Method { ast, .. } => ast.node(ast.root()),
            _ => panic!("not a method"),
        }
    }

    #[test]
    fn only_outermost_method_catches() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( run = ( [ [ [ ^ 1 ] value ] value ] value ) )");
        assert!(matches!(*root(&methods[0]), Node::CatchNonLocalReturn { .. }));

        let InvokableKind::Method {
            embedded_blocks, ..
        } = methods[0].kind()
        else {
            panic!("not a method");
        };
        let outer = &embedded_blocks[0];
        assert!(!matches!(*root(outer), Node::CatchNonLocalReturn { .. }));
    }

    #[test]
    fn non_local_return_level_counts_blocks() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( run = ( [ [ ^ 1 ] ] ) )");
        let InvokableKind::Method {
            embedded_blocks, ..
        } = methods[0].kind()
        else {
            panic!("not a method");
        };
        let InvokableKind::Method {
            embedded_blocks: inner, ..
        } = embedded_blocks[0].kind()
        else {
            panic!("not a method");
        };
        assert!(matches!(
            *root(&inner[0]),
            Node::NonLocalReturn {
                context_level: 2,
                ..
            }
        ));
    }

    #[test]
    fn method_return_is_plain() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( run = ( ^ 1 ) )");
        assert!(matches!(*root(&methods[0]), Node::Literal(Value::Integer(1))));
    }

    #[test]
    fn block_signatures_count_arguments() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( run = ( ^ [:a :b | a ] ) )");
        let InvokableKind::Method {
            embedded_blocks, ..
        } = methods[0].kind()
        else {
            panic!("not a method");
        };
        let signature = embedded_blocks[0].signature_string();
        assert!(signature.starts_with("$blockMethod@1@"));
        assert!(signature.ends_with("::"));
        assert_eq!(embedded_blocks[0].number_of_arguments(), 3);
    }

    #[test]
    fn large_literals_are_big_integers() {
        let u = test_universe();
        let methods = methods(&u, "Foo = ( a = ( ^ 2147483648 ) b = ( ^ -5 ) c = ( ^ -1.5 ) )");
        assert!(matches!(*root(&methods[0]), Node::Literal(Value::BigInteger(_))));
        assert!(matches!(*root(&methods[1]), Node::Literal(Value::Integer(-5))));
        assert!(matches!(*root(&methods[2]), Node::Literal(Value::Double(d)) if d == -1.5));
    }

    #[test]
    fn assigning_an_argument_is_an_error() {
        let u = test_universe();
        let err = parse(&u, "Foo = ( set: x = ( x := 1 ) )")
            .err()
            .expect("expected an error");
        assert!(err.message.contains("Arguments are read-only"));
        assert_eq!(err.file, "test.som");
    }

    #[test]
    fn unexpected_symbol_reports_position() {
        let u = test_universe();
        let err = parse(&u, "Foo = (\n  bar = ( ^ ) )")
            .err()
            .expect("expected an error");
        assert_eq!(err.coordinate.line, 2);
        assert_eq!(err.found, TokenKind::EndTerm);
        assert!(err.message.starts_with("Unexpected symbol. Expected a literal"));
        assert!(err.to_string().starts_with("test.som:2:"));
    }

    #[test]
    fn unknown_superclass_is_an_error() {
        let u = test_universe();
        let err = parse(&u, "Foo = DoesNotExist ( )")
            .err()
            .expect("expected an error");
        assert!(err.message.contains("Super class DoesNotExist could not be loaded"));
    }
}
