use std::sync::Arc;

use crate::{
    backend::chunk::{Chunk, OpCode, SourceLocation},
    backend::object::FunctionObject,
    error::{ErrorReporter, VesperCompilerError, VesperPipelineError},
    frontend::source::SourceSpan,
    frontend::tokenizer::{Token, TokenType, Tokenizer},
    memory::{FunctionHandle, HeapAllocator, StringHandle},
    SourceMap, Value,
};

pub const FRAME_MAX: usize = 64;
pub const STACK_MAX: usize = FRAME_MAX * 256;

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

/// A compiled script, ready to hand to the VM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesperProgram(FunctionHandle);

impl VesperProgram {
    pub fn new(handle: FunctionHandle) -> Self {
        Self(handle)
    }

    pub fn into_handle(self) -> FunctionHandle {
        self.0
    }
}

/// Front door of the compiler: tokenizes and compiles a source map in a
/// single pass, producing the top-level function.
pub struct CompilerPipeline<'a> {
    source_map: Arc<SourceMap>,
    allocator: &'a mut HeapAllocator,
}

impl<'a> CompilerPipeline<'a> {
    pub fn new(source_map: SourceMap, allocator: &'a mut HeapAllocator) -> Self {
        Self {
            source_map: Arc::new(source_map),
            allocator,
        }
    }

    pub fn run(self) -> Result<VesperProgram, VesperPipelineError> {
        let compiler = Compiler::new(self.source_map.clone(), self.allocator);
        let function = compiler.compile().map_err(|error| {
            VesperPipelineError::new(
                error
                    .into_errors()
                    .into_iter()
                    .map(|e| e.into_formatted(&self.source_map))
                    .collect(),
            )
        })?;

        Ok(VesperProgram::new(self.allocator.allocate_function(function)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, PartialEq)]
struct Local {
    name: StringHandle,
    depth: Option<usize>,
    is_captured: bool,
}

impl Local {
    fn new(name: StringHandle) -> Self {
        Self {
            name,
            depth: None,
            is_captured: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UpvalueDesc {
    index: u8,
    is_local: bool,
}

/// Per-function compiler state. Nested function declarations push a new
/// state and stash the previous one in `enclosing`, forming the chain
/// that upvalue resolution walks.
#[derive(Debug, Clone, PartialEq)]
struct CompilerState {
    kind: FunctionKind,
    function: FunctionObject,
    locals: Vec<Local>,
    local_count: usize,
    scope_depth: usize,
    upvalues: Vec<UpvalueDesc>,
    enclosing: Option<Box<CompilerState>>,
}

impl CompilerState {
    fn new(name: StringHandle, kind: FunctionKind, slot_zero_name: StringHandle) -> Self {
        // Slot 0 belongs to the runtime: the called closure, or the
        // receiver for methods and initializers.
        let mut slot_zero = Local::new(slot_zero_name);
        slot_zero.depth = Some(0);

        Self {
            kind,
            function: FunctionObject::new(name, 0),
            locals: vec![slot_zero],
            local_count: 1,
            scope_depth: 0,
            upvalues: Vec::new(),
            enclosing: None,
        }
    }

    fn push(&mut self, name: StringHandle, kind: FunctionKind, slot_zero_name: StringHandle) {
        let fresh = Self::new(name, kind, slot_zero_name);
        let previous = std::mem::replace(self, fresh);
        self.enclosing = Some(Box::new(previous));
    }

    fn pop(&mut self) -> Option<Self> {
        if let Some(mut previous) = self.enclosing.take() {
            std::mem::swap(&mut *previous, self);
            Some(*previous)
        } else {
            None
        }
    }

    fn resolve_local(
        &self,
        name: StringHandle,
        span: SourceSpan,
    ) -> Result<Option<usize>, VesperCompilerError> {
        for i in (0..self.local_count).rev() {
            let local = &self.locals[i];
            if local.name == name {
                if local.depth.is_none() {
                    return Err(VesperCompilerError::new_syntax_error(
                        "Can't read local variable in its own initializer.".to_string(),
                        span,
                    ));
                }
                return Ok(Some(i));
            }
        }

        Ok(None)
    }

    fn resolve_upvalue(
        &mut self,
        name: StringHandle,
        span: SourceSpan,
    ) -> Result<Option<usize>, VesperCompilerError> {
        if let Some(enclosing) = self.enclosing.as_mut() {
            if let Some(local_index) = enclosing.resolve_local(name, span)? {
                enclosing.locals[local_index].is_captured = true;
                return self.add_upvalue(local_index, true, span).map(Some);
            }

            if let Some(upvalue_index) = enclosing.resolve_upvalue(name, span)? {
                return self.add_upvalue(upvalue_index, false, span).map(Some);
            }
        }

        Ok(None)
    }

    fn add_upvalue(
        &mut self,
        index: usize,
        is_local: bool,
        span: SourceSpan,
    ) -> Result<usize, VesperCompilerError> {
        let upvalue_count = self.function.upvalue_count;

        for i in 0..upvalue_count {
            let upvalue = self.upvalues[i];
            if upvalue.index == index as u8 && upvalue.is_local == is_local {
                return Ok(i);
            }
        }

        if upvalue_count == MAX_UPVALUES {
            return Err(VesperCompilerError::new_syntax_error(
                "Too many closure variables in function.".to_string(),
                span,
            ));
        }

        self.upvalues.push(UpvalueDesc {
            index: index as u8,
            is_local,
        });
        self.function.upvalue_count += 1;

        Ok(upvalue_count)
    }
}

/// Tracks whether a class body is being compiled, gating `this` and
/// `super`.
#[derive(Debug, Default)]
struct ClassCompiler {
    has_superclass: bool,
    enclosing: Option<Box<ClassCompiler>>,
}

#[derive(Debug, Clone, Default)]
struct ParserState {
    current: Token,
    previous: Token,
    panic_mode: bool,
}

/// Precedence levels, lowest to highest. The discriminant order drives
/// the Pratt loop.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Handler selectors for the parse table. Dispatched by a match in
/// `Compiler::apply`, which keeps the table itself declarative data.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    String,
    Literal,
    Variable,
    And,
    Or,
    Call,
    Dot,
    This,
    Super,
}

#[derive(Debug, Clone, Copy)]
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

impl ParseRule {
    const fn new(
        prefix: Option<ParseFn>,
        infix: Option<ParseFn>,
        precedence: Precedence,
    ) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

fn get_rule(token_type: TokenType) -> ParseRule {
    use ParseFn::*;
    use Precedence as P;

    match token_type {
        TokenType::LeftParen => ParseRule::new(Some(Grouping), Some(Call), P::Call),
        TokenType::Dot => ParseRule::new(None, Some(Dot), P::Call),
        TokenType::Minus => ParseRule::new(Some(Unary), Some(Binary), P::Term),
        TokenType::Plus => ParseRule::new(None, Some(Binary), P::Term),
        TokenType::Slash => ParseRule::new(None, Some(Binary), P::Factor),
        TokenType::Star => ParseRule::new(None, Some(Binary), P::Factor),
        TokenType::Bang => ParseRule::new(Some(Unary), None, P::None),
        TokenType::BangEquals => ParseRule::new(None, Some(Binary), P::Equality),
        TokenType::EqualsEquals => ParseRule::new(None, Some(Binary), P::Equality),
        TokenType::Greater => ParseRule::new(None, Some(Binary), P::Comparison),
        TokenType::GreaterEquals => ParseRule::new(None, Some(Binary), P::Comparison),
        TokenType::Less => ParseRule::new(None, Some(Binary), P::Comparison),
        TokenType::LessEquals => ParseRule::new(None, Some(Binary), P::Comparison),
        TokenType::Identifier => ParseRule::new(Some(Variable), None, P::None),
        TokenType::String => ParseRule::new(Some(String), None, P::None),
        TokenType::Number => ParseRule::new(Some(Number), None, P::None),
        TokenType::And => ParseRule::new(None, Some(And), P::And),
        TokenType::Or => ParseRule::new(None, Some(Or), P::Or),
        TokenType::False => ParseRule::new(Some(Literal), None, P::None),
        TokenType::True => ParseRule::new(Some(Literal), None, P::None),
        TokenType::Nil => ParseRule::new(Some(Literal), None, P::None),
        TokenType::This => ParseRule::new(Some(This), None, P::None),
        TokenType::Super => ParseRule::new(Some(Super), None, P::None),
        _ => ParseRule::new(None, None, P::None),
    }
}

/// Single-pass compiler: pulls tokens, resolves scopes and upvalues, and
/// emits bytecode as it parses. On any error it reports, enters panic
/// mode, and synchronizes at the next statement boundary; the produced
/// function is discarded when any error was reported.
pub struct Compiler<'a> {
    source_map: Arc<SourceMap>,
    allocator: &'a mut HeapAllocator,
    tokenizer: Tokenizer,
    parser: ParserState,
    state: CompilerState,
    class_compiler: Option<Box<ClassCompiler>>,
    errors: ErrorReporter,
    blank_handle: StringHandle,
    this_handle: StringHandle,
    super_handle: StringHandle,
    init_handle: StringHandle,
}

impl<'a> Compiler<'a> {
    pub fn new(source_map: Arc<SourceMap>, allocator: &'a mut HeapAllocator) -> Self {
        let script_handle = allocator.strings.intern(&source_map.name);
        let blank_handle = allocator.strings.intern("");
        let this_handle = allocator.strings.intern("this");
        let super_handle = allocator.strings.intern("super");
        let init_handle = allocator.strings.intern("init");

        let tokenizer = Tokenizer::new(source_map.clone());

        Self {
            source_map,
            allocator,
            tokenizer,
            parser: ParserState::default(),
            state: CompilerState::new(script_handle, FunctionKind::Script, blank_handle),
            class_compiler: None,
            errors: ErrorReporter::new(),
            blank_handle,
            this_handle,
            super_handle,
            init_handle,
        }
    }

    pub fn compile(mut self) -> Result<FunctionObject, VesperPipelineError> {
        self.advance();

        while !self.match_token(TokenType::Eof) {
            self.declaration();
        }

        self.emit_return(self.previous_span());

        if self.errors.has_errors() {
            Err(VesperPipelineError::new(self.errors.take_errors()))
        } else {
            Ok(self.state.function)
        }
    }

    // ---- token plumbing ----

    fn advance(&mut self) {
        self.parser.previous = std::mem::take(&mut self.parser.current);

        loop {
            self.parser.current = self.tokenizer.next_token();
            if self.parser.current.token_type != TokenType::Error {
                break;
            }

            let message = self
                .parser
                .current
                .error_message
                .clone()
                .unwrap_or_else(|| "Unexpected token.".to_string());
            self.error_at_current(&message);
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) {
        if self.parser.current.token_type == token_type {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.parser.current.token_type == token_type
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> SourceSpan {
        SourceSpan::new(self.parser.current.start, self.parser.current.end)
    }

    fn previous_span(&self) -> SourceSpan {
        SourceSpan::new(self.parser.previous.start, self.parser.previous.end)
    }

    fn previous_lexeme(&self) -> String {
        self.parser.previous.lexeme(&self.source_map).iter().collect()
    }

    fn previous_identifier(&mut self) -> StringHandle {
        let name = self.previous_lexeme();
        self.allocator.strings.intern(&name)
    }

    // ---- error reporting ----

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current_span(), message);
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous_span(), message);
    }

    fn error_at(&mut self, span: SourceSpan, message: &str) {
        if self.parser.panic_mode {
            return;
        }
        self.parser.panic_mode = true;
        self.errors
            .report_error(VesperCompilerError::new_syntax_error(
                message.to_string(),
                span,
            ));
    }

    fn report(&mut self, error: VesperCompilerError) {
        if self.parser.panic_mode {
            return;
        }
        self.parser.panic_mode = true;
        self.errors.report_error(error);
    }

    fn synchronize(&mut self) {
        self.parser.panic_mode = false;

        while self.parser.current.token_type != TokenType::Eof {
            if self.parser.previous.token_type == TokenType::Semicolon {
                return;
            }

            match self.parser.current.token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ---- emission ----

    fn current_chunk_mut(&mut self) -> &mut Chunk {
        &mut self.state.function.chunk
    }

    fn loc_for(&self, span: SourceSpan) -> SourceLocation {
        SourceLocation::new(
            self.source_map.get_line_number(span.start),
            self.source_map.get_column_number(span.start),
        )
    }

    fn emit_opcode(&mut self, opcode: OpCode, span: SourceSpan) {
        let loc = self.loc_for(span);
        self.current_chunk_mut().write_opcode(opcode, loc);
    }

    fn emit_byte(&mut self, byte: u8, span: SourceSpan) {
        let loc = self.loc_for(span);
        self.current_chunk_mut().write(byte, loc);
    }

    fn emit_opcode_and_byte(&mut self, opcode: OpCode, byte: u8, span: SourceSpan) {
        self.emit_opcode(opcode, span);
        self.emit_byte(byte, span);
    }

    fn emit_jump(&mut self, opcode: OpCode, span: SourceSpan) -> usize {
        self.emit_opcode(opcode, span);
        self.emit_byte(0xff, span);
        self.emit_byte(0xff, span);
        self.current_chunk_mut().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize, span: SourceSpan) {
        let jump = self.current_chunk_mut().code.len() - offset - 2;

        if jump > u16::MAX as usize {
            self.error_at(span, "Too much code to jump over.");
            return;
        }

        self.current_chunk_mut().code[offset] = ((jump >> 8) & 0xff) as u8;
        self.current_chunk_mut().code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_loop(&mut self, loop_start: usize, span: SourceSpan) {
        self.emit_opcode(OpCode::Loop, span);
        let offset = self.current_chunk_mut().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error_at(span, "Loop body too large.");
            return;
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8, span);
        self.emit_byte((offset & 0xff) as u8, span);
    }

    fn make_constant(&mut self, value: Value, span: SourceSpan) -> u8 {
        let index = self.current_chunk_mut().add_constant(value);

        if index > u8::MAX as usize {
            self.error_at(span, "Too many constants in one chunk.");
            return 0;
        }

        index as u8
    }

    fn emit_constant(&mut self, value: Value, span: SourceSpan) {
        let byte = self.make_constant(value, span);
        self.emit_opcode_and_byte(OpCode::Constant, byte, span);
    }

    fn emit_return(&mut self, span: SourceSpan) {
        if matches!(self.state.kind, FunctionKind::Initializer) {
            self.emit_opcode_and_byte(OpCode::GetLocal, 0, span);
        } else {
            self.emit_opcode(OpCode::Nil, span);
        }
        self.emit_opcode(OpCode::Return, span);
    }

    // ---- scopes and variables ----

    fn begin_scope(&mut self) {
        self.state.scope_depth += 1;
    }

    fn end_scope(&mut self, span: SourceSpan) {
        self.state.scope_depth -= 1;

        while self.state.local_count > 0 {
            let local = &self.state.locals[self.state.local_count - 1];
            match local.depth {
                Some(depth) if depth > self.state.scope_depth => {
                    let opcode = if local.is_captured {
                        OpCode::CloseUpvalue
                    } else {
                        OpCode::Pop
                    };
                    self.state.local_count -= 1;
                    self.state.locals.pop();
                    self.emit_opcode(opcode, span);
                }
                _ => break,
            }
        }
    }

    fn add_local(&mut self, name: StringHandle, span: SourceSpan) {
        if self.state.local_count == MAX_LOCALS {
            self.error_at(span, "Too many local variables in function.");
            return;
        }

        self.state.locals.push(Local::new(name));
        self.state.local_count += 1;
    }

    fn declare_variable(&mut self, name: StringHandle, span: SourceSpan) {
        if self.state.scope_depth == 0 {
            return;
        }

        for i in (0..self.state.local_count).rev() {
            let local = &self.state.locals[i];
            if local
                .depth
                .map(|depth| depth < self.state.scope_depth)
                .unwrap_or(false)
            {
                break;
            }

            if local.name == name {
                self.error_at(span, "Already a variable with this name in this scope.");
                break;
            }
        }

        self.add_local(name, span);
    }

    /// Consumes an identifier and declares it. Returns the name handle
    /// for globals; locals are defined by slot, not by name.
    fn parse_variable(&mut self, message: &str) -> Option<StringHandle> {
        self.consume(TokenType::Identifier, message);
        let name = self.previous_identifier();
        let span = self.previous_span();
        self.declare_variable(name, span);

        if self.state.scope_depth > 0 {
            None
        } else {
            Some(name)
        }
    }

    fn mark_initialized(&mut self) {
        if self.state.scope_depth == 0 {
            return;
        }
        if self.state.local_count > 0 {
            let depth = self.state.scope_depth;
            if let Some(local) = self.state.locals.get_mut(self.state.local_count - 1) {
                local.depth = Some(depth);
            }
        }
    }

    fn define_variable(&mut self, name: Option<StringHandle>, span: SourceSpan) {
        match name {
            None => self.mark_initialized(),
            Some(handle) => {
                let byte = self.make_constant(Value::String(handle), span);
                self.emit_opcode_and_byte(OpCode::DefineGlobal, byte, span);
            }
        }
    }

    fn named_variable(&mut self, name: StringHandle, span: SourceSpan, can_assign: bool) {
        let local = match self.state.resolve_local(name, span) {
            Ok(local) => local,
            Err(error) => {
                self.report(error);
                return;
            }
        };

        let (arg, get_op, set_op) = if let Some(index) = local {
            (index as u8, OpCode::GetLocal, OpCode::SetLocal)
        } else {
            match self.state.resolve_upvalue(name, span) {
                Ok(Some(index)) => (index as u8, OpCode::GetUpvalue, OpCode::SetUpvalue),
                Ok(None) => {
                    let byte = self.make_constant(Value::String(name), span);
                    (byte, OpCode::GetGlobal, OpCode::SetGlobal)
                }
                Err(error) => {
                    self.report(error);
                    return;
                }
            }
        };

        if can_assign && self.match_token(TokenType::Equals) {
            self.expression();
            self.emit_opcode_and_byte(set_op, arg, span);
        } else {
            self.emit_opcode_and_byte(get_op, arg, span);
        }
    }

    // ---- Pratt machinery ----

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let prefix = match get_rule(self.parser.previous.token_type).prefix {
            Some(prefix) => prefix,
            None => {
                self.error("Expect expression.");
                return;
            }
        };

        let can_assign = precedence <= Precedence::Assignment;
        self.apply(prefix, can_assign);

        while precedence <= get_rule(self.parser.current.token_type).precedence {
            self.advance();
            if let Some(infix) = get_rule(self.parser.previous.token_type).infix {
                self.apply(infix, can_assign);
            }
        }

        if can_assign && self.match_token(TokenType::Equals) {
            self.error("Invalid assignment target.");
        }
    }

    fn apply(&mut self, parse_fn: ParseFn, can_assign: bool) {
        match parse_fn {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
            ParseFn::Variable => self.variable(can_assign),
            ParseFn::And => self.and_(),
            ParseFn::Or => self.or_(),
            ParseFn::Call => self.call(),
            ParseFn::Dot => self.dot(can_assign),
            ParseFn::This => self.this_(),
            ParseFn::Super => self.super_(),
        }
    }

    // ---- expression handlers ----

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.parser.previous.token_type;
        let span = self.previous_span();

        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenType::Minus => self.emit_opcode(OpCode::Negate, span),
            TokenType::Bang => self.emit_opcode(OpCode::Not, span),
            _ => unreachable!("invalid unary operator"),
        }
    }

    fn binary(&mut self) {
        let operator = self.parser.previous.token_type;
        let span = self.previous_span();
        let rule = get_rule(operator);

        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenType::Plus => self.emit_opcode(OpCode::Add, span),
            TokenType::Minus => self.emit_opcode(OpCode::Subtract, span),
            TokenType::Star => self.emit_opcode(OpCode::Multiply, span),
            TokenType::Slash => self.emit_opcode(OpCode::Divide, span),
            TokenType::EqualsEquals => self.emit_opcode(OpCode::Equal, span),
            TokenType::BangEquals => {
                self.emit_opcode(OpCode::Equal, span);
                self.emit_opcode(OpCode::Not, span);
            }
            TokenType::Greater => self.emit_opcode(OpCode::Greater, span),
            TokenType::GreaterEquals => {
                self.emit_opcode(OpCode::Less, span);
                self.emit_opcode(OpCode::Not, span);
            }
            TokenType::Less => self.emit_opcode(OpCode::Less, span),
            TokenType::LessEquals => {
                self.emit_opcode(OpCode::Greater, span);
                self.emit_opcode(OpCode::Not, span);
            }
            _ => unreachable!("invalid binary operator"),
        }
    }

    fn number(&mut self) {
        let span = self.previous_span();
        let value: f64 = self.previous_lexeme().parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value), span);
    }

    fn string(&mut self) {
        let span = self.previous_span();
        let lexeme = self.previous_lexeme();
        let contents = translate_escapes(&lexeme[1..lexeme.len() - 1]);
        let handle = self.allocator.strings.intern(&contents);
        self.emit_constant(Value::String(handle), span);
    }

    fn literal(&mut self) {
        let span = self.previous_span();
        match self.parser.previous.token_type {
            TokenType::False => self.emit_opcode(OpCode::False, span),
            TokenType::True => self.emit_opcode(OpCode::True, span),
            TokenType::Nil => self.emit_opcode(OpCode::Nil, span),
            _ => unreachable!("invalid literal"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous_identifier();
        let span = self.previous_span();
        self.named_variable(name, span, can_assign);
    }

    fn and_(&mut self) {
        let span = self.previous_span();
        let end_jump = self.emit_jump(OpCode::JumpIfFalse, span);

        self.emit_opcode(OpCode::Pop, span);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump, span);
    }

    fn or_(&mut self) {
        let span = self.previous_span();
        let else_jump = self.emit_jump(OpCode::JumpIfFalse, span);
        let end_jump = self.emit_jump(OpCode::Jump, span);

        self.patch_jump(else_jump, span);
        self.emit_opcode(OpCode::Pop, span);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump, span);
    }

    fn call(&mut self) {
        let span = self.previous_span();
        let arg_count = self.argument_list();
        self.emit_opcode_and_byte(OpCode::Call, arg_count, span);
    }

    fn argument_list(&mut self) -> u8 {
        let mut arg_count: usize = 0;

        if !self.check(TokenType::RightParen) {
            loop {
                self.expression();
                if arg_count == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                arg_count += 1;

                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after arguments.");
        arg_count.min(255) as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenType::Identifier, "Expect property name after '.'.");
        let name = self.previous_identifier();
        let span = self.previous_span();
        let byte = self.make_constant(Value::String(name), span);

        if can_assign && self.match_token(TokenType::Equals) {
            self.expression();
            self.emit_opcode_and_byte(OpCode::SetProperty, byte, span);
        } else if self.match_token(TokenType::LeftParen) {
            let arg_count = self.argument_list();
            self.emit_opcode_and_byte(OpCode::Invoke, byte, span);
            self.emit_byte(arg_count, span);
        } else {
            self.emit_opcode_and_byte(OpCode::GetProperty, byte, span);
        }
    }

    fn this_(&mut self) {
        if self.class_compiler.is_none() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }

        let span = self.previous_span();
        self.named_variable(self.this_handle, span, false);
    }

    fn super_(&mut self) {
        let span = self.previous_span();

        match self.class_compiler.as_ref() {
            None => {
                self.error("Can't use 'super' outside of a class.");
            }
            Some(class) if !class.has_superclass => {
                self.error("Can't use 'super' in a class with no superclass.");
            }
            _ => {}
        }

        self.consume(TokenType::Dot, "Expect '.' after 'super'.");
        self.consume(TokenType::Identifier, "Expect superclass method name.");
        let name = self.previous_identifier();
        let name_span = self.previous_span();
        let byte = self.make_constant(Value::String(name), name_span);

        self.named_variable(self.this_handle, span, false);

        if self.match_token(TokenType::LeftParen) {
            let arg_count = self.argument_list();
            self.named_variable(self.super_handle, span, false);
            self.emit_opcode_and_byte(OpCode::SuperInvoke, byte, name_span);
            self.emit_byte(arg_count, name_span);
        } else {
            self.named_variable(self.super_handle, span, false);
            self.emit_opcode_and_byte(OpCode::GetSuper, byte, name_span);
        }
    }

    // ---- declarations and statements ----

    fn declaration(&mut self) {
        if self.match_token(TokenType::Class) {
            self.class_declaration();
        } else if self.match_token(TokenType::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.parser.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::For) {
            self.for_statement();
        } else if self.match_token(TokenType::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope(self.previous_span());
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.");
    }

    fn var_declaration(&mut self) {
        let name = self.parse_variable("Expect variable name.");
        let span = self.previous_span();

        if self.match_token(TokenType::Equals) {
            self.expression();
        } else {
            self.emit_opcode(OpCode::Nil, span);
        }

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        );
        self.define_variable(name, span);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_opcode(OpCode::Pop, self.previous_span());
    }

    fn print_statement(&mut self) {
        let span = self.previous_span();
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_opcode(OpCode::Print, span);
    }

    fn if_statement(&mut self) {
        let span = self.previous_span();
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse, span);
        self.emit_opcode(OpCode::Pop, span);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump, span);
        self.patch_jump(then_jump, span);
        self.emit_opcode(OpCode::Pop, span);

        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump, span);
    }

    fn while_statement(&mut self) {
        let span = self.previous_span();
        let loop_start = self.current_chunk_mut().code.len();

        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, span);
        self.emit_opcode(OpCode::Pop, span);
        self.statement();
        self.emit_loop(loop_start, span);

        self.patch_jump(exit_jump, span);
        self.emit_opcode(OpCode::Pop, span);
    }

    fn for_statement(&mut self) {
        let span = self.previous_span();
        self.begin_scope();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.");

        if self.match_token(TokenType::Semicolon) {
            // No initializer.
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk_mut().code.len();

        let exit_jump = if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");

            let exit_jump = self.emit_jump(OpCode::JumpIfFalse, span);
            self.emit_opcode(OpCode::Pop, span);
            Some(exit_jump)
        } else {
            None
        };

        if !self.match_token(TokenType::RightParen) {
            // The increment runs after the body: jump over it now, run
            // the body, then loop back to it.
            let body_jump = self.emit_jump(OpCode::Jump, span);
            let increment_start = self.current_chunk_mut().code.len();

            self.expression();
            self.emit_opcode(OpCode::Pop, span);
            self.consume(TokenType::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start, span);
            loop_start = increment_start;
            self.patch_jump(body_jump, span);
        }

        self.statement();
        self.emit_loop(loop_start, span);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump, span);
            self.emit_opcode(OpCode::Pop, span);
        }

        self.end_scope(self.previous_span());
    }

    fn return_statement(&mut self) {
        let span = self.previous_span();

        if matches!(self.state.kind, FunctionKind::Script) {
            self.error("Can't return from top-level code.");
        }

        if self.match_token(TokenType::Semicolon) {
            self.emit_return(span);
        } else {
            if matches!(self.state.kind, FunctionKind::Initializer) {
                self.error("Can't return a value from an initializer.");
            }

            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after return value.");
            self.emit_opcode(OpCode::Return, span);
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        let name_handle = self.previous_identifier();
        // Functions may refer to themselves; initialize eagerly.
        self.mark_initialized();
        self.function(FunctionKind::Function, name_handle);
        self.define_variable(global, self.previous_span());
    }

    fn function(&mut self, kind: FunctionKind, name: StringHandle) {
        let slot_zero = if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
            self.this_handle
        } else {
            self.blank_handle
        };
        self.state.push(name, kind, slot_zero);
        self.begin_scope();

        self.consume(TokenType::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenType::RightParen) {
            loop {
                if self.state.function.arity == 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                self.state.function.arity += 1;

                let parameter = self.parse_variable("Expect parameter name.");
                self.define_variable(parameter, self.previous_span());

                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.");
        self.consume(TokenType::LeftBrace, "Expect '{' before function body.");
        self.block();

        let span = self.previous_span();
        self.emit_return(span);

        let finished = self
            .state
            .pop()
            .expect("function compiler should have an enclosing state");
        let upvalues = finished.upvalues;
        let upvalue_count = finished.function.upvalue_count;

        let handle = self.allocator.allocate_function(finished.function);
        let byte = self.make_constant(Value::Function(handle), span);
        self.emit_opcode_and_byte(OpCode::Closure, byte, span);

        for i in 0..upvalue_count {
            let upvalue = upvalues[i];
            self.emit_byte(if upvalue.is_local { 1 } else { 0 }, span);
            self.emit_byte(upvalue.index, span);
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenType::Identifier, "Expect class name.");
        let name = self.previous_identifier();
        let span = self.previous_span();

        self.declare_variable(name, span);
        let byte = self.make_constant(Value::String(name), span);
        self.emit_opcode_and_byte(OpCode::Class, byte, span);
        self.define_variable(
            if self.state.scope_depth > 0 {
                None
            } else {
                Some(name)
            },
            span,
        );

        let enclosing_class = self.class_compiler.take();
        self.class_compiler = Some(Box::new(ClassCompiler {
            has_superclass: false,
            enclosing: enclosing_class,
        }));

        if self.match_token(TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.");
            let superclass = self.previous_identifier();
            let superclass_span = self.previous_span();
            self.variable(false);

            if superclass == name {
                self.error_at(superclass_span, "A class can't inherit from itself.");
            }

            self.begin_scope();
            self.add_local(self.super_handle, span);
            self.define_variable(None, span);

            self.named_variable(name, span, false);
            self.emit_opcode(OpCode::Inherit, superclass_span);

            if let Some(class) = self.class_compiler.as_mut() {
                class.has_superclass = true;
            }
        }

        self.named_variable(name, span, false);
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.method();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.");
        self.emit_opcode(OpCode::Pop, span);

        let has_superclass = self
            .class_compiler
            .as_ref()
            .map(|class| class.has_superclass)
            .unwrap_or(false);
        if has_superclass {
            self.end_scope(span);
        }

        self.class_compiler = self
            .class_compiler
            .take()
            .and_then(|class| class.enclosing);
    }

    fn method(&mut self) {
        self.consume(TokenType::Identifier, "Expect method name.");
        let name = self.previous_identifier();
        let span = self.previous_span();
        let byte = self.make_constant(Value::String(name), span);

        let kind = if name == self.init_handle {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };

        self.function(kind, name);
        self.emit_opcode_and_byte(OpCode::Method, byte, span);
    }
}

fn translate_escapes(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('0') => result.push('\0'),
                Some(other) => result.push(other),
                None => break,
            }
        } else {
            result.push(c);
        }
    }

    result
}
