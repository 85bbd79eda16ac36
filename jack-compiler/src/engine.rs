//! Recursive-descent compilation engine
//!
//! Each grammar nonterminal is one method that consumes tokens and emits
//! VM commands directly; there is no intermediate tree. Identifier terms
//! are disambiguated with a single token of lookahead (`[`, `(` or `.`),
//! which is all the Jack grammar requires.

use crate::symbol_table::{Kind, Symbol, SymbolTable};
use crate::tokenizer::{Keyword, LexError, Token, TokenStream};
use crate::vm_writer::{EmitError, Segment, VmOp, VmWriter};
use std::fmt;
use std::io::Write;

/// Binary operators, compiled strictly left to right at one precedence.
const BINARY_OPS: [char; 9] = ['+', '-', '*', '/', '&', '|', '<', '>', '='];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Emit(EmitError),
    /// Input ended while the grammar still required tokens
    UnexpectedEnd,
    Expected { expected: String, found: String },
    UndefinedIdentifier(String),
    ArrayAccessOnNonArray { name: String, ty: String },
    /// A bare (implicit-this) call inside a `function`
    MethodCallInFunction(String),
    ConstructorMustReturnThis,
}

impl std::error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Emit(e) => write!(f, "{e}"),
            Self::UnexpectedEnd => f.write_str("unexpected end of input"),
            Self::Expected { expected, found } => {
                write!(f, "expected {expected}, got {found}")
            }
            Self::UndefinedIdentifier(name) => {
                write!(f, "undefined identifier: {name}")
            }
            Self::ArrayAccessOnNonArray { name, ty } => {
                write!(f, "array access on non-Array variable {name} of type {ty}")
            }
            Self::MethodCallInFunction(name) => {
                write!(f, "method call {name} has no receiver inside a function")
            }
            Self::ConstructorMustReturnThis => {
                f.write_str("a constructor must return this")
            }
        }
    }
}

impl From<EmitError> for CompileError {
    fn from(e: EmitError) -> Self {
        Self::Emit(e)
    }
}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

pub struct CompilationEngine<W: Write> {
    tokens: TokenStream,
    table: SymbolTable,
    writer: VmWriter<W>,
    class_name: String,
    subroutine_kind: SubroutineKind,
    if_index: u16,
    while_index: u16,
}

impl<W: Write> CompilationEngine<W> {
    pub fn new(tokens: TokenStream, out: W) -> Self {
        Self {
            tokens,
            table: SymbolTable::new(),
            writer: VmWriter::new(out),
            class_name: String::new(),
            subroutine_kind: SubroutineKind::Function,
            if_index: 0,
            while_index: 0,
        }
    }

    /// Compiles a complete class, the unit of Jack compilation.
    pub fn compile_class(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Class)?;
        self.class_name = self.expect_identifier()?;
        self.expect_symbol('{')?;

        while self.current_is_any_keyword(&[Keyword::Static, Keyword::Field]) {
            self.compile_class_var_dec()?;
        }

        while self.current_is_any_keyword(&[
            Keyword::Constructor,
            Keyword::Function,
            Keyword::Method,
        ]) {
            self.compile_subroutine()?;
        }

        self.expect_symbol('}')?;

        if let Some(extra) = self.tokens.current() {
            return Err(CompileError::Expected {
                expected: "end of class".to_string(),
                found: extra.to_string(),
            });
        }
        Ok(())
    }

    /// `('static' | 'field') type varName (',' varName)* ';'`
    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        let kind = match self.advance()? {
            Token::Keyword(Keyword::Static) => Kind::Static,
            Token::Keyword(Keyword::Field) => Kind::Field,
            other => {
                return Err(Self::expected("'static' or 'field'", &other));
            }
        };
        let ty = self.parse_type(false)?;
        self.define_variable_list(&ty, kind)
    }

    /// `('constructor' | 'function' | 'method') ('void' | type)
    /// subroutineName '(' parameterList ')' subroutineBody`
    fn compile_subroutine(&mut self) -> Result<(), CompileError> {
        self.subroutine_kind = match self.advance()? {
            Token::Keyword(Keyword::Constructor) => SubroutineKind::Constructor,
            Token::Keyword(Keyword::Function) => SubroutineKind::Function,
            Token::Keyword(Keyword::Method) => SubroutineKind::Method,
            other => {
                return Err(Self::expected("'constructor', 'function' or 'method'", &other));
            }
        };
        self.parse_type(true)?;
        let name = self.expect_identifier()?;

        self.table.begin_subroutine();
        self.if_index = 0;
        self.while_index = 0;

        // A method's first argument is the receiver.
        if self.subroutine_kind == SubroutineKind::Method {
            let class_name = self.class_name.clone();
            self.table.define("this", &class_name, Kind::Arg);
        }

        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;

        self.compile_subroutine_body(&name)?;

        self.table.end_subroutine();
        Ok(())
    }

    /// `((type varName) (',' type varName)*)?` without the parentheses.
    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        while !self.current_is_symbol(')') {
            let ty = self.parse_type(false)?;
            let name = self.expect_identifier()?;
            self.table.define(&name, &ty, Kind::Arg);

            if self.current_is_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `'{' varDec* statements '}'`; locals are counted before the
    /// function header goes out, then the prologue binds `this`.
    fn compile_subroutine_body(&mut self, name: &str) -> Result<(), CompileError> {
        self.expect_symbol('{')?;

        while self.current_is_any_keyword(&[Keyword::Var]) {
            self.compile_var_dec()?;
        }

        let n_locals = self.table.var_count(Kind::Var);
        let qualified = format!("{}.{}", self.class_name, name);
        self.writer.write_function(&qualified, n_locals)?;

        match self.subroutine_kind {
            SubroutineKind::Constructor => {
                // this = Memory.alloc(field count)
                let n_fields = self.table.var_count(Kind::Field);
                self.writer.write_push(Segment::Constant, n_fields)?;
                self.writer.write_call("Memory.alloc", 1)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Method => {
                // this = argument 0
                self.writer.write_push(Segment::Argument, 0)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')?;
        Ok(())
    }

    /// `'var' type varName (',' varName)* ';'`
    fn compile_var_dec(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Var)?;
        let ty = self.parse_type(false)?;
        self.define_variable_list(&ty, Kind::Var)
    }

    fn compile_statements(&mut self) -> Result<(), CompileError> {
        loop {
            match self.tokens.current() {
                Some(Token::Keyword(Keyword::Let)) => self.compile_let()?,
                Some(Token::Keyword(Keyword::If)) => self.compile_if()?,
                Some(Token::Keyword(Keyword::While)) => self.compile_while()?,
                Some(Token::Keyword(Keyword::Do)) => self.compile_do()?,
                Some(Token::Keyword(Keyword::Return)) => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    /// `'let' varName ('[' expression ']')? '=' expression ';'`
    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Let)?;
        let name = self.expect_identifier()?;
        let symbol = self.lookup(&name)?;

        if self.current_is_symbol('[') {
            self.require_array(&name, &symbol)?;

            // Target address first: base + index stays on the stack while
            // the right-hand side is evaluated (which may itself rebind
            // pointer 1).
            self.push_symbol(&symbol)?;
            self.expect_symbol('[')?;
            self.compile_expression()?;
            self.expect_symbol(']')?;
            self.writer.write_arithmetic(VmOp::Add)?;

            self.expect_symbol('=')?;
            self.compile_expression()?;

            self.writer.write_pop(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::Pointer, 1)?;
            self.writer.write_push(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::That, 0)?;
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.writer.write_pop(symbol.kind.segment(), symbol.index)?;
        }

        self.expect_symbol(';')?;
        Ok(())
    }

    /// `'if' '(' expression ')' '{' statements '}'
    ///  ('else' '{' statements '}')?`
    fn compile_if(&mut self) -> Result<(), CompileError> {
        let n = self.if_index;
        self.if_index += 1;
        let false_label = format!("IF_FALSE{n}");
        let end_label = format!("IF_END{n}");

        self.expect_keyword(Keyword::If)?;
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.writer.write_arithmetic(VmOp::Not)?;
        self.writer.write_if_goto(&false_label)?;

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        if self.current_is_any_keyword(&[Keyword::Else]) {
            self.advance()?;
            self.writer.write_goto(&end_label)?;
            self.writer.write_label(&false_label)?;

            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;

            self.writer.write_label(&end_label)?;
        } else {
            self.writer.write_label(&false_label)?;
        }
        Ok(())
    }

    /// `'while' '(' expression ')' '{' statements '}'`
    fn compile_while(&mut self) -> Result<(), CompileError> {
        let n = self.while_index;
        self.while_index += 1;
        let exp_label = format!("WHILE_EXP{n}");
        let end_label = format!("WHILE_END{n}");

        self.writer.write_label(&exp_label)?;

        self.expect_keyword(Keyword::While)?;
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;

        self.writer.write_arithmetic(VmOp::Not)?;
        self.writer.write_if_goto(&end_label)?;

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        self.writer.write_goto(&exp_label)?;
        self.writer.write_label(&end_label)?;
        Ok(())
    }

    /// `'do' subroutineCall ';'` — the call's value is discarded.
    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Do)?;
        let first = self.expect_identifier()?;
        self.compile_subroutine_call(&first)?;
        self.writer.write_pop(Segment::Temp, 0)?;
        self.expect_symbol(';')?;
        Ok(())
    }

    /// `'return' expression? ';'` — void subroutines return 0, and a
    /// constructor must return `this`.
    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Return)?;

        if self.subroutine_kind == SubroutineKind::Constructor {
            match self.tokens.current() {
                Some(Token::Keyword(Keyword::This)) => {
                    self.advance()?;
                    self.writer.write_push(Segment::Pointer, 0)?;
                }
                _ => return Err(CompileError::ConstructorMustReturnThis),
            }
        } else if self.current_is_symbol(';') {
            self.writer.write_push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
        }

        self.expect_symbol(';')?;
        self.writer.write_return()?;
        Ok(())
    }

    /// `term (op term)*`, left to right, no precedence.
    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.compile_term()?;

        while let Some(Token::Symbol(op)) = self.tokens.current() {
            let op = *op;
            if !BINARY_OPS.contains(&op) {
                break;
            }
            self.advance()?;
            self.compile_term()?;
            self.emit_binary_op(op)?;
        }
        Ok(())
    }

    fn compile_term(&mut self) -> Result<(), CompileError> {
        match self.advance()? {
            Token::IntConst(value) => {
                self.writer.write_push(Segment::Constant, value)?;
            }
            Token::StringConst(contents) => self.compile_string_constant(&contents)?,
            Token::Keyword(Keyword::True) => {
                // all-ones
                self.writer.write_push(Segment::Constant, 0)?;
                self.writer.write_arithmetic(VmOp::Not)?;
            }
            Token::Keyword(Keyword::False | Keyword::Null) => {
                self.writer.write_push(Segment::Constant, 0)?;
            }
            Token::Keyword(Keyword::This) => {
                self.writer.write_push(Segment::Pointer, 0)?;
            }
            Token::Symbol('(') => {
                self.compile_expression()?;
                self.expect_symbol(')')?;
            }
            Token::Symbol('-') => {
                self.compile_term()?;
                self.writer.write_arithmetic(VmOp::Neg)?;
            }
            Token::Symbol('~') => {
                self.compile_term()?;
                self.writer.write_arithmetic(VmOp::Not)?;
            }
            Token::Symbol('^') => {
                self.compile_term()?;
                self.writer.write_arithmetic(VmOp::ShiftLeft)?;
            }
            Token::Symbol('#') => {
                self.compile_term()?;
                self.writer.write_arithmetic(VmOp::ShiftRight)?;
            }
            Token::Identifier(name) => self.compile_identifier_term(&name)?,
            other => return Err(Self::expected("a term", &other)),
        }
        Ok(())
    }

    /// A variable, an array entry, or a subroutine call: the next token
    /// decides.
    fn compile_identifier_term(&mut self, name: &str) -> Result<(), CompileError> {
        match self.tokens.current() {
            Some(Token::Symbol('[')) => {
                let symbol = self.lookup(name)?;
                self.require_array(name, &symbol)?;

                self.push_symbol(&symbol)?;
                self.expect_symbol('[')?;
                self.compile_expression()?;
                self.expect_symbol(']')?;
                self.writer.write_arithmetic(VmOp::Add)?;
                self.writer.write_pop(Segment::Pointer, 1)?;
                self.writer.write_push(Segment::That, 0)?;
            }
            Some(Token::Symbol('(' | '.')) => self.compile_subroutine_call(name)?,
            _ => {
                let symbol = self.lookup(name)?;
                self.push_symbol(&symbol)?;
            }
        }
        Ok(())
    }

    /// `subroutineName '(' expressionList ')'` or
    /// `(className | varName) '.' subroutineName '(' expressionList ')'`,
    /// with `first` already consumed.
    fn compile_subroutine_call(&mut self, first: &str) -> Result<(), CompileError> {
        if self.current_is_symbol('.') {
            self.advance()?;
            let sub_name = self.expect_identifier()?;

            if let Some(symbol) = self.table.get(first).cloned() {
                // A receiver: its value becomes the implicit first argument.
                self.push_symbol(&symbol)?;
                let n_args = self.compile_expression_list()?;
                let callee = format!("{}.{}", symbol.ty, sub_name);
                self.writer.write_call(&callee, n_args + 1)?;
            } else {
                // A class name: a plain function call.
                let n_args = self.compile_expression_list()?;
                let callee = format!("{first}.{sub_name}");
                self.writer.write_call(&callee, n_args)?;
            }
        } else if self.current_is_symbol('(') {
            // Implicit-this method call on the current class.
            if self.subroutine_kind == SubroutineKind::Function {
                return Err(CompileError::MethodCallInFunction(first.to_string()));
            }
            self.writer.write_push(Segment::Pointer, 0)?;
            let n_args = self.compile_expression_list()?;
            let callee = format!("{}.{}", self.class_name, first);
            self.writer.write_call(&callee, n_args + 1)?;
        } else {
            return Err(CompileError::Expected {
                expected: "'(' or '.' in subroutine call".to_string(),
                found: self.found_text(),
            });
        }
        Ok(())
    }

    /// `'(' (expression (',' expression)*)? ')'`; returns the number of
    /// expressions compiled.
    fn compile_expression_list(&mut self) -> Result<u16, CompileError> {
        self.expect_symbol('(')?;

        let mut count = 0u16;
        if !self.current_is_symbol(')') {
            self.compile_expression()?;
            count += 1;
            while self.current_is_symbol(',') {
                self.advance()?;
                self.compile_expression()?;
                count += 1;
            }
        }

        self.expect_symbol(')')?;
        Ok(count)
    }

    /// Builds the string at runtime, one appendChar per character.
    fn compile_string_constant(&mut self, contents: &str) -> Result<(), CompileError> {
        #[allow(clippy::cast_possible_truncation)]
        let length = contents.chars().count() as u16;
        self.writer.write_push(Segment::Constant, length)?;
        self.writer.write_call("String.new", 1)?;
        for ch in contents.chars() {
            #[allow(clippy::cast_possible_truncation)]
            self.writer.write_push(Segment::Constant, ch as u16)?;
            self.writer.write_call("String.appendChar", 2)?;
        }
        Ok(())
    }

    fn emit_binary_op(&mut self, op: char) -> Result<(), CompileError> {
        match op {
            '+' => self.writer.write_arithmetic(VmOp::Add)?,
            '-' => self.writer.write_arithmetic(VmOp::Sub)?,
            '&' => self.writer.write_arithmetic(VmOp::And)?,
            '|' => self.writer.write_arithmetic(VmOp::Or)?,
            '<' => self.writer.write_arithmetic(VmOp::Lt)?,
            '>' => self.writer.write_arithmetic(VmOp::Gt)?,
            '=' => self.writer.write_arithmetic(VmOp::Eq)?,
            '*' => self.writer.write_call("Math.multiply", 2)?,
            '/' => self.writer.write_call("Math.divide", 2)?,
            _ => unreachable!("operator set is closed"),
        }
        Ok(())
    }

    /// `'int' | 'char' | 'boolean' | className`, plus `'void'` for return
    /// types.
    fn parse_type(&mut self, allow_void: bool) -> Result<String, CompileError> {
        match self.advance()? {
            Token::Keyword(k @ (Keyword::Int | Keyword::Char | Keyword::Boolean)) => {
                Ok(k.name().to_string())
            }
            Token::Keyword(Keyword::Void) if allow_void => Ok("void".to_string()),
            Token::Identifier(name) => Ok(name),
            other => Err(Self::expected(
                if allow_void {
                    "a type or 'void'"
                } else {
                    "a type"
                },
                &other,
            )),
        }
    }

    /// `varName (',' varName)* ';'` with the type already parsed.
    fn define_variable_list(&mut self, ty: &str, kind: Kind) -> Result<(), CompileError> {
        loop {
            let name = self.expect_identifier()?;
            self.table.define(&name, ty, kind);

            if self.current_is_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Symbol, CompileError> {
        self.table
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedIdentifier(name.to_string()))
    }

    fn require_array(&self, name: &str, symbol: &Symbol) -> Result<(), CompileError> {
        if symbol.ty == "Array" {
            Ok(())
        } else {
            Err(CompileError::ArrayAccessOnNonArray {
                name: name.to_string(),
                ty: symbol.ty.clone(),
            })
        }
    }

    fn push_symbol(&mut self, symbol: &Symbol) -> Result<(), EmitError> {
        self.writer.write_push(symbol.kind.segment(), symbol.index)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        self.tokens.advance().ok_or(CompileError::UnexpectedEnd)
    }

    fn current_is_symbol(&self, symbol: char) -> bool {
        self.tokens.current().is_some_and(|t| t.is_symbol(symbol))
    }

    fn current_is_any_keyword(&self, keywords: &[Keyword]) -> bool {
        self.tokens
            .current()
            .is_some_and(|t| keywords.iter().any(|&k| t.is_keyword(k)))
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), CompileError> {
        match self.advance()? {
            Token::Symbol(c) if c == symbol => Ok(()),
            other => Err(Self::expected(&format!("'{symbol}'"), &other)),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), CompileError> {
        match self.advance()? {
            Token::Keyword(k) if k == keyword => Ok(()),
            other => Err(Self::expected(&format!("'{keyword}'"), &other)),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, CompileError> {
        match self.advance()? {
            Token::Identifier(name) => Ok(name),
            other => Err(Self::expected("an identifier", &other)),
        }
    }

    fn expected(expected: &str, found: &Token) -> CompileError {
        CompileError::Expected {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    fn found_text(&self) -> String {
        self.tokens
            .current()
            .map_or_else(|| "end of input".to_string(), ToString::to_string)
    }
}
