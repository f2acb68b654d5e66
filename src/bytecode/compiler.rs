//! Single-pass bytecode compiler: walks the AST once, emitting
//! instructions and patching jumps as it goes.

use std::rc::Rc;

use crate::ast::{Block, Expr, ExprKind, InfixOp, PrefixOp, Program, Stmt, StmtKind};
use crate::bytecode::builtins::BUILTINS;
use crate::bytecode::chunk::{Bytecode, CompiledFunction};
use crate::bytecode::instruction::{self, Op};
use crate::bytecode::symbol_table::{Symbol, SymbolScope, SymbolTable};
use crate::bytecode::value::Value;
use crate::error::CompileError;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Placeholder operand for jumps patched after their target is known.
const PLACEHOLDER: usize = 0xffff;

/// A record of an emitted instruction, kept for peephole rewrites.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

/// One function body under compilation. The compiler pushes a fresh scope
/// for every function literal and pops it into a `CompiledFunction`.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    /// The most recently emitted instruction.
    last: Option<EmittedInstruction>,
    /// The one before it, restored when `last` is removed.
    previous: Option<EmittedInstruction>,
}

/// The bytecode compiler.
///
/// Reusable across REPL lines: the symbol table and constant pool persist
/// between `compile` calls, and each call starts a fresh main scope.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, def) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, def.name);
        }

        Self {
            constants: Vec::new(),
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Compile a program into bytecode.
    pub fn compile(&mut self, program: &Program) -> CompileResult<Bytecode> {
        // A failed compile may have left function scopes behind; unwind
        // to the global scope before starting over.
        while !self.symbols.is_global() {
            let symbols = std::mem::take(&mut self.symbols);
            let (outer, _, _) = symbols.into_parts();
            self.symbols = outer.expect("non-global scope has an outer");
        }
        self.scopes = vec![CompilationScope::default()];

        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }

        Ok(Bytecode {
            instructions: std::mem::take(&mut self.scopes[0].instructions),
            constants: self.constants.clone(),
        })
    }

    // ===== Statements =====

    fn compile_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Let { name, value } => self.compile_let_statement(name, value),

            StmtKind::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
                Ok(())
            }

            StmtKind::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop, &[]);
                Ok(())
            }

            StmtKind::Block(block) => self.compile_block(block),
        }
    }

    fn compile_let_statement(&mut self, name: &str, value: &Expr) -> CompileResult<()> {
        // Define before compiling the value so a function literal can
        // resolve its own name; the matching Get only runs at call time.
        let symbol = self.symbols.define(name);
        if symbol.scope == SymbolScope::Local && symbol.index > u8::MAX as usize {
            return Err(CompileError::TooManyLocals);
        }

        match &value.kind {
            ExprKind::FunctionLiteral { parameters, body } => {
                self.compile_function_literal(parameters, body, Some(name))?;
            }
            _ => self.compile_expression(value)?,
        }

        match symbol.scope {
            SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
            _ => self.emit(Op::SetLocal, &[symbol.index]),
        };
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    // ===== Expressions =====

    fn compile_expression(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                let symbol = self
                    .symbols
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone(), expr.span))?;
                self.load_symbol(&symbol);
                Ok(())
            }

            ExprKind::IntegerLiteral(n) => {
                let index = self.add_constant(Value::Integer(*n))?;
                self.emit(Op::Constant, &[index]);
                Ok(())
            }

            ExprKind::BooleanLiteral(true) => {
                self.emit(Op::True, &[]);
                Ok(())
            }
            ExprKind::BooleanLiteral(false) => {
                self.emit(Op::False, &[]);
                Ok(())
            }

            ExprKind::StringLiteral(s) => {
                let index = self.add_constant(Value::Str(Rc::new(s.clone())))?;
                self.emit(Op::Constant, &[index]);
                Ok(())
            }

            ExprKind::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator {
                    PrefixOp::Bang => self.emit(Op::Bang, &[]),
                    PrefixOp::Minus => self.emit(Op::Minus, &[]),
                };
                Ok(())
            }

            ExprKind::Infix {
                left,
                operator,
                right,
            } => self.compile_infix_expression(left, *operator, right),

            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if_expression(condition, consequence, alternative.as_ref()),

            ExprKind::ArrayLiteral(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
                Ok(())
            }

            ExprKind::HashLiteral(pairs) => {
                // Sort by the keys' rendered form so bytecode is
                // deterministic regardless of hash iteration order.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
                Ok(())
            }

            ExprKind::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
                Ok(())
            }

            ExprKind::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
                Ok(())
            }

            ExprKind::FunctionLiteral { parameters, body } => {
                self.compile_function_literal(parameters, body, None)
            }
        }
    }

    fn compile_infix_expression(
        &mut self,
        left: &Expr,
        operator: InfixOp,
        right: &Expr,
    ) -> CompileResult<()> {
        // There is no less-than opcode: `a < b` compiles as `b > a`.
        if operator == InfixOp::Lt {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
            self.emit(Op::GreaterThan, &[]);
            return Ok(());
        }

        self.compile_expression(left)?;
        self.compile_expression(right)?;
        match operator {
            InfixOp::Add => self.emit(Op::Add, &[]),
            InfixOp::Sub => self.emit(Op::Sub, &[]),
            InfixOp::Mul => self.emit(Op::Mul, &[]),
            InfixOp::Div => self.emit(Op::Div, &[]),
            InfixOp::Gt => self.emit(Op::GreaterThan, &[]),
            InfixOp::Eq => self.emit(Op::Equal, &[]),
            InfixOp::NotEq => self.emit(Op::NotEqual, &[]),
            InfixOp::Lt => unreachable!("handled above"),
        };
        Ok(())
    }

    fn compile_if_expression(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> CompileResult<()> {
        self.compile_expression(condition)?;

        let jump_not_truthy = self.emit(Op::JumpNotTruthy, &[PLACEHOLDER]);

        self.compile_block(consequence)?;
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_instruction();
        }

        let jump = self.emit(Op::Jump, &[PLACEHOLDER]);

        let after_consequence = self.current_instructions().len();
        self.change_operand(jump_not_truthy, after_consequence);

        match alternative {
            Some(block) => {
                self.compile_block(block)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_instruction();
                }
            }
            None => {
                self.emit(Op::Null, &[]);
            }
        }

        let after_alternative = self.current_instructions().len();
        self.change_operand(jump, after_alternative);

        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        parameters: &[String],
        body: &Block,
        name: Option<&str>,
    ) -> CompileResult<()> {
        self.enter_scope();

        // A let-bound function sees its own name, resolved to the
        // executing closure itself rather than the (not yet set) binding.
        if let Some(name) = name {
            self.symbols.define_function(name);
        }
        for parameter in parameters {
            self.symbols.define(parameter);
        }

        self.compile_block(body)?;

        // An expression in tail position becomes the return value; a body
        // that ends without one returns null.
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let free_symbols = self.symbols.free_symbols.clone();
        let num_locals = self.symbols.num_definitions;
        let instructions = self.leave_scope();

        if num_locals > u8::MAX as usize + 1 {
            return Err(CompileError::TooManyLocals);
        }

        // Load each captured original, in capture order, for the VM to
        // pop into the closure.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let function = CompiledFunction::new(instructions, num_locals, parameters.len());
        let index = self.add_constant(Value::Function(Rc::new(function)))?;
        self.emit(Op::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Op::CurrentClosure, &[]),
        };
    }

    // ===== Emission =====

    fn current_instructions(&self) -> &[u8] {
        &self.scopes.last().expect("at least one scope").instructions
    }

    fn current_scope(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("at least one scope")
    }

    /// Append an instruction, returning its byte offset.
    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = instruction::make(op, operands);
        let scope = self.current_scope();
        let position = scope.instructions.len();
        scope.instructions.extend(instruction);
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction { op, position });
        position
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scopes
            .last()
            .and_then(|scope| scope.last)
            .is_some_and(|last| last.op == op)
    }

    /// Drop the last emitted instruction.
    fn remove_last_instruction(&mut self) {
        let scope = self.current_scope();
        if let Some(last) = scope.last {
            scope.instructions.truncate(last.position);
            scope.last = scope.previous;
            scope.previous = None;
        }
    }

    /// Rewrite a trailing `OpPop` into `OpReturnValue` in place.
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope();
        if let Some(last) = scope.last.as_mut() {
            scope.instructions[last.position] = Op::ReturnValue as u8;
            last.op = Op::ReturnValue;
        }
    }

    /// Patch the u16 operand of the instruction at `position`.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let bytes = (operand as u16).to_be_bytes();
        let scope = self.current_scope();
        scope.instructions[position + 1] = bytes[0];
        scope.instructions[position + 2] = bytes[1];
    }

    fn add_constant(&mut self, value: Value) -> CompileResult<usize> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants);
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    // ===== Scopes =====

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer);
    }

    /// Pop the current compilation scope, returning its instructions.
    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("unbalanced scope pop");
        let symbols = std::mem::take(&mut self.symbols);
        let (outer, _, _) = symbols.into_parts();
        self.symbols = outer.expect("function scope has an outer");
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
