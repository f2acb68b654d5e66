//! Stack-based virtual machine executing compiled bytecode.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::builtins::BUILTINS;
use crate::bytecode::chunk::{Bytecode, Closure, CompiledFunction};
use crate::bytecode::instruction::{read_u16, Op};
use crate::bytecode::value::{HashKey, HashPair, Value};
use crate::error::RuntimeError;

/// Maximum operand stack depth.
pub const STACK_SIZE: usize = 2048;
/// Fixed capacity of the globals store.
pub const GLOBALS_SIZE: usize = 65536;
/// Maximum call depth.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

/// The activation record of one function call.
#[derive(Debug)]
struct Frame {
    /// The closure being executed.
    closure: Rc<Closure>,
    /// Instruction pointer. Starts at -1 so the fetch loop's
    /// pre-increment lands on byte 0.
    ip: isize,
    /// Value of `sp` just before the callee's locals region; parameters
    /// and locals live at `stack[base_pointer..]`.
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    fn instructions(&self) -> &[u8] {
        &self.closure.function.instructions
    }
}

/// The virtual machine: fetch-decode-execute over an operand stack, call
/// frames, and a globals store.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    /// Always points at the next free slot. `stack[sp]` after a pop still
    /// holds the most recently popped value; the REPL reads the last
    /// expression result from there.
    sp: usize,
    globals: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// Build a VM around an existing globals store, so bindings persist
    /// across REPL compilations.
    pub fn with_globals(bytecode: Bytecode, mut globals: Vec<Value>) -> Self {
        globals.resize(GLOBALS_SIZE, Value::Null);

        // The program body runs as a synthetic outermost function.
        let main_fn = CompiledFunction::new(bytecode.instructions, 0, 0);
        let main_closure = Closure::new(Rc::new(main_fn), Vec::new());

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(Rc::new(main_closure), 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Hand the globals store back to the caller.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The slot just freed by the last pop; what a finished program left
    /// behind.
    pub fn last_popped_stack_element(&self) -> &Value {
        &self.stack[self.sp]
    }

    /// The fetch-decode-execute loop. Runs to completion or fails with a
    /// terminal error; the stack and frames are simply abandoned on
    /// failure.
    pub fn run(&mut self) -> VmResult<()> {
        while self.current_frame().ip < self.current_frame().instructions().len() as isize - 1 {
            self.current_frame_mut().ip += 1;
            let ip = self.current_frame().ip as usize;

            let byte = self.current_frame().instructions()[ip];
            let op = Op::from_u8(byte).ok_or(RuntimeError::UndefinedOpcode(byte))?;

            match op {
                Op::Constant => {
                    let index = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.execute_binary_operation(op)?;
                }

                Op::Pop => {
                    self.pop();
                }

                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,
                Op::Null => self.push(Value::Null)?,

                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Op::Minus => self.execute_minus_operator()?,
                Op::Bang => self.execute_bang_operator()?,

                Op::Jump => {
                    let target = self.read_u16_operand(ip);
                    self.current_frame_mut().ip = target as isize - 1;
                }

                Op::JumpNotTruthy => {
                    let target = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;

                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.current_frame_mut().ip = target as isize - 1;
                    }
                }

                Op::SetGlobal => {
                    let index = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;
                    let value = self.pop();
                    self.globals[index] = value;
                }

                Op::GetGlobal => {
                    let index = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Op::SetLocal => {
                    let slot = self.read_u8_operand(ip);
                    self.current_frame_mut().ip += 1;
                    let base = self.current_frame().base_pointer;
                    let value = self.pop();
                    self.stack[base + slot] = value;
                }

                Op::GetLocal => {
                    let slot = self.read_u8_operand(ip);
                    self.current_frame_mut().ip += 1;
                    let base = self.current_frame().base_pointer;
                    let value = self.stack[base + slot].clone();
                    self.push(value)?;
                }

                Op::GetBuiltin => {
                    let index = self.read_u8_operand(ip);
                    self.current_frame_mut().ip += 1;
                    self.push(Value::Builtin(index as u16))?;
                }

                Op::GetFree => {
                    let index = self.read_u8_operand(ip);
                    self.current_frame_mut().ip += 1;
                    let value = self.current_frame().closure.free[index].clone();
                    self.push(value)?;
                }

                Op::CurrentClosure => {
                    let closure = Rc::clone(&self.current_frame().closure);
                    self.push(Value::Closure(closure))?;
                }

                Op::Array => {
                    let count = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;

                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Value::Array(Rc::new(elements)))?;
                }

                Op::Hash => {
                    let count = self.read_u16_operand(ip);
                    self.current_frame_mut().ip += 2;

                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }

                Op::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }

                Op::Call => {
                    let argc = self.read_u8_operand(ip);
                    self.current_frame_mut().ip += 1;
                    self.execute_call(argc)?;
                }

                Op::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.pop_frame();
                    if self.frames.is_empty() {
                        // A top-level return ends the program, leaving
                        // its value where the REPL reads results.
                        self.sp = frame.base_pointer;
                        self.push(return_value)?;
                        self.pop();
                        return Ok(());
                    }
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }

                Op::Return => {
                    let frame = self.pop_frame();
                    if self.frames.is_empty() {
                        self.sp = frame.base_pointer;
                        self.push(Value::Null)?;
                        self.pop();
                        return Ok(());
                    }
                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }

                Op::Closure => {
                    let const_index = self.read_u16_operand(ip);
                    let free_count = {
                        let ins = self.current_frame().instructions();
                        ins[ip + 3] as usize
                    };
                    self.current_frame_mut().ip += 3;
                    self.push_closure(const_index, free_count)?;
                }
            }
        }

        Ok(())
    }

    // ===== Operators =====

    fn execute_binary_operation(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                self.execute_binary_integer_operation(op, *l, *r)
            }
            (Value::Str(l), Value::Str(r)) => {
                if op != Op::Add {
                    return Err(RuntimeError::UnknownStringOperator(op.name()));
                }
                self.push(Value::Str(Rc::new(format!("{}{}", l, r))))
            }
            _ => Err(RuntimeError::UnsupportedBinaryTypes {
                left: left.type_tag(),
                right: right.type_tag(),
            }),
        }
    }

    fn execute_binary_integer_operation(&mut self, op: Op, left: i64, right: i64) -> VmResult<()> {
        let result = match op {
            Op::Add => left.wrapping_add(right),
            Op::Sub => left.wrapping_sub(right),
            Op::Mul => left.wrapping_mul(right),
            Op::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left.wrapping_div(right)
            }
            _ => return Err(RuntimeError::UnknownIntegerOperator(op.name())),
        };
        self.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();

        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            return self.execute_integer_comparison(op, *l, *r);
        }
        if matches!(left, Value::Integer(_)) || matches!(right, Value::Integer(_)) {
            return Err(RuntimeError::UnknownOperator {
                op: op.name(),
                left: left.type_tag(),
                right: right.type_tag(),
            });
        }

        // Booleans and null are canonical, so equality is identity;
        // strings compare structurally.
        match op {
            Op::Equal => self.push(Value::Boolean(left == right)),
            Op::NotEqual => self.push(Value::Boolean(left != right)),
            _ => Err(RuntimeError::UnknownOperator {
                op: op.name(),
                left: left.type_tag(),
                right: right.type_tag(),
            }),
        }
    }

    fn execute_integer_comparison(&mut self, op: Op, left: i64, right: i64) -> VmResult<()> {
        let result = match op {
            Op::Equal => left == right,
            Op::NotEqual => left != right,
            Op::GreaterThan => left > right,
            _ => return Err(RuntimeError::UnknownIntegerOperator(op.name())),
        };
        self.push(Value::Boolean(result))
    }

    fn execute_minus_operator(&mut self) -> VmResult<()> {
        match self.pop() {
            Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg())),
            other => Err(RuntimeError::UnsupportedNegation(other.type_tag())),
        }
    }

    fn execute_bang_operator(&mut self) -> VmResult<()> {
        let result = match self.pop() {
            Value::Boolean(b) => !b,
            Value::Null => true,
            _ => false,
        };
        self.push(Value::Boolean(result))
    }

    // ===== Collections =====

    fn build_hash(&mut self, start: usize, end: usize) -> VmResult<Value> {
        let mut pairs: IndexMap<HashKey, HashPair> = IndexMap::new();

        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key.hash_key()?;
            // A duplicate key keeps its position; the value is replaced.
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }

        Ok(Value::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(i)) => {
                let element = usize::try_from(*i)
                    .ok()
                    .and_then(|i| elements.get(i))
                    .cloned()
                    .unwrap_or(Value::Null);
                self.push(element)
            }
            (Value::Hash(pairs), _) => {
                let key = index.hash_key()?;
                let value = pairs
                    .get(&key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Value::Null);
                self.push(value)
            }
            _ => Err(RuntimeError::IndexNotSupported(left.type_tag())),
        }
    }

    // ===== Calls =====

    fn execute_call(&mut self, argc: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            Value::Builtin(index) => self.call_builtin(index, argc),
            _ => Err(RuntimeError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> VmResult<()> {
        let function = &closure.function;
        if argc != function.num_parameters {
            return Err(RuntimeError::WrongArity {
                want: function.num_parameters,
                got: argc,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }

        // Arguments already sit at the bottom of the locals region; the
        // remaining local slots follow them.
        let base_pointer = self.sp - argc;
        let next_sp = base_pointer + function.num_locals;
        if next_sp > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.frames.push(Frame::new(closure, base_pointer));
        self.sp = next_sp;
        Ok(())
    }

    fn call_builtin(&mut self, index: u16, argc: usize) -> VmResult<()> {
        let args = self.stack[self.sp - argc..self.sp].to_vec();
        let result = (BUILTINS[index as usize].func)(&args);

        self.sp -= argc + 1;
        self.push(result.unwrap_or(Value::Null))
    }

    fn push_closure(&mut self, const_index: usize, free_count: usize) -> VmResult<()> {
        let function = match &self.constants[const_index] {
            Value::Function(function) => Rc::clone(function),
            other => return Err(RuntimeError::NotAFunction(other.type_tag())),
        };

        let free = self.stack[self.sp - free_count..self.sp].to_vec();
        self.sp -= free_count;

        self.push(Value::Closure(Rc::new(Closure::new(function, free))))
    }

    // ===== Stack and frame plumbing =====

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("at least one frame")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("at least one frame")
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("frame underflow")
    }

    fn read_u16_operand(&self, ip: usize) -> usize {
        read_u16(&self.current_frame().instructions()[ip + 1..]) as usize
    }

    fn read_u8_operand(&self, ip: usize) -> usize {
        self.current_frame().instructions()[ip + 1] as usize
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// Pop the top of the stack. The value stays in its slot so
    /// `last_popped_stack_element` can read it.
    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    #[cfg(test)]
    fn stack_pointer(&self) -> usize {
        self.sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Compiler;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn compile(source: &str) -> Bytecode {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        assert!(
            parser.errors().is_empty(),
            "parser errors: {:?}",
            parser.errors()
        );
        Compiler::new().compile(&program).expect("compile error")
    }

    fn run(source: &str) -> Vm {
        let mut vm = Vm::new(compile(source));
        vm.run().expect("runtime error");
        vm
    }

    fn last(source: &str) -> Value {
        run(source).last_popped_stack_element().clone()
    }

    fn check_int(cases: &[(&str, i64)]) {
        for (source, expected) in cases {
            assert_eq!(
                last(source),
                Value::Integer(*expected),
                "source: {}",
                source
            );
        }
    }

    fn check_bool(cases: &[(&str, bool)]) {
        for (source, expected) in cases {
            assert_eq!(
                last(source),
                Value::Boolean(*expected),
                "source: {}",
                source
            );
        }
    }

    fn check_inspect(cases: &[(&str, &str)]) {
        for (source, expected) in cases {
            assert_eq!(last(source).inspect(), *expected, "source: {}", source);
        }
    }

    fn check_runtime_error(cases: &[(&str, &str)]) {
        for (source, expected) in cases {
            let mut vm = Vm::new(compile(source));
            let err = vm.run().expect_err(source);
            assert_eq!(err.to_string(), *expected, "source: {}", source);
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        check_int(&[
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("1 * 2", 2),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("-5", -5),
            ("-10", -10),
            ("-50 + 100 + -50", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ]);
    }

    #[test]
    fn test_boolean_expressions() {
        check_bool(&[
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("true == true", true),
            ("false == false", true),
            ("true == false", false),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == true", false),
            ("!true", false),
            ("!5", false),
            ("!!true", true),
            ("!!5", true),
            ("!(if (false) { 5; })", true),
        ]);
    }

    #[test]
    fn test_conditionals() {
        check_int(&[
            ("if (true) { 10 }", 10),
            ("if (true) { 10 } else { 20 }", 10),
            ("if (false) { 10 } else { 20 }", 20),
            ("if (1) { 10 }", 10),
            ("if (1 < 2) { 10 }", 10),
            ("if (1 > 2) { 10 } else { 20 }", 20),
            ("if ((if (false) { 10 })) { 10 } else { 20 }", 20),
        ]);
        assert_eq!(last("if (1 > 2) { 10 }"), Value::Null);
        assert_eq!(last("if (false) { 10 }"), Value::Null);
        assert_eq!(last("if (false) { 10 }").inspect(), "Null");
    }

    #[test]
    fn test_global_let_statements() {
        check_int(&[
            ("let one = 1; one", 1),
            ("let one = 1; let two = 2; one + two", 3),
            ("let a = 1; let b = 2; a + b;", 3),
            ("let one = 1; let two = one + one; one + two", 3),
        ]);
    }

    #[test]
    fn test_top_level_return_ends_the_program() {
        check_int(&[("return 10;", 10), ("return 2 * 5; 9;", 10)]);
        let vm = run("return 1 + 1;");
        assert_eq!(vm.stack_pointer(), 0);
    }

    #[test]
    fn test_string_expressions() {
        check_inspect(&[
            (r#""vesper""#, "vesper"),
            (r#""ves" + "per""#, "vesper"),
            (r#""ves" + "per" + " sky""#, "vesper sky"),
        ]);
    }

    #[test]
    fn test_array_literals() {
        check_inspect(&[
            ("[]", "[]"),
            ("[1, 2, 3]", "[1, 2, 3]"),
            ("[1 + 2, 3 * 4, 5 + 6]", "[3, 12, 11]"),
        ]);
    }

    #[test]
    fn test_hash_literals() {
        check_inspect(&[
            ("{}", "{}"),
            ("{1: 2, 2: 3}", "{1: 2, 2: 3}"),
            ("{1 + 1: 2 * 2, 3 + 3: 4 * 4}", "{2: 4, 6: 16}"),
            // Last occurrence of a duplicate key wins.
            ("{1: 2, 1: 3}", "{1: 3}"),
        ]);
    }

    #[test]
    fn test_index_expressions() {
        check_int(&[
            ("[1, 2, 3][1]", 2),
            ("[1, 2, 3][0 + 2]", 3),
            ("[[1, 1, 1]][0][0]", 1),
            ("{1: 1, 2: 2}[1]", 1),
            ("{1: 1, 2: 2}[2]", 2),
            ("{1 + 1: 2 * 2}[2]", 4),
        ]);
        assert_eq!(last("[][0]"), Value::Null);
        assert_eq!(last("[1, 2, 3][99]"), Value::Null);
        assert_eq!(last("[1][-1]"), Value::Null);
        assert_eq!(last("{1: 1}[0]"), Value::Null);
        assert_eq!(last("{}[0]"), Value::Null);
    }

    #[test]
    fn test_calling_functions() {
        check_int(&[
            ("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15),
            (
                "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
                3,
            ),
            (
                "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
                3,
            ),
            ("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99),
            (
                "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
                99,
            ),
        ]);
    }

    #[test]
    fn test_functions_without_return_value() {
        assert_eq!(last("let noReturn = fn() { }; noReturn();"), Value::Null);
        assert_eq!(
            last(
                "let noReturn = fn() { };
                 let noReturnTwo = fn() { noReturn(); };
                 noReturn(); noReturnTwo();"
            ),
            Value::Null
        );
    }

    #[test]
    fn test_first_class_functions() {
        check_int(&[(
            "let returnsOne = fn() { 1; };
             let returnsOneReturner = fn() { returnsOne; };
             returnsOneReturner()();",
            1,
        )]);
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        check_int(&[
            ("let one = fn() { let one = 1; one }; one();", 1),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
                3,
            ),
            (
                "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
                 let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
                 oneAndTwo() + threeAndFour();",
                10,
            ),
            (
                "let firstFoobar = fn() { let foobar = 50; foobar; };
                 let secondFoobar = fn() { let foobar = 100; foobar; };
                 firstFoobar() + secondFoobar();",
                150,
            ),
            (
                "let globalSeed = 50;
                 let minusOne = fn() { let num = 1; globalSeed - num; };
                 let minusTwo = fn() { let num = 2; globalSeed - num; };
                 minusOne() + minusTwo();",
                97,
            ),
        ]);
    }

    #[test]
    fn test_calling_functions_with_arguments() {
        check_int(&[
            ("let identity = fn(a) { a; }; identity(4);", 4),
            ("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3),
            ("let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);", 3),
            (
                "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
                10,
            ),
            (
                "let sum = fn(a, b) { let c = a + b; c; };
                 let outer = fn() { sum(1, 2) + sum(3, 4); };
                 outer();",
                10,
            ),
            (
                "let globalNum = 10;
                 let sum = fn(a, b) { let c = a + b; c + globalNum; };
                 let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
                 outer() + globalNum;",
                50,
            ),
        ]);
    }

    #[test]
    fn test_calling_with_wrong_arguments() {
        check_runtime_error(&[
            (
                "fn() { 1; }(1);",
                "wrong number of arguments: want=0, got=1",
            ),
            (
                "fn(a) { a; }();",
                "wrong number of arguments: want=1, got=0",
            ),
            (
                "fn(a, b) { a + b; }(1);",
                "wrong number of arguments: want=2, got=1",
            ),
        ]);
    }

    #[test]
    fn test_builtin_functions() {
        check_int(&[
            (r#"len("")"#, 0),
            (r#"len("four")"#, 4),
            (r#"len("hello world")"#, 11),
            ("len([1, 2, 3])", 3),
            ("len([])", 0),
            ("first([1, 2, 3])", 1),
            ("last([1, 2, 3])", 3),
        ]);
        assert_eq!(last("first([])"), Value::Null);
        assert_eq!(last("last([])"), Value::Null);
        assert_eq!(last("rest([])"), Value::Null);
        assert_eq!(last(r#"puts("hello")"#), Value::Null);
        check_inspect(&[
            ("rest([1, 2, 3])", "[2, 3]"),
            ("push([], 1)", "[1]"),
            ("push([1], 2)", "[1, 2]"),
        ]);
    }

    #[test]
    fn test_builtin_misuse_yields_error_values() {
        // Builtin misuse is an in-band Error value on the stack, not a
        // terminal VM error.
        check_inspect(&[
            (
                "len(1)",
                "ERROR: argument to `len` not supported, got INTEGER",
            ),
            (
                r#"len("one", "two")"#,
                "ERROR: wrong number of arguments. got=2, want=1",
            ),
            ("first(1)", "ERROR: argument to `first` must be ARRAY, got INTEGER"),
            ("push(1, 1)", "ERROR: argument to `push` must be ARRAY, got INTEGER"),
        ]);
    }

    #[test]
    fn test_closures() {
        check_int(&[
            (
                "let newClosure = fn(a) { fn() { a; }; };
                 let closure = newClosure(99);
                 closure();",
                99,
            ),
            (
                "let newAdder = fn(x) { fn(y) { x + y } };
                 let addTwo = newAdder(2);
                 addTwo(3);",
                5,
            ),
            (
                "let newAdder = fn(a, b) {
                     let c = a + b;
                     fn(d) { c + d };
                 };
                 let adder = newAdder(1, 2);
                 adder(8);",
                11,
            ),
            (
                "let newAdderOuter = fn(a, b) {
                     let c = a + b;
                     fn(d) {
                         let e = d + c;
                         fn(f) { e + f; };
                     };
                 };
                 let newAdderInner = newAdderOuter(1, 2);
                 let adder = newAdderInner(3);
                 adder(8);",
                14,
            ),
            (
                "let newClosure = fn(a, b) {
                     let one = fn() { a; };
                     let two = fn() { b; };
                     fn() { one() + two(); };
                 };
                 let closure = newClosure(9, 90);
                 closure();",
                99,
            ),
        ]);
    }

    #[test]
    fn test_recursive_functions() {
        check_int(&[
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);",
                0,
            ),
            (
                "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 let wrapper = fn() { countDown(1); };
                 wrapper();",
                0,
            ),
            (
                "let wrapper = fn() {
                     let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                     countDown(1);
                 };
                 wrapper();",
                0,
            ),
        ]);
        // Self-reference resolves through OpCurrentClosure even when the
        // calls sit in tail position of an if-arm.
        check_bool(&[(
            "let counter = fn(x) { if (x > 100) { return true; } else { counter(x + 1); } };
             counter(0);",
            true,
        )]);
    }

    #[test]
    fn test_recursive_fibonacci() {
        check_int(&[(
            "let fibo = fn(x) { if (x < 2) { return x; } fibo(x - 1) + fibo(x - 2); };
             fibo(10);",
            55,
        )]);
    }

    #[test]
    fn test_runtime_errors() {
        check_runtime_error(&[
            (
                "5 + true;",
                "unsupported types for binary operation: INTEGER BOOLEAN",
            ),
            (
                "5 + true; 5;",
                "unsupported types for binary operation: INTEGER BOOLEAN",
            ),
            ("-true", "unsupported type for negation: BOOLEAN"),
            (r#""a" - "b""#, "unknown string operator: OpSub"),
            ("5 / 0", "division by zero"),
            ("true > false", "unknown operator: OpGreaterThan (BOOLEAN BOOLEAN)"),
            ("1 == true", "unknown operator: OpEqual (INTEGER BOOLEAN)"),
            ("{[1]: 2}", "unusable as hash key: ARRAY"),
            ("{1: 2}[fn() { 1 }]", "unusable as hash key: CLOSURE"),
            ("5[0]", "index operator not supported: INTEGER"),
            ("1(1)", "calling non-function"),
            ("let x = 5; x();", "calling non-function"),
        ]);
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let mut vm = Vm::new(compile("let f = fn() { f(); }; f();"));
        let err = vm.run().expect_err("expected overflow");
        assert_eq!(err.to_string(), "frame overflow");
    }

    #[test]
    fn test_stack_is_clean_after_run() {
        let vm = run("1; 2; 3; if (true) { 10 }; [1, 2]; {1: 2};");
        assert_eq!(vm.stack_pointer(), 0);
    }

    #[test]
    fn test_globals_persist_across_vms() {
        // REPL-style reuse: one compiler, one globals store, many lines.
        let mut compiler = Compiler::new();
        let mut globals = vec![Value::Null; GLOBALS_SIZE];

        for (source, expected) in [
            ("let a = 1;", "1"),
            ("let b = a + 1;", "2"),
            ("a + b", "3"),
        ] {
            let tokens = Scanner::new(source).scan_tokens().unwrap();
            let mut parser = Parser::new(tokens);
            let program = parser.parse();
            assert!(parser.errors().is_empty());

            let bytecode = compiler.compile(&program).expect("compile error");
            let mut vm = Vm::with_globals(bytecode, globals);
            vm.run().expect("runtime error");
            assert_eq!(vm.last_popped_stack_element().inspect(), expected);
            globals = vm.into_globals();
        }
    }
}
