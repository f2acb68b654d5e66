//! Vesper: a small dynamic language compiled to bytecode and executed on
//! a stack-based virtual machine.
//!
//! The pipeline: source → [`lexer`] → tokens → [`parser`] → AST →
//! [`bytecode::Compiler`] → `Bytecode { instructions, constants }` →
//! [`bytecode::Vm`] → result value.

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod span;

use bytecode::{Bytecode, Compiler, Value, Vm};
use error::VesperError;
use lexer::Scanner;
use parser::Parser;

/// Compile source text to bytecode, surfacing lexer, parser, and compile
/// errors.
pub fn compile_source(source: &str) -> Result<Bytecode, VesperError> {
    let tokens = Scanner::new(source).scan_tokens()?;

    let mut parser = Parser::new(tokens);
    let program = parser.parse();
    if !parser.errors().is_empty() {
        return Err(VesperError::Parse(parser.take_errors()));
    }

    Ok(Compiler::new().compile(&program)?)
}

/// Run source text through the whole pipeline and return the value the
/// last expression left behind.
pub fn run_source(source: &str) -> Result<Value, VesperError> {
    let bytecode = compile_source(source)?;
    let mut vm = Vm::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped_stack_element().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_end_to_end() {
        assert_eq!(run_source("1 + 2").unwrap().inspect(), "3");
        assert_eq!(
            run_source("let newAdder = fn(x) { fn(y) { x + y } }; let addTwo = newAdder(2); addTwo(3);")
                .unwrap()
                .inspect(),
            "5"
        );
    }

    #[test]
    fn test_parse_errors_surface_as_a_list() {
        let err = run_source("let x 5;").unwrap_err();
        match err {
            VesperError::Parse(errors) => assert!(!errors.is_empty()),
            other => panic!("expected parse errors, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_error_surfaces() {
        let err = run_source("ghost;").unwrap_err();
        assert_eq!(err.to_string(), "compile error: undefined variable ghost");
    }

    #[test]
    fn test_runtime_error_surfaces() {
        let err = run_source("5 + true;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: unsupported types for binary operation: INTEGER BOOLEAN"
        );
    }
}
