//! Bytecode disassembler producing the canonical text listing.

use std::fmt::Write;

use crate::bytecode::instruction::{read_operands, Op};

/// Disassemble an instruction buffer. One line per instruction:
/// a zero-padded 4-digit decimal byte offset, the opcode name, then the
/// decoded operands.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < code.len() {
        let Some(op) = Op::from_u8(code[offset]) else {
            writeln!(out, "ERROR: opcode {} is undefined", code[offset]).unwrap();
            offset += 1;
            continue;
        };

        let (operands, read) = read_operands(op, &code[offset + 1..]);
        writeln!(out, "{:04} {}", offset, fmt_instruction(op, &operands)).unwrap();
        offset += 1 + read;
    }

    out
}

/// Format a single decoded instruction.
pub fn fmt_instruction(op: Op, operands: &[usize]) -> String {
    let operand_count = op.operand_widths().len();
    if operands.len() != operand_count {
        return format!(
            "ERROR: operand len {} does not match defined {}",
            operands.len(),
            operand_count
        );
    }

    match operand_count {
        0 => op.name().to_string(),
        1 => format!("{} {}", op.name(), operands[0]),
        2 => format!("{} {} {}", op.name(), operands[0], operands[1]),
        _ => format!("ERROR: unhandled operand count for {}", op.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::make;
    use crate::bytecode::Compiler;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn disassemble_source(source: &str) -> String {
        let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        assert!(parser.errors().is_empty());
        let bytecode = Compiler::new().compile(&program).expect("compile error");
        disassemble(&bytecode.instructions)
    }

    #[test]
    fn test_disassemble_formatting() {
        let code: Vec<u8> = [
            make(Op::Add, &[]),
            make(Op::GetLocal, &[1]),
            make(Op::Constant, &[2]),
            make(Op::Constant, &[65535]),
            make(Op::Closure, &[65535, 255]),
        ]
        .concat();

        let expected = "\
0000 OpAdd
0001 OpGetLocal 1
0003 OpConstant 2
0006 OpConstant 65535
0009 OpClosure 65535 255
";
        assert_eq!(disassemble(&code), expected);
    }

    #[test]
    fn test_conditional_listing() {
        // Pins the if-without-else convention: the missing alternative
        // becomes OpNull.
        let expected = "\
0000 OpTrue
0001 OpJumpNotTruthy 10
0004 OpConstant 0
0007 OpJump 11
0010 OpNull
0011 OpPop
0012 OpConstant 1
0015 OpPop
";
        assert_eq!(disassemble_source("if (true) { 10 }; 3333;"), expected);
    }

    #[test]
    fn test_unknown_opcode() {
        let code = vec![Op::Pop as u8, 255];
        let listing = disassemble(&code);
        assert_eq!(listing, "0000 OpPop\nERROR: opcode 255 is undefined\n");
    }

    #[test]
    fn test_operand_count_mismatch() {
        assert_eq!(
            fmt_instruction(Op::Constant, &[]),
            "ERROR: operand len 0 does not match defined 1"
        );
    }
}
