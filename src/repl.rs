//! Interactive REPL with persistent state across lines.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::bytecode::vm::GLOBALS_SIZE;
use crate::bytecode::{Compiler, Value, Vm};
use crate::error::ParserError;
use crate::lexer::Scanner;
use crate::parser::Parser;

const PROMPT: &str = ">> ";
const HISTORY_FILE: &str = ".vesper_history";

const BANNER: &str = r#"            *
      _..._     .
    .'     '.      *
   / .-'''-. \
  | |  *    | |   .
   \ '-...-' /
    '._   _.'  *
   *   '''    .
"#;

/// The interactive loop. The compiler (symbol table and constant pool)
/// and the globals store live here, so bindings persist between lines.
pub struct Repl {
    compiler: Compiler,
    globals: Vec<Value>,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            compiler: Compiler::new(),
            globals: vec![Value::Null; GLOBALS_SIZE],
        }
    }

    fn history_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(HISTORY_FILE)
        } else {
            PathBuf::from(HISTORY_FILE)
        }
    }

    pub fn run(&mut self) {
        println!("Vesper {}", env!("CARGO_PKG_VERSION"));
        println!("Type exit or quit to leave.\n");

        let mut rl = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(_) => {
                println!("Warning: using basic input (no history)");
                self.run_basic();
                return;
            }
        };

        let history_path = Self::history_path();
        let _ = rl.load_history(&history_path);

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        break;
                    }
                    let _ = rl.add_history_entry(line);
                    self.execute_line(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("input error: {}", e);
                    break;
                }
            }
        }

        let _ = rl.save_history(&history_path);
        println!("Goodbye!");
    }

    /// Plain-stdin fallback when no terminal editor is available.
    fn run_basic(&mut self) {
        let stdin = io::stdin();
        loop {
            print!("{}", PROMPT);
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        break;
                    }
                    self.execute_line(line);
                }
            }
        }
        println!("Goodbye!");
    }

    fn execute_line(&mut self, line: &str) {
        let tokens = match Scanner::new(line).scan_tokens() {
            Ok(tokens) => tokens,
            Err(err) => {
                self.print_errors(" lexer errors:", &[err.to_string()]);
                return;
            }
        };

        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        if !parser.errors().is_empty() {
            self.print_parser_errors(parser.errors());
            return;
        }

        let bytecode = match self.compiler.compile(&program) {
            Ok(bytecode) => bytecode,
            Err(err) => {
                self.print_errors(" compile errors:", &[err.to_string()]);
                return;
            }
        };

        let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
        match vm.run() {
            Ok(()) => println!("{}", vm.last_popped_stack_element().inspect()),
            Err(err) => self.print_errors(" runtime errors:", &[err.to_string()]),
        }
        self.globals = vm.into_globals();
    }

    fn print_parser_errors(&self, errors: &[ParserError]) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        self.print_errors(" parser errors:", &messages);
    }

    fn print_errors(&self, heading: &str, messages: &[String]) {
        eprintln!("{}", BANNER);
        eprintln!("Woops! The evening sky clouded over!");
        eprintln!("{}", heading);
        for message in messages {
            eprintln!("\t{}", message.red());
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
