//! Vesper CLI: execute files, evaluate one-liners, or run the REPL.

use std::env;
use std::fs;
use std::process;

use vesper::bytecode::{disassemble, Bytecode, Value};
use vesper::repl::Repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
    /// Compile a file and print its bytecode listing
    Disassemble { file: String },
    /// Start the REPL
    Repl,
}

fn print_usage() {
    eprintln!("Vesper {} - bytecode interpreter", VERSION);
    eprintln!();
    eprintln!("Usage: vesper [options] [script.vsp]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>             Evaluate code and print the result");
    eprintln!("  --disassemble <file>  Compile a file and print its bytecode");
    eprintln!("  --help, -h            Show this help message");
    eprintln!("  --version, -v         Show the version");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  vesper                Start the interactive REPL");
    eprintln!("  vesper script.vsp     Run a script file");
    eprintln!("  vesper -e \"1 + 2\"     Evaluate an expression");
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [] => Ok(Command::Repl),
        [flag] if flag == "--help" || flag == "-h" => {
            print_usage();
            process::exit(0);
        }
        [flag] if flag == "--version" || flag == "-v" => {
            println!("vesper {}", VERSION);
            process::exit(0);
        }
        [flag, code] if flag == "-e" => Ok(Command::Eval { code: code.clone() }),
        [flag, file] if flag == "--disassemble" => Ok(Command::Disassemble { file: file.clone() }),
        [file] if !file.starts_with('-') => Ok(Command::Run { file: file.clone() }),
        _ => Err(format!("unrecognized arguments: {}", args.join(" "))),
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!();
            print_usage();
            process::exit(2);
        }
    };

    match command {
        Command::Repl => Repl::new().run(),

        Command::Run { file } => {
            let source = read_file(&file);
            if let Err(err) = vesper::run_source(&source) {
                eprintln!("{}", err);
                process::exit(1);
            }
        }

        Command::Eval { code } => match vesper::run_source(&code) {
            Ok(value) => println!("{}", value.inspect()),
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        },

        Command::Disassemble { file } => {
            let source = read_file(&file);
            match vesper::compile_source(&source) {
                Ok(bytecode) => print!("{}", listing(&bytecode)),
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(1);
                }
            }
        }
    }
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("could not read {}: {}", path, err);
            process::exit(1);
        }
    }
}

/// The full listing: constants, the main body, then each compiled
/// function constant's body.
fn listing(bytecode: &Bytecode) -> String {
    let mut out = String::new();

    out.push_str("constants:\n");
    for (index, constant) in bytecode.constants.iter().enumerate() {
        out.push_str(&format!("  {:04} {}\n", index, constant.inspect()));
    }

    out.push_str("\nmain:\n");
    out.push_str(&disassemble(&bytecode.instructions));

    for (index, constant) in bytecode.constants.iter().enumerate() {
        if let Value::Function(function) = constant {
            out.push_str(&format!(
                "\nfunction {:04} ({} locals, {} parameters):\n",
                index, function.num_locals, function.num_parameters
            ));
            out.push_str(&disassemble(&function.instructions));
        }
    }

    out
}
