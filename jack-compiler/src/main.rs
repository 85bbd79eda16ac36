//! Jack compiler driver
//!
//! # Usage
//! ```bash
//! jack-compiler <path>
//! ```
//!
//! A directory compiles every `.jack` file directly inside it, writing one
//! sibling `.vm` per input; a single `.jack` file compiles to `<stem>.vm`.

#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::path::Path;
use std::process;

use jack_compiler::compile_path;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <path>", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} Main.jack", args[0]);
        eprintln!("  {} Square/", args[0]);
        process::exit(1);
    }

    match compile_path(Path::new(&args[1])) {
        Ok(outputs) => {
            for output in outputs {
                println!("Compiled: {}", output.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
