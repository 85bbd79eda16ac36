//! VM translator driver
//!
//! # Usage
//! ```bash
//! vm-translator <path>
//! ```
//!
//! A directory translates every `.vm` file directly inside it into one
//! `<dirname>.asm` next to the directory; a single `.vm` file translates
//! to `<stem>.asm`.

#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::path::Path;
use std::process;

use vm_translator::translate_path;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <path>", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} SimpleAdd.vm", args[0]);
        eprintln!("  {} FibonacciElement/", args[0]);
        process::exit(1);
    }

    match translate_path(Path::new(&args[1])) {
        Ok(output) => println!("Translation complete: {} -> {}", args[1], output.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
