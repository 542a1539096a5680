//! Babygc driver
//!
//! Runs a command script, or an interactive REPL when no file is given.
//!
//! ```text
//! bgc [--stack N] [--threshold N] [--limit N] [FILE]
//! ```

use babygc::{Interpreter, Vm, VmConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

fn main() {
    env_logger::init();

    let (config, file) = match parse_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            eprintln!("usage: bgc [--stack N] [--threshold N] [--limit N] [FILE]");
            std::process::exit(2);
        }
    };

    let vm = match Vm::with_config(config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let mut interp = Interpreter::new(vm);

    match file {
        Some(path) => run_file(&mut interp, &path),
        None => run_repl(&mut interp),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(VmConfig, Option<String>), String> {
    let mut config = VmConfig::default();
    let mut file = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| -> Result<usize, String> {
            let raw = args
                .next()
                .ok_or_else(|| format!("{} needs a value", flag))?;
            raw.parse()
                .map_err(|_| format!("{}: invalid number {:?}", flag, raw))
        };

        match arg.as_str() {
            "--stack" => config = config.with_stack_capacity(value("--stack")?),
            "--threshold" => config = config.with_initial_threshold(value("--threshold")?),
            "--limit" => config = config.with_heap_limit(Some(value("--limit")?)),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}", flag)),
            other => {
                if file.is_some() {
                    return Err(format!("unexpected argument {}", other));
                }
                file = Some(other.to_string());
            }
        }
    }

    Ok((config, file))
}

fn run_file(interp: &mut Interpreter, filename: &str) {
    let source = match std::fs::read_to_string(filename) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    for (i, line) in source.lines().enumerate() {
        match interp.run_line(i + 1, line) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => {
                eprintln!("{}: {}", filename, e);
                std::process::exit(1);
            }
        }
    }
}

fn run_repl(interp: &mut Interpreter) {
    println!("Babygc - mark-and-sweep playground");
    println!("Commands: push N, pair, pop, dup [D], gc, count, stack, show [D],");
    println!("          setfirst P T, setsecond P T, stats, threshold, reset, dump");
    println!("Ctrl+D to exit.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error starting line editor: {}", e);
            std::process::exit(1);
        }
    };

    let mut line_no = 0;
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                match interp.run_line(line_no, &line) {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
}
