use std::{env, fs, path::Path, process};

use deviser::{
    runtime::{config::VmConfig, vm::VM},
    syntax::{reader::Reader, token::is_complete},
};
use rustyline::{DefaultEditor, error::ReadlineError};

struct Options {
    gc_stats: bool,
    disassemble: bool,
}

fn main() {
    env_logger::init();

    let mut args: Vec<String> = env::args().collect();
    let no_gc = take_flag(&mut args, "--no-gc");
    let trace = take_flag(&mut args, "--trace");
    let options = Options {
        gc_stats: take_flag(&mut args, "--gc-stats"),
        disassemble: take_flag(&mut args, "--disassemble"),
    };

    let Some(config_path) = take_value(&mut args, "--config") else {
        return;
    };
    let Some(gc_threshold) = take_number(&mut args, "--gc-threshold") else {
        return;
    };
    let Some(max_arenas) = take_number(&mut args, "--max-arenas") else {
        return;
    };
    let Some(max_frames) = take_number(&mut args, "--max-frames") else {
        return;
    };

    let mut config = match config_path {
        Some(path) => match VmConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error: {err}");
                process::exit(2);
            }
        },
        None => VmConfig::default(),
    };
    if no_gc {
        config.gc_enabled = false;
    }
    if trace {
        config.trace = true;
    }
    if let Some(threshold) = gc_threshold {
        config.gc_threshold = threshold;
    }
    if max_arenas.is_some() {
        config.max_arenas = max_arenas;
    }
    if let Some(frames) = max_frames {
        config.max_frames = frames;
    }

    if let Some(unknown) = args.iter().skip(1).find(|arg| arg.starts_with("--")) {
        eprintln!("Error: unknown flag {unknown}");
        print_help();
        process::exit(2);
    }

    match args.get(1).map(String::as_str) {
        None | Some("repl") => repl(config, &options),
        Some("-h" | "--help" | "help") => print_help(),
        Some("run") => match args.get(2) {
            Some(path) => run_file(path, config, &options),
            None => eprintln!("Usage: deviser run <file.lisp>"),
        },
        Some(path) => run_file(path, config, &options),
    }
}

fn print_help() {
    println!(
        "\
Deviser

Usage:
  deviser                 Start the REPL
  deviser repl            Start the REPL
  deviser <file>          Evaluate every form in <file>
  deviser run <file>      Same as above

Flags:
  --no-gc                 Never collect garbage
  --gc-threshold=<n>      Allocations between collections (0 = before every form)
  --max-arenas=<n>        Cap heap growth at <n> arenas
  --max-frames=<n>        Frame-stack depth limit
  --trace                 Log every executed instruction (RUST_LOG=trace)
  --config <file>         Load VM settings from a JSON file
  --gc-stats              Print heap statistics as JSON on exit
  --disassemble           Print the bytecode of every defined function"
    );
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|arg| arg != flag);
    args.len() != before
}

/// Removes `--name value` or `--name=value` from `args`.
///
/// Returns `None` after printing usage when the value is missing.
fn take_value(args: &mut Vec<String>, name: &str) -> Option<Option<String>> {
    let prefix = format!("{name}=");
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == name {
            if i + 1 >= args.len() {
                eprintln!("Usage: deviser {name} <value>");
                return None;
            }
            value = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        if let Some(inline) = args[i].strip_prefix(&prefix) {
            value = Some(inline.to_string());
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(value)
}

fn take_number(args: &mut Vec<String>, name: &str) -> Option<Option<usize>> {
    match take_value(args, name)? {
        None => Some(None),
        Some(text) => match text.parse::<usize>() {
            Ok(parsed) => Some(Some(parsed)),
            Err(_) => {
                eprintln!("Error: {name} expects a non-negative integer.");
                None
            }
        },
    }
}

fn new_vm(config: VmConfig) -> VM {
    match VM::with_config(config) {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("Error: cannot start the VM: {err}");
            process::exit(2);
        }
    }
}

fn run_file(path: &str, config: VmConfig, options: &Options) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: cannot read {path}: {err}");
            process::exit(2);
        }
    };

    let mut vm = new_vm(config);
    let failures = eval_source(&mut vm, &source, false);
    finish(&mut vm, options);

    if failures > 0 {
        process::exit(1);
    }
}

/// Reads and evaluates forms one at a time so output and errors interleave
/// in source order. Returns the number of failed forms.
fn eval_source(vm: &mut VM, source: &str, echo: bool) -> usize {
    let mut reader = Reader::new(source);
    let mut failures = 0;
    loop {
        let form = match reader.read(&mut vm.heap, &mut vm.symbols) {
            Ok(Some(form)) => form,
            Ok(None) => break,
            Err(err) => {
                eprintln!("read error: {err}");
                return failures + 1;
            }
        };
        match vm.eval_form(form) {
            Ok(value) if echo => println!("{}", vm.display(value)),
            Ok(_) => {}
            Err(err) => {
                eprintln!("{err}");
                failures += 1;
            }
        }
    }
    failures
}

fn show_definitions(vm: &mut VM) {
    for cell in vm.take_definitions() {
        if let Some(listing) = vm.disassemble(cell) {
            println!("{listing}");
        }
    }
}

fn finish(vm: &mut VM, options: &Options) {
    if options.disassemble {
        show_definitions(vm);
    }
    if options.gc_stats {
        match serde_json::to_string_pretty(&vm.heap.stats()) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("Error: cannot encode heap statistics: {err}"),
        }
    }
}

fn repl(config: VmConfig, options: &Options) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Error: cannot start line editor: {err}");
            process::exit(2);
        }
    };
    let mut vm = new_vm(config);

    println!(
        "Deviser REPL v{} (type :help for help, :quit to exit)",
        env!("CARGO_PKG_VERSION")
    );

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "deviser> " } else { "  ... " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        };

        if buffer.is_empty() {
            match line.trim() {
                "" => continue,
                ":quit" | ":q" => break,
                ":help" | ":h" => {
                    print_repl_help();
                    continue;
                }
                ":gc" => {
                    let metrics = vm.collect_garbage();
                    println!("freed {} of {} cells", metrics.freed, vm.heap.capacity());
                    println!("{}", vm.heap.stats());
                    continue;
                }
                _ => {}
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');
        if !is_complete(&buffer) {
            continue;
        }

        let _ = editor.add_history_entry(buffer.trim_end());
        eval_source(&mut vm, &buffer, true);
        if options.disassemble {
            show_definitions(&mut vm);
        }
        buffer.clear();
    }

    if options.gc_stats {
        finish(&mut vm, &Options { gc_stats: true, disassemble: false });
    }
    println!("Goodbye!");
}

fn print_repl_help() {
    println!(
        "\
Commands:
  :quit, :q    Exit the REPL
  :help, :h    Show this help message
  :gc          Collect garbage now and show heap statistics

Enter forms such as (defun sq (x) (* x x)) or (sq 7).
Unbalanced parentheses continue the form on the next line."
    );
}
