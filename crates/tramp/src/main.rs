use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use tramp::{CaseSensitivity, DisabledFiles, Interpreter, Procedure, ReadOnlyFiles, Value};

#[derive(Parser)]
#[command(name = "tramp", version, about = "tramp: a small Scheme with proper tail calls")]
struct Cli {
    /// Files to load, in order, before anything else
    files: Vec<PathBuf>,

    /// Evaluate an expression and print its value instead of starting the REPL
    #[arg(short, long)]
    eval: Option<String>,

    /// Fold symbols to lower case when reading
    #[arg(long)]
    fold_case: bool,

    /// Refuse all file access from scripts (`load`)
    #[arg(long)]
    no_fs: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let interpreter = build_interpreter(&cli);

    for path in &cli.files {
        if let Err(msg) = load_file(&interpreter, path) {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    }

    if let Some(expr) = &cli.eval {
        return match interpreter.eval_str_named(expr, "<eval>") {
            Ok(val) => {
                print_value(&val);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if !cli.files.is_empty() {
        return ExitCode::SUCCESS;
    }

    repl(&interpreter);
    ExitCode::SUCCESS
}

fn build_interpreter(cli: &Cli) -> Interpreter {
    let case = if cli.fold_case {
        CaseSensitivity::FoldLowercase
    } else {
        CaseSensitivity::Sensitive
    };
    let builder = Interpreter::builder().case_sensitivity(case);
    if cli.no_fs {
        builder.with_files(DisabledFiles).build()
    } else {
        builder.with_files(ReadOnlyFiles).build()
    }
}

fn load_file(interpreter: &Interpreter, path: &PathBuf) -> Result<(), String> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| format!("Error reading {display}: {e}"))?;
    interpreter
        .eval_reader(BufReader::new(file), &display)
        .map(|_| ())
        .map_err(|e| format!("Error in {display}: {e}"))
}

fn print_value(val: &Value) {
    if !val.is_unspecified() {
        println!("{val}");
    }
}

/// A line typed at the prompt, before it is treated as source.
#[derive(Debug, PartialEq)]
enum Command {
    Quit,
    Help,
    Env,
    Source,
}

impl Command {
    fn parse(line: &str) -> Command {
        match line.trim() {
            ",quit" | ",exit" | ",q" => Command::Quit,
            ",help" | ",h" => Command::Help,
            ",env" => Command::Env,
            _ => Command::Source,
        }
    }
}

/// Source collected across prompts until every open list is closed.
#[derive(Default)]
struct Pending {
    text: String,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append a line; returns the whole form once it is complete.
    fn feed(&mut self, line: &str) -> Option<String> {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
        if is_balanced(&self.text) {
            let done = std::mem::take(&mut self.text);
            Some(done.trim().to_string())
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.text.clear();
    }
}

fn repl(interpreter: &Interpreter) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error: cannot start line editor: {e}");
            return;
        }
    };
    let history = history_file();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    println!("tramp v{} (,help for commands)", env!("CARGO_PKG_VERSION"));

    let mut pending = Pending::default();
    loop {
        let prompt = if pending.is_empty() { "tramp> " } else { "  ... " };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        };

        if pending.is_empty() {
            match Command::parse(&line) {
                Command::Quit => break,
                Command::Help => {
                    print_help();
                    continue;
                }
                Command::Env => {
                    print_env(interpreter);
                    continue;
                }
                Command::Source => {}
            }
        }

        let Some(input) = pending.feed(&line) else {
            continue;
        };
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input.as_str());
        match interpreter.eval_str_named(&input, "<repl>") {
            Ok(val) => print_value(&val),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = editor.save_history(path);
    }
}

/// True once every open paren outside strings and comments is closed.
fn is_balanced(input: &str) -> bool {
    let mut depth = 0i32;
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ';' => {
                // skip to end of line
                if !chars.by_ref().any(|c| c == '\n') {
                    break;
                }
            }
            '"' => loop {
                match chars.next() {
                    None => return false,
                    Some('"') => break,
                    Some('\\') => {
                        chars.next();
                    }
                    Some(_) => {}
                }
            },
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}

fn print_help() {
    println!("Commands:");
    println!("  ,quit ,exit ,q   leave the REPL");
    println!("  ,help ,h         show this text");
    println!("  ,env             list global values that are not primitives");
    println!();
    println!("Special forms: define define-macro lambda if set! begin quote quasiquote");
}

fn print_env(interpreter: &Interpreter) {
    let globals = interpreter.global_env();
    let mut shown = 0;
    for name in globals.local_names() {
        let Some(val) = globals.get(&interpreter.intern(&name)) else {
            continue;
        };
        if matches!(val, Value::Procedure(Procedure::Native(_))) {
            continue;
        }
        println!("  {name} = {val}");
        shown += 1;
    }
    if shown == 0 {
        println!("  (nothing defined yet)");
    }
}

/// `$HOME/.tramp/history.txt`, or no history when `HOME` is unset.
fn history_file() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".tramp").join("history.txt"))
}
