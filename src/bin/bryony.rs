use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

use bryony::{BryonyError, Repl, Runtime, Value};

#[derive(Parser)]
#[command(author, version, about = "Bryony language interpreter")]
struct Args {
    /// Enable the `debug` native and diagnostic chatter
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Bryony script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Bryony code
    Eval { source: String },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script, args.debug),
        Command::Repl => {
            let mut repl = Repl::new(".", args.debug);
            repl.run()
        }
        Command::Eval { source } => eval_snippet(&source, args.debug),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: PathBuf, debug: bool) -> Result<(), BryonyError> {
    // Imports resolve relative to the script's own directory.
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut runtime = Runtime::new(root, debug);
    runtime.load_module(&name)?;
    for event in runtime.drain_events() {
        println!("EVENT[{}]: {}", event.tag, event.payload);
    }
    Ok(())
}

fn eval_snippet(source: &str, debug: bool) -> Result<(), BryonyError> {
    let mut runtime = Runtime::new(".", debug);
    let module = runtime.scratch_module("<eval>");
    let value = runtime.eval_in(module, source, "<eval>")?;
    if !matches!(value, Value::Null) {
        println!("{value}");
    }
    for event in runtime.drain_events() {
        println!("EVENT[{}]: {}", event.tag, event.payload);
    }
    Ok(())
}
