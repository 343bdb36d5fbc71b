use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    diagnostics::{BryonyError, Result},
    runtime::{ModuleId, Runtime},
    value::Value,
};

/// Interactive session over a single scratch namespace, so bindings
/// persist from one line to the next.
pub struct Repl {
    runtime: Runtime,
    module: ModuleId,
}

impl Repl {
    pub fn new(root: impl Into<std::path::PathBuf>, debug: bool) -> Self {
        let mut runtime = Runtime::new(root, debug);
        let module = runtime.scratch_module("<repl>");
        Self { runtime, module }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(|err| {
            BryonyError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
        })?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.runtime.eval_in(self.module, trimmed, "<repl>") {
                        Ok(Value::Null) => {}
                        Ok(value) => {
                            println!("{value}");
                        }
                        Err(BryonyError::Diagnostic(diag)) => {
                            eprintln!("{:?} error: {diag}", diag.kind);
                        }
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(BryonyError::from(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        err,
                    )));
                }
            }
        }
        Ok(())
    }
}
