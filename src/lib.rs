//! Core library for the Bryony scripting language: lexing, parsing,
//! tree-walking evaluation, a path-keyed module system, and the native
//! bridge that lets a host drive turn-based simulations from scripts.

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod rng;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{BryonyError, Diagnostic, ErrorKind, Result};
pub use repl::Repl;
pub use runtime::{ModuleId, Runtime};
pub use value::{Event, Value};
