use std::fmt;

use thiserror::Error;

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unterminated string, unknown escape, unexpected character.
    Lex,
    /// Unexpected token, malformed construct.
    Parse,
    /// Undefined variable or function.
    Name,
    /// Wrong operand types for an operator, call, or index.
    Type,
    /// Division/modulo by zero, out-of-bounds list write, arity mismatch,
    /// control flow escaping its boundary, recursion limit.
    Range,
    /// Missing or unreadable source file.
    Module,
}

/// A structured error carrying file, line, column, and message.
///
/// Every failure inside the interpreter is one of these; the scripted
/// language has no recoverable error handling of its own, so a diagnostic
/// unwinds straight to the host boundary that invoked the runtime.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: "<unknown>".into(),
            line: 1,
            col: 1,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, col: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self.col = col;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.col, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Bryony toolchain.
#[derive(Debug, Error)]
pub enum BryonyError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BryonyError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BryonyError::Diagnostic(diag) => Some(diag.kind),
            BryonyError::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BryonyError>;

/// A failure raised inside a native-bridge function, before the evaluator
/// has attached the call-site position to it.
#[derive(Debug)]
pub struct NativeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl NativeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
