//! Engine-level error type.
//!
//! Every fallible engine operation returns [`EngineResult`]. The reference
//! interpreter this crate is modeled on hand-rolls `Display` on its exception
//! kind enum rather than pulling in `thiserror`; this crate does the same,
//! since the error surface here is small and fixed.

use std::fmt;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Broad classification of engine errors, used by callers that want to
/// pattern-match without parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed IR: a `Null` request was encountered in a position that
    /// should always hold a decodable command.
    FrontendPanic,
    /// A function, method, or named object could not be resolved.
    Resolution,
    /// Wrong argument count, wrong operand type, or other arity/type mismatch.
    TypeOrArity,
    /// Misuse of a control-flow keyword outside its matching block, or an
    /// illegal function-definition shape (e.g. `variable` not last).
    Invariant,
    /// A native function returned a `Message` at error level.
    Propagated,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FrontendPanic => "frontend panic",
            Self::Resolution => "resolution error",
            Self::TypeOrArity => "type/arity error",
            Self::Invariant => "invariant violation",
            Self::Propagated => "propagated error",
        };
        f.write_str(s)
    }
}

/// An error raised during execution, tagged with the offending command's
/// source index so the driver can report exactly where it happened.
#[derive(Debug, Clone)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    /// Source index of the command that raised the error, when known.
    pub source_index: Option<usize>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source_index: None }
    }

    #[must_use]
    pub fn at(mut self, source_index: usize) -> Self {
        self.source_index = Some(source_index);
        self
    }

    pub fn frontend_panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FrontendPanic, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message)
    }

    pub fn type_or_arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeOrArity, message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invariant, message)
    }

    pub fn propagated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Propagated, message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_index {
            Some(idx) => write!(f, "{}: {} (at command {idx})", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for EngineError {}
