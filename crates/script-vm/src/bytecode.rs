//! The compiled intermediate representation, re-exported under one name to
//! mirror how the engine's call sites refer to "the bytecode" as a unit
//! rather than naming the `command` module directly.

pub use crate::command::{ArgKind, Argument, Command, CodeUnit, JumpTable, Keyword, Literal, Request, RequestOptions};
