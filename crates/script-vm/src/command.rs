//! The compiled intermediate representation: code units, commands, requests,
//! and arguments. Produced by an upstream compiler; the engine only consumes
//! this shape (§6 External Interfaces).

use std::{collections::HashMap, rc::Rc};

use serde::{Deserialize, Serialize};

/// A built-in keyword recognized by the dispatcher (§4.5).
///
/// `strum::Display` gives each variant a stable lowercase name for error
/// messages and tracing without hand-writing a `match`; `serde` lets a
/// compiled code unit carry keywords as plain strings in its on-disk form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    EndIf,
    While,
    EndWhile,
    For,
    EndFor,
    Case,
    When,
    EndCase,
    Continue,
    Break,
    Bind,
    Deliver,
    Swap,
    Return,
    Fn,
    EndFn,
    TypeId,
    Dir,
    Exist,
    Convert,
    RefCount,
    NullObj,
    Destroy,
    Hash,
}

/// What kind of request a [`Command`] carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Malformed/placeholder slot. Encountering this at dispatch time is a
    /// frontend panic (§4.1 step 4).
    Null,
    /// A built-in keyword.
    Command(Keyword),
    /// An external (function/method) call. `domain` is `Some` for a method
    /// call resolved on a receiver object evaluated from an argument
    /// (§4.2); `None` for a free-function call.
    Ext { id: Rc<str>, domain: Option<Box<Argument>> },
}

/// Options recorded on a [`Command`] by the compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    /// The call's result is discarded; nothing is pushed to the return stack.
    pub void_call: bool,
    /// For `bind`: always create a fresh binding in the current scope rather
    /// than overwriting an enclosing one of the same name.
    pub local_object: bool,
    /// Start-of-block source index, for block-opening keywords.
    pub nest: Option<usize>,
    /// End-of-block source index (the matching `end`), for block-opening
    /// keywords and their matching `end`.
    pub nest_end: Option<usize>,
    /// Root-of-block source index, used by `continue`/`break` to find the
    /// loop being escaped when nested.
    pub nest_root: Option<usize>,
    /// For `continue`/`break`: how many enclosing `{condition, jump, scope}`
    /// triples to pop before jumping.
    pub escape_depth: usize,
}

/// What kind of value an [`Argument`] names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArgKind {
    /// A literal recorded in the IR itself.
    Normal(Literal),
    /// A name to resolve on the object stack (§4.7).
    ObjectStack(Rc<str>),
    /// A value produced by a preceding command in the same frame, consumed
    /// positionally from the frame's return stack.
    ReturnStack,
    Null,
}

/// A literal argument's parsed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Already unwrapped of its surrounding `"…"` by the compiler.
    String(Rc<str>),
    /// An identifier used as a bare string value (e.g. a parameter name in a
    /// `fn` argument list).
    Identifier(Rc<str>),
}

/// One argument to a [`Command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    pub kind: ArgKind,
}

impl Argument {
    pub fn literal(lit: Literal) -> Self {
        Self { kind: ArgKind::Normal(lit) }
    }

    pub fn object_stack(name: impl Into<Rc<str>>) -> Self {
        Self { kind: ArgKind::ObjectStack(name.into()) }
    }

    pub fn return_stack() -> Self {
        Self { kind: ArgKind::ReturnStack }
    }

    pub fn null() -> Self {
        Self { kind: ArgKind::Null }
    }
}

/// A request plus its argument list (evaluated right-to-left, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub request: Request,
    pub source_index: usize,
    pub options: RequestOptions,
    pub args: Vec<Argument>,
}

/// Static branch targets for one `if`/`case`/`while` instance, keyed by the
/// source index of the block-opening command (§6, "static jump table").
/// The compiler emits these; the VM never re-scans code to compute them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JumpTable(pub HashMap<usize, Vec<usize>>);

impl JumpTable {
    pub fn targets(&self, source_index: usize) -> &[usize] {
        self.0.get(&source_index).map_or(&[], Vec::as_slice)
    }
}

/// An ordered sequence of commands compiled from one lexical body, plus its
/// static jump table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeUnit {
    pub commands: Vec<Command>,
    pub jump_table: JumpTable,
}

impl CodeUnit {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Command> {
        self.commands.get(idx)
    }
}
