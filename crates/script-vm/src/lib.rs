//! A stack-based virtual machine for a small dynamic scripting language.
//!
//! The engine consumes a compiled [`bytecode::CodeUnit`] produced by an
//! external frontend and drives it to completion via [`engine::Engine`].
//! Everything upstream of the IR (lexer, parser, standard-library modules)
//! is out of scope here; this crate owns the dispatcher, the value model,
//! and the function-call protocol.

mod builtins;
mod bytecode;
mod call;
mod command;
mod engine;
mod error;
mod frame;
mod function;
mod limits;
mod object;
mod registry;
mod stack;
mod stdlib;
mod tracer;

pub use crate::{
    bytecode::{ArgKind, Argument, Command, CodeUnit, JumpTable, Keyword, Literal, Request, RequestOptions},
    engine::Engine,
    error::{EngineError, EngineResult, ErrorKind},
    function::{ClosureRecord, DefinedFunction, FunctionValue, NativeFunction, ParamPattern, classify_params},
    limits::{Limits, NoLimitTracker, ResourceTracker},
    object::{Content, IterSource, IterState, Object, PlainScalar, Slot},
    registry::{ArgMap, FREE_DOMAIN, FunctionRegistry, Level, Message, MessageCode, NativeFn, TypeRegistry, TypeTraits},
    stdlib::register_builtin_types,
    tracer::{NoopTracer, StderrTracer, Tracer},
};
