//! Execution tracing hooks (ambient stack, §2.1).
//!
//! Mirrors the reference interpreter's `VmTracer` trait: a `NoopTracer` is
//! the default and costs nothing at the call sites that invoke it, while a
//! `StderrTracer` prints a line per dispatched command for debugging. The
//! reference interpreter monomorphizes its VM over the tracer type parameter
//! to get a truly zero-cost no-op; this crate instead takes `&mut dyn Tracer`,
//! trading a small amount of dispatch overhead for a simpler `Engine` type
//! that doesn't need to be generic over tracing. See `DESIGN.md` for the
//! rationale.

use crate::command::Command;

/// Hook points at key dispatch events. Implementors only need to override
/// the events they care about.
pub trait Tracer {
    fn on_dispatch(&mut self, _source_index: usize, _command: &Command) {}
    fn on_call(&mut self, _function_name: &str, _depth: usize) {}
    fn on_return(&mut self, _depth: usize) {}
    fn on_error(&mut self, _message: &str) {}
}

/// Zero-op tracer; the default.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Prints one human-readable line per traced event to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_dispatch(&mut self, source_index: usize, command: &Command) {
        eprintln!("[{source_index}] {:?}", command.request);
    }

    fn on_call(&mut self, function_name: &str, depth: usize) {
        eprintln!("-> call {function_name} (depth {depth})");
    }

    fn on_return(&mut self, depth: usize) {
        eprintln!("<- return (depth {depth})");
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("!! {message}");
    }
}
