//! Resource limits (ambient stack, §2.1 / §5).
//!
//! Mirrors the reference interpreter's `ResourceTracker`/`ResourceLimits`
//! split: a trait for the policy decision, a concrete struct carrying the
//! numbers, and a unit-type implementation for "unbounded". Exceeding a
//! limit surfaces as an ordinary [`EngineError`], never a panic or abort.

use crate::error::EngineError;

pub trait ResourceTracker {
    /// Called once per regular (non-tail) call push. `depth` is the frame
    /// stack depth *before* the push.
    fn check_recursion_depth(&self, depth: usize) -> Result<(), EngineError>;
    /// Called once per dispatched command.
    fn check_operation_count(&mut self, count: u64) -> Result<(), EngineError>;
}

/// No limits: every check succeeds. The default for embedding contexts that
/// trust their own code units.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    fn check_recursion_depth(&self, _depth: usize) -> Result<(), EngineError> {
        Ok(())
    }

    fn check_operation_count(&mut self, _count: u64) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Concrete ceilings for recursion depth and total dispatched commands.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_recursion_depth: usize,
    pub max_operations: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_recursion_depth: 1_000, max_operations: 50_000_000 }
    }
}

impl ResourceTracker for Limits {
    fn check_recursion_depth(&self, depth: usize) -> Result<(), EngineError> {
        if depth >= self.max_recursion_depth {
            return Err(EngineError::invariant(format!(
                "maximum recursion depth exceeded: {depth} >= {}",
                self.max_recursion_depth
            )));
        }
        Ok(())
    }

    fn check_operation_count(&mut self, count: u64) -> Result<(), EngineError> {
        if count > self.max_operations {
            return Err(EngineError::invariant(format!(
                "operation limit exceeded: {count} > {}",
                self.max_operations
            )));
        }
        Ok(())
    }
}
