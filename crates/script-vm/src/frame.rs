//! Per-call execution state (§3 "Runtime frame").

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{bytecode::CodeUnit, object::Object};

/// Per-call state, mutated only by the dispatcher. Destroyed on return,
/// along with the object-stack scopes it owns.
pub struct RuntimeFrame {
    /// The code unit this frame is executing.
    pub code: Rc<CodeUnit>,
    /// Program counter: index of the next command to decode.
    pub idx: usize,
    /// Rebase applied to jump targets recorded against an enclosing unit's
    /// source indices, when this frame is running a nested body sliced from
    /// a larger one.
    pub jump_offset: usize,
    /// One past the last command index that belongs to this frame's own
    /// body: `code.len()` at top level, or the owning function's `end` for a
    /// called function. Bounds the tail-position test (§4.4) to this frame's
    /// own body instead of the whole (never re-sliced) `code` unit.
    pub body_end: usize,
    /// LIFO of end-of-block targets, one per currently open block. Block
    /// nesting rarely runs deep, so this is inline-stored up to 8 levels
    /// before spilling to the heap, mirroring the reference interpreter's use
    /// of `SmallVec` for its own per-call argument/kwarg buffers.
    pub jump_stack: SmallVec<[usize; 8]>,
    /// LIFO of branch targets (elif/when/else), pre-loaded from the static
    /// jump table when an `if`/`case`/`while` opens.
    pub branch_jump_stack: Vec<Vec<usize>>,
    /// Values produced by preceding commands in this frame, consumed
    /// positionally (LIFO).
    pub return_stack: SmallVec<[Object; 4]>,
    /// LIFO of "does this block own an object-stack scope" flags, one per
    /// open block.
    pub scope_stack: SmallVec<[bool; 8]>,
    /// LIFO of "has a prior branch in this if/elif/case chain already
    /// matched" flags.
    pub condition_stack: SmallVec<[bool; 8]>,

    pub error: Option<crate::error::EngineError>,
    pub warning: Option<String>,
    pub final_cycle: bool,
    pub activated_continue: bool,
    pub activated_break: bool,
    pub jump_from_end: bool,
    pub void_call: bool,
    pub disable_step: bool,

    /// The owning function's id, empty at top level. Used by `return` to
    /// know how far to unwind the object stack (up to and including the
    /// scope that binds `__user_func`).
    pub function_scope: Option<Rc<str>>,
    pub msg_string: Option<String>,
    /// Object-stack depth when this frame was pushed; `return`/pop unwind to
    /// exactly this depth.
    pub object_stack_base: usize,
}

impl RuntimeFrame {
    pub fn new(code: Rc<CodeUnit>, idx: usize, jump_offset: usize, body_end: usize, object_stack_base: usize) -> Self {
        Self {
            code,
            idx,
            jump_offset,
            body_end,
            jump_stack: SmallVec::new(),
            branch_jump_stack: Vec::new(),
            return_stack: SmallVec::new(),
            scope_stack: SmallVec::new(),
            condition_stack: SmallVec::new(),
            error: None,
            warning: None,
            final_cycle: false,
            activated_continue: false,
            activated_break: false,
            jump_from_end: false,
            void_call: false,
            disable_step: false,
            function_scope: None,
            msg_string: None,
            object_stack_base,
        }
    }

    /// Resets in-place for a tail recursion/tail call transform (§4.4):
    /// preserves `function_scope`, rebinds the code pointer and offset, and
    /// clears all block bookkeeping so the callee starts from a clean slate.
    pub fn reset_for_tail(&mut self, code: Rc<CodeUnit>, idx: usize, jump_offset: usize, body_end: usize, function_id: Rc<str>) {
        self.code = code;
        self.idx = idx;
        self.jump_offset = jump_offset;
        self.body_end = body_end;
        self.jump_stack.clear();
        self.branch_jump_stack.clear();
        self.scope_stack.clear();
        self.condition_stack.clear();
        self.final_cycle = false;
        self.activated_continue = false;
        self.activated_break = false;
        self.jump_from_end = false;
        // Like `goto`, this repositions `idx` outside of sequential flow, so
        // the dispatch loop's post-command auto-increment must be suppressed
        // once for the reused frame, or the callee's first body command
        // would be skipped.
        self.disable_step = true;
        self.function_scope = Some(function_id);
    }
}
