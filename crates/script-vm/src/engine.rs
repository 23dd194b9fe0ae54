//! The [`Engine`]: owns the frame stack, object stack, and the process-wide
//! registries, and drives the dispatch loop (§4.1).

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    bytecode::{ArgKind, Argument, CodeUnit, Keyword, Literal, Request},
    command::Command,
    error::{EngineError, EngineResult, ErrorKind},
    frame::RuntimeFrame,
    limits::{Limits, ResourceTracker},
    object::Object,
    registry::{FunctionRegistry, TypeRegistry},
    stack::ObjectStack,
    tracer::{NoopTracer, Tracer},
};

/// Owns all engine state and drives execution to completion.
///
/// Generic over [`ResourceTracker`] so an embedder can opt into
/// [`crate::limits::NoLimitTracker`] for trusted code units without paying
/// for limit checks; the default, [`Limits`], enforces sane ceilings.
pub struct Engine<R: ResourceTracker = Limits> {
    pub(crate) frames: Vec<RuntimeFrame>,
    pub(crate) objects: ObjectStack,
    pub(crate) types: TypeRegistry,
    pub(crate) functions: FunctionRegistry,
    /// Named constants available from any scope, below the object stack in
    /// the name-resolution order described in §4.7.
    pub(crate) constants: AHashMap<Rc<str>, Object>,
    pub(crate) tracer: Box<dyn Tracer>,
    pub(crate) resources: R,
    /// Accumulated error trace (§7): every raised error is appended here,
    /// even ones later recovered from via `Invoke` unwinding.
    pub(crate) error_trace: Vec<EngineError>,
    op_count: u64,
    /// Set when a top-level `return` executes at frame-stack depth 1; holds
    /// the script's final value instead of pushing it onto a (nonexistent)
    /// caller.
    final_value: Option<Object>,
    /// Recorded frame-stack depth at the point an `Invoke` reentry began, so
    /// the inner dispatch loop knows when to stop (§5 "nested Invoke").
    invoke_stop_points: Vec<usize>,
}

impl Engine<Limits> {
    pub fn new(types: TypeRegistry, functions: FunctionRegistry) -> Self {
        Self::with_resources(types, functions, Limits::default())
    }
}

impl<R: ResourceTracker> Engine<R> {
    pub fn with_resources(types: TypeRegistry, functions: FunctionRegistry, resources: R) -> Self {
        Self {
            frames: Vec::new(),
            objects: ObjectStack::new(),
            types,
            functions,
            constants: AHashMap::new(),
            tracer: Box::new(NoopTracer),
            resources,
            error_trace: Vec::new(),
            op_count: 0,
            final_value: None,
            invoke_stop_points: Vec::new(),
        }
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = tracer;
    }

    pub fn define_constant(&mut self, name: impl Into<Rc<str>>, value: Object) {
        self.constants.insert(name.into(), value);
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn error_trace(&self) -> &[EngineError] {
        &self.error_trace
    }

    /// Runs a top-level code unit to completion (§4.1). Returns the script's
    /// final value: whatever a top-level `return` yielded, or `null` if the
    /// unit ran off the end without one.
    pub fn run(&mut self, code: Rc<CodeUnit>) -> EngineResult<Object> {
        let base = self.objects.depth();
        let body_end = code.len();
        self.frames.push(RuntimeFrame::new(code, 0, 0, body_end, base));
        let result = self.dispatch_loop();
        match &result {
            Ok(_) => debug_assert_eq!(self.frames.len(), 1, "top-level execution must return to depth 1"),
            Err(_) => {
                // Leave frames/objects as-is for post-mortem inspection via `error_trace`.
            }
        }
        result
    }

    /// The main loop (§4.1). Runs until the top-level frame is exhausted, an
    /// `Invoke` stop point is reached, or an error terminates execution.
    pub(crate) fn dispatch_loop(&mut self) -> EngineResult<Object> {
        loop {
            if let Some(&stop_at) = self.invoke_stop_points.last() {
                if self.frames.len() == stop_at {
                    return Ok(self.frames.last_mut().map(|f| f.return_stack.pop()).flatten().unwrap_or_else(Object::null));
                }
            }

            let depth = self.frames.len();
            let idx = self.frames[depth - 1].idx;
            let len = self.frames[depth - 1].body_end;

            if idx >= len {
                if depth > 1 {
                    self.pop_frame_without_value();
                    continue;
                }
                // Top-level unit exhausted with no explicit `return`.
                return Ok(self.final_value.take().unwrap_or_else(Object::null));
            }

            if let Some(warning) = self.frames[depth - 1].warning.take() {
                self.tracer.on_error(&format!("warning: {warning}"));
            }

            self.op_count += 1;
            self.resources.check_operation_count(self.op_count)?;

            let command = Rc::clone(&self.frames[depth - 1].code);
            let command = command.get(idx).cloned().ok_or_else(|| {
                EngineError::frontend_panic("program counter ran past the end of the code unit").at(idx)
            })?;

            self.tracer.on_dispatch(command.source_index, &command);
            self.frames[depth - 1].void_call = command.options.void_call;

            if matches!(command.request, Request::Null) {
                let err = EngineError::frontend_panic("encountered a Null request").at(command.source_index);
                self.error_trace.push(err.clone());
                return Err(err);
            }

            let is_return = matches!(command.request, Request::Command(Keyword::Return));

            let step_result = match &command.request {
                Request::Command(keyword) => self.exec_keyword(*keyword, &command),
                Request::Ext { id, domain } => self.exec_call(Rc::clone(id), domain.clone(), &command),
                Request::Null => unreachable!("handled above"),
            };

            if let Err(err) = step_result {
                let err = if err.source_index.is_some() { err } else { err.at(command.source_index) };
                self.error_trace.push(err.clone());
                self.frames[depth - 1].error = Some(err.clone());
                return Err(err);
            }

            if !is_return {
                let frame = &mut self.frames[depth - 1];
                if frame.disable_step {
                    frame.disable_step = false;
                } else {
                    frame.idx += 1;
                }
            }
        }
    }

    /// Pops the current frame with no return value, for the "ran off the end
    /// of a called function's body" case (§4.1 step 3).
    pub(crate) fn pop_frame_without_value(&mut self) {
        let frame = self.frames.pop().expect("pop_frame_without_value called with no frames");
        self.objects.truncate(frame.object_stack_base);
        self.tracer.on_return(self.frames.len());
        if let Some(caller) = self.frames.last_mut() {
            caller.return_stack.push(Object::null());
        }
    }

    pub(crate) fn set_final_value(&mut self, value: Object) {
        self.final_value = Some(value);
    }

    pub(crate) fn push_invoke_stop(&mut self) {
        self.invoke_stop_points.push(self.frames.len());
    }

    pub(crate) fn pop_invoke_stop(&mut self) {
        self.invoke_stop_points.pop();
    }

    /// Internal reentry used by built-ins that must call back into
    /// user-defined methods (e.g. `compare`, `head`, `step_forward`) while
    /// mid-dispatch. Records `stop_point = frame_stack.depth` and exits the
    /// (recursive) inner loop as soon as that depth is observed again (§5).
    pub(crate) fn invoke(&mut self, function: Rc<crate::function::FunctionValue>, args: crate::registry::ArgMap) -> EngineResult<Object> {
        match function.as_ref() {
            crate::function::FunctionValue::Native(native) => {
                let message = (native.func)(&args);
                if message.is_error() {
                    return Err(EngineError::propagated(message.detail));
                }
                Ok(message.value)
            }
            crate::function::FunctionValue::Defined(defined) => {
                self.push_invoke_stop();
                let pushed = self.push_regular_call(defined, args);
                if let Err(err) = pushed {
                    self.pop_invoke_stop();
                    return Err(err);
                }
                let result = self.dispatch_loop();
                self.pop_invoke_stop();
                result.map_err(|_| EngineError::propagated("invoking error"))
            }
        }
    }

    /// Evaluates one argument (§4.7). `peek` requests that a `ReturnStack`
    /// argument be peeked rather than consumed, for domain resolution that
    /// must not disturb the return stack.
    pub(crate) fn eval_argument(&mut self, arg: &Argument, peek: bool) -> EngineResult<Object> {
        match &arg.kind {
            ArgKind::Normal(lit) => Ok(literal_to_object(lit)),
            ArgKind::ObjectStack(name) => {
                if let Some(obj) = self.objects.find(name) {
                    return Ok(obj.clone());
                }
                if let Some(obj) = self.constants.get(name) {
                    return Ok(obj.clone());
                }
                if let Some(func) = self.functions.lookup(crate::registry::FREE_DOMAIN, name) {
                    return Ok(Object::function(func));
                }
                Err(EngineError::resolution(format!("'{name}' is not defined")))
            }
            ArgKind::ReturnStack => {
                let frame = self.frames.last_mut().expect("return stack argument with no active frame");
                if peek {
                    frame.return_stack.last().cloned().ok_or_else(|| {
                        EngineError::resolution("return stack is empty")
                    })
                } else {
                    frame.return_stack.pop().ok_or_else(|| EngineError::resolution("return stack is empty"))
                }
            }
            ArgKind::Null => Ok(Object::null()),
        }
    }

    /// Evaluates a command's whole argument list, right-to-left (§4.3/§4.7),
    /// returning values in source (left-to-right) order.
    pub(crate) fn eval_args_right_to_left(&mut self, args: &[Argument]) -> EngineResult<Vec<Object>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args.iter().rev() {
            values.push(self.eval_argument(arg, false)?);
        }
        values.reverse();
        Ok(values)
    }
}

fn literal_to_object(lit: &Literal) -> Object {
    match lit {
        Literal::Int(v) => Object::int(*v),
        Literal::Float(v) => Object::float(*v),
        Literal::Bool(v) => Object::bool(*v),
        Literal::String(v) => Object::string(Rc::clone(v)),
        Literal::Identifier(v) => Object::string(Rc::clone(v)),
    }
}

impl<R: ResourceTracker> Engine<R> {
    /// Dispatches one built-in keyword command.
    pub(crate) fn exec_keyword(&mut self, keyword: Keyword, command: &Command) -> EngineResult<()> {
        crate::builtins::dispatch(self, keyword, command)
    }
}

