//! Function resolution (§4.2), argument binding (§4.3), and call execution
//! including the tail-recursion/tail-call transforms (§4.4).

use std::rc::Rc;

use crate::{
    bytecode::{ArgKind, Argument, Command, Keyword, Request},
    engine::Engine,
    error::{EngineError, EngineResult},
    frame::RuntimeFrame,
    function::{DefinedFunction, FunctionValue, ParamPattern},
    limits::ResourceTracker,
    object::Object,
    registry::{ArgMap, FREE_DOMAIN, Message, MessageCode},
    stack::USER_FUNC_NAME,
};

/// Whether a call site sits in tail position, and if so, whether the callee
/// is the enclosing function itself (tail recursion) or another function
/// (tail call). See §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallPosition {
    Regular,
    TailRecursion,
    TailCall,
}

impl<R: ResourceTracker> Engine<R> {
    /// Executes one `Ext` command: resolves the callee, binds arguments,
    /// then dispatches to native/defined call execution.
    pub(crate) fn exec_call(
        &mut self,
        id: Rc<str>,
        domain: Option<Box<Argument>>,
        command: &Command,
    ) -> EngineResult<()> {
        let (function, receiver) = self.resolve_function(domain.as_deref(), &id)?;
        let mut arg_map = self.bind_arguments(&function, &command.args, command.source_index)?;
        if let Some(receiver) = receiver {
            arg_map.insert(Rc::from("me"), receiver);
        }
        self.dispatch_call(function, arg_map, command)
    }

    /// §4.2 function resolution.
    fn resolve_function(
        &mut self,
        domain: Option<&Argument>,
        id: &str,
    ) -> EngineResult<(Rc<FunctionValue>, Option<Object>)> {
        if let Some(domain_arg) = domain {
            // Domain resolution peeks the return stack: it must not consume
            // a value the command's own argument list still needs (§4.2).
            let receiver = self.eval_argument(domain_arg, true)?;
            let type_id = receiver.unpacked_type_id();
            let function = self
                .functions
                .lookup(&type_id, id)
                .ok_or_else(|| EngineError::resolution(format!("method '{id}' is not found on type '{type_id}'")))?;
            return Ok((function, Some(receiver)));
        }

        if let Some(function) = self.functions.lookup(FREE_DOMAIN, id) {
            return Ok((function, None));
        }
        if let Some(obj) = self.objects.find(id) {
            if let Some(function) = obj.as_function() {
                return Ok((function, None));
            }
        }
        Err(EngineError::resolution(format!("function '{id}' is not found")))
    }

    /// The internal resolution path used by built-ins that need to invoke a
    /// type's own method (e.g. `compare`, `head`, `step_forward`) given an
    /// explicit type id, bypassing the object-stack fallback used for
    /// ordinary calls.
    pub(crate) fn fetch_function_impl(&self, id: &str, type_id: &str) -> EngineResult<Rc<FunctionValue>> {
        self.functions
            .lookup(type_id, id)
            .ok_or_else(|| EngineError::resolution(format!("method '{id}' is not found on type '{type_id}'")))
    }

    /// §4.3 argument binding across the three parameter patterns.
    fn bind_arguments(&mut self, function: &FunctionValue, args: &[Argument], source_index: usize) -> EngineResult<ArgMap> {
        let params = function.params();
        let values = self.eval_args_right_to_left(args)?;
        let mut map = ArgMap::default();

        match function.pattern() {
            ParamPattern::Normal => {
                if values.len() != params.len() {
                    return Err(EngineError::type_or_arity(format!(
                        "{} arguments: expected {}, got {}",
                        if values.len() > params.len() { "too many" } else { "too few" },
                        params.len(),
                        values.len()
                    ))
                    .at(source_index));
                }
                for (name, mut value) in params.iter().zip(values) {
                    value.set_deliver(false);
                    map.insert(Rc::clone(name), value);
                }
            }
            ParamPattern::AutoSize => {
                let fixed = params.len() - 1;
                if values.len() < fixed {
                    return Err(EngineError::type_or_arity(format!(
                        "too few arguments: expected at least {fixed}, got {}",
                        values.len()
                    ))
                    .at(source_index));
                }
                let mut values = values;
                let pack: Vec<Object> = values.split_off(fixed);
                for (name, mut value) in params[..fixed].iter().zip(values) {
                    value.set_deliver(false);
                    map.insert(Rc::clone(name), value);
                }
                let pack = pack.into_iter().map(|mut v| { v.set_deliver(false); v }).collect();
                map.insert(Rc::clone(&params[fixed]), Object::array(pack));
            }
            ParamPattern::AutoFill => {
                let limit = function.limit();
                if values.len() < limit || values.len() > params.len() {
                    return Err(EngineError::type_or_arity(format!(
                        "expected between {limit} and {} arguments, got {}",
                        params.len(),
                        values.len()
                    ))
                    .at(source_index));
                }
                // Bind from the right: the supplied values line up with the
                // trailing `values.len()` parameters; earlier parameters
                // (past the supplied count) get null.
                let missing = params.len() - values.len();
                for name in &params[..missing] {
                    map.insert(Rc::clone(name), Object::null());
                }
                for (name, mut value) in params[missing..].iter().zip(values) {
                    value.set_deliver(false);
                    map.insert(Rc::clone(name), value);
                }
            }
        }
        Ok(map)
    }

    /// §4.4 call execution: native dispatch (including `Interface`
    /// re-resolution) or the three IR-bodied stack-frame transitions.
    fn dispatch_call(&mut self, function: Rc<FunctionValue>, arg_map: ArgMap, command: &Command) -> EngineResult<()> {
        match function.as_ref() {
            FunctionValue::Native(native) => {
                let message = (native.func)(&arg_map);
                self.handle_native_message(message, arg_map, command)
            }
            FunctionValue::Defined(defined) => {
                let position = self.call_position(command, defined.id.as_ref());
                match position {
                    CallPosition::TailRecursion | CallPosition::TailCall => {
                        self.do_tail_transform(Rc::clone(defined), arg_map)
                    }
                    CallPosition::Regular => {
                        self.resources.check_recursion_depth(self.frames.len())?;
                        self.push_regular_call(defined, arg_map)
                    }
                }
            }
        }
    }

    fn handle_native_message(&mut self, message: Message, arg_map: ArgMap, command: &Command) -> EngineResult<()> {
        match message.code {
            MessageCode::Success | MessageCode::Object => {
                if !command.options.void_call {
                    self.frames.last_mut().expect("native call with no frame").return_stack.push(message.value);
                }
                Ok(())
            }
            MessageCode::Interface => {
                let (domain, id) = message
                    .interface_target()
                    .ok_or_else(|| EngineError::resolution("malformed Interface message"))?;
                let function = if domain.is_empty() {
                    self.functions
                        .lookup(FREE_DOMAIN, id)
                        .ok_or_else(|| EngineError::resolution(format!("function '{id}' is not found")))?
                } else {
                    self.fetch_function_impl(id, domain)?
                };
                self.dispatch_call(function, arg_map, command)
            }
            MessageCode::NormalParam | MessageCode::AutoFill | MessageCode::AutoSize => {
                // These codes describe which binding pattern the native
                // function expects; a well-formed registry entry never
                // returns them from a call (they exist for introspection by
                // the registration API), so seeing one here is a bug in the
                // registered function.
                Err(EngineError::invariant(format!(
                    "native function returned a binding-pattern code ({:?}) instead of a result",
                    message.code
                )))
            }
            MessageCode::IllegalParam
            | MessageCode::IllegalCall
            | MessageCode::IllegalSymbol
            | MessageCode::BadStream
            | MessageCode::BadExpression => Err(EngineError::propagated(message.detail)),
        }
    }

    /// Determines whether `command` is a self-call or other-call in tail
    /// position (§4.4).
    fn call_position(&self, command: &Command, callee_id: &str) -> CallPosition {
        let frame = self.frames.last().expect("call with no active frame");
        if !is_tail_position(frame, command.source_index, command.options.void_call) {
            return CallPosition::Regular;
        }
        match &frame.function_scope {
            Some(current_id) if current_id.as_ref() == callee_id => CallPosition::TailRecursion,
            _ => CallPosition::TailCall,
        }
    }

    /// Pushes a fresh frame for a non-tail call to an IR-bodied function.
    ///
    /// `jump_offset` is always 0 here: `defined.body` is the full enclosing
    /// code unit (never re-sliced), so jump-table targets and `nest_end`
    /// values recorded against it are already absolute and need no rebasing.
    pub(crate) fn push_regular_call(&mut self, defined: &DefinedFunction, arg_map: ArgMap) -> EngineResult<()> {
        let base = self.objects.depth();
        self.objects.push();
        self.bind_into_current_scope(defined, arg_map);
        let mut frame = RuntimeFrame::new(Rc::clone(&defined.body), defined.offset, 0, defined.end, base);
        frame.function_scope = Some(Rc::clone(&defined.id));
        self.tracer.on_call(defined.id.as_ref(), self.frames.len() + 1);
        self.frames.push(frame);
        Ok(())
    }

    /// The tail-recursion/tail-call transform (§4.4): reuses the current
    /// frame and object-stack scope instead of pushing new ones. Arguments
    /// are naturalized (any `Ref` wrapper detached via `copy()`) first,
    /// since the scope the refs point into is about to be cleared.
    fn do_tail_transform(&mut self, defined: Rc<DefinedFunction>, arg_map: ArgMap) -> EngineResult<()> {
        let natural: ArgMap = arg_map.into_iter().map(|(k, v)| (k, v.copy())).collect();
        {
            let frame = self.frames.last_mut().expect("tail call with no active frame");
            frame.reset_for_tail(Rc::clone(&defined.body), defined.offset, 0, defined.end, Rc::clone(&defined.id));
        }
        self.objects.clear_current();
        self.bind_into_current_scope(&defined, natural);
        self.tracer.on_call(defined.id.as_ref(), self.frames.len());
        Ok(())
    }

    fn bind_into_current_scope(&mut self, defined: &DefinedFunction, arg_map: ArgMap) {
        for (name, value) in arg_map {
            self.objects.create_object(name, value);
        }
        self.objects.create_object(USER_FUNC_NAME, Object::string(Rc::clone(&defined.id)));
        if let Some(closure) = &defined.closure {
            for (name, value) in closure {
                self.objects.create_object(Rc::clone(name), value.copy());
            }
        }
    }

    /// §4.4 `return`: aggregates 0/1/N≥2 argument values into null/value/array,
    /// then unwinds the object stack up to (and including) the scope that
    /// bound `__user_func`, pops the frame, and pushes the result onto the
    /// caller's return stack. A top-level `return` instead records the
    /// script's final value and ends the run.
    pub(crate) fn exec_return(&mut self, command: &Command) -> EngineResult<()> {
        let values = self.eval_args_right_to_left(&command.args)?;
        let result = match values.len() {
            0 => Object::null(),
            1 => values.into_iter().next().expect("checked len == 1"),
            _ => Object::array(values),
        };

        let frame = self.frames.last().expect("return with no active frame");
        let base = frame.object_stack_base;
        self.objects.truncate(base);

        if self.frames.len() == 1 {
            self.frames.last_mut().expect("frame present").idx = self.frames[0].code.len();
            self.set_final_value(result);
            return Ok(());
        }

        self.frames.pop();
        self.tracer.on_return(self.frames.len());
        self.frames.last_mut().expect("caller frame present").return_stack.push(result);
        Ok(())
    }
}

/// §4.4 tail-position test: the command is the last one in the current
/// frame's own body, or the second-to-last followed by a `return` of exactly
/// one `ReturnStack` argument on a non-`void_call` command. Bounded by
/// `frame.body_end` rather than `frame.code.len()`, since a called function's
/// body is never re-sliced out of the enclosing code unit (§4.4 design note).
fn is_tail_position(frame: &RuntimeFrame, source_index: usize, void_call: bool) -> bool {
    let last_idx = frame.body_end - 1;
    if source_index == last_idx {
        return true;
    }
    if void_call || source_index + 1 != last_idx {
        return false;
    }
    match frame.code.get(last_idx) {
        Some(next) => is_single_return_stack_return(next),
        None => false,
    }
}

fn is_single_return_stack_return(command: &Command) -> bool {
    matches!(command.request, Request::Command(Keyword::Return))
        && command.args.len() == 1
        && matches!(command.args[0].kind, ArgKind::ReturnStack)
}

