//! `fn` function definition and closure capture (§4.6).
//!
//! A parameter's optional/variable marker is carried in its own spelling:
//! the compiler emits a trailing `?` for an AutoFill parameter and a
//! trailing `*` for the AutoSize pack parameter, stripped here before the
//! name is bound.

use std::{collections::HashSet, rc::Rc};

use crate::{
    bytecode::Command,
    engine::Engine,
    error::{EngineError, EngineResult},
    function::{ClosureRecord, DefinedFunction, FunctionValue, classify_params},
    limits::ResourceTracker,
    object::Object,
    stack::{CASE_NAME, ITERATOR_NAME, USER_FUNC_NAME},
};

struct ParamSpec {
    name: Rc<str>,
    optional: bool,
    variable: bool,
}

fn parse_param_spec(spec: &str) -> ParamSpec {
    if let Some(stripped) = spec.strip_suffix('*') {
        ParamSpec { name: Rc::from(stripped), optional: false, variable: true }
    } else if let Some(stripped) = spec.strip_suffix('?') {
        ParamSpec { name: Rc::from(stripped), optional: true, variable: false }
    } else {
        ParamSpec { name: Rc::from(spec), optional: false, variable: false }
    }
}

pub(crate) fn exec_fn<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let bind_name = engine
        .eval_argument(&command.args[0], false)?
        .as_str()
        .ok_or_else(|| EngineError::invariant("fn requires an identifier to bind"))?;

    let mut names = Vec::with_capacity(command.args.len().saturating_sub(1));
    let mut optional = Vec::with_capacity(names.capacity());
    let mut variable = Vec::with_capacity(names.capacity());
    for arg in &command.args[1..] {
        let spec = engine
            .eval_argument(arg, false)?
            .as_str()
            .ok_or_else(|| EngineError::invariant("fn parameter must be an identifier"))?;
        let parsed = parse_param_spec(&spec);
        names.push(parsed.name);
        optional.push(parsed.optional);
        variable.push(parsed.variable);
    }

    let (pattern, limit) = classify_params(&names, &optional, &variable)?;

    let nest = command.options.nest.expect("fn command missing nest");
    let nest_end = command.options.nest_end.expect("fn command missing nest_end");
    let offset = nest + 1;

    let frame = engine.frames.last().expect("fn with no active frame");
    let body = Rc::clone(&frame.code);
    let closure = if engine.frames.len() > 1 { Some(capture_closure(engine)) } else { None }.flatten();

    let defined = DefinedFunction { id: Rc::clone(&bind_name), params: names, pattern, limit, offset, end: nest_end, body, closure };
    engine.objects.create_object(Rc::clone(&bind_name), Object::function(Rc::new(FunctionValue::Defined(defined))));

    let frame = engine.frames.last_mut().expect("fn with no active frame");
    crate::builtins::control::goto(frame, nest_end);
    Ok(())
}

/// Scans the object stack from the innermost scope outward until (and
/// including) the scope that binds `__user_func`, copying each unseen name
/// (innermost binding wins on shadowing).
fn capture_closure<R: ResourceTracker>(engine: &Engine<R>) -> Option<ClosureRecord> {
    let base = engine.objects.scope_index_of(USER_FUNC_NAME)?;
    let scopes: Vec<_> = engine.objects.scopes_from(base).collect();

    let mut seen = HashSet::new();
    let mut record = Vec::new();
    for container in scopes.iter().rev() {
        for name in container.names() {
            // These are VM-internal markers, not user bindings; capturing
            // them would let a stale `__user_func` overwrite the callee's
            // own binding once the closure record is merged back in.
            if name.as_ref() == USER_FUNC_NAME || name.as_ref() == ITERATOR_NAME || name.as_ref() == CASE_NAME {
                continue;
            }
            if seen.insert(Rc::clone(name)) {
                let value = container.find(name).expect("name came from this container").copy();
                record.push((Rc::clone(name), value));
            }
        }
    }
    Some(record)
}
