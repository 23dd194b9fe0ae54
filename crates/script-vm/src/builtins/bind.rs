//! `bind`/`deliver`/`swap` (§4.5 "Binding").

use std::rc::Rc;

use crate::{
    bytecode::{ArgKind, Command},
    engine::Engine,
    error::{EngineError, EngineResult},
    limits::ResourceTracker,
    object::Object,
};

/// Where a `bind`/`deliver`/`swap` operand writes: either straight through a
/// `Ref` object (aliasing, e.g. an array element), or by name into the
/// object stack.
pub(crate) enum Target {
    Ref(Object),
    Named(Rc<str>),
}

pub(crate) fn resolve_target(lhs_value: Object) -> EngineResult<Target> {
    if lhs_value.is_ref() {
        Ok(Target::Ref(lhs_value))
    } else {
        let name = lhs_value
            .as_str()
            .ok_or_else(|| EngineError::invariant("bind/deliver/swap target must be a ref or an identifier"))?;
        Ok(Target::Named(name))
    }
}

fn read_target<R: ResourceTracker>(engine: &Engine<R>, target: &Target) -> EngineResult<Object> {
    match target {
        Target::Ref(r) => Ok(r.unpack()),
        Target::Named(name) => engine
            .objects
            .find(name)
            .cloned()
            .ok_or_else(|| EngineError::resolution(format!("'{name}' is not defined"))),
    }
}

pub(crate) fn write_target<R: ResourceTracker>(engine: &mut Engine<R>, target: &Target, value: Object, local_object: bool) {
    match target {
        Target::Ref(r) => {
            let mut r = r.clone();
            r.write_through(value);
        }
        Target::Named(name) => {
            if !local_object {
                if let Some(existing) = engine.objects.find_mut(name) {
                    *existing = value;
                    return;
                }
            }
            engine.objects.create_object(Rc::clone(name), value);
        }
    }
}

pub(crate) fn exec_bind<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let [lhs, rhs] = <[Object; 2]>::try_from(values).map_err(|_| EngineError::type_or_arity("bind requires exactly 2 operands"))?;
    let target = resolve_target(lhs)?;
    write_target(engine, &target, rhs.copy(), command.options.local_object);
    Ok(())
}

/// Like `bind`, but always moves the source's content (per the type's
/// shallow-delivery rule, bypassing the `deliver` flag check) and nulls out
/// the source binding afterward, when the source was itself a named binding.
pub(crate) fn exec_deliver<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let lhs_value = engine.eval_argument(&command.args[0], false)?;
    let target = resolve_target(lhs_value)?;

    let rhs_arg = &command.args[1];
    let moved = match &rhs_arg.kind {
        ArgKind::ObjectStack(name) => {
            let mut current = engine
                .objects
                .find(name)
                .cloned()
                .ok_or_else(|| EngineError::resolution(format!("'{name}' is not defined")))?;
            current.set_deliver(true);
            let moved = current.copy();
            if let Some(slot) = engine.objects.find_mut(name) {
                *slot = Object::null();
            }
            moved
        }
        ArgKind::Normal(_) | ArgKind::ReturnStack | ArgKind::Null => engine.eval_argument(rhs_arg, false)?,
    };

    write_target(engine, &target, moved, command.options.local_object);
    Ok(())
}

pub(crate) fn exec_swap<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let a_value = engine.eval_argument(&command.args[0], false)?;
    let b_value = engine.eval_argument(&command.args[1], false)?;
    let a = resolve_target(a_value)?;
    let b = resolve_target(b_value)?;

    let a_current = read_target(engine, &a)?;
    let b_current = read_target(engine, &b)?;

    write_target(engine, &a, b_current, false);
    write_target(engine, &b, a_current, false);
    Ok(())
}
