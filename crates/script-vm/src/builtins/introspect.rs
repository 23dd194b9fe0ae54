//! Introspection built-ins (§4.5): `typeid`, `dir`, `exist`, `convert`,
//! `ref_count`, `null_obj`, `destroy`, `hash`.
//!
//! `time`, `version`, and `code_name` are external-collaborator concerns (the
//! host environment/build, not the VM core) and have no [`Keyword`] variant
//! here.

use std::rc::Rc;

use crate::{
    bytecode::Command,
    engine::Engine,
    error::{EngineError, EngineResult},
    limits::ResourceTracker,
    object::{Content, Object},
    registry::ArgMap,
};

use super::{bind, push_result};

pub(crate) fn exec_typeid<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    push_result(engine, command, Object::string(value.unpacked_type_id()));
    Ok(())
}

pub(crate) fn exec_dir<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    let type_id = value.unpacked_type_id();
    let methods = engine.types().methods_of(&type_id).iter().map(|m| Object::string(Rc::clone(m))).collect();
    push_result(engine, command, Object::array(methods));
    Ok(())
}

pub(crate) fn exec_exist<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let [target, method] = <[Object; 2]>::try_from(values)
        .map_err(|_| EngineError::type_or_arity("exist requires exactly 2 operands"))?;
    let method_name = method.as_str().ok_or_else(|| EngineError::type_or_arity("exist's method name must be a string"))?;
    let exists = engine.types().has_method(&target.unpacked_type_id(), &method_name);
    push_result(engine, command, Object::bool(exists));
    Ok(())
}

/// `convert(value, target_type)`: string -> numeric/bool is a plain parse;
/// anything -> `"string"` calls the value's own type's `get_str` (§4.5).
pub(crate) fn exec_convert<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let [value, target] = <[Object; 2]>::try_from(values)
        .map_err(|_| EngineError::type_or_arity("convert requires exactly 2 operands"))?;
    let target_type = target.as_str().ok_or_else(|| EngineError::type_or_arity("convert's target type must be a string"))?;

    let converted = match target_type.as_ref() {
        "string" => {
            let type_id = value.unpacked_type_id();
            let get_str = engine.fetch_function_impl("get_str", &type_id)?;
            let mut args = ArgMap::default();
            args.insert(Rc::from("me"), value);
            engine.invoke(get_str, args)?
        }
        "int" => {
            let text = value.as_str().ok_or_else(|| EngineError::type_or_arity("convert to int requires a string source"))?;
            let parsed: i64 = text.trim().parse().map_err(|_| EngineError::type_or_arity(format!("'{text}' is not a valid int")))?;
            Object::int(parsed)
        }
        "float" => {
            let text = value.as_str().ok_or_else(|| EngineError::type_or_arity("convert to float requires a string source"))?;
            let parsed: f64 = text.trim().parse().map_err(|_| EngineError::type_or_arity(format!("'{text}' is not a valid float")))?;
            Object::float(parsed)
        }
        "bool" => {
            let text = value.as_str().ok_or_else(|| EngineError::type_or_arity("convert to bool requires a string source"))?;
            let parsed: bool = text.trim().parse().map_err(|_| EngineError::type_or_arity(format!("'{text}' is not a valid bool")))?;
            Object::bool(parsed)
        }
        other => return Err(EngineError::type_or_arity(format!("convert does not know target type '{other}'"))),
    };

    push_result(engine, command, converted);
    Ok(())
}

pub(crate) fn exec_ref_count<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    let count = match value.unpack().content() {
        Content::Array(a) => Rc::strong_count(a),
        Content::Function(f) => Rc::strong_count(f),
        Content::Iter(s) => Rc::strong_count(s),
        Content::Str(s) => Rc::strong_count(s),
        _ => 1,
    };
    push_result(engine, command, Object::int(count as i64));
    Ok(())
}

pub(crate) fn exec_null_obj<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    push_result(engine, command, Object::bool(value.is_null()));
    Ok(())
}

pub(crate) fn exec_destroy<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    let target = bind::resolve_target(value)?;
    bind::write_target(engine, &target, Object::null(), false);
    Ok(())
}

pub(crate) fn exec_hash<R: ResourceTracker>(engine: &mut Engine<R>, command: &Command) -> EngineResult<()> {
    let value = engine.eval_argument(&command.args[0], false)?;
    let type_id = value.unpacked_type_id();
    let hashable = engine.types().get(&type_id).is_some_and(|t| t.hashable);
    if !hashable {
        return Err(EngineError::type_or_arity(format!("type '{type_id}' is not hashable")));
    }
    let hash = hash_of(&value);
    push_result(engine, command, Object::int(hash));
    Ok(())
}

fn hash_of(value: &Object) -> i64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    match value.unpack().content() {
        Content::Int(v) => v.hash(&mut hasher),
        Content::Float(v) => v.to_bits().hash(&mut hasher),
        Content::Bool(v) => v.hash(&mut hasher),
        Content::Str(v) => v.hash(&mut hasher),
        _ => unreachable!("exec_hash already rejected non-hashable types"),
    }
    hasher.finish() as i64
}
