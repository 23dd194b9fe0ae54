//! Arithmetic, comparison, and logical built-ins (§4.5), including the
//! static type-promotion table for the four plain types.

use crate::{
    bytecode::{Command, Keyword},
    engine::Engine,
    error::{EngineError, EngineResult},
    limits::ResourceTracker,
    object::Object,
};

/// A plain-type operand classified for the promotion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Float,
    String,
}

fn kind_of(obj: &Object) -> Option<Kind> {
    use crate::object::Content;
    match obj.unpack().content() {
        Content::Bool(_) => Some(Kind::Bool),
        Content::Int(_) => Some(Kind::Int),
        Content::Float(_) => Some(Kind::Float),
        Content::Str(_) => Some(Kind::String),
        _ => None,
    }
}

/// The result "family" an arithmetic operator promotes `(lhs, rhs)` into:
/// `String` if either operand is a string, else the wider of `{Bool, Int,
/// Float}` (with `Bool × Bool` arithmetic promoting to `Int`, since there is
/// no sensible plain-type arithmetic result narrower than a number).
fn promote(lhs: Kind, rhs: Kind) -> Kind {
    if lhs == Kind::String || rhs == Kind::String {
        return Kind::String;
    }
    if lhs == Kind::Float || rhs == Kind::Float {
        return Kind::Float;
    }
    if lhs == Kind::Int || rhs == Kind::Int {
        return Kind::Int;
    }
    Kind::Int
}

fn as_f64(obj: &Object) -> f64 {
    use crate::object::Content;
    match obj.unpack().content() {
        Content::Bool(b) => f64::from(*b),
        Content::Int(v) => *v as f64,
        Content::Float(v) => *v,
        _ => 0.0,
    }
}

fn as_i64(obj: &Object) -> i64 {
    use crate::object::Content;
    match obj.unpack().content() {
        Content::Bool(b) => i64::from(*b),
        Content::Int(v) => *v,
        Content::Float(v) => *v as i64,
        _ => 0,
    }
}

fn str_repr(obj: &Object) -> String {
    use crate::object::Content;
    match obj.unpack().content() {
        Content::Str(s) => s.to_string(),
        Content::Int(v) => v.to_string(),
        Content::Float(v) => v.to_string(),
        Content::Bool(b) => b.to_string(),
        Content::Null => "null".to_string(),
        _ => String::new(),
    }
}

pub(crate) fn exec_arith<R: ResourceTracker>(engine: &mut Engine<R>, keyword: Keyword, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let [lhs, rhs] = <[Object; 2]>::try_from(values)
        .map_err(|_| EngineError::type_or_arity("arithmetic operator requires exactly 2 operands"))?;

    let lhs_kind = kind_of(&lhs).ok_or_else(|| EngineError::type_or_arity("operand is not a plain type"))?;
    let rhs_kind = kind_of(&rhs).ok_or_else(|| EngineError::type_or_arity("operand is not a plain type"))?;

    let result = match promote(lhs_kind, rhs_kind) {
        Kind::String => match keyword {
            Keyword::Add => Object::string(format!("{}{}", str_repr(&lhs), str_repr(&rhs))),
            _ => Object::null(),
        },
        Kind::Float => {
            let (a, b) = (as_f64(&lhs), as_f64(&rhs));
            let v = match keyword {
                Keyword::Add => a + b,
                Keyword::Sub => a - b,
                Keyword::Mul => a * b,
                Keyword::Div => a / b,
                _ => unreachable!("exec_arith only dispatches arithmetic keywords"),
            };
            Object::float(v)
        }
        Kind::Int | Kind::Bool => {
            let (a, b) = (as_i64(&lhs), as_i64(&rhs));
            match keyword {
                Keyword::Add => Object::int(a.wrapping_add(b)),
                Keyword::Sub => Object::int(a.wrapping_sub(b)),
                Keyword::Mul => Object::int(a.wrapping_mul(b)),
                Keyword::Div => {
                    if b == 0 {
                        return Err(EngineError::type_or_arity("division by zero"));
                    }
                    Object::int(a.wrapping_div(b))
                }
                _ => unreachable!("exec_arith only dispatches arithmetic keywords"),
            }
        }
    };

    super::push_result(engine, command, result);
    Ok(())
}

pub(crate) fn exec_compare<R: ResourceTracker>(engine: &mut Engine<R>, keyword: Keyword, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let [lhs, rhs] = <[Object; 2]>::try_from(values)
        .map_err(|_| EngineError::type_or_arity("comparison operator requires exactly 2 operands"))?;

    let result = if lhs.is_plain() && rhs.is_plain() {
        compare_plain(keyword, &lhs, &rhs)?
    } else {
        // Outside the plain-type set, `==`/`!=` fall back to the type's
        // `compare` method; other operators fail (§4.5).
        match keyword {
            Keyword::Eq | Keyword::Ne => {
                let equal = invoke_compare(engine, &lhs, &rhs)?;
                Object::bool(if keyword == Keyword::Eq { equal } else { !equal })
            }
            _ => return Err(EngineError::type_or_arity("only == and != are defined for non-plain operands")),
        }
    };

    super::push_result(engine, command, result);
    Ok(())
}

fn compare_plain(keyword: Keyword, lhs: &Object, rhs: &Object) -> EngineResult<Object> {
    let lhs_kind = kind_of(lhs).expect("checked is_plain");
    let rhs_kind = kind_of(rhs).expect("checked is_plain");

    if matches!(keyword, Keyword::Eq | Keyword::Ne) {
        let equal = lhs.plain_eq(rhs) || {
            // Cross-type numeric equality (e.g. 1 == 1.0), which `plain_eq`
            // intentionally rejects since it also backs `when` matching.
            lhs_kind != Kind::String
                && rhs_kind != Kind::String
                && lhs.plain_cmp().unwrap().partial_cmp_with(&rhs.plain_cmp().unwrap()) == Some(std::cmp::Ordering::Equal)
        };
        return Ok(Object::bool(if keyword == Keyword::Eq { equal } else { !equal }));
    }

    if lhs_kind == Kind::String || rhs_kind == Kind::String {
        return Ok(Object::null());
    }

    let ord = lhs
        .plain_cmp()
        .unwrap()
        .partial_cmp_with(&rhs.plain_cmp().unwrap())
        .ok_or_else(|| EngineError::type_or_arity("operands are not ordered"))?;
    use std::cmp::Ordering::{Equal, Greater, Less};
    let result = match (keyword, ord) {
        (Keyword::Lt, Less) | (Keyword::Le, Less | Equal) | (Keyword::Gt, Greater) | (Keyword::Ge, Greater | Equal) => true,
        _ => false,
    };
    Ok(Object::bool(result))
}

/// Falls back to a type's own `compare` method for non-plain `==`/`!=`.
fn invoke_compare<R: ResourceTracker>(engine: &mut Engine<R>, lhs: &Object, rhs: &Object) -> EngineResult<bool> {
    let type_id = lhs.unpacked_type_id();
    let function = engine.fetch_function_impl("compare", &type_id)?;
    let mut args = crate::registry::ArgMap::default();
    args.insert("me".into(), lhs.clone());
    args.insert("other".into(), rhs.clone());
    let result = engine.invoke(function, args)?;
    Ok(result.as_bool().unwrap_or(false))
}

pub(crate) fn exec_logical<R: ResourceTracker>(engine: &mut Engine<R>, keyword: Keyword, command: &Command) -> EngineResult<()> {
    let values = engine.eval_args_right_to_left(&command.args)?;
    let bools: Vec<bool> = values
        .iter()
        .map(|v| v.as_bool().ok_or_else(|| EngineError::type_or_arity("logical operator requires boolean operands")))
        .collect::<EngineResult<_>>()?;

    let result = match keyword {
        Keyword::And => {
            if bools.len() != 2 {
                return Err(EngineError::type_or_arity("&& requires exactly 2 operands"));
            }
            bools[0] && bools[1]
        }
        Keyword::Or => {
            if bools.len() != 2 {
                return Err(EngineError::type_or_arity("|| requires exactly 2 operands"));
            }
            bools[0] || bools[1]
        }
        Keyword::Not => {
            if bools.len() != 1 {
                return Err(EngineError::type_or_arity("! requires exactly 1 operand"));
            }
            !bools[0]
        }
        _ => unreachable!("exec_logical only dispatches logical keywords"),
    };

    super::push_result(engine, command, Object::bool(result));
    Ok(())
}
