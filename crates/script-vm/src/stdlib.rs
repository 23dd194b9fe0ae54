//! Built-in plain-type registrations (§4.8): the minimal, faithful trait set
//! for `int`, `float`, `bool`, `string`, `array`, and the `iterator` type
//! produced by foreach, registered once at startup into a [`TypeRegistry`]
//! and [`FunctionRegistry`]. These are ambient plumbing so the promotion
//! table, `compare`, and foreach can be exercised end-to-end — not a
//! standard library of string/array operations.

use std::rc::Rc;

use crate::{
    object::{Content, IterSource, Object, TYPE_ARRAY, TYPE_BOOL, TYPE_FLOAT, TYPE_INT, TYPE_ITERATOR, TYPE_STRING},
    registry::{ArgMap, FunctionRegistry, Message, TypeRegistry, TypeTraits},
};

// `ArgMap` lookups against a malformed call (missing `me`/`other`) fall back
// to `null` rather than panicking; the dispatcher that built the map is the
// only caller, and a missing required argument is its bug, not the script's.
fn arg(args: &ArgMap, name: &str) -> Object {
    args.get(name).cloned().unwrap_or_else(Object::null)
}

fn compare_plain_values(me: &Object, other: &Object) -> bool {
    let (a, b) = (me.unpack(), other.unpack());
    if a.unpacked_type_id() != b.unpacked_type_id() {
        return false;
    }
    match (a.plain_cmp(), b.plain_cmp()) {
        (Some(x), Some(y)) => x.partial_cmp_with(&y) == Some(std::cmp::Ordering::Equal),
        _ => false,
    }
}

fn get_str_plain(me: &Object) -> String {
    let v = me.unpack();
    match v.content() {
        Content::Int(i) => i.to_string(),
        Content::Float(f) => f.to_string(),
        Content::Bool(b) => b.to_string(),
        Content::Str(s) => s.to_string(),
        _ => String::new(),
    }
}

fn native(name: &str, params: &[&str], func: impl Fn(&ArgMap) -> Message + 'static) -> crate::function::FunctionValue {
    crate::function::FunctionValue::Native(crate::function::NativeFunction {
        name: Rc::from(name),
        params: params.iter().map(|p| Rc::from(*p)).collect(),
        pattern: crate::function::ParamPattern::Normal,
        limit: params.len(),
        func: Rc::new(func),
    })
}

fn register_compare_get_str(functions: &mut FunctionRegistry, type_id: &str) {
    functions.register(type_id, "compare", native("compare", &["me", "other"], |args| {
        let equal = compare_plain_values(&arg(args, "me"), &arg(args, "other"));
        Message::success(Object::bool(equal))
    }));
    functions.register(type_id, "get_str", native("get_str", &["me"], |args| {
        Message::success(Object::string(get_str_plain(&arg(args, "me"))))
    }));
}

/// Registers `int`, `float`, `bool`, `string`, `array`, and `iterator` into
/// `types`/`functions`. The embedder calls this once, before [`crate::engine::Engine::new`],
/// since the registries are constructor arguments rather than something the
/// engine builds for itself.
pub fn register_builtin_types(types: &mut TypeRegistry, functions: &mut FunctionRegistry) {
    for type_id in [TYPE_INT, TYPE_FLOAT, TYPE_BOOL] {
        types.register(
            type_id,
            TypeTraits { methods: vec![Rc::from("compare"), Rc::from("get_str")], shallow_delivery: false, hashable: true, comparable: true },
        );
        register_compare_get_str(functions, type_id);
    }

    types.register(
        TYPE_STRING,
        TypeTraits {
            methods: vec!["compare", "get_str", "head", "tail", "obj", "step_forward"].into_iter().map(Rc::from).collect(),
            shallow_delivery: false,
            hashable: true,
            comparable: true,
        },
    );
    register_compare_get_str(functions, TYPE_STRING);

    functions.register(TYPE_STRING, "head", native("head", &["me"], |args| {
        let s = arg(args, "me").as_str().unwrap_or_else(|| Rc::from(""));
        Message::success(Object::iterator(IterSource::Str(s)))
    }));
    functions.register(TYPE_STRING, "tail", native("tail", &["me"], |args| {
        let s = arg(args, "me").as_str().unwrap_or_else(|| Rc::from(""));
        Message::success(Object::int(s.chars().count() as i64))
    }));

    types.register(
        TYPE_ARRAY,
        TypeTraits {
            methods: vec!["head", "tail", "obj", "step_forward", "compare", "get_str"].into_iter().map(Rc::from).collect(),
            shallow_delivery: false,
            hashable: false,
            comparable: true,
        },
    );
    functions.register(TYPE_ARRAY, "head", native("head", &["me"], |args| {
        let slots = arg(args, "me").array_slots().unwrap_or_default();
        Message::success(Object::iterator(IterSource::Array(slots)))
    }));
    functions.register(TYPE_ARRAY, "tail", native("tail", &["me"], |args| {
        let slots = arg(args, "me").array_slots().unwrap_or_default();
        Message::success(Object::int(slots.borrow().len() as i64))
    }));
    functions.register(TYPE_ARRAY, "compare", native("compare", &["me", "other"], |args| {
        let (me, other) = (arg(args, "me"), arg(args, "other"));
        let (a, b) = (me.array_slots(), other.array_slots());
        let equal = match (a, b) {
            (Some(a), Some(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.borrow().plain_eq(&y.borrow()))
            }
            _ => false,
        };
        Message::success(Object::bool(equal))
    }));
    functions.register(TYPE_ARRAY, "get_str", native("get_str", &["me"], |args| {
        Message::success(Object::string(format!("{:?}", arg(args, "me"))))
    }));

    types.register(
        TYPE_ITERATOR,
        TypeTraits {
            methods: vec!["obj", "step_forward", "compare"].into_iter().map(Rc::from).collect(),
            shallow_delivery: true,
            hashable: false,
            comparable: false,
        },
    );
    functions.register(TYPE_ITERATOR, "obj", native("obj", &["me"], |args| {
        let Some(state) = arg(args, "me").as_iter_state() else {
            return error_message("obj called on a non-iterator object");
        };
        let state = state.borrow();
        let value = match &state.source {
            IterSource::Str(s) => match s.chars().nth(state.index) {
                Some(c) => Object::string(c.to_string()),
                None => Object::null(),
            },
            IterSource::Array(slots) => match slots.borrow().get(state.index) {
                Some(slot) => Object::make_ref(Rc::clone(slot)),
                None => Object::null(),
            },
        };
        Message::success(value)
    }));
    functions.register(TYPE_ITERATOR, "step_forward", native("step_forward", &["me"], |args| {
        let Some(state) = arg(args, "me").as_iter_state() else {
            return error_message("step_forward called on a non-iterator object");
        };
        state.borrow_mut().index += 1;
        Message::success(Object::null())
    }));
    functions.register(TYPE_ITERATOR, "compare", native("compare", &["me", "other"], |args| {
        let (me, other) = (arg(args, "me"), arg(args, "other"));
        let Some(state) = me.as_iter_state() else {
            return error_message("compare called on a non-iterator object");
        };
        let bound = other.as_int().unwrap_or(0);
        Message::success(Object::bool(state.borrow().index as i64 >= bound))
    }));
}

fn error_message(detail: impl Into<String>) -> Message {
    Message::error(crate::registry::MessageCode::IllegalCall, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FREE_DOMAIN;

    fn built() -> (TypeRegistry, FunctionRegistry) {
        let mut types = TypeRegistry::new();
        let mut functions = FunctionRegistry::new();
        register_builtin_types(&mut types, &mut functions);
        (types, functions)
    }

    #[test]
    fn plain_types_register_compare_and_get_str() {
        let (types, functions) = built();
        assert!(types.has_method(TYPE_INT, "compare"));
        assert!(functions.lookup(TYPE_INT, "get_str").is_some());
        assert!(functions.lookup(FREE_DOMAIN, "compare").is_none());
    }

    #[test]
    fn string_head_produces_an_iterator_with_tail_as_length() {
        let (_, functions) = built();
        let head = functions.lookup(TYPE_STRING, "head").unwrap();
        let mut args = ArgMap::default();
        args.insert(Rc::from("me"), Object::string("abc"));
        let head_fn = head.as_native().unwrap();
        let iter = (head_fn.func)(&args).value;
        assert!(iter.as_iter_state().is_some());

        let tail = functions.lookup(TYPE_STRING, "tail").unwrap();
        let tail_fn = tail.as_native().unwrap();
        let tail_value = (tail_fn.func)(&args).value;
        assert_eq!(tail_value.as_int(), Some(3));
    }

    #[test]
    fn array_compare_is_elementwise() {
        let (_, functions) = built();
        let compare = functions.lookup(TYPE_ARRAY, "compare").unwrap();
        let compare_fn = compare.as_native().unwrap();
        let mut args = ArgMap::default();
        args.insert(Rc::from("me"), Object::array(vec![Object::int(1), Object::int(2)]));
        args.insert(Rc::from("other"), Object::array(vec![Object::int(1), Object::int(2)]));
        assert_eq!((compare_fn.func)(&args).value.as_bool(), Some(true));
    }
}
