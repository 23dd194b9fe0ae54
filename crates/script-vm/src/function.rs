//! Function representation: native and IR-bodied callables, and the three
//! parameter-binding patterns.

use std::rc::Rc;

use crate::{bytecode::CodeUnit, object::Object, registry::NativeFn};

/// How a function's trailing parameters absorb extra/missing call arguments.
///
/// See `§4.3 Argument binding` for the full binding algorithm per pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPattern {
    /// Exact arity: `|args| == |params|`.
    Normal,
    /// Variadic trailing parameter: the last parameter packs all arguments
    /// past `|params| - 1` into an `array`.
    AutoSize,
    /// Optional trailing parameters: parameters past the supplied argument
    /// count are bound to `null`, down to `limit`.
    AutoFill,
}

/// A closure record: a snapshot of enclosing bindings captured at
/// function-definition time (`§4.6 Closure capture`). Captured values are
/// copies, so there is no cyclic reference between a closure and the scope
/// it was captured from.
pub type ClosureRecord = Vec<(Rc<str>, Object)>;

/// Either a native (host) function or an IR-bodied (user-defined) function.
pub enum FunctionValue {
    Native(NativeFunction),
    Defined(DefinedFunction),
}

/// A host-provided function: a function pointer plus its declared parameter
/// list and binding pattern.
pub struct NativeFunction {
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub pattern: ParamPattern,
    /// Minimum required argument count; only meaningful for `AutoFill`.
    pub limit: usize,
    pub func: NativeFn,
}

/// A user-defined, IR-bodied function.
pub struct DefinedFunction {
    pub id: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub pattern: ParamPattern,
    /// Minimum required argument count; only meaningful for `AutoFill`.
    pub limit: usize,
    /// Offset (into `body`) where execution of a call starts. `body` is the
    /// full enclosing code unit; bodies are not re-sliced at definition time
    /// so that jump-table targets recorded against the enclosing unit's
    /// source indices stay valid without rebasing at store time.
    pub offset: usize,
    /// One past the source index of this function's last body command (the
    /// matching `EndFn`'s own index). Since `body` is never re-sliced, a
    /// call's tail-position test (§4.4) needs this boundary to tell "the last
    /// command of this function's body" apart from "the last command of the
    /// whole enclosing code unit".
    pub end: usize,
    pub body: Rc<CodeUnit>,
    /// Present only when this function was defined inside another function
    /// (`fn` at frame depth > 1). Absent for top-level function definitions.
    pub closure: Option<ClosureRecord>,
}

impl FunctionValue {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Native(n) => &n.name,
            Self::Defined(d) => &d.id,
        }
    }

    pub fn params(&self) -> &[Rc<str>] {
        match self {
            Self::Native(n) => &n.params,
            Self::Defined(d) => &d.params,
        }
    }

    pub fn pattern(&self) -> ParamPattern {
        match self {
            Self::Native(n) => n.pattern,
            Self::Defined(d) => d.pattern,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            Self::Native(n) => n.limit,
            Self::Defined(d) => d.limit,
        }
    }

    pub fn as_defined(&self) -> Option<&DefinedFunction> {
        match self {
            Self::Defined(d) => Some(d),
            Self::Native(_) => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeFunction> {
        match self {
            Self::Native(n) => Some(n),
            Self::Defined(_) => None,
        }
    }
}

/// Constructs the [`ParamPattern`] and `limit` (§4.6) from the markers on a
/// `fn`'s declared parameter list.
///
/// Rejects (per §4.6): both `optional` and `variable` present; `variable`
/// present anywhere but the last parameter; an `optional` parameter preceded
/// by a non-optional parameter that comes *after* the first `optional` marker.
pub fn classify_params(
    names: &[Rc<str>],
    optional: &[bool],
    variable: &[bool],
) -> Result<(ParamPattern, usize), crate::error::EngineError> {
    use crate::error::EngineError;

    let any_optional = optional.iter().any(|&b| b);
    let any_variable = variable.iter().any(|&b| b);

    if any_optional && any_variable {
        return Err(EngineError::invariant("a parameter list cannot mix `optional` and `variable` markers"));
    }

    if any_variable {
        let last = variable.len() - 1;
        if variable[..last].iter().any(|&b| b) {
            return Err(EngineError::invariant("`variable` parameter must be the last parameter"));
        }
        return Ok((ParamPattern::AutoSize, names.len() - 1));
    }

    if any_optional {
        let first_optional = optional.iter().position(|&b| b).unwrap();
        if optional[first_optional..].iter().any(|&b| !b) {
            return Err(EngineError::invariant(
                "non-optional parameters cannot follow the first `optional` parameter",
            ));
        }
        let limit = first_optional;
        return Ok((ParamPattern::AutoFill, limit));
    }

    Ok((ParamPattern::Normal, names.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mixed_optional_and_variable() {
        let names: Vec<Rc<str>> = vec!["a".into()];
        let err = classify_params(&names, &[true], &[true]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Invariant);
    }

    #[test]
    fn rejects_variable_not_last() {
        let names: Vec<Rc<str>> = vec!["a".into(), "b".into()];
        let err = classify_params(&names, &[false, false], &[true, false]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Invariant);
    }

    #[test]
    fn autofill_limit_is_first_optional_index() {
        let names: Vec<Rc<str>> = vec!["a".into(), "b".into(), "c".into()];
        let (pattern, limit) = classify_params(&names, &[false, true, true], &[false, false, false]).unwrap();
        assert_eq!(pattern, ParamPattern::AutoFill);
        assert_eq!(limit, 1);
    }
}
