//! Process-wide, read-only registries: type traits and the native/external
//! function table (§6 "Registration API"). Both are built once by
//! `Engine::new` and never mutated during execution.

use std::rc::Rc;

use ahash::AHashMap;

use crate::object::Object;

/// A function argument map, bound by parameter name (§4.3).
pub type ArgMap = AHashMap<Rc<str>, Object>;

/// Result code returned by a native function (§6 "Native function ABI").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    Success,
    Object,
    NormalParam,
    AutoFill,
    AutoSize,
    /// Indirect call: re-resolve `(domain, id)` named in `Message::detail`
    /// and re-enter call execution with the same argument map (§4.4).
    Interface,
    IllegalParam,
    IllegalCall,
    IllegalSymbol,
    BadStream,
    BadExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Normal,
    Error,
    Warning,
}

/// A native function's return value.
#[derive(Debug, Clone)]
pub struct Message {
    pub code: MessageCode,
    pub level: Level,
    pub detail: String,
    pub value: Object,
}

impl Message {
    pub fn success(value: Object) -> Self {
        Self { code: MessageCode::Success, level: Level::Normal, detail: String::new(), value }
    }

    pub fn object(value: Object) -> Self {
        Self { code: MessageCode::Object, level: Level::Normal, detail: String::new(), value }
    }

    pub fn error(code: MessageCode, detail: impl Into<String>) -> Self {
        Self { code, level: Level::Error, detail: detail.into(), value: Object::null() }
    }

    /// Requests that the dispatcher re-resolve `(domain, id)` and re-enter
    /// call execution with the same argument map.
    pub fn interface(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            code: MessageCode::Interface,
            level: Level::Normal,
            detail: format!("{}\0{}", domain.into(), id.into()),
            value: Object::null(),
        }
    }

    /// Splits an `Interface` message's detail back into `(domain, id)`.
    pub fn interface_target(&self) -> Option<(&str, &str)> {
        self.detail.split_once('\0')
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

pub type NativeFn = Rc<dyn Fn(&ArgMap) -> Message>;

/// Metadata for one registered type: the ordered method set used by `dir`
/// and `exist`, and whether the type's delivery is shallow (shared, never
/// copied) rather than a deep copy.
#[derive(Debug, Clone, Default)]
pub struct TypeTraits {
    pub methods: Vec<Rc<str>>,
    pub shallow_delivery: bool,
    pub hashable: bool,
    pub comparable: bool,
}

/// The process-wide `type_id -> traits` mapping (§3 "Type traits").
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: AHashMap<Rc<str>, TypeTraits>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_id: impl Into<Rc<str>>, traits: TypeTraits) {
        self.types.insert(type_id.into(), traits);
    }

    pub fn get(&self, type_id: &str) -> Option<&TypeTraits> {
        self.types.get(type_id)
    }

    pub fn methods_of(&self, type_id: &str) -> &[Rc<str>] {
        self.types.get(type_id).map_or(&[], |t| t.methods.as_slice())
    }

    pub fn has_method(&self, type_id: &str, method: &str) -> bool {
        self.methods_of(type_id).iter().any(|m| &**m == method)
    }
}

/// The `(domain, id) -> function` mapping used for both method dispatch
/// (non-empty `domain`) and free-function calls (empty `domain`, §4.2).
#[derive(Default)]
pub struct FunctionRegistry {
    functions: AHashMap<(Rc<str>, Rc<str>), Rc<crate::function::FunctionValue>>,
}

pub const FREE_DOMAIN: &str = "";

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        domain: impl Into<Rc<str>>,
        id: impl Into<Rc<str>>,
        function: crate::function::FunctionValue,
    ) {
        self.functions.insert((domain.into(), id.into()), Rc::new(function));
    }

    pub fn lookup(&self, domain: &str, id: &str) -> Option<Rc<crate::function::FunctionValue>> {
        self.functions.get(&(Rc::from(domain), Rc::from(id))).cloned()
    }
}
