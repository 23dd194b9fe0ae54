//! The runtime value and its type-driven delivery semantics.
//!
//! An [`Object`] carries a `type_id`, shared-ownership content, and two flags:
//! `deliver` (the next read should transfer rather than copy) and the aliasing
//! case, represented by [`Content::Ref`] (a handle onto another object's
//! storage slot). [`Object::unpack`] collapses a ref chain down to the
//! concrete object it ultimately names.
//!
//! Containers (`array`) store their elements as individually boxed slots
//! (`Rc<RefCell<Object>>`) rather than in one flat `Vec<Object>`, so that
//! indexing can hand back a `Ref` object pointing directly at a slot without
//! a parallel slab/arena of indices. Plain scalars (`int`/`float`/`bool`) and
//! `string` are small and immutable, so they are simply cloned on delivery.

use std::{cell::RefCell, cmp::Ordering, fmt, rc::Rc};

use crate::function::FunctionValue;

/// An addressable storage location. Taking a [`Content::Ref`] to one of these
/// is how the engine represents "this object aliases another, and writes
/// must write through" without a global slab of indices.
pub type Slot = Rc<RefCell<Object>>;

/// The type-tagged content of an [`Object`].
#[derive(Clone)]
pub enum Content {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    /// Backing storage for `array`: an ordered sequence of addressable slots.
    Array(Rc<RefCell<Vec<Slot>>>),
    /// A callable value: either IR-bodied or native. See [`FunctionValue`].
    Function(Rc<FunctionValue>),
    /// An alias onto another object's storage. `Object::unpack` collapses
    /// chains of these down to the first non-ref object.
    Ref(Slot),
    /// The foreach iterator produced by a container's `head` method
    /// (§4.5 `for`). Shared and mutated in place by `step_forward` so the
    /// loop can keep rebinding the same `__iterator` object across
    /// iterations.
    Iter(Rc<RefCell<IterState>>),
}

/// State for an in-progress foreach iteration over a built-in container.
pub enum IterSource {
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Slot>>>),
}

pub struct IterState {
    pub source: IterSource,
    pub index: usize,
}

/// The runtime value. See the module docs for the delivery model.
#[derive(Clone)]
pub struct Object {
    type_id: Rc<str>,
    content: Content,
    /// When set, the next copy-producing read of this object should move
    /// its content instead of cloning it. Cleared by any copy-producing read.
    deliver: bool,
}

pub const TYPE_NULL: &str = "null";
pub const TYPE_INT: &str = "int";
pub const TYPE_FLOAT: &str = "float";
pub const TYPE_BOOL: &str = "bool";
pub const TYPE_STRING: &str = "string";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_FUNCTION: &str = "function";
pub const TYPE_ITERATOR: &str = "iterator";

impl Object {
    pub fn new(type_id: impl Into<Rc<str>>, content: Content) -> Self {
        Self { type_id: type_id.into(), content, deliver: false }
    }

    pub fn null() -> Self {
        Self::new(TYPE_NULL, Content::Null)
    }

    pub fn int(v: i64) -> Self {
        Self::new(TYPE_INT, Content::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Self::new(TYPE_FLOAT, Content::Float(v))
    }

    pub fn bool(v: bool) -> Self {
        Self::new(TYPE_BOOL, Content::Bool(v))
    }

    pub fn string(v: impl Into<Rc<str>>) -> Self {
        Self::new(TYPE_STRING, Content::Str(v.into()))
    }

    pub fn array(values: Vec<Object>) -> Self {
        let slots = values.into_iter().map(|v| Rc::new(RefCell::new(v))).collect();
        Self::new(TYPE_ARRAY, Content::Array(Rc::new(RefCell::new(slots))))
    }

    pub fn function(f: Rc<FunctionValue>) -> Self {
        Self::new(TYPE_FUNCTION, Content::Function(f))
    }

    pub fn iterator(source: IterSource) -> Self {
        Self::new(TYPE_ITERATOR, Content::Iter(Rc::new(RefCell::new(IterState { source, index: 0 }))))
    }

    pub fn as_iter_state(&self) -> Option<Rc<RefCell<IterState>>> {
        match self.unpack().content {
            Content::Iter(v) => Some(v),
            _ => None,
        }
    }

    /// Wraps a slot as a `Ref` object: an alias whose reads/writes go through
    /// the slot's current content.
    pub fn make_ref(slot: Slot) -> Self {
        // A ref's `type_id` is never consulted directly (callers always
        // `unpack` first), but is kept descriptive for debugging.
        Self { type_id: Rc::from("ref"), content: Content::Ref(slot), deliver: false }
    }

    /// The type tag of this object. For a `Ref`, this is the synthetic `"ref"`
    /// tag, not the aliased object's type — callers that need the semantic
    /// type of a possibly-aliased object must call `unpack()` first, per the
    /// invariant that `type_id` only describes non-ref content.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// The type id of the object this aliases, after following any `Ref`
    /// chain. Unlike `type_id()`, this is always the semantic type.
    pub fn unpacked_type_id(&self) -> Rc<str> {
        Rc::clone(&self.unpack().type_id)
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.content, Content::Ref(_))
    }

    pub fn deliver_flag(&self) -> bool {
        self.deliver
    }

    pub fn set_deliver(&mut self, deliver: bool) {
        self.deliver = deliver;
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unpack().content, Content::Null)
    }

    /// Collapses a chain of `Ref` objects down to the concrete object it
    /// ultimately names, cloning along the way (refs are cheap `Rc` clones).
    pub fn unpack(&self) -> Object {
        match &self.content {
            Content::Ref(slot) => slot.borrow().unpack(),
            _ => self.clone(),
        }
    }

    /// Writes `value` through this object if it is a ref, otherwise replaces
    /// `self` in place. Used by `bind`/`deliver`/`swap`.
    pub fn write_through(&mut self, value: Object) {
        match &self.content {
            Content::Ref(slot) => slot.borrow_mut().write_through(value),
            _ => *self = value,
        }
    }

    /// A type-driven copy of the content, honoring `deliver`: if `deliver`
    /// is set the content is moved as-is (with the flag cleared on the
    /// result's source would already be consumed by the caller); otherwise a
    /// deep copy is produced per the type's delivery rule.
    ///
    /// `array` is deep-copied (a fresh set of slots, recursively copied);
    /// `function` is shallow-delivered (shared, never copied), since closures
    /// and function values are treated as immutable once built.
    pub fn copy(&self) -> Object {
        let this = self.unpack();
        if this.deliver {
            let mut moved = this.clone();
            moved.deliver = false;
            return moved;
        }
        match &this.content {
            Content::Null => Object::null(),
            Content::Int(v) => Object::int(*v),
            Content::Float(v) => Object::float(*v),
            Content::Bool(v) => Object::bool(*v),
            Content::Str(s) => Object::new(TYPE_STRING, Content::Str(Rc::clone(s))),
            Content::Array(slots) => {
                let copied: Vec<Slot> = slots
                    .borrow()
                    .iter()
                    .map(|s| Rc::new(RefCell::new(s.borrow().copy())))
                    .collect();
                Object::new(TYPE_ARRAY, Content::Array(Rc::new(RefCell::new(copied))))
            }
            Content::Function(f) => Object::new(TYPE_FUNCTION, Content::Function(Rc::clone(f))),
            // Iterators are shallow-delivered: `step_forward` must observe
            // the same position across every binding of `__iterator`.
            Content::Iter(s) => Object::new(TYPE_ITERATOR, Content::Iter(Rc::clone(s))),
            Content::Ref(_) => unreachable!("unpack() never yields a Ref"),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.unpack().content {
            Content::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.unpack().content {
            Content::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unpack().content {
            Content::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<Rc<str>> {
        match self.unpack().content {
            Content::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn array_slots(&self) -> Option<Rc<RefCell<Vec<Slot>>>> {
        match self.unpack().content {
            Content::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<Rc<FunctionValue>> {
        match self.unpack().content {
            Content::Function(v) => Some(v),
            _ => None,
        }
    }

    /// True for the four types arithmetic/comparison/`case` accept directly.
    pub fn is_plain(&self) -> bool {
        matches!(self.unpack().content, Content::Int(_) | Content::Float(_) | Content::Bool(_) | Content::Str(_))
    }

    /// Identity/value equality used by `when` matching and the default
    /// `compare` for plain types: same `type_id`, same underlying value.
    pub fn plain_eq(&self, other: &Object) -> bool {
        let (a, b) = (self.unpack(), other.unpack());
        if a.type_id() != b.type_id() {
            return false;
        }
        match (&a.content, &b.content) {
            (Content::Null, Content::Null) => true,
            (Content::Int(x), Content::Int(y)) => x == y,
            (Content::Float(x), Content::Float(y)) => x == y,
            (Content::Bool(x), Content::Bool(y)) => x == y,
            (Content::Str(x), Content::Str(y)) => x == y,
            _ => false,
        }
    }

    /// Ordering for plain numeric/string types, used by `< <= > >=`.
    pub fn plain_cmp(&self) -> Option<PlainScalar> {
        match self.unpack().content {
            Content::Int(v) => Some(PlainScalar::Int(v)),
            Content::Float(v) => Some(PlainScalar::Float(v)),
            Content::Bool(v) => Some(PlainScalar::Bool(v)),
            Content::Str(v) => Some(PlainScalar::Str(v)),
            _ => None,
        }
    }
}

/// A plain scalar pulled out for comparison purposes (see [`Object::plain_cmp`]).
pub enum PlainScalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
}

impl PlainScalar {
    pub fn partial_cmp_with(&self, other: &PlainScalar) -> Option<Ordering> {
        use PlainScalar::{Bool, Float, Int, Str};
        match (self, other) {
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Str(a), Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let this = self.unpack();
        match &this.content {
            Content::Null => write!(f, "null"),
            Content::Int(v) => write!(f, "{v}"),
            Content::Float(v) => write!(f, "{v}"),
            Content::Bool(v) => write!(f, "{v}"),
            Content::Str(v) => write!(f, "{v:?}"),
            Content::Array(slots) => {
                write!(f, "[")?;
                for (i, s) in slots.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", s.borrow())?;
                }
                write!(f, "]")
            }
            Content::Function(func) => write!(f, "<function {}>", func.display_name()),
            Content::Iter(s) => write!(f, "<iterator at {}>", s.borrow().index),
            Content::Ref(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_does_not_alias_arrays() {
        let arr = Object::array(vec![Object::int(1), Object::int(2)]);
        let copy = arr.copy();
        let slots = arr.array_slots().unwrap();
        slots.borrow()[0].borrow_mut().write_through(Object::int(99));
        assert_eq!(copy.array_slots().unwrap().borrow()[0].borrow().as_int(), Some(1));
    }

    #[test]
    fn deliver_flag_moves_instead_of_cloning_semantics() {
        let mut obj = Object::string("hi");
        obj.set_deliver(true);
        let moved = obj.copy();
        assert!(!moved.deliver_flag());
        assert_eq!(moved.as_str().as_deref(), Some("hi"));
    }

    #[test]
    fn ref_write_through_mutates_target() {
        let slot: Slot = Rc::new(RefCell::new(Object::int(1)));
        let mut r = Object::make_ref(Rc::clone(&slot));
        r.write_through(Object::int(42));
        assert_eq!(slot.borrow().as_int(), Some(42));
    }

    #[test]
    fn plain_eq_requires_same_type_and_value() {
        assert!(Object::int(2).plain_eq(&Object::int(2)));
        assert!(!Object::int(2).plain_eq(&Object::float(2.0)));
    }
}
