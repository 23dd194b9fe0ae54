//! Lexically scoped name→object bindings (§3 "Object container" / "Object
//! stack").

use std::rc::Rc;

use ahash::AHashMap;

use crate::{error::EngineError, object::Object};

/// The reserved binding name for the active foreach iterator (§4.5 `for`).
pub const ITERATOR_NAME: &str = "__iterator";
/// The reserved binding name marking the scope that owns a call (§4.4).
pub const USER_FUNC_NAME: &str = "__user_func";
/// The reserved binding name for the `case` scrutinee snapshot (§4.5 `case`).
pub const CASE_NAME: &str = "__case";

/// An ordered map `name -> Object` for one lexical scope.
///
/// Implemented as an insertion-ordered vector with a side index for O(1)
/// lookup, matching the reference interpreter's preference for explicit,
/// inspectable scope storage over a plain hash map (insertion order matters
/// here for deterministic `dir`-style introspection of a scope).
#[derive(Debug, Default)]
pub struct ObjectContainer {
    names: Vec<Rc<str>>,
    objects: Vec<Object>,
    index: AHashMap<Rc<str>, usize>,
}

impl ObjectContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<&Object> {
        self.index.get(name).map(|&i| &self.objects[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Object> {
        self.index.get(name).copied().map(move |i| &mut self.objects[i])
    }

    /// Rejects duplicate names within the same scope.
    pub fn add(&mut self, name: impl Into<Rc<str>>, object: Object) -> Result<(), EngineError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(EngineError::invariant(format!("'{name}' is already bound in this scope")));
        }
        self.index.insert(Rc::clone(&name), self.objects.len());
        self.names.push(name);
        self.objects.push(object);
        Ok(())
    }

    /// Inserts or overwrites a binding in this scope, regardless of whether
    /// it already exists. Used for the `local_object` fast path and for
    /// parameter binding.
    pub fn set(&mut self, name: impl Into<Rc<str>>, object: Object) {
        let name = name.into();
        if let Some(&i) = self.index.get(&name) {
            self.objects[i] = object;
        } else {
            self.index.insert(Rc::clone(&name), self.objects.len());
            self.names.push(name);
            self.objects.push(object);
        }
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.objects.clear();
        self.index.clear();
    }

    /// Removes every binding except `keep` (used by loop-end to preserve the
    /// iterator binding across re-entry, §4.5).
    pub fn clear_except(&mut self, keep: &str) {
        if let Some(&i) = self.index.get(keep) {
            let name = self.names[i].clone();
            let object = self.objects[i].clone();
            self.clear();
            self.index.insert(Rc::clone(&name), 0);
            self.names.push(name);
            self.objects.push(object);
        } else {
            self.clear();
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &Rc<str>> {
        self.names.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

/// A sequence of [`ObjectContainer`]s, indexed deepest-last (§3 "Object
/// stack").
#[derive(Debug, Default)]
pub struct ObjectStack {
    scopes: Vec<ObjectContainer>,
}

impl ObjectStack {
    pub fn new() -> Self {
        Self { scopes: vec![ObjectContainer::new()] }
    }

    pub fn push(&mut self) {
        self.scopes.push(ObjectContainer::new());
    }

    pub fn pop(&mut self) -> ObjectContainer {
        self.scopes.pop().expect("object stack underflow")
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth);
    }

    /// Searches scopes top-down.
    pub fn find(&self, name: &str) -> Option<&Object> {
        self.scopes.iter().rev().find_map(|s| s.find(name))
    }

    /// Searches scopes top-down for a scope that already binds `name`,
    /// returning a mutable reference into it. Used by `bind` to overwrite an
    /// enclosing binding in place.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Object> {
        self.scopes.iter_mut().rev().find(|s| s.contains(name)).and_then(|s| s.find_mut(name))
    }

    pub fn current(&mut self) -> &mut ObjectContainer {
        self.scopes.last_mut().expect("object stack is never empty")
    }

    pub fn create_object(&mut self, name: impl Into<Rc<str>>, object: Object) {
        self.current().set(name, object);
    }

    /// Pours every binding from `other` into the current scope, consuming it.
    pub fn merge_map(&mut self, other: ObjectContainer) {
        let current = self.current();
        for (name, object) in other.names.into_iter().zip(other.objects.into_iter()) {
            current.set(name, object);
        }
    }

    pub fn clear_current(&mut self) {
        self.current().clear();
    }

    /// Clears every binding in the current scope except `keep` (used by
    /// `for`-loop re-entry to preserve `__iterator` across iterations).
    pub fn clear_current_except(&mut self, keep: &str) {
        self.current().clear_except(keep);
    }

    /// Finds the innermost scope index that binds `name` (searching
    /// top-down), used by closure capture to stop at the `__user_func` scope.
    pub fn scope_index_of(&self, name: &str) -> Option<usize> {
        self.scopes.iter().enumerate().rev().find(|(_, s)| s.contains(name)).map(|(i, _)| i)
    }

    pub fn scopes_from(&self, start: usize) -> impl Iterator<Item = &ObjectContainer> {
        self.scopes[start..].iter()
    }

    /// The scope index considered the "base" for closure capture purposes:
    /// the bottom of the stack, i.e. the module/top-level scope.
    pub fn get_base(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicates() {
        let mut c = ObjectContainer::new();
        c.add("x", Object::int(1)).unwrap();
        assert!(c.add("x", Object::int(2)).is_err());
    }

    #[test]
    fn clear_except_preserves_named_binding() {
        let mut c = ObjectContainer::new();
        c.add("__iterator", Object::int(1)).unwrap();
        c.add("y", Object::int(2)).unwrap();
        c.clear_except("__iterator");
        assert!(c.find("__iterator").is_some());
        assert!(c.find("y").is_none());
    }

    #[test]
    fn stack_find_searches_top_down() {
        let mut s = ObjectStack::new();
        s.create_object("x", Object::int(1));
        s.push();
        s.create_object("x", Object::int(2));
        assert_eq!(s.find("x").unwrap().as_int(), Some(2));
    }
}
