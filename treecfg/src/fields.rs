//! The dual-keyed field container backing every tree node.
//!
//! A node can hold named fields and positional elements at the same time;
//! the two keyspaces are independent, so `foo.bar` and `foo.3` never
//! collide. Named iteration order is insertion order.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::merge::MergeStrategy;
use crate::value::Value;

/// Per-field annotations recorded by the normalizer from tag modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    /// Replace string-like values under this field on emit.
    pub redact: bool,
    /// How arrays under this field compose during merges.
    pub strategy: Option<MergeStrategy>,
}

impl FieldFlags {
    /// Fold `other` into `self`: redaction is sticky, an explicit incoming
    /// strategy overrides the recorded one.
    pub(crate) fn absorb(&mut self, other: FieldFlags) {
        self.redact |= other.redact;
        if other.strategy.is_some() {
            self.strategy = other.strategy;
        }
    }

    fn is_default(self) -> bool {
        self == FieldFlags::default()
    }
}

#[derive(Clone)]
struct Entry {
    value: Value,
    flags: FieldFlags,
}

/// Named map and positional array, side by side.
#[derive(Clone, Default)]
pub(crate) struct Fields {
    named: IndexMap<String, Entry>,
    arr: Vec<Value>,
}

impl Fields {
    pub(crate) fn new() -> Self {
        Fields::default()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name).map(|e| &e.value)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.named.get_mut(name).map(|e| &mut e.value)
    }

    pub(crate) fn set(&mut self, name: &str, value: Value) {
        match self.named.get_mut(name) {
            Some(entry) => entry.value = value,
            None => {
                self.named.insert(
                    name.to_string(),
                    Entry {
                        value,
                        flags: FieldFlags::default(),
                    },
                );
            }
        }
    }

    pub(crate) fn del(&mut self, name: &str) -> bool {
        self.named.shift_remove(name).is_some()
    }

    pub(crate) fn get_at(&self, idx: usize) -> Option<&Value> {
        self.arr.get(idx)
    }

    /// Set the element at `idx`, extending the array with nil holes when the
    /// index lies beyond the current length.
    pub(crate) fn set_at(&mut self, idx: usize, value: Value) {
        while self.arr.len() <= idx {
            self.arr.push(Value::nil());
        }
        self.arr[idx] = value;
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.arr.push(value);
    }

    /// Remove the element at `idx`, shifting subsequent elements left.
    pub(crate) fn del_at(&mut self, idx: usize) -> bool {
        if idx < self.arr.len() {
            self.arr.remove(idx);
            true
        } else {
            false
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    pub(crate) fn array(&self) -> &[Value] {
        &self.arr
    }

    pub(crate) fn array_mut(&mut self) -> &mut Vec<Value> {
        &mut self.arr
    }

    pub(crate) fn named_len(&self) -> usize {
        self.named.len()
    }

    pub(crate) fn arr_len(&self) -> usize {
        self.arr.len()
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub(crate) fn flags(&self, name: &str) -> FieldFlags {
        self.named
            .get(name)
            .map(|e| e.flags)
            .unwrap_or_default()
    }

    /// Record tag-derived flags for `name`, folding into any present.
    pub(crate) fn tag_field(&mut self, name: &str, flags: FieldFlags) {
        if flags.is_default() {
            return;
        }
        if let Some(entry) = self.named.get_mut(name) {
            entry.flags.absorb(flags);
        }
    }
}

/// A set of field names, optionally chained onto a parent set.
///
/// The normalizer threads one through `squash`ed records to detect fields
/// that collapse onto the same name, and strict unpacking uses one to track
/// which fields the target consumed.
pub struct FieldSet<'a> {
    parent: Option<&'a FieldSet<'a>>,
    names: HashSet<String>,
}

impl<'a> FieldSet<'a> {
    /// An empty set, chained onto `parent` when one is given.
    #[must_use]
    pub fn new(parent: Option<&'a FieldSet<'a>>) -> Self {
        FieldSet {
            parent,
            names: HashSet::new(),
        }
    }

    /// Record `name` unconditionally.
    pub fn add(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    /// Whether `name` is present in this set or any ancestor.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name) || self.parent.is_some_and(|p| p.has(name))
    }

    /// Record `name`, reporting whether it was new to the whole chain.
    pub fn add_new(&mut self, name: &str) -> bool {
        if self.has(name) {
            return false;
        }
        self.add(name);
        true
    }

    /// All names in the chain, in no particular order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut out: Vec<String> = self.names.iter().cloned().collect();
        if let Some(parent) = self.parent {
            out.extend(parent.names());
        }
        out
    }
}
