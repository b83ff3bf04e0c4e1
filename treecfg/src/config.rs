//! The configuration tree node and its embedding API.
//!
//! A [`Config`] is a cheap handle over a shared tree node. Child links are
//! strong (`Rc`), parent links weak, so a tree can never leak through its own
//! back-pointers. Handles returned by [`Config::child`] share the underlying
//! node: mutating through the child is visible through the parent.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{Error, Reason, Result};
use crate::fields::{FieldFlags, Fields, FieldSet};
use crate::opts::{Meta, Options};
use crate::path::Path;
use crate::value::{Value, ValueKind, REDACTED};

pub(crate) struct Node {
    pub(crate) fields: Fields,
    pub(crate) ctx: Context,
    pub(crate) meta: Option<Meta>,
}

/// Back-pointer from a value or node to the node owning it.
#[derive(Clone, Default)]
pub(crate) struct Context {
    parent: Option<Weak<RefCell<Node>>>,
    pub(crate) field: String,
}

impl Context {
    pub(crate) fn detached() -> Self {
        Context::default()
    }

    pub(crate) fn new(parent: &Config, field: impl Into<String>) -> Self {
        Context {
            parent: Some(Rc::downgrade(&parent.node)),
            field: field.into(),
        }
    }

    pub(crate) fn parent_config(&self) -> Option<Config> {
        let node = self.parent.as_ref()?.upgrade()?;
        Some(Config { node })
    }

    pub(crate) fn path(&self, sep: &str) -> String {
        if self.field.is_empty() {
            return String::new();
        }
        match self.parent_config() {
            Some(parent) => {
                let prefix = parent.path(sep);
                if prefix.is_empty() {
                    self.field.clone()
                } else {
                    format!("{prefix}{sep}{}", self.field)
                }
            }
            None => self.field.clone(),
        }
    }
}

/// A node in the configuration tree.
#[derive(Clone)]
pub struct Config {
    pub(crate) node: Rc<RefCell<Node>>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.path(".");
        if path.is_empty() {
            f.write_str("Config")
        } else {
            write!(f, "Config({path})")
        }
    }
}

impl Config {
    /// An empty, detached configuration.
    #[must_use]
    pub fn new() -> Self {
        Config {
            node: Rc::new(RefCell::new(Node {
                fields: Fields::new(),
                ctx: Context::detached(),
                meta: None,
            })),
        }
    }

    /// Whether two handles refer to the same tree node.
    #[must_use]
    pub fn is_same(&self, other: &Config) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    /// The node this configuration is nested in, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Config> {
        self.node.borrow().ctx.parent_config()
    }

    /// Dotted path of this node from the root; empty at the root.
    #[must_use]
    pub fn path(&self, sep: &str) -> String {
        self.node.borrow().ctx.path(sep)
    }

    /// Path of a field within this node, as seen from the root.
    #[must_use]
    pub fn path_of(&self, field: &str, sep: &str) -> String {
        let prefix = self.path(sep);
        if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}{sep}{field}")
        }
    }

    /// Walk to the root of the tree this node belongs to.
    #[must_use]
    pub fn root(&self) -> Config {
        let mut cur = self.clone();
        while let Some(parent) = cur.parent() {
            cur = parent;
        }
        cur
    }

    /// The opaque source tag attached to this node.
    #[must_use]
    pub fn meta(&self) -> Option<Meta> {
        self.node.borrow().meta.clone()
    }

    pub(crate) fn set_meta(&self, meta: Option<Meta>) {
        if meta.is_some() {
            self.node.borrow_mut().meta = meta;
        }
    }

    pub(crate) fn set_context(&self, ctx: Context) {
        self.node.borrow_mut().ctx = ctx;
    }

    /// Names of all named fields, in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.node
            .borrow()
            .fields
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Whether a named field exists on this node (no path descent).
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.node.borrow().fields.has(name)
    }

    /// Number of positional elements on this node.
    #[must_use]
    pub fn array_len(&self) -> usize {
        self.node.borrow().fields.arr_len()
    }

    /// Whether this node carries positional elements.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.array_len() > 0
    }

    /// Number of elements held by the named field: the element count for
    /// arrays, 1 for scalars, 0 for nil, `None` when the field is absent.
    #[must_use]
    pub fn count_field(&self, name: &str) -> Option<usize> {
        let v = self.get_raw(name)?;
        v.len(&Options::default()).ok()
    }

    // --- raw node access -------------------------------------------------

    pub(crate) fn get_raw(&self, name: &str) -> Option<Value> {
        self.node.borrow().fields.get(name).cloned()
    }

    pub(crate) fn get_at_raw(&self, idx: usize) -> Option<Value> {
        self.node.borrow().fields.get_at(idx).cloned()
    }

    /// Insert a named value, rebinding (or copying) it into this node.
    pub(crate) fn set_raw(&self, name: &str, value: Value) {
        let adopted = self.adopt(value, Context::new(self, name));
        self.node.borrow_mut().fields.set(name, adopted);
    }

    /// Insert a positional value, extending the array with nil holes.
    pub(crate) fn set_at_raw(&self, idx: usize, value: Value) {
        let adopted = self.adopt(value, Context::new(self, idx.to_string()));
        self.node.borrow_mut().fields.set_at(idx, adopted);
    }

    pub(crate) fn push_raw(&self, value: Value) {
        let idx = self.array_len();
        let adopted = self.adopt(value, Context::new(self, idx.to_string()));
        self.node.borrow_mut().fields.push(adopted);
    }

    pub(crate) fn del_raw(&self, name: &str) -> bool {
        self.node.borrow_mut().fields.del(name)
    }

    pub(crate) fn del_at_raw(&self, idx: usize) -> bool {
        self.node.borrow_mut().fields.del_at(idx)
    }

    /// A sub-tree that already lives in another tree is copied rather than
    /// shared; everything else is rebound in place.
    fn adopt(&self, mut value: Value, ctx: Context) -> Value {
        let foreign = match &value.kind {
            ValueKind::Sub(c) => c.parent().is_some_and(|p| !p.is_same(self)),
            _ => false,
        };
        if foreign {
            value.copied(ctx)
        } else {
            value.set_context(ctx);
            value
        }
    }

    /// Insert a named value directly on this node, without path parsing.
    /// Used by generated normalization code, where names are literal.
    pub fn insert_field(&self, name: &str, value: Value) {
        self.set_raw(name, value);
    }

    /// Tag-derived flags recorded for the named field.
    #[must_use]
    pub fn field_flags(&self, name: &str) -> FieldFlags {
        self.node.borrow().fields.flags(name)
    }

    /// Record tag-derived flags for the named field.
    pub fn tag_field(&self, name: &str, flags: FieldFlags) {
        self.node.borrow_mut().fields.tag_field(name, flags);
    }

    /// Whether the named field is tagged for redaction.
    #[must_use]
    pub fn field_redacted(&self, name: &str) -> bool {
        self.field_flags(name).redact
    }

    /// Copy this tree, rebuilding every context against the copy.
    pub(crate) fn deep_copy(&self, ctx: Context) -> Config {
        let out = Config::new();
        out.set_context(ctx);
        out.set_meta(self.meta());
        for name in self.keys() {
            let value = self.get_raw(&name).expect("key listed");
            let flags = self.field_flags(&name);
            out.set_raw(&name, value.copied(Context::new(&out, &name)));
            out.tag_field(&name, flags);
        }
        for idx in 0..self.array_len() {
            let value = self.get_at_raw(idx).expect("index in range");
            out.push_raw(value.copied(Context::new(&out, idx.to_string())));
        }
        out
    }

    // --- path-based access ----------------------------------------------

    /// Whether a value exists at `path` (optionally at element `idx`).
    pub fn has(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<bool> {
        let opts = opts.clone();
        Path::parse_idx(path, idx, &opts).has(self, &opts)
    }

    /// The value at `path` (optionally at element `idx`).
    pub fn value_at(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<Value> {
        let opts = opts.clone();
        Path::parse_idx(path, idx, &opts).get_value(self, &opts)
    }

    /// Store `value` at `path`, creating intermediate nodes as needed.
    pub fn set_value(&self, path: &str, idx: Option<usize>, value: Value, opts: &Options) -> Result<()> {
        let opts = opts.clone();
        let mut value = value;
        value.set_meta(opts.meta.clone());
        Path::parse_idx(path, idx, &opts).set_value(self, &opts, value)
    }

    /// Remove the value at `path`. Returns whether anything was removed;
    /// missing intermediate nodes are not an error.
    pub fn remove(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<bool> {
        let opts = opts.clone();
        Path::parse_idx(path, idx, &opts).remove(self, &opts)
    }

    // --- typed accessors -------------------------------------------------

    /// Read a boolean at `path`.
    pub fn get_bool(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<bool> {
        self.value_at(path, idx, opts)?.to_bool(opts)
    }

    /// Read a signed integer at `path`.
    pub fn get_int(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<i64> {
        self.value_at(path, idx, opts)?.to_int(opts)
    }

    /// Read an unsigned integer at `path`.
    pub fn get_uint(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<u64> {
        self.value_at(path, idx, opts)?.to_uint(opts)
    }

    /// Read a float at `path`.
    pub fn get_float(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<f64> {
        self.value_at(path, idx, opts)?.to_float(opts)
    }

    /// Read a string at `path`.
    pub fn get_str(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<String> {
        self.value_at(path, idx, opts)?.to_str(opts)
    }

    /// Read a nested configuration at `path`. The returned handle shares the
    /// underlying node with this tree.
    pub fn child(&self, path: &str, idx: Option<usize>, opts: &Options) -> Result<Config> {
        self.value_at(path, idx, opts)?.to_config(opts)
    }

    /// Store a boolean at `path`.
    pub fn set_bool(&self, path: &str, idx: Option<usize>, value: bool, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::bool(value), opts)
    }

    /// Store a signed integer at `path`.
    pub fn set_int(&self, path: &str, idx: Option<usize>, value: i64, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::int(value), opts)
    }

    /// Store an unsigned integer at `path`.
    pub fn set_uint(&self, path: &str, idx: Option<usize>, value: u64, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::uint(value), opts)
    }

    /// Store a float at `path`.
    pub fn set_float(&self, path: &str, idx: Option<usize>, value: f64, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::float(value), opts)
    }

    /// Store a string at `path`.
    pub fn set_str(&self, path: &str, idx: Option<usize>, value: &str, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::str(value), opts)
    }

    /// Nest a configuration at `path`. A tree that already has a parent is
    /// copied in, so the original stays untouched.
    pub fn set_child(&self, path: &str, idx: Option<usize>, child: &Config, opts: &Options) -> Result<()> {
        self.set_value(path, idx, Value::sub(child.clone()), opts)
    }

    // --- whole-tree views ------------------------------------------------

    /// Render the dotted path of every leaf, exactly once, no inner nodes.
    #[must_use]
    pub fn flattened_keys(&self, opts: &Options) -> Vec<String> {
        let sep = if opts.path_sep.is_empty() {
            "."
        } else {
            opts.path_sep.as_str()
        };
        let mut out = Vec::new();
        self.flatten_into(&mut out, "", sep);
        out
    }

    fn flatten_into(&self, out: &mut Vec<String>, prefix: &str, sep: &str) {
        let join = |field: &str| {
            if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}{sep}{field}")
            }
        };
        for name in self.keys() {
            let value = self.get_raw(&name).expect("key listed");
            match &value.kind {
                ValueKind::Sub(sub) => sub.flatten_into(out, &join(&name), sep),
                _ => out.push(join(&name)),
            }
        }
        for idx in 0..self.array_len() {
            let value = self.get_at_raw(idx).expect("index in range");
            let field = idx.to_string();
            match &value.kind {
                ValueKind::Sub(sub) => sub.flatten_into(out, &join(&field), sep),
                _ => out.push(join(&field)),
            }
        }
    }

    /// Convert this tree into a dynamic value, resolving references and
    /// applying redaction.
    ///
    /// Named-only nodes become objects, positional-only nodes arrays. Mixed
    /// nodes become objects with the positional elements keyed by their
    /// decimal index. Empty nodes reify to null.
    pub fn reify(&self, opts: &Options) -> Result<serde_json::Value> {
        let named: Vec<String> = self.keys();
        let arr_len = self.array_len();
        match (named.is_empty(), arr_len == 0) {
            (true, true) => Ok(serde_json::Value::Null),
            (false, true) => {
                let mut map = serde_json::Map::new();
                for name in named {
                    map.insert(name.clone(), self.reify_field(&name, opts)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            (true, false) => {
                let mut items = Vec::with_capacity(arr_len);
                for idx in 0..arr_len {
                    let value = self.get_at_raw(idx).expect("index in range");
                    items.push(value.reify(opts)?);
                }
                Ok(serde_json::Value::Array(items))
            }
            (false, false) => {
                let mut map = serde_json::Map::new();
                for name in named {
                    map.insert(name.clone(), self.reify_field(&name, opts)?);
                }
                for idx in 0..arr_len {
                    let value = self.get_at_raw(idx).expect("index in range");
                    map.insert(idx.to_string(), value.reify(opts)?);
                }
                Ok(serde_json::Value::Object(map))
            }
        }
    }

    fn reify_field(&self, name: &str, opts: &Options) -> Result<serde_json::Value> {
        let value = self.get_raw(name).expect("key listed");
        let field_opts = self.field_unpack_opts(name, false, opts);
        value.reify(&field_opts)
    }

    /// A copy of this tree with string-like leaves under redact-tagged
    /// fields replaced by the redaction placeholder.
    #[must_use]
    pub fn redact(&self) -> Config {
        let out = self.deep_copy(Context::detached());
        out.redact_in_place(false);
        out
    }

    fn redact_in_place(&self, armed: bool) {
        for name in self.keys() {
            let inner_armed = armed || self.field_redacted(&name);
            let value = self.get_raw(&name).expect("key listed");
            match &value.kind {
                ValueKind::Sub(sub) => sub.redact_in_place(inner_armed),
                ValueKind::Str(_) | ValueKind::Splice(_) if inner_armed => {
                    self.set_raw(&name, Value::str(REDACTED));
                }
                _ => {}
            }
        }
        for idx in 0..self.array_len() {
            let value = self.get_at_raw(idx).expect("index in range");
            match &value.kind {
                ValueKind::Sub(sub) => sub.redact_in_place(armed),
                ValueKind::Str(_) | ValueKind::Splice(_) if armed => {
                    self.set_at_raw(idx, Value::str(REDACTED));
                }
                _ => {}
            }
        }
    }

    // --- unpack support ---------------------------------------------------

    /// Look up a record field by its configured name, honouring the path
    /// separator so one tag can address a nested setting. Absence is `None`.
    pub fn lookup_field(&self, name: &str, opts: &Options) -> Result<Option<Value>> {
        match Path::parse(name, opts).get_value(self, opts) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Option bag for emitting the named field: redaction arms when either
    /// the tree flag or the target's own tag says so.
    #[must_use]
    pub fn field_unpack_opts(&self, name: &str, redact_attr: bool, opts: &Options) -> Options {
        if redact_attr || self.field_redacted(name) {
            opts.redacting()
        } else {
            opts.clone()
        }
    }

    /// Strict-mode check: every named field must appear in `claimed`.
    pub fn ensure_all_claimed(&self, claimed: &FieldSet<'_>) -> Result<()> {
        for name in self.keys() {
            if !claimed.has(&name) {
                return Err(Error::config_at(
                    Reason::UnknownField,
                    self.path_of(&name, "."),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_paths() {
        let cfg = Config::new();
        assert_eq!(cfg.path("."), "");
        assert_eq!(cfg.path_of("a", "."), "a");
        assert!(cfg.parent().is_none());
    }

    #[test]
    fn set_raw_binds_context() {
        let cfg = Config::new();
        cfg.set_raw("answer", Value::int(42));
        let v = cfg.get_raw("answer").expect("present");
        assert_eq!(v.path("."), "answer");
    }

    #[test]
    fn nested_child_paths_and_parent() {
        let parent = Config::new();
        let child = Config::new();
        parent.set_raw("sub", Value::sub(child.clone()));
        assert_eq!(child.path("."), "sub");
        assert!(child.parent().expect("parent").is_same(&parent));
        assert!(child.root().is_same(&parent));
    }

    #[test]
    fn adopt_copies_foreign_subtree() {
        let first = Config::new();
        let child = Config::new();
        child.set_raw("x", Value::int(1));
        first.set_raw("a", Value::sub(child.clone()));

        let second = Config::new();
        second.set_raw("b", Value::sub(child.clone()));

        // The original parent link is unchanged; the second tree got a copy.
        assert_eq!(child.path("."), "a");
        let copy = second
            .get_raw("b")
            .expect("copied")
            .to_config(&Options::new())
            .expect("sub");
        assert!(!copy.is_same(&child));
        assert_eq!(copy.path("."), "b");
    }

    #[test]
    fn deep_copy_rebuilds_contexts() {
        let cfg = Config::new();
        let inner = Config::new();
        inner.set_raw("leaf", Value::str("v"));
        cfg.set_raw("inner", Value::sub(inner));

        let copy = cfg.deep_copy(Context::detached());
        let copied_inner = copy
            .get_raw("inner")
            .expect("inner")
            .to_config(&Options::new())
            .expect("sub");
        assert_eq!(copied_inner.path("."), "inner");
        assert!(copied_inner.parent().expect("parent").is_same(&copy));
    }

    #[test]
    fn count_field_conventions() {
        let cfg = Config::new();
        cfg.set_raw("scalar", Value::int(1));
        cfg.set_raw("nothing", Value::nil());
        let arr = Config::new();
        arr.push_raw(Value::int(1));
        arr.push_raw(Value::int(2));
        cfg.set_raw("list", Value::sub(arr));

        assert_eq!(cfg.count_field("scalar"), Some(1));
        assert_eq!(cfg.count_field("nothing"), Some(0));
        assert_eq!(cfg.count_field("list"), Some(2));
        assert_eq!(cfg.count_field("absent"), None);
    }

    #[test]
    fn reify_shapes() {
        let cfg = Config::new();
        assert_eq!(
            cfg.reify(&Options::new()).expect("empty"),
            serde_json::Value::Null
        );

        cfg.set_raw("a", Value::int(1));
        let arr = Config::new();
        arr.push_raw(Value::str("x"));
        cfg.set_raw("list", Value::sub(arr));
        assert_eq!(
            cfg.reify(&Options::new()).expect("object"),
            serde_json::json!({"a": 1, "list": ["x"]})
        );
    }

    #[test]
    fn mixed_node_reifies_to_object_with_index_keys() {
        let cfg = Config::new();
        cfg.set_raw("name", Value::str("n"));
        cfg.node.borrow_mut().fields.push(Value::int(7));
        assert_eq!(
            cfg.reify(&Options::new()).expect("mixed"),
            serde_json::json!({"name": "n", "0": 7})
        );
    }
}
