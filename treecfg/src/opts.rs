//! The option bag threaded through every public entry point.
//!
//! [`Options`] is a value type: callers build one with the chainable
//! constructors below and pass it by reference; entry points clone it so a
//! running operation can never observe later mutation.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Reason, Result};

/// Opaque source tag attached to normalized values.
///
/// The tree never interprets the tag; it is carried alongside values and
/// surfaced again on the values read back out, so embedders can report which
/// input a setting came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Free-form description of the source, e.g. a file name.
    pub source: String,
}

impl Meta {
    /// Tag with the given source description.
    #[must_use]
    pub fn source(source: impl Into<String>) -> Self {
        Meta {
            source: source.into(),
        }
    }
}

/// Fallback lookup consulted when a reference cannot be satisfied within the
/// tree. Receives the rendered reference path and produces a replacement
/// string.
pub type Resolver = Rc<dyn Fn(&str) -> Result<String>>;

/// Default cap on numeric path steps; larger numbers are treated as names.
pub const DEFAULT_MAX_IDX: u64 = u16::MAX as u64;

/// Options accepted by every public operation.
#[derive(Clone)]
pub struct Options {
    pub(crate) path_sep: String,
    pub(crate) max_idx: u64,
    pub(crate) escape_path: bool,
    pub(crate) enable_num_keys: bool,
    pub(crate) var_exp: bool,
    pub(crate) show_redacted: bool,
    pub(crate) strict: bool,
    pub(crate) meta: Option<Meta>,
    pub(crate) resolvers: Vec<Resolver>,
    /// Paths currently being resolved; shared across nested resolutions so
    /// cycles are caught, drained again when each resolution frame returns.
    pub(crate) active: Rc<RefCell<HashSet<String>>>,
    /// Set while descending through a redact-tagged field.
    pub(crate) redact_active: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            path_sep: String::new(),
            max_idx: DEFAULT_MAX_IDX,
            escape_path: false,
            enable_num_keys: false,
            var_exp: false,
            show_redacted: false,
            strict: false,
            meta: None,
            resolvers: Vec::new(),
            active: Rc::new(RefCell::new(HashSet::new())),
            redact_active: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("path_sep", &self.path_sep)
            .field("max_idx", &self.max_idx)
            .field("escape_path", &self.escape_path)
            .field("enable_num_keys", &self.enable_num_keys)
            .field("var_exp", &self.var_exp)
            .field("show_redacted", &self.show_redacted)
            .field("strict", &self.strict)
            .field("meta", &self.meta)
            .field("resolvers", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}

impl Options {
    /// An empty option bag, equal to [`Options::default`].
    #[must_use]
    pub fn new() -> Self {
        Options::default()
    }

    /// Separator used when parsing and rendering paths. With no separator
    /// configured (the default), a textual path is a single field name.
    #[must_use]
    pub fn path_sep(mut self, sep: impl Into<String>) -> Self {
        self.path_sep = sep.into();
        self
    }

    /// Upper bound for parsing numeric path steps as indices. Steps above
    /// the bound are treated as field names, which keeps hostile inputs from
    /// forcing huge array allocations.
    #[must_use]
    pub fn max_idx(mut self, max: u64) -> Self {
        self.max_idx = max;
        self
    }

    /// Treat a whole `[…]`-wrapped input as one literal path step.
    #[must_use]
    pub fn escape_path(mut self, enabled: bool) -> Self {
        self.escape_path = enabled;
        self
    }

    /// Treat bare numeric steps as field names rather than indices.
    #[must_use]
    pub fn enable_num_keys(mut self, enabled: bool) -> Self {
        self.enable_num_keys = enabled;
        self
    }

    /// Scan strings for `${…}` expansions during normalization.
    #[must_use]
    pub fn var_exp(mut self) -> Self {
        self.var_exp = true;
        self
    }

    /// Emit redact-tagged values verbatim instead of `"[REDACTED]"`.
    #[must_use]
    pub fn show_redacted(mut self) -> Self {
        self.show_redacted = true;
        self
    }

    /// Fail unpacking when the tree carries named fields the target does not
    /// declare.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Attach an opaque source tag to values created under these options.
    #[must_use]
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Register a fallback resolver. Repeatable; resolvers are consulted in
    /// registration order.
    #[must_use]
    pub fn resolve<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Result<String> + 'static,
    {
        self.resolvers.push(Rc::new(resolver));
        self
    }

    /// Register the process-environment resolver.
    #[must_use]
    pub fn resolve_env(self) -> Self {
        self.resolve(|name| {
            std::env::var(name).map_err(|_| Error::missing(name.to_string()))
        })
    }

    /// Register the terminal no-op resolver, which answers every lookup with
    /// the original `${name}` template so unresolvable references survive
    /// as-is instead of failing.
    #[must_use]
    pub fn resolve_noop(self) -> Self {
        self.resolve(|name| Ok(format!("${{{name}}}")))
    }

    /// Whether strict unpacking was requested.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether `${…}` scanning is enabled.
    #[must_use]
    pub fn is_var_exp(&self) -> bool {
        self.var_exp
    }

    /// Clone of this bag with redaction armed for the subtree about to be
    /// emitted.
    #[must_use]
    pub fn redacting(&self) -> Self {
        let mut out = self.clone();
        out.redact_active = true;
        out
    }

    /// True when the value being emitted must be replaced by the redaction
    /// placeholder.
    #[must_use]
    pub fn redact_now(&self) -> bool {
        self.redact_active && !self.show_redacted
    }

    /// Mark `key` as being resolved, failing with `cyclic reference` when it
    /// already is. The returned guard un-marks the key when dropped.
    pub(crate) fn enter_resolve(&self, key: &str) -> Result<ActiveGuard> {
        if !self.active.borrow_mut().insert(key.to_string()) {
            return Err(Error::cyclic(key.to_string()));
        }
        Ok(ActiveGuard {
            set: Rc::clone(&self.active),
            key: key.to_string(),
        })
    }

    /// Run the registered resolvers in order for `name`.
    ///
    /// Recoverable failures move on to the next resolver; anything else is
    /// critical and returned immediately. Exhausting the chain yields the
    /// caller's original error back via `Err(None)`-style fall-through,
    /// expressed here as the `missing` sentinel.
    pub(crate) fn run_resolvers(&self, name: &str) -> Result<String> {
        for resolver in &self.resolvers {
            match resolver(name) {
                Ok(s) => return Ok(s),
                Err(e) if e.is_recoverable() => {}
                Err(e) => return Err(e),
            }
        }
        Err(Error::config_at(Reason::Missing, name.to_string()))
    }

    /// Whether any fallback resolver is registered.
    #[must_use]
    pub fn has_resolvers(&self) -> bool {
        !self.resolvers.is_empty()
    }
}

/// Removes its key from the active-resolution set on drop.
#[derive(Debug)]
pub(crate) struct ActiveGuard {
    set: Rc<RefCell<HashSet<String>>>,
    key: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.key);
    }
}
