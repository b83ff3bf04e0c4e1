//! The tagged value model stored at every tree position.
//!
//! A [`Value`] is one of the primitive variants, a nested sub-tree, or one of
//! the lazy variants (`Ref`, `Splice`) produced by `${…}` scanning. The lazy
//! variants delegate every typed accessor to their resolved form, so callers
//! never observe an unresolved reference through the typed API.

use std::fmt;

use serde_json::Number;

use crate::config::{Config, Context};
use crate::error::{Error, Reason, Result};
use crate::opts::{Meta, Options};
use crate::variables::{Reference, Splice};

pub(crate) const REDACTED: &str = "[REDACTED]";

#[derive(Clone)]
pub(crate) enum ValueKind {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Sub(Config),
    Ref(Reference),
    Splice(Splice),
    Nil,
}

/// A single configuration value together with its tree context.
#[derive(Clone)]
pub struct Value {
    pub(crate) kind: ValueKind,
    pub(crate) ctx: Context,
    pub(crate) meta: Option<Meta>,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Bool(b) => write!(f, "Bool({b})"),
            ValueKind::Int(i) => write!(f, "Int({i})"),
            ValueKind::Uint(u) => write!(f, "Uint({u})"),
            ValueKind::Float(x) => write!(f, "Float({x})"),
            ValueKind::Str(s) => write!(f, "Str({s:?})"),
            ValueKind::Sub(_) => f.write_str("Sub(..)"),
            ValueKind::Ref(r) => write!(f, "Ref({r})"),
            ValueKind::Splice(s) => write!(f, "Splice({s})"),
            ValueKind::Nil => f.write_str("Nil"),
        }
    }
}

impl Value {
    fn new(kind: ValueKind) -> Self {
        Value {
            kind,
            ctx: Context::detached(),
            meta: None,
        }
    }

    /// A boolean value.
    #[must_use]
    pub fn bool(b: bool) -> Self {
        Value::new(ValueKind::Bool(b))
    }

    /// A signed integer value.
    #[must_use]
    pub fn int(i: i64) -> Self {
        Value::new(ValueKind::Int(i))
    }

    /// An unsigned integer value.
    #[must_use]
    pub fn uint(u: u64) -> Self {
        Value::new(ValueKind::Uint(u))
    }

    /// A floating-point value.
    #[must_use]
    pub fn float(f: f64) -> Self {
        Value::new(ValueKind::Float(f))
    }

    /// A string value.
    #[must_use]
    pub fn str(s: impl Into<String>) -> Self {
        Value::new(ValueKind::Str(s.into()))
    }

    /// A nested sub-tree value.
    #[must_use]
    pub fn sub(config: Config) -> Self {
        Value::new(ValueKind::Sub(config))
    }

    /// The explicit absence value, distinct from a field not being present.
    #[must_use]
    pub fn nil() -> Self {
        Value::new(ValueKind::Nil)
    }

    pub(crate) fn reference(r: Reference) -> Self {
        Value::new(ValueKind::Ref(r))
    }

    pub(crate) fn splice(s: Splice) -> Self {
        Value::new(ValueKind::Splice(s))
    }

    /// Whether this is the explicit nil value.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self.kind, ValueKind::Nil)
    }

    /// Whether this value holds a nested sub-tree.
    #[must_use]
    pub fn is_sub(&self) -> bool {
        matches!(self.kind, ValueKind::Sub(_))
    }

    /// Whether this value is an unresolved reference or splice.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, ValueKind::Ref(_) | ValueKind::Splice(_))
    }

    /// The opaque source tag attached to this value, if any.
    #[must_use]
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub(crate) fn set_meta(&mut self, meta: Option<Meta>) {
        if meta.is_some() {
            self.meta = meta;
        }
    }

    /// Static descriptor of the variant, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) => "int",
            ValueKind::Uint(_) => "uint",
            ValueKind::Float(_) => "float",
            ValueKind::Str(_) | ValueKind::Splice(_) => "string",
            ValueKind::Sub(_) => "object",
            ValueKind::Ref(_) => "reference",
            ValueKind::Nil => "nil",
        }
    }

    /// The node owning this value, if it is attached to a tree.
    #[must_use]
    pub(crate) fn owner(&self) -> Option<Config> {
        match &self.kind {
            ValueKind::Sub(c) => c.parent(),
            _ => self.ctx.parent_config(),
        }
    }

    /// Dotted path of this value within its tree.
    #[must_use]
    pub(crate) fn path(&self, sep: &str) -> String {
        match &self.kind {
            ValueKind::Sub(c) => c.path(sep),
            _ => self.ctx.path(sep),
        }
    }

    pub(crate) fn set_context(&mut self, ctx: Context) {
        if let ValueKind::Sub(c) = &self.kind {
            c.set_context(ctx.clone());
        }
        self.ctx = ctx;
    }

    /// Copy this value for insertion under `ctx`.
    ///
    /// Sub-trees are copied node by node so the inserted child is exclusively
    /// owned by its new parent (a shared handle would alias two trees).
    #[must_use]
    pub(crate) fn copied(&self, ctx: Context) -> Value {
        let kind = match &self.kind {
            ValueKind::Sub(c) => ValueKind::Sub(c.deep_copy(ctx.clone())),
            other => other.clone(),
        };
        Value {
            kind,
            ctx,
            meta: self.meta.clone(),
        }
    }

    /// Resolve `Ref` and `Splice` to a concrete value; identity otherwise.
    pub(crate) fn resolved(&self, opts: &Options) -> Result<Value> {
        match &self.kind {
            ValueKind::Ref(r) => r.resolve(self.owner().as_ref(), opts),
            ValueKind::Splice(s) => {
                let rendered = s.eval(self.owner().as_ref(), opts)?;
                let mut v = Value::str(rendered);
                v.ctx = self.ctx.clone();
                Ok(v)
            }
            _ => Ok(self.clone()),
        }
    }

    fn mismatch(&self) -> Error {
        Error::type_mismatch(self.path("."))
    }

    /// Interpret this value as a boolean.
    pub fn to_bool(&self, opts: &Options) -> Result<bool> {
        match &self.kind {
            ValueKind::Bool(b) => Ok(*b),
            ValueKind::Str(s) => parse_bool(s).ok_or_else(|| self.mismatch()),
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_bool(opts).map_err(|e| e.with_path(self.path(".")))
            }
            ValueKind::Nil => Err(Error::config_at(Reason::NilValue, self.path("."))),
            _ => Err(self.mismatch()),
        }
    }

    /// Interpret this value as a signed 64-bit integer.
    pub fn to_int(&self, opts: &Options) -> Result<i64> {
        match &self.kind {
            ValueKind::Int(i) => Ok(*i),
            ValueKind::Uint(u) => {
                i64::try_from(*u).map_err(|_| Error::config_at(Reason::Overflow, self.path(".")))
            }
            ValueKind::Float(f) => float_to_int(*f).map_err(|r| Error::config_at(r, self.path("."))),
            ValueKind::Str(s) => parse_int_prefixed(s).ok_or_else(|| self.mismatch()),
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_int(opts).map_err(|e| e.with_path(self.path(".")))
            }
            ValueKind::Nil => Err(Error::config_at(Reason::NilValue, self.path("."))),
            _ => Err(self.mismatch()),
        }
    }

    /// Interpret this value as an unsigned 64-bit integer.
    pub fn to_uint(&self, opts: &Options) -> Result<u64> {
        match &self.kind {
            ValueKind::Uint(u) => Ok(*u),
            ValueKind::Int(i) => {
                u64::try_from(*i).map_err(|_| Error::config_at(Reason::Negative, self.path(".")))
            }
            ValueKind::Float(f) => {
                float_to_uint(*f).map_err(|r| Error::config_at(r, self.path(".")))
            }
            ValueKind::Str(s) => parse_uint_prefixed(s).ok_or_else(|| self.mismatch()),
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_uint(opts).map_err(|e| e.with_path(self.path(".")))
            }
            ValueKind::Nil => Err(Error::config_at(Reason::NilValue, self.path("."))),
            _ => Err(self.mismatch()),
        }
    }

    /// Interpret this value as a 64-bit float.
    pub fn to_float(&self, opts: &Options) -> Result<f64> {
        match &self.kind {
            ValueKind::Float(f) => Ok(*f),
            ValueKind::Int(i) => Ok(*i as f64),
            ValueKind::Uint(u) => Ok(*u as f64),
            ValueKind::Str(s) => s.trim().parse::<f64>().map_err(|_| self.mismatch()),
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_float(opts).map_err(|e| e.with_path(self.path(".")))
            }
            ValueKind::Nil => Err(Error::config_at(Reason::NilValue, self.path("."))),
            _ => Err(self.mismatch()),
        }
    }

    /// Render this value as a string.
    pub fn to_str(&self, opts: &Options) -> Result<String> {
        match &self.kind {
            ValueKind::Str(s) => Ok(s.clone()),
            ValueKind::Bool(b) => Ok(b.to_string()),
            ValueKind::Int(i) => Ok(i.to_string()),
            ValueKind::Uint(u) => Ok(u.to_string()),
            ValueKind::Float(f) => Ok(f.to_string()),
            ValueKind::Nil => Ok("null".to_string()),
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_str(opts).map_err(|e| e.with_path(self.path(".")))
            }
            ValueKind::Sub(_) => Err(self.mismatch()),
        }
    }

    /// Interpret this value as a nested configuration.
    ///
    /// Nil yields a fresh empty configuration in place, so descending through
    /// explicit nulls behaves like descending through an empty object.
    pub fn to_config(&self, opts: &Options) -> Result<Config> {
        match &self.kind {
            ValueKind::Sub(c) => Ok(c.clone()),
            ValueKind::Nil => {
                let cfg = Config::new();
                cfg.set_context(self.ctx.clone());
                Ok(cfg)
            }
            ValueKind::Ref(_) | ValueKind::Splice(_) => {
                self.resolved(opts)?.to_config(opts).map_err(|e| e.with_path(self.path(".")))
            }
            _ => Err(self.mismatch()),
        }
    }

    /// Number of elements: 1 for scalars, the element count for sub-trees
    /// carrying an array, 0 for nil.
    pub fn len(&self, opts: &Options) -> Result<usize> {
        match &self.kind {
            ValueKind::Nil => Ok(0),
            ValueKind::Sub(c) => {
                let n = c.array_len();
                Ok(if n > 0 { n } else { 1 })
            }
            ValueKind::Ref(_) | ValueKind::Splice(_) => self.resolved(opts)?.len(opts),
            _ => Ok(1),
        }
    }

    /// Convert to a dynamic value, resolving references and applying
    /// redaction to string-like leaves.
    pub fn reify(&self, opts: &Options) -> Result<serde_json::Value> {
        match &self.kind {
            ValueKind::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            ValueKind::Int(i) => Ok(serde_json::Value::Number((*i).into())),
            ValueKind::Uint(u) => Ok(serde_json::Value::Number((*u).into())),
            ValueKind::Float(f) => Ok(Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number)),
            ValueKind::Str(s) => {
                if opts.redact_now() {
                    Ok(serde_json::Value::String(REDACTED.to_string()))
                } else {
                    Ok(serde_json::Value::String(s.clone()))
                }
            }
            ValueKind::Nil => Ok(serde_json::Value::Null),
            ValueKind::Sub(c) => c.reify(opts),
            ValueKind::Ref(_) | ValueKind::Splice(_) => self.resolved(opts)?.reify(opts),
        }
    }
}

/// Parse `true`/`false`/`on`/`off`, case-insensitively.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

/// Parse a signed integer with an optional `0x`/`0o`/`0b` base prefix.
pub(crate) fn parse_int_prefixed(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = parse_uint_prefixed(rest)?;
    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Parse an unsigned integer with an optional `0x`/`0o`/`0b` base prefix.
pub(crate) fn parse_uint_prefixed(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(oct) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (oct, 8)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (s, 10)
    };
    u64::from_str_radix(digits, radix).ok()
}

fn float_to_int(f: f64) -> std::result::Result<i64, Reason> {
    if !f.is_finite() {
        return Err(Reason::Overflow);
    }
    if f < i64::MIN as f64 || f > i64::MAX as f64 {
        return Err(Reason::Overflow);
    }
    Ok(f as i64)
}

fn float_to_uint(f: f64) -> std::result::Result<u64, Reason> {
    if !f.is_finite() {
        return Err(Reason::Overflow);
    }
    if f < 0.0 {
        return Err(Reason::Negative);
    }
    if f > u64::MAX as f64 {
        return Err(Reason::Overflow);
    }
    Ok(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn opts() -> Options {
        Options::new()
    }

    #[test]
    fn bool_round_trip() {
        let v = Value::bool(true);
        assert!(v.to_bool(&opts()).expect("bool"));
        assert_eq!(v.to_str(&opts()).expect("string"), "true");
        assert!(v.to_int(&opts()).is_err());
    }

    #[test]
    fn int_to_uint_rejects_negative() {
        let err = Value::int(-1).to_uint(&opts()).expect_err("negative");
        assert_eq!(*err.reason(), Reason::Negative);
    }

    #[test]
    fn uint_to_int_rejects_overflow() {
        let err = Value::uint(u64::MAX).to_int(&opts()).expect_err("overflow");
        assert_eq!(*err.reason(), Reason::Overflow);
        assert_eq!(Value::uint(23).to_int(&opts()).expect("fits"), 23);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(1.0e300)]
    fn float_to_int_rejects_out_of_range(#[case] f: f64) {
        let err = Value::float(f).to_int(&opts()).expect_err("reject");
        assert_eq!(*err.reason(), Reason::Overflow);
    }

    #[test]
    fn float_to_uint_rejects_negative() {
        let err = Value::float(-0.5).to_uint(&opts()).expect_err("negative");
        assert_eq!(*err.reason(), Reason::Negative);
    }

    #[rstest]
    #[case("42", 42)]
    #[case("0x2a", 42)]
    #[case("0o52", 42)]
    #[case("0b101010", 42)]
    #[case("-17", -17)]
    fn string_to_int_base_prefixes(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(
            Value::str(input).to_int(&opts()).expect("parse"),
            expected
        );
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("on", true)]
    #[case("false", false)]
    #[case("Off", false)]
    fn string_to_bool_literals(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(Value::str(input).to_bool(&opts()).expect("parse"), expected);
    }

    #[test]
    fn string_to_bool_rejects_other() {
        assert!(Value::str("yes").to_bool(&opts()).is_err());
    }

    #[test]
    fn nil_renders_null_and_counts_zero() {
        let v = Value::nil();
        assert_eq!(v.to_str(&opts()).expect("null"), "null");
        assert_eq!(v.len(&opts()).expect("len"), 0);
        assert_eq!(*v.to_int(&opts()).expect_err("nil").reason(), Reason::NilValue);
    }

    #[test]
    fn scalar_len_is_one() {
        assert_eq!(Value::int(3).len(&opts()).expect("len"), 1);
    }

    #[test]
    fn reify_primitives() {
        assert_eq!(Value::int(3).reify(&opts()).expect("int"), serde_json::json!(3));
        assert_eq!(
            Value::str("x").reify(&opts()).expect("str"),
            serde_json::json!("x")
        );
        assert_eq!(Value::nil().reify(&opts()).expect("nil"), serde_json::Value::Null);
    }

    #[test]
    fn reify_redacts_strings_only() {
        let armed = opts().redacting();
        assert_eq!(
            Value::str("secret").reify(&armed).expect("str"),
            serde_json::json!(REDACTED)
        );
        assert_eq!(Value::int(5).reify(&armed).expect("int"), serde_json::json!(5));
    }
}
