//! Normalization of heterogeneous sources into canonical trees.
//!
//! Two traits cover the input space: [`ToValue`] turns one value into its
//! canonical [`Value`], [`ToConfig`] turns a whole source (mapping, record,
//! sequence, existing tree) into a [`Config`]. `#[derive(Config)]` generates
//! both for record types; the impls below cover primitives, collections,
//! dynamic values, and existing trees.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::{Error, Reason, Result};
use crate::fields::FieldSet;
use crate::opts::Options;
use crate::value::Value;
use crate::variables::{parse_template, Piece, Splice};

/// Normalize one value into its canonical representation.
pub trait ToValue {
    /// Produce the canonical value under the given options.
    fn to_value(&self, opts: &Options) -> Result<Value>;
}

/// Normalize a whole source into a configuration tree.
pub trait ToConfig {
    /// Produce a fresh tree from this source.
    fn to_config(&self, opts: &Options) -> Result<Config> {
        let cfg = Config::new();
        let mut claimed = FieldSet::new(None);
        self.to_config_into(&cfg, &mut claimed, opts)?;
        Ok(cfg)
    }

    /// Write this source's fields into `cfg`. `claimed` tracks names already
    /// taken at this level, so fields collapsing onto one name (through
    /// renaming or squashing) fail with `duplicate field key`.
    fn to_config_into(
        &self,
        cfg: &Config,
        claimed: &mut FieldSet<'_>,
        opts: &Options,
    ) -> Result<()>;
}

impl Config {
    /// Build a tree by normalizing `source`.
    pub fn from_source<S: ToConfig + ?Sized>(source: &S, opts: &Options) -> Result<Config> {
        let opts = opts.clone();
        let cfg = source.to_config(&opts)?;
        cfg.set_meta(opts.meta.clone());
        Ok(cfg)
    }
}

/// Scan a string for `${…}` and classify the result: a plain string, a bare
/// reference, or a splice. Scanning only happens under `var_exp`.
pub(crate) fn normalize_string(s: &str, opts: &Options) -> Result<Value> {
    if !opts.is_var_exp() || !s.contains("${") {
        return Ok(Value::str(s));
    }
    let mut pieces = parse_template(s, opts)?;
    if pieces.is_empty() {
        return Ok(Value::str(""));
    }
    if pieces.len() == 1 {
        return Ok(match pieces.remove(0) {
            Piece::Str(plain) => Value::str(plain),
            Piece::Ref(reference) => Value::reference(reference),
            expansion @ Piece::Exp(_) => Value::splice(Splice::from_pieces(vec![expansion])),
        });
    }
    Ok(Value::splice(Splice::from_pieces(pieces)))
}

// --- primitives -----------------------------------------------------------

impl ToValue for bool {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        Ok(Value::bool(*self))
    }
}

macro_rules! to_value_via {
    ($ctor:ident, $via:ty: $($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self, _opts: &Options) -> Result<Value> {
                Ok(Value::$ctor(<$via>::from(*self)))
            }
        }
    )*};
}

to_value_via!(int, i64: i8, i16, i32, i64);
to_value_via!(uint, u64: u8, u16, u32, u64);
to_value_via!(float, f64: f32, f64);

impl ToValue for isize {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        let v = i64::try_from(*self).map_err(|_| Error::config(Reason::Overflow))?;
        Ok(Value::int(v))
    }
}

impl ToValue for usize {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        let v = u64::try_from(*self).map_err(|_| Error::config(Reason::Overflow))?;
        Ok(Value::uint(v))
    }
}

impl ToValue for str {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        normalize_string(self, opts)
    }
}

impl ToValue for String {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        normalize_string(self, opts)
    }
}

/// Durations normalize to their nanosecond count, matching the unpacking
/// direction where integers are read as nanoseconds.
impl ToValue for Duration {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        let nanos = u64::try_from(self.as_nanos()).map_err(|_| Error::config(Reason::Overflow))?;
        Ok(Value::uint(nanos))
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        (**self).to_value(opts)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(opts),
            None => Ok(Value::nil()),
        }
    }
}

// --- sequences ------------------------------------------------------------

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        let cfg = Config::new();
        for item in self {
            cfg.push_raw(item.to_value(opts)?);
        }
        Ok(Value::sub(cfg))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        self.as_slice().to_value(opts)
    }
}

impl<T: ToValue, const N: usize> ToValue for [T; N] {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        self.as_slice().to_value(opts)
    }
}

// --- mappings -------------------------------------------------------------

macro_rules! map_source {
    ($($map:ident),*) => {$(
        impl<T: ToValue> ToValue for $map<String, T> {
            fn to_value(&self, opts: &Options) -> Result<Value> {
                Ok(Value::sub(self.to_config(opts)?))
            }
        }

        impl<T: ToValue> ToConfig for $map<String, T> {
            fn to_config_into(
                &self,
                cfg: &Config,
                claimed: &mut FieldSet<'_>,
                opts: &Options,
            ) -> Result<()> {
                for (name, value) in self {
                    if !claimed.add_new(name) {
                        return Err(Error::duplicate_key(name.clone()));
                    }
                    cfg.set_raw(name, value.to_value(opts)?);
                }
                Ok(())
            }
        }
    )*};
}

map_source!(HashMap, BTreeMap, IndexMap);

// --- dynamic values -------------------------------------------------------

impl ToValue for serde_json::Value {
    fn to_value(&self, opts: &Options) -> Result<Value> {
        match self {
            serde_json::Value::Null => Ok(Value::nil()),
            serde_json::Value::Bool(b) => Ok(Value::bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Value::uint(u))
                } else {
                    n.as_f64()
                        .map(Value::float)
                        .ok_or_else(|| Error::config(Reason::TypeMismatch))
                }
            }
            serde_json::Value::String(s) => normalize_string(s, opts),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Ok(Value::sub(self.to_config(opts)?))
            }
        }
    }
}

impl ToConfig for serde_json::Value {
    fn to_config_into(
        &self,
        cfg: &Config,
        claimed: &mut FieldSet<'_>,
        opts: &Options,
    ) -> Result<()> {
        match self {
            serde_json::Value::Object(map) => {
                for (name, value) in map {
                    if !claimed.add_new(name) {
                        return Err(Error::duplicate_key(name.clone()));
                    }
                    cfg.set_raw(name, value.to_value(opts)?);
                }
                Ok(())
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    cfg.push_raw(item.to_value(opts)?);
                }
                Ok(())
            }
            _ => Err(Error::config(Reason::ExpectedObject)),
        }
    }
}

// --- existing trees -------------------------------------------------------

impl ToValue for Value {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        Ok(self.clone())
    }
}

impl ToValue for Config {
    fn to_value(&self, _opts: &Options) -> Result<Value> {
        Ok(Value::sub(self.clone()))
    }
}

impl ToConfig for Config {
    /// An existing tree normalizes to itself; the handle is shared, not
    /// copied.
    fn to_config(&self, _opts: &Options) -> Result<Config> {
        Ok(self.clone())
    }

    fn to_config_into(
        &self,
        cfg: &Config,
        claimed: &mut FieldSet<'_>,
        _opts: &Options,
    ) -> Result<()> {
        for name in self.keys() {
            if !claimed.add_new(&name) {
                return Err(Error::duplicate_key(name));
            }
            cfg.set_raw(&name, self.get_raw(&name).expect("key listed"));
            cfg.tag_field(&name, self.field_flags(&name));
        }
        for idx in 0..self.array_len() {
            cfg.push_raw(self.get_at_raw(idx).expect("index in range"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_normalize_to_matching_variants() {
        let opts = Options::new();
        let cfg = Config::from_source(
            &json!({"b": true, "i": -42, "u": 23, "f": 3.14, "s": "string"}),
            &opts,
        )
        .expect("normalize");
        assert!(cfg.get_bool("b", None, &opts).expect("b"));
        assert_eq!(cfg.get_int("i", None, &opts).expect("i"), -42);
        assert_eq!(cfg.get_uint("u", None, &opts).expect("u"), 23);
        assert!((cfg.get_float("f", None, &opts).expect("f") - 3.14).abs() < 1e-9);
        assert_eq!(cfg.get_str("s", None, &opts).expect("s"), "string");
    }

    #[test]
    fn sequences_populate_the_positional_side() {
        let opts = Options::new();
        let cfg = Config::from_source(&json!([1, 2, 3]), &opts).expect("normalize");
        assert!(cfg.is_array());
        assert_eq!(cfg.array_len(), 3);
        assert_eq!(cfg.get_int("", Some(2), &opts).expect("element"), 3);
    }

    #[test]
    fn scalar_top_level_is_rejected() {
        let err = Config::from_source(&json!(42), &Options::new()).expect_err("scalar");
        assert_eq!(*err.reason(), Reason::ExpectedObject);
    }

    #[test]
    fn null_becomes_explicit_nil() {
        let opts = Options::new();
        let cfg = Config::from_source(&json!({"gone": null}), &opts).expect("normalize");
        assert!(cfg.has("gone", None, &opts).expect("present"));
        assert_eq!(cfg.count_field("gone"), Some(0));
    }

    #[test]
    fn string_without_var_exp_stays_plain() {
        let opts = Options::new();
        let v = normalize_string("${ref}", &opts).expect("plain");
        assert!(!v.is_lazy());
    }

    #[test]
    fn string_with_var_exp_becomes_reference() {
        let opts = Options::new().var_exp();
        let v = normalize_string("${ref}", &opts).expect("ref");
        assert!(v.is_lazy());
        assert_eq!(v.type_name(), "reference");
    }

    #[test]
    fn mixed_template_becomes_splice() {
        let opts = Options::new().var_exp();
        let v = normalize_string("x${a}y", &opts).expect("splice");
        assert_eq!(v.type_name(), "string");
        assert!(v.is_lazy());
    }

    #[test]
    fn escaped_template_collapses_to_plain_string() {
        let opts = Options::new().var_exp();
        let v = normalize_string("$${a}", &opts).expect("plain");
        assert!(!v.is_lazy());
        assert_eq!(v.to_str(&opts).expect("str"), "${a}");
    }

    #[test]
    fn maps_normalize_with_nested_values() {
        let opts = Options::new();
        let mut inner = BTreeMap::new();
        inner.insert("port".to_string(), 8080_i64);
        let mut outer = BTreeMap::new();
        outer.insert("server".to_string(), inner);
        let cfg = Config::from_source(&outer, &opts).expect("normalize");
        let opts_dot = Options::new().path_sep(".");
        assert_eq!(
            cfg.get_int("server.port", None, &opts_dot).expect("port"),
            8080
        );
    }

    #[test]
    fn duration_normalizes_to_nanoseconds() {
        let opts = Options::new();
        let v = Duration::from_millis(5).to_value(&opts).expect("duration");
        assert_eq!(v.to_uint(&opts).expect("ns"), 5_000_000);
    }
}
