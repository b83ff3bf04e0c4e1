//! Materializing trees into typed targets.
//!
//! Leaf and collection conversions go through [`FromValue`]; record targets
//! implement [`Unpack`], normally via `#[derive(Config)]`. Defaults applied
//! through [`InitDefaults`] survive for fields the tree does not mention,
//! because record fields are merged in place rather than rebuilt.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::{Error, Reason, Result};
use crate::fields::FieldSet;
use crate::opts::Options;
use crate::validators::parse_duration;
use crate::value::{Value, ValueKind, REDACTED};

/// Conversion from a tree value into a concrete target type.
pub trait FromValue: Sized {
    /// Build a fresh target from `value`.
    fn from_value(value: &Value, opts: &Options) -> Result<Self>;

    /// Unpack `value` into an existing target.
    ///
    /// Leaves replace themselves; record and map targets override this to
    /// merge in place, which is what lets defaults survive partial input.
    fn merge_value(&mut self, value: &Value, opts: &Options) -> Result<()> {
        *self = Self::from_value(value, opts)?;
        Ok(())
    }
}

/// Applied to a target before it is populated, so fields the tree does not
/// mention keep their defaults. Generated from `#[config(default = …)]`
/// attributes unless a type opts into a hand-written impl.
pub trait InitDefaults {
    /// Write default values into `self`.
    fn init_defaults(&mut self) {}
}

/// Whole-record validation, run over the fully-populated target after every
/// field validator has passed. Opted into with the struct-level
/// `#[config(validate)]` attribute.
pub trait Validate {
    /// Check the populated record.
    fn validate(&self) -> Result<()>;
}

/// A record target for [`Config::unpack`].
pub trait Unpack {
    /// Populate `self` from `cfg`, recording consumed field names in
    /// `claimed`. `squash`ed records share their parent's claim set.
    fn unpack_fields(
        &mut self,
        cfg: &Config,
        opts: &Options,
        claimed: &mut FieldSet<'_>,
    ) -> Result<()>;

    /// Populate `self` from `cfg`; in strict mode, fields nothing claimed
    /// are an error.
    fn unpack_from(&mut self, cfg: &Config, opts: &Options) -> Result<()> {
        let mut claimed = FieldSet::new(None);
        self.unpack_fields(cfg, opts, &mut claimed)?;
        if opts.is_strict() {
            cfg.ensure_all_claimed(&claimed)?;
        }
        Ok(())
    }
}

impl Config {
    /// Unpack this tree into `target` under default options.
    ///
    /// On error the target may have been partially written; only the error
    /// carries meaning, the target's contents do not.
    pub fn unpack<T: Unpack + ?Sized>(&self, target: &mut T) -> Result<()> {
        self.unpack_with(target, &Options::default())
    }

    /// Unpack this tree into `target`.
    ///
    /// On error the target may have been partially written; only the error
    /// carries meaning, the target's contents do not.
    pub fn unpack_with<T: Unpack + ?Sized>(&self, target: &mut T, opts: &Options) -> Result<()> {
        let opts = opts.clone();
        target.unpack_from(self, &opts)
    }
}

// --- leaves ---------------------------------------------------------------

impl FromValue for bool {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        value.to_bool(opts)
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        value.to_int(opts)
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        value.to_uint(opts)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        value.to_float(opts)
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        let wide = value.to_float(opts)?;
        Ok(wide as f32)
    }
}

macro_rules! from_value_narrow_int {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value, opts: &Options) -> Result<Self> {
                let wide = value.to_int(opts)?;
                <$t>::try_from(wide)
                    .map_err(|_| Error::config_at(Reason::Overflow, value_path(value)))
            }
        }
    )*};
}

macro_rules! from_value_narrow_uint {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            fn from_value(value: &Value, opts: &Options) -> Result<Self> {
                let wide = value.to_uint(opts)?;
                <$t>::try_from(wide)
                    .map_err(|_| Error::config_at(Reason::Overflow, value_path(value)))
            }
        }
    )*};
}

from_value_narrow_int!(i8, i16, i32, isize);
from_value_narrow_uint!(u8, u16, u32, usize);

fn value_path(value: &Value) -> String {
    value.path(".")
}

impl FromValue for String {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        if opts.redact_now() {
            return Ok(REDACTED.to_string());
        }
        value.to_str(opts)
    }
}

/// Durations unpack from duration literals (`"300ms"`, `"2h45m"`) or from
/// numbers, read as nanoseconds.
impl FromValue for Duration {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        let resolved = value.resolved(opts)?;
        match &resolved.kind {
            ValueKind::Str(s) => {
                parse_duration(s).ok_or_else(|| Error::type_mismatch(value_path(value)))
            }
            ValueKind::Int(_) | ValueKind::Uint(_) => {
                let nanos = resolved.to_uint(opts)?;
                Ok(Duration::from_nanos(nanos))
            }
            ValueKind::Float(f) if *f >= 0.0 && f.is_finite() => {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let nanos = *f as u64;
                Ok(Duration::from_nanos(nanos))
            }
            _ => Err(Error::type_mismatch(value_path(value))),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        if value.is_nil() {
            return Ok(None);
        }
        Ok(Some(T::from_value(value, opts)?))
    }
}

// --- sequences ------------------------------------------------------------

fn array_source(value: &Value, opts: &Options) -> Result<Option<Config>> {
    let resolved = value.resolved(opts)?;
    match &resolved.kind {
        ValueKind::Sub(cfg) => {
            if cfg.array_len() == 0 && !cfg.keys().is_empty() {
                return Err(Error::config_at(Reason::NoArray, value_path(value)));
            }
            Ok(Some(cfg.clone()))
        }
        ValueKind::Nil => Ok(None),
        _ => Err(Error::config_at(Reason::NoArray, value_path(value))),
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        let Some(cfg) = array_source(value, opts)? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(cfg.array_len());
        for idx in 0..cfg.array_len() {
            let element = cfg.get_at_raw(idx).expect("index in range");
            out.push(T::from_value(&element, opts)?);
        }
        Ok(out)
    }
}

impl<T: FromValue, const N: usize> FromValue for [T; N] {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        let items: Vec<T> = Vec::from_value(value, opts)?;
        if items.len() != N {
            return Err(Error::config_at(
                Reason::ArraySizeMismatch,
                value_path(value),
            ));
        }
        items
            .try_into()
            .map_err(|_| Error::config_at(Reason::ArraySizeMismatch, value_path(value)))
    }
}

// --- mappings and other whole-tree targets --------------------------------

macro_rules! map_target {
    ($($map:ident),*) => {$(
        impl<T: FromValue> Unpack for $map<String, T> {
            fn unpack_fields(
                &mut self,
                cfg: &Config,
                opts: &Options,
                claimed: &mut FieldSet<'_>,
            ) -> Result<()> {
                for name in cfg.keys() {
                    claimed.add(&name);
                    let value = cfg.get_raw(&name).expect("key listed");
                    let field_opts = cfg.field_unpack_opts(&name, false, opts);
                    let item = T::from_value(&value, &field_opts)
                        .map_err(|e| e.with_path(cfg.path_of(&name, ".")))?;
                    self.insert(name, item);
                }
                Ok(())
            }
        }

        impl<T: FromValue> FromValue for $map<String, T> {
            fn from_value(value: &Value, opts: &Options) -> Result<Self> {
                let mut out = Self::default();
                out.merge_value(value, opts)?;
                Ok(out)
            }

            fn merge_value(&mut self, value: &Value, opts: &Options) -> Result<()> {
                let cfg = value.to_config(opts)?;
                let mut claimed = FieldSet::new(None);
                self.unpack_fields(&cfg, opts, &mut claimed)
            }
        }
    )*};
}

map_target!(HashMap, BTreeMap, IndexMap);

impl<T: FromValue> Unpack for Vec<T> {
    fn unpack_fields(
        &mut self,
        cfg: &Config,
        opts: &Options,
        _claimed: &mut FieldSet<'_>,
    ) -> Result<()> {
        *self = Vec::from_value(&Value::sub(cfg.clone()), opts)?;
        Ok(())
    }
}

impl Unpack for serde_json::Value {
    fn unpack_fields(
        &mut self,
        cfg: &Config,
        opts: &Options,
        claimed: &mut FieldSet<'_>,
    ) -> Result<()> {
        for name in cfg.keys() {
            claimed.add(&name);
        }
        *self = cfg.reify(opts)?;
        Ok(())
    }
}

/// Unpacking into a configuration merges rather than copies.
impl Unpack for Config {
    fn unpack_fields(
        &mut self,
        cfg: &Config,
        opts: &Options,
        claimed: &mut FieldSet<'_>,
    ) -> Result<()> {
        for name in cfg.keys() {
            claimed.add(&name);
        }
        self.merge(cfg, opts)
    }
}

impl FromValue for Config {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        let out = Config::new();
        out.merge_value_into(value, opts)?;
        Ok(out)
    }

    fn merge_value(&mut self, value: &Value, opts: &Options) -> Result<()> {
        self.merge_value_into(value, opts)
    }
}

impl Config {
    fn merge_value_into(&self, value: &Value, opts: &Options) -> Result<()> {
        let child = value.to_config(opts)?;
        self.merge(&child, opts)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value, _opts: &Options) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value, opts: &Options) -> Result<Self> {
        value.reify(opts)
    }
}
