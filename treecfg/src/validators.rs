//! Tag-driven validation of unpacked values.
//!
//! Validators live in a process-wide registry keyed by name. The registry is
//! seeded with the built-ins on first use; additional validators must be
//! registered during initialization, before configuration unpacking begins.
//!
//! A `validate` tag carries a comma-separated list of invocations, each
//! `name` or `name=param`. Callbacks see the value through the [`Checked`]
//! view rather than the concrete field type.

use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use indexmap::IndexMap;

use crate::config::Config;
use crate::error::{Error, Reason, Result};
use crate::value::{parse_int_prefixed, parse_uint_prefixed};

/// Type-erased view of a value under validation.
#[derive(Debug, Clone, Copy)]
pub enum Checked<'a> {
    /// A signed number.
    Int(i64),
    /// An unsigned number.
    Uint(u64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(&'a str),
    /// A collection, seen only through its element count.
    Len(usize),
    /// A duration.
    Duration(Duration),
    /// Absent or out of scope for validation.
    Nothing,
}

/// Conversion into the [`Checked`] view. Implemented for every type the
/// built-in validators can see; implement it for your own field types to
/// make them validatable.
pub trait AsChecked {
    /// The validation view of this value.
    fn as_checked(&self) -> Checked<'_>;
}

macro_rules! checked_int {
    ($($t:ty),*) => {$(
        impl AsChecked for $t {
            fn as_checked(&self) -> Checked<'_> {
                Checked::Int(i64::from(*self))
            }
        }
    )*};
}

macro_rules! checked_uint {
    ($($t:ty),*) => {$(
        impl AsChecked for $t {
            fn as_checked(&self) -> Checked<'_> {
                Checked::Uint(u64::from(*self))
            }
        }
    )*};
}

checked_int!(i8, i16, i32, i64);
checked_uint!(u8, u16, u32, u64);

impl AsChecked for isize {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Int(i64::try_from(*self).unwrap_or(i64::MAX))
    }
}

impl AsChecked for usize {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Uint(u64::try_from(*self).unwrap_or(u64::MAX))
    }
}

impl AsChecked for f32 {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Float(f64::from(*self))
    }
}

impl AsChecked for f64 {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Float(*self)
    }
}

impl AsChecked for bool {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Nothing
    }
}

impl AsChecked for str {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Str(self)
    }
}

impl AsChecked for String {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Str(self)
    }
}

impl AsChecked for Duration {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Duration(*self)
    }
}

impl<T> AsChecked for Vec<T> {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Len(self.len())
    }
}

impl<K, V> AsChecked for HashMap<K, V> {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Len(self.len())
    }
}

impl<K, V> AsChecked for BTreeMap<K, V> {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Len(self.len())
    }
}

impl<K, V> AsChecked for IndexMap<K, V> {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Len(self.len())
    }
}

impl<T: AsChecked> AsChecked for Option<T> {
    fn as_checked(&self) -> Checked<'_> {
        match self {
            Some(inner) => inner.as_checked(),
            None => Checked::Nothing,
        }
    }
}

impl AsChecked for Config {
    fn as_checked(&self) -> Checked<'_> {
        Checked::Len(self.keys().len() + self.array_len())
    }
}

/// A validator callback: the value view plus the raw `=param` text.
pub type ValidatorCallback = fn(&Checked<'_>, &str) -> Result<()>;

static VALIDATORS: LazyLock<RwLock<HashMap<String, ValidatorCallback>>> = LazyLock::new(|| {
    let mut table: HashMap<String, ValidatorCallback> = HashMap::new();
    table.insert("nonzero".to_string(), validate_nonzero);
    table.insert("positive".to_string(), validate_positive);
    table.insert("min".to_string(), validate_min);
    table.insert("max".to_string(), validate_max);
    table.insert("required".to_string(), validate_required);
    RwLock::new(table)
});

/// Register a validator under `name`.
///
/// # Errors
///
/// Fails with `duplicate validator` when the name is already taken,
/// including the built-in names.
pub fn register_validator(name: &str, callback: ValidatorCallback) -> Result<()> {
    let mut table = VALIDATORS.write().expect("validator table poisoned");
    if table.contains_key(name) {
        return Err(Error::implementation(Reason::DuplicateValidator));
    }
    table.insert(name.to_string(), callback);
    Ok(())
}

/// Run a comma-separated validator tag against a value.
///
/// Failures carry the dotted `path` of the field under validation. An
/// unregistered validator name is an implementation error.
pub fn run_validators(value: &Checked<'_>, tags: &str, path: &str) -> Result<()> {
    for spec in tags.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        let (name, param) = match spec.split_once('=') {
            Some((name, param)) => (name.trim(), param.trim()),
            None => (spec, ""),
        };
        let callback = {
            let table = VALIDATORS.read().expect("validator table poisoned");
            table.get(name).copied()
        };
        let Some(callback) = callback else {
            return Err(
                Error::implementation(Reason::Message(format!("unknown validator '{name}'")))
                    .with_path(path),
            );
        };
        callback(value, param).map_err(|e| e.with_path(path))?;
    }
    Ok(())
}

fn validate_nonzero(value: &Checked<'_>, _param: &str) -> Result<()> {
    match value {
        Checked::Int(0) | Checked::Uint(0) => Err(Error::config(Reason::ZeroValue)),
        Checked::Float(f) if *f == 0.0 => Err(Error::config(Reason::ZeroValue)),
        Checked::Duration(d) if d.is_zero() => Err(Error::config(Reason::ZeroValue)),
        Checked::Str("") | Checked::Len(0) => Err(Error::config(Reason::Empty)),
        _ => Ok(()),
    }
}

fn validate_positive(value: &Checked<'_>, _param: &str) -> Result<()> {
    match value {
        Checked::Int(i) if *i < 0 => Err(Error::config(Reason::Negative)),
        Checked::Float(f) if *f < 0.0 => Err(Error::config(Reason::Negative)),
        _ => Ok(()),
    }
}

fn validate_required(value: &Checked<'_>, _param: &str) -> Result<()> {
    match value {
        Checked::Nothing | Checked::Str("") | Checked::Len(0) => {
            Err(Error::config(Reason::Required))
        }
        _ => Ok(()),
    }
}

fn validate_min(value: &Checked<'_>, param: &str) -> Result<()> {
    compare_bound(value, param, false)
}

fn validate_max(value: &Checked<'_>, param: &str) -> Result<()> {
    compare_bound(value, param, true)
}

/// Shared `min`/`max` logic. The parameter parses as an integer, a float, or
/// a duration literal, following the shape of the value under validation.
fn compare_bound(value: &Checked<'_>, param: &str, upper: bool) -> Result<()> {
    let fail = |rel: &str| Err(Error::config(Reason::Message(format!("value {rel} {param}"))));
    match value {
        Checked::Int(i) => {
            let bound = parse_int_prefixed(param).ok_or_else(|| bad_param(param))?;
            match (upper, *i) {
                (false, v) if v < bound => fail("<"),
                (true, v) if v > bound => fail(">"),
                _ => Ok(()),
            }
        }
        Checked::Uint(u) => {
            let bound = parse_uint_prefixed(param).ok_or_else(|| bad_param(param))?;
            match (upper, *u) {
                (false, v) if v < bound => fail("<"),
                (true, v) if v > bound => fail(">"),
                _ => Ok(()),
            }
        }
        Checked::Float(f) => {
            let bound: f64 = param.parse().map_err(|_| bad_param(param))?;
            match (upper, *f) {
                (false, v) if v < bound => fail("<"),
                (true, v) if v > bound => fail(">"),
                _ => Ok(()),
            }
        }
        Checked::Duration(d) => {
            let bound = parse_duration(param).ok_or_else(|| bad_param(param))?;
            match (upper, *d) {
                (false, v) if v < bound => fail("<"),
                (true, v) if v > bound => fail(">"),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn bad_param(param: &str) -> Error {
    Error::implementation(Reason::Message(format!(
        "invalid validator parameter '{param}'"
    )))
}

/// Parse a duration literal: a sequence of `<number><unit>` terms with units
/// `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`, e.g. `"300ms"` or `"2h45m"`.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input == "0" {
        return Some(Duration::ZERO);
    }
    if input.is_empty() {
        return None;
    }

    let mut nanos = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let number: f64 = rest[..digits].parse().ok()?;
        let unit = &rest[digits..];
        let (scale, consumed) = if unit.starts_with("ns") {
            (1.0, 2)
        } else if unit.starts_with("us") {
            (1e3, 2)
        } else if unit.starts_with("µs") {
            (1e3, "µs".len())
        } else if unit.starts_with("ms") {
            (1e6, 2)
        } else if unit.starts_with('s') {
            (1e9, 1)
        } else if unit.starts_with('m') {
            (6e10, 1)
        } else if unit.starts_with('h') {
            (3.6e12, 1)
        } else {
            return None;
        };
        nanos += number * scale;
        rest = &unit[consumed..];
    }

    if nanos.is_finite() && nanos >= 0.0 {
        Some(Duration::from_nanos(nanos as u64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn nonzero_rejects_zero_numbers() {
        assert!(run_validators(&Checked::Int(0), "nonzero", "a").is_err());
        assert!(run_validators(&Checked::Int(1), "nonzero", "a").is_ok());
        let err = run_validators(&Checked::Uint(0), "nonzero", "a").expect_err("zero");
        assert_eq!(*err.reason(), Reason::ZeroValue);
        assert_eq!(err.path(), "a");
    }

    #[test]
    fn nonzero_rejects_empty_strings_and_collections() {
        let err = run_validators(&Checked::Str(""), "nonzero", "s").expect_err("empty");
        assert_eq!(*err.reason(), Reason::Empty);
        assert!(run_validators(&Checked::Len(0), "nonzero", "l").is_err());
        assert!(run_validators(&Checked::Str("x"), "nonzero", "s").is_ok());
    }

    #[test]
    fn positive_rejects_negative() {
        let err = run_validators(&Checked::Int(-1), "positive", "n").expect_err("negative");
        assert_eq!(*err.reason(), Reason::Negative);
        assert!(run_validators(&Checked::Int(0), "positive", "n").is_ok());
        assert!(run_validators(&Checked::Float(-0.5), "positive", "n").is_err());
    }

    #[rstest]
    #[case(Checked::Int(5), "min=2", true)]
    #[case(Checked::Int(1), "min=2", false)]
    #[case(Checked::Uint(9), "max=10", true)]
    #[case(Checked::Uint(11), "max=10", false)]
    #[case(Checked::Float(0.5), "min=0.1", true)]
    #[case(Checked::Float(0.05), "min=0.1", false)]
    fn numeric_bounds(#[case] value: Checked<'_>, #[case] tag: &str, #[case] ok: bool) {
        assert_eq!(run_validators(&value, tag, "n").is_ok(), ok);
    }

    #[test]
    fn duration_bounds_parse_literals() {
        let value = Checked::Duration(Duration::from_secs(90));
        assert!(run_validators(&value, "min=1m", "d").is_ok());
        assert!(run_validators(&value, "max=1m", "d").is_err());
        assert!(run_validators(&value, "min=1m30s", "d").is_ok());
    }

    #[test]
    fn comma_separated_tags_all_run() {
        assert!(run_validators(&Checked::Int(5), "nonzero, min=2, max=9", "n").is_ok());
        assert!(run_validators(&Checked::Int(12), "nonzero, min=2, max=9", "n").is_err());
    }

    #[test]
    fn required_checks_presence_and_emptiness() {
        assert!(run_validators(&Checked::Nothing, "required", "r").is_err());
        assert!(run_validators(&Checked::Str(""), "required", "r").is_err());
        assert!(run_validators(&Checked::Str("v"), "required", "r").is_ok());
    }

    #[test]
    fn unknown_validator_is_an_implementation_error() {
        let err = run_validators(&Checked::Int(1), "does_not_exist", "x").expect_err("unknown");
        assert_eq!(err.class(), crate::error::Class::Implementation);
    }

    #[test]
    fn duplicate_registration_fails() {
        fn never(_: &Checked<'_>, _: &str) -> Result<()> {
            Ok(())
        }
        register_validator("registered_once", never).expect("first");
        let err = register_validator("registered_once", never).expect_err("second");
        assert_eq!(*err.reason(), Reason::DuplicateValidator);
        let err = register_validator("nonzero", never).expect_err("builtin");
        assert_eq!(*err.reason(), Reason::DuplicateValidator);
    }

    #[rstest]
    #[case("300ms", Duration::from_millis(300))]
    #[case("2h45m", Duration::from_secs(2 * 3600 + 45 * 60))]
    #[case("1.5s", Duration::from_millis(1500))]
    #[case("100ns", Duration::from_nanos(100))]
    #[case("0", Duration::ZERO)]
    fn duration_literals(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).expect("parse"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("5")]
    #[case("five seconds")]
    #[case("-5s")]
    fn invalid_duration_literals(#[case] input: &str) {
        assert!(parse_duration(input).is_none());
    }
}
