//! Procedural macros for `treecfg`.
//!
//! [`derive@Config`] turns a plain struct into a configuration record: it
//! implements the normalization traits (`ToValue`, `ToConfig`), the
//! unpacking traits (`Unpack`, `FromValue`, `InitDefaults`), and wires
//! field-level tag modifiers and validators through the `#[config(...)]`
//! attribute.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod derive;

/// Derive configuration record support for a struct with named fields.
///
/// The target must implement `Default`. Recognized field attributes:
///
/// - `#[config(rename = "name")]` - the field's configuration name; the
///   field identifier is used otherwise. With a path separator configured,
///   a name like `"a.b.c"` addresses a nested setting during unpacking.
/// - `#[config(squash)]` / `#[config(inline)]` - merge the sub-record's
///   fields into the enclosing level instead of nesting them.
/// - `#[config(replace)]` / `#[config(append)]` / `#[config(prepend)]` -
///   merge strategy recorded on the field during normalization.
/// - `#[config(redact)]` - replace the emitted value of string-like targets
///   with `"[REDACTED]"` unless `show_redacted` is set.
/// - `#[config(required)]` - fail unpacking when the field is absent.
/// - `#[config(default = expr)]` - value applied before population.
/// - `#[config(validate = "nonzero,min=2")]` - validators run after the
///   field is populated.
///
/// Struct-level attributes: `#[config(validate)]` runs the type's
/// `Validate` impl over the fully-populated record; `#[config(init_defaults)]`
/// suppresses the generated `InitDefaults` impl in favour of a hand-written
/// one.
#[proc_macro_derive(Config, attributes(config))]
pub fn derive_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    derive::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
