//! Parsing of `#[config(...)]` attributes.

use syn::meta::ParseNestedMeta;
use syn::{Attribute, Expr, Lit};

/// Struct-level attributes recognised by `#[derive(Config)]`.
#[derive(Default, Clone)]
pub(crate) struct StructAttrs {
    /// Run the type's `Validate` impl after unpacking.
    pub validate: bool,
    /// The type supplies its own `InitDefaults` impl.
    pub manual_init_defaults: bool,
}

/// Merge strategy named by a field attribute.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeStrategy {
    Replace,
    Append,
    Prepend,
}

/// Field-level attributes recognised by `#[derive(Config)]`.
///
/// - `rename` overrides the configuration name derived from the field
///   identifier.
/// - `squash`/`inline` flatten the sub-record into the enclosing level.
/// - `replace`/`append`/`prepend` record the field's merge strategy.
/// - `redact` marks the value for emit-time redaction.
/// - `required` makes absence an error during unpacking.
/// - `default` supplies an expression applied before population.
/// - `validate` carries the comma-separated validator tag.
#[derive(Default, Clone)]
pub(crate) struct FieldAttrs {
    pub rename: Option<String>,
    pub squash: bool,
    pub strategy: Option<MergeStrategy>,
    pub redact: bool,
    pub required: bool,
    pub default: Option<Expr>,
    pub validate: Option<String>,
}

/// Iterate all `#[config(...)]` attributes once and apply a callback.
fn parse_config_attrs<F>(attrs: &[Attribute], mut f: F) -> syn::Result<()>
where
    F: FnMut(&ParseNestedMeta<'_>) -> syn::Result<()>,
{
    for attr in attrs.iter().filter(|a| a.path().is_ident("config")) {
        attr.parse_nested_meta(|meta| f(&meta))?;
    }
    Ok(())
}

fn string_value(meta: &ParseNestedMeta<'_>, what: &str) -> syn::Result<String> {
    let lit = meta.value()?.parse::<Lit>()?;
    if let Lit::Str(s) = lit {
        Ok(s.value())
    } else {
        Err(meta.error(format!("{what} must be a string literal")))
    }
}

pub(crate) fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<StructAttrs> {
    let mut out = StructAttrs::default();
    parse_config_attrs(attrs, |meta| {
        if meta.path.is_ident("validate") {
            out.validate = true;
        } else if meta.path.is_ident("init_defaults") {
            out.manual_init_defaults = true;
        } else {
            return Err(meta.error("unknown struct-level config attribute"));
        }
        Ok(())
    })?;
    Ok(out)
}

pub(crate) fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    parse_config_attrs(attrs, |meta| {
        if meta.path.is_ident("rename") {
            out.rename = Some(string_value(meta, "rename")?);
        } else if meta.path.is_ident("squash") || meta.path.is_ident("inline") {
            out.squash = true;
        } else if meta.path.is_ident("replace") {
            set_strategy(&mut out, MergeStrategy::Replace, meta)?;
        } else if meta.path.is_ident("append") {
            set_strategy(&mut out, MergeStrategy::Append, meta)?;
        } else if meta.path.is_ident("prepend") {
            set_strategy(&mut out, MergeStrategy::Prepend, meta)?;
        } else if meta.path.is_ident("redact") {
            out.redact = true;
        } else if meta.path.is_ident("required") {
            out.required = true;
        } else if meta.path.is_ident("default") {
            out.default = Some(meta.value()?.parse::<Expr>()?);
        } else if meta.path.is_ident("validate") {
            out.validate = Some(string_value(meta, "validate")?);
        } else {
            return Err(meta.error("unknown config attribute"));
        }
        Ok(())
    })?;
    Ok(out)
}

fn set_strategy(
    out: &mut FieldAttrs,
    strategy: MergeStrategy,
    meta: &ParseNestedMeta<'_>,
) -> syn::Result<()> {
    if out.strategy.is_some() {
        return Err(meta.error("conflicting merge strategies"));
    }
    out.strategy = Some(strategy);
    Ok(())
}
