//! Expansion of `#[derive(Config)]`.

mod generate;
mod parse;

use proc_macro2::TokenStream;
use syn::{Data, DeriveInput, Fields};

pub(crate) use parse::{FieldAttrs, MergeStrategy, StructAttrs};

/// A record field together with its parsed attributes and effective name.
pub(crate) struct RecordField {
    pub ident: syn::Ident,
    pub name: String,
    pub attrs: FieldAttrs,
}

pub(crate) fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Config cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &data.fields,
                    "Config requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Config can only be derived for structs",
            ));
        }
    };

    let struct_attrs = parse::parse_struct_attrs(&input.attrs)?;

    let mut records = Vec::with_capacity(fields.len());
    for field in fields {
        let attrs = parse::parse_field_attrs(&field.attrs)?;
        let ident = field.ident.clone().expect("named field");
        let name = attrs
            .rename
            .clone()
            .unwrap_or_else(|| ident.to_string().to_lowercase());
        records.push(RecordField {
            ident,
            name,
            attrs,
        });
    }

    Ok(generate::record_impls(&input.ident, &struct_attrs, &records))
}
