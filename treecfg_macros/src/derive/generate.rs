//! Token generation for `#[derive(Config)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;

use super::{MergeStrategy, RecordField, StructAttrs};

pub(crate) fn record_impls(
    ident: &Ident,
    struct_attrs: &StructAttrs,
    fields: &[RecordField],
) -> TokenStream {
    let init_defaults =
        (!struct_attrs.manual_init_defaults).then(|| init_defaults_impl(ident, fields));
    let unpack = unpack_impl(ident, struct_attrs, fields);
    let from_value = from_value_impl(ident);
    let normalize = normalize_impls(ident, fields);

    quote! {
        #init_defaults
        #unpack
        #from_value
        #normalize
    }
}

fn init_defaults_impl(ident: &Ident, fields: &[RecordField]) -> TokenStream {
    let assignments: Vec<TokenStream> = fields
        .iter()
        .filter_map(|f| {
            let field = &f.ident;
            f.attrs
                .default
                .as_ref()
                .map(|expr| quote! { self.#field = (#expr); })
        })
        .collect();

    quote! {
        #[automatically_derived]
        impl treecfg::InitDefaults for #ident {
            fn init_defaults(&mut self) {
                #(#assignments)*
            }
        }
    }
}

fn unpack_field_step(f: &RecordField, struct_path: bool) -> TokenStream {
    let field = &f.ident;
    let name = &f.name;

    let validate = f.attrs.validate.as_ref().map(|tags| {
        let at = if struct_path {
            quote! { cfg.path(".") }
        } else {
            quote! { cfg.path_of(#name, ".") }
        };
        quote! {
            treecfg::validators::run_validators(
                &treecfg::validators::AsChecked::as_checked(&self.#field),
                #tags,
                &#at,
            )?;
        }
    });

    if f.attrs.squash {
        return quote! {
            {
                treecfg::Unpack::unpack_fields(&mut self.#field, cfg, opts, claimed)?;
                #validate
            }
        };
    }

    let redact = f.attrs.redact;
    let missing_arm = if f.attrs.required {
        quote! { return Err(treecfg::Error::required(cfg.path_of(#name, "."))); }
    } else {
        quote! {}
    };

    quote! {
        {
            claimed.add(#name);
            match cfg.lookup_field(#name, opts)? {
                Some(value) => {
                    let field_opts = cfg.field_unpack_opts(#name, #redact, opts);
                    treecfg::FromValue::merge_value(&mut self.#field, &value, &field_opts)
                        .map_err(|e| e.with_path(cfg.path_of(#name, ".")))?;
                }
                None => { #missing_arm }
            }
            #validate
        }
    }
}

fn unpack_impl(ident: &Ident, struct_attrs: &StructAttrs, fields: &[RecordField]) -> TokenStream {
    let steps: Vec<TokenStream> = fields
        .iter()
        .map(|f| unpack_field_step(f, f.attrs.squash))
        .collect();

    let silence_unused = fields
        .is_empty()
        .then(|| quote! { let _ = (&cfg, &opts, &claimed); });

    let validate_struct = struct_attrs.validate.then(|| {
        quote! {
            treecfg::Validate::validate(&*self).map_err(|e| e.with_path(cfg.path(".")))?;
        }
    });

    quote! {
        #[automatically_derived]
        impl treecfg::Unpack for #ident {
            fn unpack_fields(
                &mut self,
                cfg: &treecfg::Config,
                opts: &treecfg::Options,
                claimed: &mut treecfg::FieldSet<'_>,
            ) -> treecfg::Result<()> {
                treecfg::InitDefaults::init_defaults(self);
                #silence_unused
                #(#steps)*
                #validate_struct
                Ok(())
            }
        }
    }
}

fn from_value_impl(ident: &Ident) -> TokenStream {
    quote! {
        #[automatically_derived]
        impl treecfg::FromValue for #ident {
            fn from_value(
                value: &treecfg::Value,
                opts: &treecfg::Options,
            ) -> treecfg::Result<Self> {
                let mut out = <Self as ::core::default::Default>::default();
                treecfg::FromValue::merge_value(&mut out, value, opts)?;
                Ok(out)
            }

            fn merge_value(
                &mut self,
                value: &treecfg::Value,
                opts: &treecfg::Options,
            ) -> treecfg::Result<()> {
                let cfg = value.to_config(opts)?;
                treecfg::Unpack::unpack_from(self, &cfg, opts)
            }
        }
    }
}

fn field_flags(f: &RecordField) -> Option<TokenStream> {
    if !f.attrs.redact && f.attrs.strategy.is_none() {
        return None;
    }
    let name = &f.name;
    let redact = f.attrs.redact;
    let strategy = match f.attrs.strategy {
        Some(MergeStrategy::Replace) => quote! { Some(treecfg::MergeStrategy::Replace) },
        Some(MergeStrategy::Append) => quote! { Some(treecfg::MergeStrategy::Append) },
        Some(MergeStrategy::Prepend) => quote! { Some(treecfg::MergeStrategy::Prepend) },
        None => quote! { None },
    };
    Some(quote! {
        cfg.tag_field(
            #name,
            treecfg::FieldFlags { redact: #redact, strategy: #strategy },
        );
    })
}

fn normalize_impls(ident: &Ident, fields: &[RecordField]) -> TokenStream {
    let steps: Vec<TokenStream> = fields
        .iter()
        .map(|f| {
            let field = &f.ident;
            let name = &f.name;
            if f.attrs.squash {
                quote! {
                    treecfg::ToConfig::to_config_into(&self.#field, cfg, claimed, opts)?;
                }
            } else {
                let flags = field_flags(f);
                quote! {
                    {
                        if !claimed.add_new(#name) {
                            return Err(treecfg::Error::duplicate_key(#name));
                        }
                        let value = treecfg::ToValue::to_value(&self.#field, opts)?;
                        cfg.insert_field(#name, value);
                        #flags
                    }
                }
            }
        })
        .collect();

    let silence_unused = fields
        .is_empty()
        .then(|| quote! { let _ = (&cfg, &opts, &claimed); });

    quote! {
        #[automatically_derived]
        impl treecfg::ToValue for #ident {
            fn to_value(&self, opts: &treecfg::Options) -> treecfg::Result<treecfg::Value> {
                Ok(treecfg::Value::sub(treecfg::ToConfig::to_config(self, opts)?))
            }
        }

        #[automatically_derived]
        impl treecfg::ToConfig for #ident {
            fn to_config_into(
                &self,
                cfg: &treecfg::Config,
                claimed: &mut treecfg::FieldSet<'_>,
                opts: &treecfg::Options,
            ) -> treecfg::Result<()> {
                #silence_unused
                #(#steps)*
                Ok(())
            }
        }
    }
}
