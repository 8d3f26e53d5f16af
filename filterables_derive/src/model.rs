use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Meta};

use crate::shared::{
    filterable_args, import_filterables, infer_kind, kind_variant, snake_case, string_value,
};

struct Column {
    name: String,
    kind: TokenStream,
}

pub fn generate_filterable_impl(input: &DeriveInput) -> syn::Result<TokenStream> {
    let filterables = import_filterables();
    let ident = &input.ident;

    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Filterable only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Filterable only supports structs",
            ));
        }
    };

    let mut table = snake_case(&ident.to_string());
    let mut primary_key = "id".to_string();

    for meta in filterable_args(&input.attrs)? {
        match meta.path() {
            path if path.is_ident("table") => table = string_value(&meta)?,
            path if path.is_ident("primary_key") => primary_key = string_value(&meta)?,
            _ => {
                return Err(syn::Error::new_spanned(
                    &meta,
                    "unknown filterable attribute; expected `table` or `primary_key`",
                ));
            }
        }
    }

    let mut columns = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };

        let mut name = field_ident.to_string();
        let mut kind = infer_kind(&field.ty).to_string();
        let mut skip = false;

        for meta in filterable_args(&field.attrs)? {
            match &meta {
                Meta::Path(path) if path.is_ident("skip") => skip = true,
                Meta::Path(path) if path.is_ident("nested") => kind = "json".to_string(),
                Meta::NameValue(nv) if nv.path.is_ident("kind") => kind = string_value(&meta)?,
                Meta::NameValue(nv) if nv.path.is_ident("rename") => name = string_value(&meta)?,
                _ => {
                    return Err(syn::Error::new_spanned(
                        &meta,
                        "unknown filterable attribute; expected `skip`, `nested`, `kind` or `rename`",
                    ));
                }
            }
        }

        if skip {
            continue;
        }

        let kind = kind_variant(&kind).ok_or_else(|| {
            syn::Error::new_spanned(
                field,
                format!(
                    "invalid kind `{}`; expected integer, real, boolean, text, timestamp, uuid or json",
                    kind
                ),
            )
        })?;

        columns.push(Column { name, kind });
    }

    if !columns.iter().any(|column| column.name == primary_key) {
        return Err(syn::Error::new_spanned(
            ident,
            format!("primary key `{}` is not a filterable field", primary_key),
        ));
    }

    let field_defs = columns.iter().map(|Column { name, kind }| {
        quote! { #filterables::model::Field::new(#name, #kind) }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #filterables::model::Filterable for #ident #ty_generics #where_clause {
            const MODEL: #filterables::model::Model = #filterables::model::Model {
                table: #table,
                primary_key: #primary_key,
                fields: &[#(#field_defs),*],
            };
        }
    })
}
