use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{
    Attribute, Expr, ExprLit, GenericArgument, Lit, Meta, PathArguments, Type,
    punctuated::Punctuated,
};

pub fn import_filterables() -> proc_macro2::TokenStream {
    // This finds the filterables crate in the user's dependencies
    let found_crate = crate_name("filterables").unwrap_or(FoundCrate::Itself);

    match found_crate {
        FoundCrate::Itself => quote! { ::filterables },
        FoundCrate::Name(name) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote! { ::#ident }
        }
    }
}

/// Every item inside the `#[filterable(...)]` attributes in `attrs`.
pub fn filterable_args(attrs: &[Attribute]) -> syn::Result<Vec<Meta>> {
    let mut args = Vec::new();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("filterable")) {
        let nested =
            attr.parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;
        args.extend(nested);
    }

    Ok(args)
}

/// Value of a `key = "value"` item.
pub fn string_value(meta: &Meta) -> syn::Result<String> {
    match meta {
        Meta::NameValue(nv) => match &nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => Ok(s.value()),
            other => Err(syn::Error::new_spanned(other, "expected a string literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected `key = \"value\"`")),
    }
}

/// `PersonRecord` → `person_record`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Last path segment of a type, looking through `Option<T>`.
fn base_type(ty: &Type) -> Option<&syn::PathSegment> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;

    if segment.ident == "Option" {
        if let PathArguments::AngleBracketed(args) = &segment.arguments {
            if let Some(GenericArgument::Type(inner)) = args.args.first() {
                return base_type(inner);
            }
        }
    }

    Some(segment)
}

/// Storage kind name inferred from a Rust type. Unknown types are text.
pub fn infer_kind(ty: &Type) -> &'static str {
    let Some(segment) = base_type(ty) else {
        return "text";
    };

    match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "integer",
        "f32" | "f64" => "real",
        "bool" => "boolean",
        "DateTime" | "NaiveDateTime" | "NaiveDate" => "timestamp",
        "Uuid" => "uuid",
        "Value" | "Vec" | "HashMap" | "BTreeMap" | "Json" => "json",
        _ => "text",
    }
}

pub fn kind_variant(kind: &str) -> Option<proc_macro2::TokenStream> {
    let filterables = import_filterables();
    let variant = match kind {
        "integer" => quote!(Integer),
        "real" => quote!(Real),
        "boolean" => quote!(Boolean),
        "text" => quote!(Text),
        "timestamp" => quote!(Timestamp),
        "uuid" => quote!(Uuid),
        "json" => quote!(Json),
        _ => return None,
    };
    Some(quote!(#filterables::model::FieldKind::#variant))
}
