mod model;
mod shared;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derive `Filterable` for a struct mapped onto a table.
///
/// ```rust,ignore
/// #[derive(Filterable)]
/// #[filterable(table = "people", primary_key = "id")]
/// struct Person {
///     id: i64,
///     age: Option<i32>,
///     #[filterable(nested)]
///     data: serde_json::Value,
///     #[filterable(skip)]
///     password_hash: String,
/// }
/// ```
#[proc_macro_derive(Filterable, attributes(filterable))]
pub fn derive_filterable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match model::generate_filterable_impl(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => e.to_compile_error().into(),
    }
}
