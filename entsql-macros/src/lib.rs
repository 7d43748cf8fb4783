//! Derive macros for entsql entity metadata.
//!
//! - `#[derive(Entity)]` with `#[entity(..)]` and `#[column(..)]` attributes
//! - `#[derive(SqlEnum)]` for fieldless enums stored by member name
//!
//! Expansions name `::entsql` paths and expect the `entsql` crate to be a
//! dependency of the deriving crate.

use proc_macro::TokenStream;

mod derive;
mod errors;

/// Derive `entsql::Entity`.
///
/// ```ignore
/// #[derive(Entity, Default)]
/// #[entity(table = "Customers", schema = "sales")]
/// pub struct Customer {
///     #[column(primary, identity)]
///     pub id: i64,
///     #[column(name = "FullName")]
///     pub name: String,
///     #[column(db_type = "AnsiString")]
///     pub code: Option<String>,
///     #[column(skip)]
///     pub cached: Vec<String>,
/// }
/// ```
///
/// Entity attributes: `table`, `schema`, `map`. Column attributes: `name`,
/// `primary`, `identity`, `db_type`, `skip`. Fields that are not `pub` are
/// described but never persisted.
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    derive::derive_entity_impl(input)
}

/// Derive `entsql::SqlEnum` together with `SqlType`, `ToValue` and
/// `FromValue`. Values are written as the member name and read back from
/// either the name or the discriminant.
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    derive::derive_sql_enum_impl(input)
}
