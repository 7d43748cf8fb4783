//! Derive macros for entity metadata: Entity, SqlEnum.
//!
//! These generate implementations of the `Entity`, `SqlEnum`, `SqlType`,
//! `ToValue` and `FromValue` traits of the `entsql` crate.

mod entity_derive;
mod enum_derive;

use proc_macro2::TokenStream as TokenStream2;
use syn::spanned::Spanned;
use syn::{Attribute, DeriveInput, LitStr};

use crate::errors;

pub use entity_derive::derive_entity_impl;
pub use enum_derive::derive_sql_enum_impl;

/// Database type names accepted by `#[column(db_type = "...")]`.
pub const DB_TYPES: &[&str] = &[
    "Boolean",
    "Byte",
    "Int16",
    "Int32",
    "Int64",
    "Single",
    "Double",
    "Decimal",
    "String",
    "AnsiString",
    "Binary",
    "Guid",
    "Date",
    "Time",
    "DateTime2",
    "Json",
];

// ============================================================================
// ENTITY ATTRIBUTE PARSING
// ============================================================================

const ENTITY_KEYS: &[&str] = &["table", "schema", "map"];

#[derive(Default)]
pub struct EntityAttrs {
    pub(crate) table: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) map: Option<String>,
}

pub fn parse_entity_attrs(attrs: &[Attribute]) -> Result<EntityAttrs, syn::Error> {
    let mut result = EntityAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let value = || -> Result<String, syn::Error> {
                let lit: LitStr = meta.value()?.parse()?;
                let text = lit.value();
                if text.trim().is_empty() {
                    return Err(syn::Error::new(lit.span(), "value must not be empty"));
                }
                Ok(text)
            };
            if meta.path.is_ident("table") {
                result.table = Some(value()?);
            } else if meta.path.is_ident("schema") {
                result.schema = Some(value()?);
            } else if meta.path.is_ident("map") {
                result.map = Some(value()?);
            } else {
                let key = meta
                    .path
                    .get_ident()
                    .map_or_else(String::new, ToString::to_string);
                return Err(errors::unknown_key(meta.path.span(), "entity", &key, ENTITY_KEYS));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

// ============================================================================
// COLUMN ATTRIBUTE PARSING
// ============================================================================

const COLUMN_KEYS: &[&str] = &["name", "primary", "identity", "db_type", "skip"];

#[derive(Default)]
pub struct ColumnAttrs {
    pub(crate) name: Option<String>,
    pub(crate) primary: bool,
    pub(crate) identity: bool,
    pub(crate) db_type: Option<String>,
    pub(crate) skip: bool,
}

pub fn parse_column_attrs(attrs: &[Attribute]) -> Result<ColumnAttrs, syn::Error> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(syn::Error::new(lit.span(), "column name must not be empty"));
                }
                result.name = Some(lit.value());
            } else if meta.path.is_ident("primary") {
                result.primary = true;
            } else if meta.path.is_ident("identity") {
                result.identity = true;
            } else if meta.path.is_ident("db_type") {
                let lit: LitStr = meta.value()?.parse()?;
                let name = lit.value();
                if !DB_TYPES.contains(&name.as_str()) {
                    return Err(errors::unknown_db_type(lit.span(), &name, DB_TYPES));
                }
                result.db_type = Some(name);
            } else if meta.path.is_ident("skip") {
                result.skip = true;
            } else {
                let key = meta
                    .path
                    .get_ident()
                    .map_or_else(String::new, ToString::to_string);
                return Err(errors::unknown_key(meta.path.span(), "column", &key, COLUMN_KEYS));
            }
            Ok(())
        })?;

        if result.skip && (result.primary || result.identity) {
            return Err(syn::Error::new_spanned(
                attr,
                "a skipped field cannot be a primary or identity column",
            ));
        }
    }

    Ok(result)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Reject generic types: descriptors are cached per type in a `static`.
pub fn reject_generics(input: &DeriveInput, derive: &str) -> Result<(), syn::Error> {
    if input.generics.params.is_empty() {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            &input.generics,
            format!("{derive} derive does not support generic types"),
        ))
    }
}

/// Print the expansion when the `debug-expand` feature is on.
#[cfg(feature = "debug-expand")]
pub fn debug_expand(name: &str, tokens: &TokenStream2) {
    if let Ok(file) = syn::parse2::<syn::File>(tokens.clone()) {
        eprintln!("// ---- expansion of {name} ----\n{}", prettyplease::unparse(&file));
    }
}

#[cfg(not(feature = "debug-expand"))]
pub const fn debug_expand(_name: &str, _tokens: &TokenStream2) {}
