//! #[derive(Entity)] implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Visibility, parse_macro_input};

use super::{debug_expand, parse_column_attrs, parse_entity_attrs, reject_generics};

// ============================================================================
// DERIVE ENTITY
// ============================================================================

pub fn derive_entity_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => {
            debug_expand(&input.ident.to_string(), &tokens);
            tokens.into()
        },
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    reject_generics(input, "Entity")?;
    let name = &input.ident;
    let name_str = name.to_string();
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity derive only supports structs with named fields. \
                     Example: `struct Customer { id: i64, name: String }`",
                ));
            },
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Entity derive only supports structs. \
                 Hint: Use `#[derive(Entity)]` on a struct mapped to a table.",
            ));
        },
    };

    let entity = parse_entity_attrs(&input.attrs)?;

    let mut properties = Vec::new();
    let mut values = Vec::new();
    let mut assignments = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let prop = ident.to_string();
        let column = parse_column_attrs(&field.attrs)?;
        let public = matches!(field.vis, Visibility::Public(_));

        if column.skip || !public {
            let private = (!public).then(|| quote! { .private() });
            properties.push(quote! {
                ::entsql::PropertyDescriptor::unmapped(#prop) #private
            });
            values.push(quote! { ::entsql::Value::Null });
            continue;
        }

        let mut descriptor = quote! { ::entsql::PropertyDescriptor::of::<#ty>(#prop) };
        if let Some(name) = &column.name {
            descriptor.extend(quote! { .column(#name) });
        }
        if column.primary {
            descriptor.extend(quote! { .primary() });
        }
        if column.identity {
            descriptor.extend(quote! { .identity() });
        }
        if let Some(db_type) = &column.db_type {
            let variant = format_ident!("{}", db_type);
            descriptor.extend(quote! { .db_type(::entsql::DbType::#variant) });
        }
        properties.push(descriptor);
        values.push(quote! { ::entsql::ToValue::to_value(&self.#ident) });
        assignments.push(quote! {
            #index => self.#ident = ::entsql::FromValue::from_value(value)?,
        });
    }

    let table = option_tokens(entity.table.as_deref());
    let schema = option_tokens(entity.schema.as_deref());
    let map = option_tokens(entity.map.as_deref());

    Ok(quote! {
        impl ::entsql::Entity for #name {
            fn descriptor() -> &'static ::entsql::EntityDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<::entsql::EntityDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    let mut descriptor = ::entsql::EntityDescriptor::new::<Self>(
                        #name_str,
                        ::std::vec![#(#properties),*],
                    );
                    descriptor.table = #table;
                    descriptor.schema = #schema;
                    descriptor.map = #map;
                    descriptor
                })
            }

            fn values(&self) -> ::std::vec::Vec<::entsql::Value> {
                ::std::vec![#(#values),*]
            }

            #[allow(unused_variables, clippy::match_single_binding)]
            fn assign(&mut self, index: usize, value: ::entsql::Value) -> ::entsql::Result<()> {
                match index {
                    #(#assignments)*
                    _ => {},
                }
                Ok(())
            }
        }
    })
}

fn option_tokens(value: Option<&str>) -> TokenStream2 {
    match value {
        Some(text) => quote! { ::std::option::Option::Some(#text) },
        None => quote! { ::std::option::Option::None },
    }
}
