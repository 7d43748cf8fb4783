//! #[derive(SqlEnum)] implementation for fieldless enums.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Lit, UnOp, parse_macro_input};

use super::{debug_expand, reject_generics};

// ============================================================================
// DERIVE SQL ENUM
// ============================================================================

pub fn derive_sql_enum_impl(input: TokenStream) -> TokenStream {
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
    reject_generics(input, "SqlEnum")?;
    let name = &input.ident;
    let name_str = name.to_string();
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "SqlEnum derive only supports enums. \
             Example: `enum Status { Active, Suspended }`",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "SqlEnum derive needs at least one variant",
        ));
    }

    let mut members = Vec::new();
    let mut to_name = Vec::new();
    let mut from_name = Vec::new();
    let mut next: i64 = 0;

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "SqlEnum derive only supports unit variants",
            ));
        }
        let discriminant = match &variant.discriminant {
            Some((_, expr)) => discriminant_value(expr)?,
            None => next,
        };
        next = discriminant.wrapping_add(1);

        let ident = &variant.ident;
        let member = ident.to_string();
        members.push(quote! { (#member, #discriminant) });
        to_name.push(quote! { Self::#ident => #member, });
        from_name.push(quote! { #member => ::std::option::Option::Some(Self::#ident), });
    }

    Ok(quote! {
        impl ::entsql::SqlEnum for #name {
            const INFO: &'static ::entsql::EnumInfo = &::entsql::EnumInfo {
                name: #name_str,
                members: &[#(#members),*],
            };

            fn member_name(&self) -> &'static str {
                match self {
                    #(#to_name)*
                }
            }

            fn from_member_name(name: &str) -> ::std::option::Option<Self> {
                match name {
                    #(#from_name)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::entsql::SqlType for #name {
            const CLIENT_TYPE: ::entsql::ClientType =
                ::entsql::ClientType::Enum(<Self as ::entsql::SqlEnum>::INFO);
        }

        impl ::entsql::ToValue for #name {
            fn to_value(&self) -> ::entsql::Value {
                ::entsql::Value::String(
                    ::entsql::SqlEnum::member_name(self).to_string(),
                )
            }
        }

        impl ::entsql::FromValue for #name {
            fn from_value(value: ::entsql::Value) -> ::entsql::Result<Self> {
                ::entsql::enum_from_value(value)
            }
        }
    })
}

/// Integer literal discriminant, optionally negated.
fn discriminant_value(expr: &Expr) -> Result<i64, syn::Error> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit), ..
        }) => lit.base10_parse(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => discriminant_value(expr).map(i64::wrapping_neg),
        other => Err(syn::Error::new_spanned(
            other,
            "SqlEnum discriminants must be integer literals",
        )),
    }
}
