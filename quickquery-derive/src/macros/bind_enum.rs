//! Derive macro for `BindEnum`

use proc_macro::TokenStream;
use proc_macro2::{Literal, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, Lit, UnOp};

fn discriminant(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Int(int), ..
        }) => int.base10_parse::<i64>().ok(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => discriminant(expr).and_then(i64::checked_neg),
        _ => None,
    }
}

pub fn derive_bind_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data) = &input.data else {
        return syn::Error::new_spanned(&input.ident, "BindEnum can only be derived for enums")
            .to_compile_error()
            .into();
    };

    let mut variants: Vec<&syn::Ident> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut ordinals: Vec<Literal> = Vec::new();
    let mut next: i64 = 0;

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(variant, "BindEnum variants cannot carry fields")
                .to_compile_error()
                .into();
        }
        if let Some((_, expr)) = &variant.discriminant {
            match discriminant(expr) {
                Some(value) => next = value,
                None => {
                    return syn::Error::new_spanned(
                        expr,
                        "BindEnum discriminants must be integer literals",
                    )
                    .to_compile_error()
                    .into();
                }
            }
        }
        variants.push(&variant.ident);
        names.push(variant.ident.to_string());
        ordinals.push(Literal::i64_suffixed(next));
        next = next.wrapping_add(1);
    }

    let by_name: Vec<TokenStream2> = variants
        .iter()
        .zip(&names)
        .map(|(variant, name)| {
            quote! {
                if name.eq_ignore_ascii_case(#name) {
                    ::std::option::Option::Some(Self::#variant)
                } else
            }
        })
        .collect();

    let expanded = quote! {
        impl #impl_generics ::quickquery::FieldValue for #enum_name #ty_generics #where_clause {
            const KIND: ::quickquery::ValueKind = ::quickquery::ValueKind::Enum;

            fn from_value(
                value: ::quickquery::Value,
            ) -> ::std::result::Result<Self, ::quickquery::Value> {
                let found = match &value {
                    ::quickquery::Value::Text(name) => {
                        #(#by_name)* { ::std::option::Option::None }
                    }
                    ::quickquery::Value::BigInt(ordinal) => match *ordinal {
                        #(#ordinals => ::std::option::Option::Some(Self::#variants),)*
                        _ => ::std::option::Option::None,
                    },
                    _ => ::std::option::Option::None,
                };
                found.ok_or(value)
            }

            fn to_value(&self) -> ::quickquery::Value {
                let name = match self {
                    #(Self::#variants => #names,)*
                };
                ::quickquery::Value::Text(::std::string::String::from(name))
            }
        }
    };

    TokenStream::from(expanded)
}
