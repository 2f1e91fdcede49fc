//! Derive macro for `Bindable`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attributes;

pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(syn::DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "Bindable can only be derived for structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut descriptors: Vec<TokenStream2> = Vec::new();
    let mut assign_arms: Vec<TokenStream2> = Vec::new();
    let mut reads: Vec<TokenStream2> = Vec::new();

    for field in fields {
        if attributes::is_skipped(field) {
            continue;
        }
        if let Some(err) = attributes::malformed_column_name(field) {
            return err.to_compile_error().into();
        }
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;
        let column_name = attributes::extract_column_name(field).unwrap_or_else(|| {
            let name = field_name.to_string();
            name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
        });
        let index = descriptors.len();

        descriptors.push(quote! {
            ::quickquery::MemberDescriptor::new(
                #column_name,
                <#field_type as ::quickquery::FieldValue>::KIND,
                <#field_type as ::quickquery::FieldValue>::NULLABLE,
            )
        });
        assign_arms.push(quote! {
            #index => <#field_type as ::quickquery::FieldValue>::from_value(value)
                .map(|v| self.#field_name = v),
        });
        reads.push(quote! {
            ::quickquery::FieldValue::to_value(&self.#field_name)
        });
    }

    let type_name = struct_name.to_string();
    let expanded = quote! {
        impl #impl_generics ::quickquery::Bindable for #struct_name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn members() -> ::std::vec::Vec<::quickquery::MemberDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            fn assign(
                &mut self,
                member: usize,
                value: ::quickquery::Value,
            ) -> ::std::result::Result<(), ::quickquery::Value> {
                match member {
                    #(#assign_arms)*
                    _ => ::std::result::Result::Err(value),
                }
            }

            fn member_values(&self) -> ::std::vec::Vec<::quickquery::Value> {
                ::std::vec![#(#reads),*]
            }
        }
    };

    TokenStream::from(expanded)
}
