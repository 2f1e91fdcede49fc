//! Attribute parsing utilities

use syn::{ExprLit, Field, Lit};

/// Extract column name from `#[column_name = "..."]`
pub fn extract_column_name(field: &Field) -> Option<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("column_name") {
            if let Ok(meta) = attr.meta.require_name_value() {
                if let syn::Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) = &meta.value
                {
                    return Some(s.value());
                }
            }
        }
    }
    None
}

/// Check for `#[skip]` or `#[ignore]`
pub fn is_skipped(field: &Field) -> bool {
    field
        .attrs
        .iter()
        .any(|attr| attr.path().is_ident("skip") || attr.path().is_ident("ignore"))
}

/// A `#[column_name]` that is present but not a string literal
pub fn malformed_column_name(field: &Field) -> Option<syn::Error> {
    field
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("column_name"))
        .filter(|_| extract_column_name(field).is_none())
        .map(|attr| syn::Error::new_spanned(attr, "expected #[column_name = \"...\"]"))
}
