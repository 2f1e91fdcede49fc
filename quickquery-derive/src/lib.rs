//! Procedural macros for QuickQuery
//!
//! This crate provides `Bindable` and `BindEnum`. Use them through the
//! re-exports in `quickquery`.

mod attributes;
mod macros;

use proc_macro::TokenStream;

/// Derive macro for `Bindable` - generates the schema descriptor of a struct
///
/// Every named field becomes a member, in declaration order, matched against
/// the column of the same name. Field types must implement `FieldValue`.
///
/// Field attributes:
/// - `#[column_name = "..."]` binds the field to a differently named column
/// - `#[skip]` (or `#[ignore]`) leaves the field out; it keeps its `Default`
///
/// The struct must also implement `Default`.
///
/// ```ignore
/// #[derive(Debug, Default, Bindable)]
/// struct Invoice {
///     id: i64,
///     #[column_name = "total_cents"]
///     total: i64,
///     paid_at: Option<chrono::DateTime<chrono::Utc>>,
///     #[skip]
///     cached_label: String,
/// }
/// ```
#[proc_macro_derive(Bindable, attributes(column_name, skip, ignore))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    macros::derive_bindable(input)
}

/// Derive macro for `BindEnum` - lets a fieldless enum be a bindable member
///
/// Columns bind by variant name (case-insensitive) or by integer ordinal.
/// Ordinals follow the explicit discriminants when given.
#[proc_macro_derive(BindEnum)]
pub fn derive_bind_enum(input: TokenStream) -> TokenStream {
    macros::derive_bind_enum(input)
}
