//! This library provides a derive macro for viewing a trace row as an array
//! of named columns.
//!
//! Deriving [`Columns`] on a struct `Struct<T>` whose fields all have type `T`
//! implements the following conversion traits between `Struct<T>` and arrays
//! `[T; N]` where `N` is the number of fields in the struct: [`Borrow`],
//! [`BorrowMut`], and [`From`]. Additionally, the traits [`Index`],
//! [`IndexMut`], and [`Default`] are implemented for `Struct<T>`, and two
//! associated constants are generated:
//!
//! - `NUM_COLUMNS`, the number of fields;
//! - `COLUMN_NAMES`, the field names in declaration order, so that column `i`
//!   of the array view is named `COLUMN_NAMES[i]`.
//!
//! The conversions employ unsafe code and place a burden on the user to
//! ensure their safe usage. The macro rejects anything but a `#[repr(C)]`
//! struct with named fields of the bare type parameter, which is enough for
//! the struct and the array to share a layout.
//!
//! [`Borrow`]: ::core::borrow::Borrow
//! [`BorrowMut`]: ::core::borrow::BorrowMut
//! [`Index`]: ::core::ops::Index
//! [`IndexMut`]: ::core::ops::IndexMut

pub(crate) mod common;
mod impls;

use impls::columns;

#[proc_macro_derive(Columns)]
pub fn derive_columns(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast = syn::parse_macro_input!(input as syn::DeriveInput);
    columns::try_derive(ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
