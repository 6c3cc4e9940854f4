use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::common::{ensure, is_bare_param, is_repr_c, single_type_param, span_err};

/// Implements `Borrow`, `BorrowMut`, `From`, `Index`, `IndexMut`, and
/// `Default`, plus the `NUM_COLUMNS` and `COLUMN_NAMES` constants.
pub(crate) fn try_derive(ast: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let Data::Struct(data) = &ast.data else {
        return Err(span_err!(&ast, "expected `struct`"));
    };

    // Check that the struct is `#[repr(C)]`.
    let repr_c = is_repr_c(&ast.attrs);
    ensure!(repr_c, &ast, "column struct must be `#[repr(C)]`");

    let Some(param) = single_type_param(&ast.generics) else {
        return Err(span_err!(
            &ast.generics,
            "column struct must have exactly one type parameter"
        ));
    };

    let Fields::Named(fields) = &data.fields else {
        return Err(span_err!(&data.fields, "column struct must have named fields"));
    };

    let mut names = Vec::with_capacity(fields.named.len());
    for field in &fields.named {
        ensure!(
            is_bare_param(&field.ty, param),
            &field.ty,
            "every column must have the type of the struct parameter"
        );
        // Named fields always carry an identifier.
        if let Some(ident) = &field.ident {
            names.push(ident.to_string());
        }
    }

    // The name of the struct.
    let name = &ast.ident;
    let num_columns = names.len();

    // SAFETY: A struct generic over T has the same layout as an array [T; N] if:
    // - The struct is `#[repr(C)]`.
    // - Every field is T.
    // - There are N fields.
    // https://doc.rust-lang.org/reference/type-layout.html#reprc-structs
    // https://doc.rust-lang.org/reference/type-layout.html#array-layout
    Ok(quote! {
        impl<T> #name<T> {
            /// Number of columns of the row.
            pub const NUM_COLUMNS: usize = #num_columns;

            /// Column names, in the order of the array view.
            pub const COLUMN_NAMES: [&'static str; #num_columns] = [#(#names),*];
        }

        impl<T> ::core::borrow::Borrow<#name<T>> for [T; #num_columns]
        where
            T: ::core::marker::Copy,
        {
            fn borrow(&self) -> &#name<T> {
                // SAFETY: `#name<T>` and `[T; N]` have the same layout.
                unsafe { ::core::mem::transmute(self) }
            }
        }

        impl<T> ::core::borrow::BorrowMut<#name<T>> for [T; #num_columns]
        where
            T: ::core::marker::Copy,
        {
            fn borrow_mut(&mut self) -> &mut #name<T> {
                // SAFETY: `#name<T>` and `[T; N]` have the same layout.
                unsafe { ::core::mem::transmute(self) }
            }
        }

        impl<T> ::core::borrow::Borrow<[T; #num_columns]> for #name<T>
        where
            T: ::core::marker::Copy,
        {
            fn borrow(&self) -> &[T; #num_columns] {
                // SAFETY: `#name<T>` and `[T; N]` have the same layout.
                unsafe { ::core::mem::transmute(self) }
            }
        }

        impl<T> ::core::borrow::BorrowMut<[T; #num_columns]> for #name<T>
        where
            T: ::core::marker::Copy,
        {
            fn borrow_mut(&mut self) -> &mut [T; #num_columns] {
                // SAFETY: `#name<T>` and `[T; N]` have the same layout.
                unsafe { ::core::mem::transmute(self) }
            }
        }

        impl<T> From<[T; #num_columns]> for #name<T>
        where
            T: ::core::marker::Copy,
        {
            fn from(value: [T; #num_columns]) -> Self {
                debug_assert_eq!(
                    ::core::mem::size_of::<#name<T>>(),
                    ::core::mem::size_of::<[T; #num_columns]>()
                );
                // Need ManuallyDrop so that `value` is not dropped by this function.
                let value = ::core::mem::ManuallyDrop::new(value);
                // Copy the bit pattern. The original value is no longer safe to use.
                // SAFETY: same layout, and `value` is never dropped.
                unsafe { ::core::mem::transmute_copy(&value) }
            }
        }

        impl<T> From<#name<T>> for [T; #num_columns]
        where
            T: ::core::marker::Copy,
        {
            fn from(value: #name<T>) -> Self {
                debug_assert_eq!(
                    ::core::mem::size_of::<#name<T>>(),
                    ::core::mem::size_of::<[T; #num_columns]>()
                );
                let value = ::core::mem::ManuallyDrop::new(value);
                // SAFETY: same layout, and `value` is never dropped.
                unsafe { ::core::mem::transmute_copy(&value) }
            }
        }

        impl<T, I> ::core::ops::Index<I> for #name<T>
        where
            T: ::core::marker::Copy,
            [T]: ::core::ops::Index<I>,
        {
            type Output = <[T] as ::core::ops::Index<I>>::Output;

            fn index(&self, index: I) -> &<Self as ::core::ops::Index<I>>::Output {
                let arr = ::core::borrow::Borrow::<[T; #num_columns]>::borrow(self);
                <[T] as ::core::ops::Index<I>>::index(arr, index)
            }
        }

        impl<T, I> ::core::ops::IndexMut<I> for #name<T>
        where
            T: ::core::marker::Copy,
            [T]: ::core::ops::IndexMut<I>,
        {
            fn index_mut(&mut self, index: I) -> &mut <Self as ::core::ops::Index<I>>::Output {
                let arr = ::core::borrow::BorrowMut::<[T; #num_columns]>::borrow_mut(self);
                <[T] as ::core::ops::IndexMut<I>>::index_mut(arr, index)
            }
        }

        impl<T> ::core::default::Default for #name<T>
        where
            T: ::core::marker::Copy + ::core::default::Default,
        {
            fn default() -> Self {
                ::core::convert::Into::<Self>::into(
                    [<T as ::core::default::Default>::default(); #num_columns]
                )
            }
        }
    })
}
