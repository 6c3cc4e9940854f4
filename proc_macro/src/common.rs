use syn::punctuated::Punctuated;
use syn::{token, Attribute, Generics, Ident, Meta, Type};

/// Prefixes an error message and generates a `syn::Error` from the message.
macro_rules! span_err {
    ($ast:expr, $msg:literal $(,)?) => {
        ::syn::Error::new_spanned($ast, ::core::concat!("avm_proc_macro error: ", $msg))
    };
}
pub(crate) use span_err;

/// Checks the condition and returns early with a prefixed error message if
/// false.
macro_rules! ensure {
    ($cond:expr, $ast:expr, $msg:literal $(,)?) => {
        if !$cond {
            return Err($crate::common::span_err!($ast, $msg));
        }
    };
}
pub(crate) use ensure;

/// Parses the `Meta` of a `repr` attribute and returns true if one of the
/// elements is "C".
fn is_meta_c(outer: &Meta) -> bool {
    if let Meta::List(inner) = outer {
        let parsed: Punctuated<Meta, token::Comma> = inner
            .parse_args_with(Punctuated::parse_terminated)
            .unwrap_or_default();
        parsed.iter().any(|meta| meta.path().is_ident("C"))
    } else {
        false
    }
}

/// Returns true if `#[repr(C)]` is contained in the attributes.
pub(crate) fn is_repr_c<'a>(attrs: impl IntoIterator<Item = &'a Attribute>) -> bool {
    attrs
        .into_iter()
        .any(|attr| attr.path().is_ident("repr") && is_meta_c(&attr.meta))
}

/// Returns the single type parameter of `generics`, if there is exactly one
/// parameter and it is a type.
pub(crate) fn single_type_param(generics: &Generics) -> Option<&Ident> {
    let mut params = generics.type_params();
    let first = params.next()?;
    (generics.params.len() == 1).then_some(&first.ident)
}

/// Returns true if `ty` is exactly the path `param`.
pub(crate) fn is_bare_param(ty: &Type, param: &Ident) -> bool {
    match ty {
        Type::Path(path) => path.qself.is_none() && path.path.is_ident(param),
        _ => false,
    }
}
