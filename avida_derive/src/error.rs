//! `#[derive(Error)]`.
//!
//! ```ignore
//! use avida_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum HardwareError {
//!     #[error("index {index} out of range for memory of size {size}")]
//!     IndexOutOfRange { index: usize, size: usize },
//!
//!     #[error("unknown instruction symbol '{0}'")]
//!     UnknownSymbol(char),
//!
//!     #[error("genome must contain at least one instruction")]
//!     EmptyGenome,
//! }
//! ```
//!
//! Tuple fields are referenced positionally (`{0}`), named fields by name.
//! Every named field must appear in the message.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Lit, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message(&variant.attrs, variant)?;
                    Ok(display_arm(quote! { Self::#ident }, &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message(&input.attrs, &input.ident)?;
            let arm = display_arm(quote! { Self }, &data.fields, &message);
            quote! {
                match self {
                    #arm
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// One `match` arm destructuring `path` and writing `message` with its fields.
fn display_arm(path: TokenStream2, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            #path => f.write_str(#message),
        },
        Fields::Unnamed(unnamed) => {
            let count = unnamed.unnamed.len();
            let idents: Vec<_> = (0..count).map(|i| format_ident!("f{}", i)).collect();
            let message = positional_to_named(message, count);
            quote! {
                #path( #(#idents),* ) => write!(f, #message, #(#idents = #idents),*),
            }
        }
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().map(|field| &field.ident).collect();
            quote! {
                #path { #(#idents),* } => write!(f, #message, #(#idents = #idents),*),
            }
        }
    }
}

/// Reads the string literal out of `#[error("...")]`.
fn message<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<String> {
    let attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(target, "missing #[error(\"...\")] display message")
        })?;

    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        ));
    };

    match syn::parse2::<Lit>(list.tokens.clone()) {
        Ok(Lit::Str(lit)) => Ok(lit.value()),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "#[error] takes a single string literal, e.g. #[error(\"bad opcode {0}\")]",
        )),
    }
}

/// Rewrites `{0}` as `{f0}` (also `{0:?}` as `{f0:?}`) so tuple fields can be
/// passed to `write!` as named arguments.
fn positional_to_named(message: &str, count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..count).rev() {
        out = out
            .replace(&format!("{{{}}}", i), &format!("{{f{}}}", i))
            .replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    out
}
