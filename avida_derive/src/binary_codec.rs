//! `#[derive(BinaryCodec)]`.
//!
//! Fields are written in declaration order using the crate's
//! `types::encoding` traits. Enums carry a one-byte tag ahead of their
//! fields; explicit discriminants (`Variant = 3`) are honoured, so reordering
//! variants does not silently change the checkpoint format.
//!
//! ```ignore
//! use avida_derive::BinaryCodec;
//!
//! #[derive(BinaryCodec)]
//! pub struct Head {
//!     position: usize,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => struct_bodies(&data.fields),
        Data::Enum(data) => enum_bodies(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "BinaryCodec cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Bindings for each field: the expression used to reach it when encoding
/// `self`, and the pattern used to destructure it inside an enum arm.
fn field_bindings(fields: &Fields) -> Vec<TokenStream2> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let ident = &f.ident;
                quote! { #ident }
            })
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| {
                let ident = format_ident!("f{}", i);
                quote! { #ident }
            })
            .collect(),
        Fields::Unit => Vec::new(),
    }
}

/// Builds `Self { a: decode?, .. }`, `Self(decode?, ..)` or `Self` for the
/// given path.
fn construct(path: TokenStream2, fields: &Fields) -> TokenStream2 {
    match fields {
        Fields::Named(named) => {
            let inits = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote! { #ident: crate::types::encoding::Decode::decode(input)?, }
            });
            quote! { #path { #(#inits)* } }
        }
        Fields::Unnamed(unnamed) => {
            let inits = (0..unnamed.unnamed.len()).map(|_| {
                quote! { crate::types::encoding::Decode::decode(input)?, }
            });
            quote! { #path( #(#inits)* ) }
        }
        Fields::Unit => path,
    }
}

fn struct_bodies(fields: &Fields) -> (TokenStream2, TokenStream2) {
    let encodes: Vec<TokenStream2> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let ident = &f.ident;
                quote! { crate::types::encoding::Encode::encode(&self.#ident, out); }
            })
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| {
                let index = syn::Index::from(i);
                quote! { crate::types::encoding::Encode::encode(&self.#index, out); }
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let encode = if encodes.is_empty() {
        quote! { let _ = out; }
    } else {
        quote! { #(#encodes)* }
    };
    let value = construct(quote! { Self }, fields);
    let decode = if matches!(fields, Fields::Unit) {
        quote! { let _ = input; Ok(#value) }
    } else {
        quote! { Ok(#value) }
    };
    (encode, decode)
}

fn enum_bodies(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let tags = discriminants(data)?;

    let mut encode_arms = Vec::with_capacity(data.variants.len());
    let mut decode_arms = Vec::with_capacity(data.variants.len());

    for (variant, tag) in data.variants.iter().zip(tags) {
        let ident = &variant.ident;
        let bindings = field_bindings(&variant.fields);
        let pattern = match &variant.fields {
            Fields::Named(_) => quote! { Self::#ident { #(#bindings),* } },
            Fields::Unnamed(_) => quote! { Self::#ident( #(#bindings),* ) },
            Fields::Unit => quote! { Self::#ident },
        };
        encode_arms.push(quote! {
            #pattern => {
                crate::types::encoding::Encode::encode(&#tag, out);
                #( crate::types::encoding::Encode::encode(#bindings, out); )*
            }
        });

        let value = construct(quote! { Self::#ident }, &variant.fields);
        decode_arms.push(quote! { #tag => Ok(#value), });
    }

    let encode = quote! {
        match self {
            #(#encode_arms)*
        }
    };
    let decode = quote! {
        let tag: u8 = crate::types::encoding::Decode::decode(input)?;
        match tag {
            #(#decode_arms)*
            _ => Err(crate::types::encoding::DecodeError::InvalidValue),
        }
    };
    Ok((encode, decode))
}

/// One-byte tags for each variant, following Rust's implicit numbering when
/// no explicit discriminant is given.
fn discriminants(data: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut tags = Vec::with_capacity(data.variants.len());
    let mut next: u16 = 0;

    for variant in &data.variants {
        let tag = match &variant.discriminant {
            Some((_, expr)) => literal_tag(expr)?,
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(variant, "BinaryCodec enums are limited to 256 variants")
            })?,
        };
        tags.push(tag);
        next = u16::from(tag) + 1;
    }

    Ok(tags)
}

fn literal_tag(expr: &syn::Expr) -> syn::Result<u8> {
    if let syn::Expr::Lit(syn::ExprLit {
        lit: syn::Lit::Int(int),
        ..
    }) = expr
    {
        return int.base10_parse::<u8>();
    }
    Err(syn::Error::new_spanned(
        expr,
        "BinaryCodec discriminants must be integer literals that fit in a u8",
    ))
}
