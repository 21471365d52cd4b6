//! Derive macros for the avida crate.
//!
//! - `#[derive(BinaryCodec)]` generates `Encode` and `Decode` so hardware state
//!   can be written to and restored from checkpoints.
//! - `#[derive(Error)]` generates `Display` and `std::error::Error` from
//!   `#[error("...")]` attributes.

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for a struct or enum.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` for an error type.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
