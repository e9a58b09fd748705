// Chaincode lifecycle transaction validator derive macros
// Written in 2020 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

#![recursion_limit = "256"]
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code
)]

//! Derive macros for the strict encoding used by all lifecycle data
//! structures. By default the generated code refers to
//! `crate::strict_encoding`; types defined outside of the validator library
//! must point to it with `#[strict_crate(lscc_validator)]`.

extern crate proc_macro;
#[macro_use]
extern crate quote;
#[macro_use]
extern crate syn;

#[macro_use]
mod util;
mod strict_encoding;

use proc_macro::TokenStream;
use syn::DeriveInput;

use crate::strict_encoding::{decode_inner, encode_inner};

#[proc_macro_derive(StrictEncode, attributes(strict_crate))]
pub fn derive_strict_encode(input: TokenStream) -> TokenStream {
    let derive_input = parse_macro_input!(input as DeriveInput);
    encode_inner(derive_input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

#[proc_macro_derive(StrictDecode, attributes(strict_crate))]
pub fn derive_strict_decode(input: TokenStream) -> TokenStream {
    let derive_input = parse_macro_input!(input as DeriveInput);
    decode_inner(derive_input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
