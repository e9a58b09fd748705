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

use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Attribute, DeriveInput, Meta, NestedMeta, Path, Result};

/// Produces [`syn::Error`] describing misuse of the attribute `$name` with a
/// message `$msg` and an example `$example` of the correct use.
macro_rules! attr_err {
    ($name:expr, $msg:tt, $example:tt) => {
        ::syn::Error::new(
            ::proc_macro2::Span::call_site(),
            format!(
                "Attribute `#[{}]`: {}\nExample use: {}",
                $name, $msg, $example
            ),
        )
    };
}

/// Path to the crate providing `strict_encoding` module. Defaults to `crate`
/// unless overridden with `#[strict_crate(path)]`.
pub(crate) fn crate_path(input: &DeriveInput) -> Result<Path> {
    let name = "strict_crate";
    let example = "#[strict_crate(lscc_validator)]";

    match attr_list(&input.attrs, name, example)? {
        Some(list) => nested_one_path(&list, name, example),
        None => Ok(parse_quote!(crate)),
    }
}

fn attr_list<'a>(
    attrs: impl IntoIterator<Item = &'a Attribute>,
    ident: &str,
    example: &str,
) -> Result<Option<Punctuated<NestedMeta, Comma>>> {
    for attr in attrs {
        if !attr.path.is_ident(ident) {
            continue;
        }
        return match attr.parse_meta() {
            Ok(Meta::List(list)) => Ok(Some(list.nested)),
            Ok(Meta::Path(_)) => {
                Err(attr_err!(ident, "unexpected path argument", example))
            }
            Ok(Meta::NameValue(_)) => Err(attr_err!(
                ident,
                "unexpected `name=\"value\"` argument",
                example
            )),
            Err(_) => Err(attr_err!(ident, "wrong format", example)),
        };
    }

    Ok(None)
}

fn nested_one_path(
    list: &Punctuated<NestedMeta, Comma>,
    attr_name: &str,
    example: &str,
) -> Result<Path> {
    let mut iter = list.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(attr_err!(
            attr_name,
            "unexpected absence of argument",
            example
        )),
        (Some(NestedMeta::Meta(Meta::Path(path))), None) => Ok(path.clone()),
        (Some(NestedMeta::Lit(_)), None) => Err(attr_err!(
            attr_name,
            "unexpected literal instead of a crate path",
            example
        )),
        (Some(_), None) => {
            Err(attr_err!(attr_name, "unexpected attribute type", example))
        }
        (Some(_), Some(_)) => Err(attr_err!(
            attr_name,
            "unexpected multiple crate paths",
            example
        )),
    }
}
