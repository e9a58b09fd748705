// Chaincode lifecycle transaction validator
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

//! Binary codec for every data structure that crosses the validator
//! boundary: transaction envelopes, policies, chaincode descriptors and
//! collection packages.
//!
//! Encoding rules:
//! * integers are fixed-width little-endian;
//! * collections and byte strings are prefixed with their `u32` length;
//! * `Option` is a significator byte (`0` or `1`) followed by the value;
//! * enums are prefixed with a single-byte variant tag.

use core::ops::Range;
use std::io::{self, Read};

/// Upper bound for the number of items pre-allocated when decoding a
/// collection; the rest grows as the data are actually read.
const MAX_PREALLOC: usize = 0x1000;

/// Binary encoding according to the strict rules applying to all lifecycle
/// data structures. The same value always produces the same bytes, so the
/// encoding may be compared byte-for-byte.
pub trait StrictEncode {
    /// Encode with the given [std::io::Write] instance; must return result
    /// with either amount of bytes encoded or an encoding error.
    fn strict_encode<E: io::Write>(&self, e: E) -> Result<usize, Error>;

    /// Serializes data as a byte array using [`StrictEncode::strict_encode`]
    fn strict_serialize(&self) -> Result<Vec<u8>, Error> {
        let mut e = vec![];
        let _ = self.strict_encode(&mut e)?;
        Ok(e)
    }
}

/// Binary decoding according to the strict rules. Any structural mismatch
/// (short data, unknown enum tag, invalid optional significator) is an
/// error; nothing is ever guessed.
pub trait StrictDecode: Sized {
    /// Decode with the given [std::io::Read] instance; must either
    /// construct an instance or return an error.
    fn strict_decode<D: io::Read>(d: D) -> Result<Self, Error>;

    /// Tries to deserialize byte array into the current type; fails if the
    /// data are not consumed entirely
    fn strict_deserialize(data: impl AsRef<[u8]>) -> Result<Self, Error> {
        strict_deserialize(&data)
    }
}

/// Convenience method for strict encoding of data structures implementing
/// [StrictEncode] into a byte vector.
pub fn strict_serialize<T>(data: &T) -> Result<Vec<u8>, Error>
where
    T: StrictEncode,
{
    let mut encoder = io::Cursor::new(vec![]);
    data.strict_encode(&mut encoder)?;
    Ok(encoder.into_inner())
}

/// Convenience method for strict decoding of data structures implementing
/// [StrictDecode] from any byte data source.
pub fn strict_deserialize<T>(data: &impl AsRef<[u8]>) -> Result<T, Error>
where
    T: StrictDecode,
{
    let mut decoder = io::Cursor::new(data.as_ref());
    let rv = T::strict_decode(&mut decoder)?;
    let consumed = decoder.position() as usize;

    // Fail if data are not consumed entirely.
    if consumed == data.as_ref().len() {
        Ok(rv)
    } else {
        Err(Error::DataNotEntirelyConsumed)
    }
}

/// Possible errors during strict encoding and decoding process
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, From, Error)]
#[display(doc_comments)]
pub enum Error {
    /// I/O error during data strict encoding: {_0}
    Io(String),

    /// String data are not in valid UTF-8 encoding
    #[from(std::str::Utf8Error)]
    #[from(std::string::FromUtf8Error)]
    Utf8Conversion,

    /// A collection (slice, vector or other type) has more items ({_0}) than
    /// may be represented by the `u32` length prefix
    ExceedMaxItems(usize),

    /// Invalid value {_0} met as an optional type byte, which must be equal to
    /// either 0 (no value) or 1
    WrongOptionalEncoding(u8),

    /// Enums are encoded as a `u8`-based values; the provided enum `{_0}` has
    /// underlying primitive type that does not fit into `u8` value
    EnumValueOverflow(String),

    /// An unsupported value `{_1}` for enum `{_0}` encountered during decode
    /// operation
    EnumValueNotKnown(String, u8),

    /// Decoding resulted in value `{_2}` for type `{_0}` that exceeds the
    /// supported range {_1:?}
    ValueOutOfRange(&'static str, Range<u128>, u128),

    /// Data were not consumed entirely during strict decoding procedure
    DataNotEntirelyConsumed,

    /// Data integrity problem during strict decoding operation: {_0}
    DataIntegrityError(String),
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[macro_export]
macro_rules! strict_encode_list {
    ( $encoder:ident; $($item:expr),+ ) => {
        {
            let mut len = 0usize;
            $(
                len += $item.strict_encode(&mut $encoder)?;
            )+
            len
        }
    };
}

/// Implements strict encoding for a field-less enum deriving
/// `num_derive::{ToPrimitive, FromPrimitive}` as a single byte.
#[macro_export]
macro_rules! impl_enum_strict_encoding {
    ($type:ty) => {
        impl $crate::strict_encoding::StrictEncode for $type {
            #[inline]
            fn strict_encode<E: ::std::io::Write>(
                &self,
                e: E,
            ) -> Result<usize, $crate::strict_encoding::Error> {
                use ::num_traits::ToPrimitive;

                match self.to_u8() {
                    Some(result) => {
                        $crate::strict_encoding::StrictEncode::strict_encode(
                            &result, e,
                        )
                    }
                    None => {
                        Err($crate::strict_encoding::Error::EnumValueOverflow(
                            stringify!($type).to_string(),
                        ))
                    }
                }
            }
        }

        impl $crate::strict_encoding::StrictDecode for $type {
            #[inline]
            fn strict_decode<D: ::std::io::Read>(
                d: D,
            ) -> Result<Self, $crate::strict_encoding::Error> {
                use ::num_traits::FromPrimitive;

                let value =
                    <u8 as $crate::strict_encoding::StrictDecode>::strict_decode(
                        d,
                    )?;
                match Self::from_u8(value) {
                    Some(result) => Ok(result),
                    None => {
                        Err($crate::strict_encoding::Error::EnumValueNotKnown(
                            stringify!($type).to_string(),
                            value,
                        ))
                    }
                }
            }
        }
    };
}

/// Little-endian fixed-width integer encoding
mod number_little_endian {
    use std::io;

    use super::{Error, StrictDecode, StrictEncode};

    macro_rules! impl_le_int {
        ($($ty:ty),+) => {
            $(
                impl StrictEncode for $ty {
                    #[inline]
                    fn strict_encode<E: io::Write>(
                        &self,
                        mut e: E,
                    ) -> Result<usize, Error> {
                        let bytes = self.to_le_bytes();
                        e.write_all(&bytes)?;
                        Ok(bytes.len())
                    }
                }

                impl StrictDecode for $ty {
                    #[inline]
                    fn strict_decode<D: io::Read>(
                        mut d: D,
                    ) -> Result<Self, Error> {
                        let mut buf = [0u8; core::mem::size_of::<$ty>()];
                        d.read_exact(&mut buf)?;
                        Ok(<$ty>::from_le_bytes(buf))
                    }
                }
            )+
        };
    }

    impl_le_int!(u8, u16, u32, u64, i8, i16, i32, i64);

    impl StrictEncode for bool {
        fn strict_encode<E: io::Write>(&self, e: E) -> Result<usize, Error> {
            (*self as u8).strict_encode(e)
        }
    }

    impl StrictDecode for bool {
        fn strict_decode<D: io::Read>(d: D) -> Result<Self, Error> {
            match u8::strict_decode(d)? {
                0 => Ok(false),
                1 => Ok(true),
                v => Err(Error::ValueOutOfRange("boolean", 0..2, v as u128)),
            }
        }
    }

    /// Lengths of collections and byte strings
    impl StrictEncode for usize {
        fn strict_encode<E: io::Write>(&self, e: E) -> Result<usize, Error> {
            if *self > core::u32::MAX as usize {
                return Err(Error::ExceedMaxItems(*self));
            }
            (*self as u32).strict_encode(e)
        }
    }

    impl StrictDecode for usize {
        fn strict_decode<D: io::Read>(d: D) -> Result<Self, Error> {
            u32::strict_decode(d).map(|val| val as usize)
        }
    }
}

mod byte_strings {
    use std::io;

    use super::{read_bytes, Error, StrictDecode, StrictEncode};

    impl StrictEncode for &[u8] {
        fn strict_encode<E: io::Write>(
            &self,
            mut e: E,
        ) -> Result<usize, Error> {
            let mut len = self.len();
            // Oversize is handled at the level of `usize` serialization
            len += len.strict_encode(&mut e)?;
            e.write_all(self)?;
            Ok(len)
        }
    }

    impl StrictEncode for [u8; 32] {
        fn strict_encode<E: io::Write>(
            &self,
            mut e: E,
        ) -> Result<usize, Error> {
            e.write_all(self)?;
            Ok(self.len())
        }
    }

    impl StrictDecode for [u8; 32] {
        fn strict_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
            let mut ret = [0u8; 32];
            d.read_exact(&mut ret)?;
            Ok(ret)
        }
    }

    impl StrictEncode for &str {
        fn strict_encode<E: io::Write>(&self, e: E) -> Result<usize, Error> {
            self.as_bytes().strict_encode(e)
        }
    }

    impl StrictEncode for String {
        fn strict_encode<E: io::Write>(&self, e: E) -> Result<usize, Error> {
            self.as_bytes().strict_encode(e)
        }
    }

    impl StrictDecode for String {
        fn strict_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
            let len = usize::strict_decode(&mut d)?;
            String::from_utf8(read_bytes(d, len)?).map_err(Error::from)
        }
    }
}

mod compositional_types {
    use std::io;

    use super::{Error, StrictDecode, StrictEncode, MAX_PREALLOC};

    /// `Option` is represented by a *significator byte*, which MUST be either
    /// `0` (for no value present) or `1`, followed by the value strict
    /// encoding.
    impl<T> StrictEncode for Option<T>
    where
        T: StrictEncode,
    {
        fn strict_encode<E: io::Write>(
            &self,
            mut e: E,
        ) -> Result<usize, Error> {
            Ok(match self {
                None => strict_encode_list!(e; 0u8),
                Some(val) => strict_encode_list!(e; 1u8, val),
            })
        }
    }

    impl<T> StrictDecode for Option<T>
    where
        T: StrictDecode,
    {
        fn strict_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
            match u8::strict_decode(&mut d)? {
                0 => Ok(None),
                1 => Ok(Some(T::strict_decode(&mut d)?)),
                invalid => Err(Error::WrongOptionalEncoding(invalid)),
            }
        }
    }

    /// `Vec` is stored as a `u32` length followed by the consequently
    /// encoded items. `Vec<u8>` therefore has the same encoding as `&[u8]`.
    impl<T> StrictEncode for Vec<T>
    where
        T: StrictEncode,
    {
        fn strict_encode<E: io::Write>(
            &self,
            mut e: E,
        ) -> Result<usize, Error> {
            let len = self.len();
            let mut encoded = len.strict_encode(&mut e)?;
            for item in self {
                encoded += item.strict_encode(&mut e)?;
            }
            Ok(encoded)
        }
    }

    impl<T> StrictDecode for Vec<T>
    where
        T: StrictDecode,
    {
        fn strict_decode<D: io::Read>(mut d: D) -> Result<Self, Error> {
            let len = usize::strict_decode(&mut d)?;
            let mut data = Vec::<T>::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                data.push(T::strict_decode(&mut d)?);
            }
            Ok(data)
        }
    }
}

/// Reads exactly `len` bytes without trusting `len` for the allocation size
fn read_bytes<D: io::Read>(d: D, len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    d.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}
