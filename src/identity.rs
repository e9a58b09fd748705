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

//! Boundary to the membership service: turning identity bytes into identity
//! handles and checking signatures made by them.

use std::fmt::{self, Display, Formatter};

use bitcoin_hashes::hex::ToHex;

use crate::policy::Principal;
use crate::strict_encoding;

/// A single signature claim: `signature` over `message` made by the holder
/// of `identity` (serialized identity bytes).
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct SignedData {
    pub message: Vec<u8>,
    pub identity: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedData {
    pub fn new(
        message: impl Into<Vec<u8>>,
        identity: impl Into<Vec<u8>>,
        signature: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            message: message.into(),
            identity: identity.into(),
            signature: signature.into(),
        }
    }
}

/// Stable identifier of an identity; two signed data items with the same
/// identifier come from the same signer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct IdentityId {
    pub msp_id: String,
    pub id: Vec<u8>,
}

impl Display for IdentityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.msp_id, self.id.to_hex())
    }
}

/// Deserialized identity handle
pub trait Identity {
    fn identifier(&self) -> IdentityId;

    /// Whether the identity is covered by the policy principal
    fn satisfies_principal(&self, principal: &Principal) -> bool;
}

/// Membership service used to resolve and authenticate signers. Must be
/// safe for concurrent use; the validator never caches its answers.
pub trait IdentityService {
    type Identity: Identity;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Identity, IdentityError>;

    fn verify(
        &self,
        identity: &Self::Identity,
        message: &[u8],
        signature: &[u8],
    ) -> bool;
}

impl<T> IdentityService for &T
where
    T: IdentityService,
{
    type Identity = T::Identity;

    #[inline]
    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Identity, IdentityError> {
        (*self).deserialize(bytes)
    }

    #[inline]
    fn verify(
        &self,
        identity: &Self::Identity,
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        (*self).verify(identity, message, signature)
    }
}

/// Reasons why identity bytes can't be turned into an identity
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum IdentityError {
    /// identity data are malformed: {_0}
    Malformed(String),

    /// identity is issued by unknown membership service provider `{_0}`
    UnknownMsp(String),

    /// identity carries invalid public key
    InvalidKey,
}

impl From<strict_encoding::Error> for IdentityError {
    fn from(err: strict_encoding::Error) -> Self {
        IdentityError::Malformed(err.to_string())
    }
}
