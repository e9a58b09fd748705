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

//! Local membership service provider over Ed25519 keys.
//!
//! Identity bytes are the strict encoding of [`SerializedIdentity`]. Any
//! key of a known MSP is a member of it; other roles are assigned
//! explicitly per public key.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

use ed25519_dalek::{
    Keypair, PublicKey, SecretKey, Signature, Signer, PUBLIC_KEY_LENGTH,
};

use crate::identity::{Identity, IdentityError, IdentityId, IdentityService};
use crate::policy::{MspRole, Principal};
use crate::strict_encoding::{StrictDecode, StrictEncode};

/// Wire form of an identity
#[derive(Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct SerializedIdentity {
    pub msp_id: String,
    pub public_key: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MspConfig {
    roles: BTreeMap<[u8; PUBLIC_KEY_LENGTH], BTreeSet<MspRole>>,
}

impl MspConfig {
    pub fn assign(&mut self, public_key: [u8; PUBLIC_KEY_LENGTH], role: MspRole) {
        self.roles.entry(public_key).or_default().insert(role);
    }

    pub fn roles(&self, public_key: &[u8; PUBLIC_KEY_LENGTH]) -> BTreeSet<MspRole> {
        let mut roles = self.roles.get(public_key).cloned().unwrap_or_default();
        roles.insert(MspRole::Member);
        roles
    }
}

/// Identity resolved by [`LocalMsp`]
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MspIdentity {
    msp_id: String,
    public_key: PublicKey,
    serialized: Vec<u8>,
    roles: BTreeSet<MspRole>,
}

impl MspIdentity {
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn has_role(&self, role: MspRole) -> bool {
        self.roles.contains(&role)
    }
}

impl Identity for MspIdentity {
    fn identifier(&self) -> IdentityId {
        IdentityId {
            msp_id: self.msp_id.clone(),
            id: self.public_key.as_bytes().to_vec(),
        }
    }

    fn satisfies_principal(&self, principal: &Principal) -> bool {
        match principal {
            Principal::Role { msp_id, role } => {
                *msp_id == self.msp_id && self.has_role(*role)
            }
            Principal::Identity(serialized) => *serialized == self.serialized,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct LocalMsp {
    providers: BTreeMap<String, MspConfig>,
}

impl LocalMsp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_msp(&mut self, msp_id: impl ToString) -> &mut MspConfig {
        self.providers.entry(msp_id.to_string()).or_default()
    }

    pub fn msp(&self, msp_id: &str) -> Option<&MspConfig> {
        self.providers.get(msp_id)
    }
}

impl IdentityService for LocalMsp {
    type Identity = MspIdentity;

    fn deserialize(&self, bytes: &[u8]) -> Result<MspIdentity, IdentityError> {
        let identity = SerializedIdentity::strict_deserialize(bytes)?;
        let config = self
            .providers
            .get(&identity.msp_id)
            .ok_or_else(|| IdentityError::UnknownMsp(identity.msp_id.clone()))?;
        let public_key = PublicKey::from_bytes(&identity.public_key)
            .map_err(|_| IdentityError::InvalidKey)?;

        Ok(MspIdentity {
            roles: config.roles(public_key.as_bytes()),
            msp_id: identity.msp_id,
            public_key,
            serialized: bytes.to_vec(),
        })
    }

    fn verify(
        &self,
        identity: &MspIdentity,
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        match Signature::try_from(signature) {
            Ok(signature) => identity
                .public_key
                .verify_strict(message, &signature)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Key holder able to produce identity bytes and signatures recognized by
/// [`LocalMsp`]
#[derive(Debug)]
pub struct SigningIdentity {
    msp_id: String,
    keypair: Keypair,
    serialized: Vec<u8>,
}

impl SigningIdentity {
    pub fn from_secret(
        msp_id: impl ToString,
        secret: &[u8],
    ) -> Result<Self, IdentityError> {
        let secret =
            SecretKey::from_bytes(secret).map_err(|_| IdentityError::InvalidKey)?;
        let public = PublicKey::from(&secret);
        let msp_id = msp_id.to_string();
        let serialized = SerializedIdentity {
            msp_id: msp_id.clone(),
            public_key: public.as_bytes().to_vec(),
        }
        .strict_serialize()?;

        Ok(Self {
            msp_id,
            keypair: Keypair { secret, public },
            serialized,
        })
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.keypair.public.to_bytes()
    }

    /// Identity bytes to be placed into endorsements and signature headers
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message).to_bytes().to_vec()
    }
}
