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

//! Signature policy expressions.
//!
//! A policy is a tree of [`SignaturePolicy`] rules with leaves referring by
//! index into the list of [`Principal`]s carried by the enclosing
//! [`PolicyEnvelope`]. Envelopes are validated on decoding: every leaf index
//! must be in range and the tree can't be nested deeper than
//! [`MAX_POLICY_DEPTH`].

mod evaluator;

pub use evaluator::{Evaluator, PolicyFailure};

use std::fmt::{self, Display, Formatter};
use std::io;

use crate::strict_encoding::{self, StrictDecode, StrictEncode};

/// Maximum nesting of `NOutOf` rules accepted from the wire
pub const MAX_POLICY_DEPTH: usize = 32;

lazy_static! {
    /// Policy which is always satisfied, consuming no signatures
    pub static ref ACCEPT_ALL_POLICY: PolicyEnvelope =
        PolicyEnvelope::accept_all();

    /// Policy which can never be satisfied
    pub static ref REJECT_ALL_POLICY: PolicyEnvelope =
        PolicyEnvelope::reject_all();
}

#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    ToPrimitive,
    FromPrimitive,
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "lowercase")
)]
#[display(Debug)]
#[repr(u8)]
pub enum MspRole {
    Member = 0,
    Admin = 1,
    Client = 2,
    Peer = 3,
}

impl_enum_strict_encoding!(MspRole);

/// Who may satisfy a `SignedBy` leaf
#[derive(Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "lowercase")
)]
pub enum Principal {
    /// Any identity of the MSP having the given role
    Role { msp_id: String, role: MspRole },

    /// Exactly this serialized identity
    Identity(Vec<u8>),
}

impl Principal {
    pub fn member(msp_id: impl ToString) -> Self {
        Principal::Role {
            msp_id: msp_id.to_string(),
            role: MspRole::Member,
        }
    }

    pub fn admin(msp_id: impl ToString) -> Self {
        Principal::Role {
            msp_id: msp_id.to_string(),
            role: MspRole::Admin,
        }
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Role { msp_id, role } => write!(f, "{}.{}", msp_id, role),
            Principal::Identity(bytes) => {
                write!(f, "identity({} bytes)", bytes.len())
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum SignaturePolicy {
    SignedBy(u32),
    NOutOf { n: u32, rules: Vec<SignaturePolicy> },
}

pub fn signed_by(index: u32) -> SignaturePolicy {
    SignaturePolicy::SignedBy(index)
}

pub fn n_out_of(n: u32, rules: Vec<SignaturePolicy>) -> SignaturePolicy {
    SignaturePolicy::NOutOf { n, rules }
}

pub fn and(lhs: SignaturePolicy, rhs: SignaturePolicy) -> SignaturePolicy {
    n_out_of(2, vec![lhs, rhs])
}

pub fn or(lhs: SignaturePolicy, rhs: SignaturePolicy) -> SignaturePolicy {
    n_out_of(1, vec![lhs, rhs])
}

impl SignaturePolicy {
    /// Number of `NOutOf` levels, a sole `SignedBy` having depth 0
    pub fn depth(&self) -> usize {
        match self {
            SignaturePolicy::SignedBy(_) => 0,
            SignaturePolicy::NOutOf { rules, .. } => {
                1 + rules.iter().map(SignaturePolicy::depth).max().unwrap_or(0)
            }
        }
    }

    /// Largest principal index referenced by the rule tree
    pub fn max_index(&self) -> Option<u32> {
        match self {
            SignaturePolicy::SignedBy(index) => Some(*index),
            SignaturePolicy::NOutOf { rules, .. } => {
                rules.iter().filter_map(SignaturePolicy::max_index).max()
            }
        }
    }

    fn encode_nested<E: io::Write>(
        &self,
        e: &mut E,
    ) -> Result<usize, strict_encoding::Error> {
        match self {
            SignaturePolicy::SignedBy(index) => {
                Ok(0u8.strict_encode(&mut *e)? + index.strict_encode(&mut *e)?)
            }
            SignaturePolicy::NOutOf { n, rules } => {
                let mut len = 1u8.strict_encode(&mut *e)?;
                len += n.strict_encode(&mut *e)?;
                len += rules.len().strict_encode(&mut *e)?;
                for rule in rules {
                    len += rule.encode_nested(e)?;
                }
                Ok(len)
            }
        }
    }

    fn decode_nested<D: io::Read>(
        d: &mut D,
        depth: usize,
    ) -> Result<Self, strict_encoding::Error> {
        match u8::strict_decode(&mut *d)? {
            0 => Ok(SignaturePolicy::SignedBy(u32::strict_decode(&mut *d)?)),
            1 => {
                if depth >= MAX_POLICY_DEPTH {
                    return Err(strict_encoding::Error::DataIntegrityError(
                        format!(
                            "signature policy is nested deeper than {} levels",
                            MAX_POLICY_DEPTH
                        ),
                    ));
                }
                let n = u32::strict_decode(&mut *d)?;
                let len = usize::strict_decode(&mut *d)?;
                let mut rules = Vec::with_capacity(len.min(16));
                for _ in 0..len {
                    rules.push(Self::decode_nested(d, depth + 1)?);
                }
                Ok(SignaturePolicy::NOutOf { n, rules })
            }
            other => Err(strict_encoding::Error::EnumValueNotKnown(
                "SignaturePolicy".to_string(),
                other,
            )),
        }
    }
}

// Recursive rule trees share a single reader or writer reference
impl StrictEncode for SignaturePolicy {
    fn strict_encode<E: io::Write>(
        &self,
        mut e: E,
    ) -> Result<usize, strict_encoding::Error> {
        self.encode_nested(&mut e)
    }
}

impl StrictDecode for SignaturePolicy {
    fn strict_decode<D: io::Read>(
        mut d: D,
    ) -> Result<Self, strict_encoding::Error> {
        Self::decode_nested(&mut d, 0)
    }
}

impl Display for SignaturePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SignaturePolicy::SignedBy(index) => write!(f, "SignedBy({})", index),
            SignaturePolicy::NOutOf { n, rules } => {
                write!(f, "OutOf({}", n)?;
                for rule in rules {
                    write!(f, ", {}", rule)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Signature policy together with the principals its leaves refer to
#[derive(Clone, PartialEq, Eq, Hash, Debug, StrictEncode)]
pub struct PolicyEnvelope {
    pub version: u32,
    pub rule: SignaturePolicy,
    pub identities: Vec<Principal>,
}

impl PolicyEnvelope {
    pub fn new(rule: SignaturePolicy, identities: Vec<Principal>) -> Self {
        Self {
            version: 0,
            rule,
            identities,
        }
    }

    /// `NOutOf(0, [])`: satisfied by any set of signatures
    pub fn accept_all() -> Self {
        Self::new(n_out_of(0, vec![]), vec![])
    }

    /// `NOutOf(1, [])`: satisfied by no set of signatures
    pub fn reject_all() -> Self {
        Self::new(n_out_of(1, vec![]), vec![])
    }

    /// Requires a signature by any member of the MSP
    pub fn signed_by_msp_member(msp_id: impl ToString) -> Self {
        Self::new(signed_by(0), vec![Principal::member(msp_id)])
    }

    /// Requires a signature by an admin of the MSP
    pub fn signed_by_msp_admin(msp_id: impl ToString) -> Self {
        Self::new(signed_by(0), vec![Principal::admin(msp_id)])
    }

    /// Requires a signature by a member of any of the listed MSPs
    pub fn signed_by_any_member<S: ToString>(msp_ids: &[S]) -> Self {
        let rules = (0..msp_ids.len() as u32).map(signed_by).collect();
        let identities = msp_ids
            .iter()
            .map(|msp_id| Principal::member(msp_id.to_string()))
            .collect();
        Self::new(n_out_of(1, rules), identities)
    }

    pub fn check(&self) -> Result<(), strict_encoding::Error> {
        if let Some(index) = self.rule.max_index() {
            if index as usize >= self.identities.len() {
                return Err(strict_encoding::Error::DataIntegrityError(
                    format!(
                        "policy refers to principal #{} while only {} are \
                         defined",
                        index,
                        self.identities.len()
                    ),
                ));
            }
        }
        if self.rule.depth() > MAX_POLICY_DEPTH {
            return Err(strict_encoding::Error::DataIntegrityError(format!(
                "signature policy is nested deeper than {} levels",
                MAX_POLICY_DEPTH
            )));
        }
        Ok(())
    }
}

impl StrictDecode for PolicyEnvelope {
    fn strict_decode<D: io::Read>(
        mut d: D,
    ) -> Result<Self, strict_encoding::Error> {
        let envelope = Self {
            version: u32::strict_decode(&mut d)?,
            rule: SignaturePolicy::strict_decode(&mut d)?,
            identities: Vec::<Principal>::strict_decode(&mut d)?,
        };
        envelope.check()?;
        Ok(envelope)
    }
}

impl Display for PolicyEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} over [", self.rule)?;
        for (index, principal) in self.identities.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", principal)?;
        }
        f.write_str("]")
    }
}
