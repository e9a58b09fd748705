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

//! Transaction envelope structures.
//!
//! Nested parts which are signed or hashed by their producers are kept as
//! opaque byte strings and decoded on demand, so signatures are always
//! checked over exactly the bytes that were signed.

use crate::chaincode::ChaincodeId;
use crate::identity::SignedData;

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Envelope {
    /// Strict-encoded [`Payload`]
    pub payload: Vec<u8>,
    /// Creator signature over `payload`
    pub signature: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Payload {
    pub header: Option<Header>,
    /// Strict-encoded [`Transaction`] for endorser transactions
    pub data: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Header {
    /// Strict-encoded [`ChannelHeader`]
    pub channel_header: Vec<u8>,
    /// Strict-encoded [`SignatureHeader`]
    pub signature_header: Vec<u8>,
}

#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Display,
    ToPrimitive,
    FromPrimitive,
)]
#[display(Debug)]
#[repr(u8)]
pub enum HeaderType {
    Message = 0,
    Config = 1,
    ConfigUpdate = 2,
    EndorserTransaction = 3,
    OrdererTransaction = 4,
    DeliverSeekInfo = 5,
    ChaincodePackage = 6,
}

impl_enum_strict_encoding!(HeaderType);

#[derive(Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode)]
pub struct ChannelHeader {
    pub header_type: HeaderType,
    pub version: i32,
    pub channel_id: String,
    pub tx_id: String,
    pub epoch: u64,
    /// Chaincode the transaction was proposed to; required for endorser
    /// transactions
    pub chaincode_id: Option<ChaincodeId>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct SignatureHeader {
    /// Serialized identity of the transaction creator
    pub creator: Vec<u8>,
    pub nonce: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Transaction {
    pub actions: Vec<TransactionAction>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct TransactionAction {
    /// Strict-encoded [`SignatureHeader`] of the proposal
    pub header: Vec<u8>,
    /// Strict-encoded [`ChaincodeActionPayload`]
    pub payload: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeActionPayload {
    /// Strict-encoded [`ChaincodeProposalPayload`]
    pub chaincode_proposal_payload: Vec<u8>,
    pub action: ChaincodeEndorsedAction,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeEndorsedAction {
    /// Strict-encoded [`ProposalResponsePayload`]; this is what endorsers
    /// sign
    pub proposal_response_payload: Vec<u8>,
    pub endorsements: Vec<Endorsement>,
}

impl ChaincodeEndorsedAction {
    /// Signed data of all endorsements, in the order of their appearance
    pub fn signed_data(&self) -> Vec<SignedData> {
        self.endorsements
            .iter()
            .map(|endorsement| {
                endorsement.signed_data(&self.proposal_response_payload)
            })
            .collect()
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Endorsement {
    /// Serialized identity of the endorser
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Endorsement {
    /// Endorsers sign the proposal response payload followed by their own
    /// serialized identity
    pub fn signed_message(proposal_response_payload: &[u8], endorser: &[u8]) -> Vec<u8> {
        let mut message =
            Vec::with_capacity(proposal_response_payload.len() + endorser.len());
        message.extend_from_slice(proposal_response_payload);
        message.extend_from_slice(endorser);
        message
    }

    pub fn signed_data(&self, proposal_response_payload: &[u8]) -> SignedData {
        SignedData {
            message: Self::signed_message(
                proposal_response_payload,
                &self.endorser,
            ),
            identity: self.endorser.clone(),
            signature: self.signature.clone(),
        }
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeProposalPayload {
    /// Strict-encoded [`crate::chaincode::ChaincodeInvocationSpec`]
    pub input: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ProposalResponsePayload {
    pub proposal_hash: Vec<u8>,
    /// Strict-encoded [`ChaincodeAction`]
    pub extension: Vec<u8>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeAction {
    /// Strict-encoded [`TxRwSet`]
    pub results: Vec<u8>,
    pub events: Vec<u8>,
    pub response: Response,
    pub chaincode_id: Option<ChaincodeId>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct Response {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

/// Simulation results of a transaction
#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct TxRwSet {
    pub ns_rwsets: Vec<NsRwSet>,
}

impl TxRwSet {
    /// All writes of the transaction together with their namespaces
    pub fn writes(&self) -> impl Iterator<Item = (&str, &KvWrite)> {
        self.ns_rwsets.iter().flat_map(|ns| {
            ns.rwset
                .writes
                .iter()
                .map(move |write| (ns.namespace.as_str(), write))
        })
    }

    /// Appends a write to the namespace, creating it when needed
    pub fn push_write(
        &mut self,
        namespace: impl ToString,
        key: impl ToString,
        value: impl Into<Vec<u8>>,
    ) {
        let namespace = namespace.to_string();
        let write = KvWrite {
            key: key.to_string(),
            is_delete: false,
            value: value.into(),
        };
        match self.ns_rwsets.iter_mut().find(|ns| ns.namespace == namespace) {
            Some(ns) => ns.rwset.writes.push(write),
            None => self.ns_rwsets.push(NsRwSet {
                namespace,
                rwset: KvRwSet {
                    reads: vec![],
                    writes: vec![write],
                },
            }),
        }
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct NsRwSet {
    pub namespace: String,
    pub rwset: KvRwSet,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct KvRwSet {
    pub reads: Vec<KvRead>,
    pub writes: Vec<KvWrite>,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct KvRead {
    pub key: String,
    pub version: Option<Height>,
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
    Default,
    StrictEncode,
    StrictDecode,
)]
pub struct Height {
    pub block_num: u64,
    pub tx_num: u64,
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct KvWrite {
    pub key: String,
    pub is_delete: bool,
    pub value: Vec<u8>,
}
