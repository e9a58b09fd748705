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

//! Deterministic signers, fake collaborators and transaction builders
//! shared by unit tests.

use crate::chaincode::{
    ChaincodeDeploymentSpec, ChaincodeDescriptor, ChaincodeId,
    ChaincodeInput, ChaincodeInvocationSpec, ChaincodeSpec,
    CollectionConfigPackage,
};
use crate::config::{
    ValidatorConfig, DEPLOY_FUNCTION, LIFECYCLE_NAMESPACE, UPGRADE_FUNCTION,
};
use crate::identity::{IdentityError, IdentityService, SignedData};
use crate::ledger::{LedgerError, LedgerQuery};
use crate::msp::{LocalMsp, MspIdentity, SigningIdentity};
use crate::policy::{MspRole, PolicyEnvelope};
use crate::strict_encoding::StrictEncode;
use crate::tx::{
    ChaincodeAction, ChaincodeActionPayload, ChaincodeEndorsedAction,
    ChaincodeProposalPayload, ChannelHeader, Endorsement, Envelope, Header,
    HeaderType, Payload, ProposalResponsePayload, SignatureHeader,
    Transaction, TransactionAction, TxRwSet,
};

/// Checks that a field-less enum is encoded as a single byte with exactly
/// the listed values and that all other byte values are rejected
macro_rules! test_enum_u8_exhaustive {
    ($enum:ident; $( $item:path => $val:expr ),+) => { {
        use ::num_traits::{FromPrimitive, ToPrimitive};

        $( assert_eq!($item.to_u8().unwrap(), $val); )+
        $( assert_eq!($enum::from_u8($val).unwrap(), $item); )+
        let mut known = ::std::collections::HashSet::new();
        $( known.insert($val); )+
        for x in 0..=u8::MAX {
            if !known.contains(&x) {
                assert_eq!($enum::from_u8(x), None);
                let decoded: Result<$enum, _> =
                    $crate::strict_encoding::strict_deserialize(&[x]);
                assert_eq!(
                    decoded.unwrap_err(),
                    $crate::strict_encoding::Error::EnumValueNotKnown(
                        stringify!($enum).to_string(),
                        x
                    )
                );
            }
        }
        $( assert_eq!($crate::strict_encoding::strict_serialize(&$item).unwrap(), &[$val]); )+
        $( assert_eq!($item, $crate::strict_encoding::strict_deserialize(&[$val]).unwrap()); )+
    } };
}

pub const CHANNEL: &str = "testchainid";

/// Seed of the key registered as admin in every test MSP
pub const ADMIN_SEED: u8 = 0xAD;

/// Seed of the default endorsing peer key
pub const ENDORSER_SEED: u8 = 1;

/// Local MSP with `Org1MSP`, `Org2MSP` and `Org3MSP` whose keys are derived
/// from single-byte seeds
pub struct TestMsp {
    msp: LocalMsp,
}

impl Default for TestMsp {
    fn default() -> Self {
        let mut msp = LocalMsp::new();
        for msp_id in &["Org1MSP", "Org2MSP", "Org3MSP"] {
            let admin = signing_identity(msp_id, ADMIN_SEED);
            msp.add_msp(msp_id).assign(admin.public_key(), MspRole::Admin);
        }
        Self { msp }
    }
}

fn signing_identity(msp_id: &str, seed: u8) -> SigningIdentity {
    SigningIdentity::from_secret(msp_id, &[seed; 32]).unwrap()
}

impl TestMsp {
    pub fn signer(&self, msp_id: &str, seed: u8) -> SigningIdentity {
        signing_identity(msp_id, seed)
    }

    pub fn sign(&self, msp_id: &str, seed: u8, message: &[u8]) -> SignedData {
        let signer = self.signer(msp_id, seed);
        SignedData::new(message, signer.serialized(), signer.sign(message))
    }

    /// Most privileged role of the key within the MSP
    pub fn role_of(&self, msp_id: &str, seed: u8) -> Option<MspRole> {
        let public_key = self.signer(msp_id, seed).public_key();
        self.msp.msp(msp_id)?.roles(&public_key).into_iter().max()
    }
}

impl IdentityService for TestMsp {
    type Identity = MspIdentity;

    fn deserialize(&self, bytes: &[u8]) -> Result<MspIdentity, IdentityError> {
        self.msp.deserialize(bytes)
    }

    fn verify(
        &self,
        identity: &MspIdentity,
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        self.msp.verify(identity, message, signature)
    }
}

/// Ledger whose every lookup fails
pub struct BrokenLedger;

impl LedgerQuery for BrokenLedger {
    fn get_descriptor(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Option<ChaincodeDescriptor>, LedgerError> {
        Err(LedgerError::Unavailable("connection reset".to_string()))
    }

    fn get_collection_package(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Option<CollectionConfigPackage>, LedgerError> {
        Err(LedgerError::Unavailable("connection reset".to_string()))
    }
}

/// Descriptor whose instantiation policy requires an `Org1MSP` admin
pub fn descriptor(name: &str, version: &str) -> ChaincodeDescriptor {
    ChaincodeDescriptor::new(name, version).with_instantiation_policy(
        PolicyEnvelope::signed_by_msp_admin("Org1MSP")
            .strict_serialize()
            .unwrap(),
    )
}

/// Builds signed transaction envelopes. Fields may be tweaked after
/// construction to produce malformed transactions.
#[derive(Clone, Debug)]
pub struct TxBuilder {
    pub header_type: HeaderType,
    pub channel: String,
    /// Chaincode named in the channel header
    pub chaincode: Option<String>,
    pub args: Vec<Vec<u8>>,
    pub rwset: TxRwSet,
    /// Replaces the encoded `rwset` when set
    pub raw_results: Option<Vec<u8>>,
    pub endorsers: Vec<(&'static str, u8)>,
    pub creator: (&'static str, u8),
    pub bad_creator_signature: bool,
    pub no_header: bool,
    /// Number of copies of the action in the transaction
    pub actions: usize,
}

impl TxBuilder {
    /// Lifecycle invocation writing `descriptor` under its name
    pub fn lifecycle(function: &str, descriptor: &ChaincodeDescriptor) -> Self {
        let cds = ChaincodeDeploymentSpec::new(&descriptor.name, &descriptor.version);
        let mut rwset = TxRwSet::default();
        rwset.push_write(
            LIFECYCLE_NAMESPACE,
            &descriptor.name,
            descriptor.strict_serialize().unwrap(),
        );
        Self {
            header_type: HeaderType::EndorserTransaction,
            channel: CHANNEL.to_string(),
            chaincode: Some(LIFECYCLE_NAMESPACE.to_string()),
            args: vec![
                function.as_bytes().to_vec(),
                CHANNEL.as_bytes().to_vec(),
                cds.strict_serialize().unwrap(),
                b"escc".to_vec(),
                b"vscc".to_vec(),
                descriptor.policy.clone(),
            ],
            rwset,
            raw_results: None,
            endorsers: vec![("Org1MSP", ENDORSER_SEED)],
            creator: ("Org1MSP", ADMIN_SEED),
            bad_creator_signature: false,
            no_header: false,
            actions: 1,
        }
    }

    pub fn deploy(descriptor: &ChaincodeDescriptor) -> Self {
        Self::lifecycle(DEPLOY_FUNCTION, descriptor)
    }

    pub fn upgrade(descriptor: &ChaincodeDescriptor) -> Self {
        Self::lifecycle(UPGRADE_FUNCTION, descriptor)
    }

    /// Passes `package` as the collections argument and writes it under the
    /// collection key of the chaincode
    pub fn with_collections(mut self, package: Vec<u8>) -> Self {
        self.args.resize(6, vec![]);
        self.args.push(package.clone());
        self.write_collections(package)
    }

    /// Writes `package` under the collection key of the chaincode without
    /// passing it as an argument
    pub fn write_collections(mut self, package: Vec<u8>) -> Self {
        let name = self.rwset.ns_rwsets[0].rwset.writes[0].key.clone();
        let key = ValidatorConfig::default().collection_key(&name);
        self.rwset.push_write(LIFECYCLE_NAMESPACE, key, package);
        self
    }

    pub fn build(&self, msp: &TestMsp) -> Vec<u8> {
        let results = match self.raw_results {
            Some(ref raw) => raw.clone(),
            None => self.rwset.strict_serialize().unwrap(),
        };
        let chaincode_action = ChaincodeAction {
            results,
            chaincode_id: Some(ChaincodeId::new(LIFECYCLE_NAMESPACE, "")),
            ..ChaincodeAction::default()
        };
        let response = ProposalResponsePayload {
            proposal_hash: vec![0x5A; 32],
            extension: chaincode_action.strict_serialize().unwrap(),
        }
        .strict_serialize()
        .unwrap();
        let endorsements = self
            .endorsers
            .iter()
            .map(|(msp_id, seed)| {
                let endorser = msp.signer(msp_id, *seed);
                let message =
                    Endorsement::signed_message(&response, endorser.serialized());
                Endorsement {
                    endorser: endorser.serialized().to_vec(),
                    signature: endorser.sign(&message),
                }
            })
            .collect();

        let invocation = ChaincodeInvocationSpec {
            chaincode_spec: ChaincodeSpec {
                chaincode_id: ChaincodeId::new(LIFECYCLE_NAMESPACE, ""),
                input: ChaincodeInput::from_args(self.args.clone()),
                ..ChaincodeSpec::default()
            },
        };
        let action_payload = ChaincodeActionPayload {
            chaincode_proposal_payload: ChaincodeProposalPayload {
                input: invocation.strict_serialize().unwrap(),
            }
            .strict_serialize()
            .unwrap(),
            action: ChaincodeEndorsedAction {
                proposal_response_payload: response,
                endorsements,
            },
        };

        let creator = msp.signer(self.creator.0, self.creator.1);
        let signature_header = SignatureHeader {
            creator: creator.serialized().to_vec(),
            nonce: vec![0x01, 0x02, 0x03],
        }
        .strict_serialize()
        .unwrap();
        let transaction = Transaction {
            actions: vec![
                TransactionAction {
                    header: signature_header.clone(),
                    payload: action_payload.strict_serialize().unwrap(),
                };
                self.actions
            ],
        };
        let channel_header = ChannelHeader {
            header_type: self.header_type,
            version: 0,
            channel_id: self.channel.clone(),
            tx_id: "a1b2c3".to_string(),
            epoch: 0,
            chaincode_id: self
                .chaincode
                .as_ref()
                .map(|name| ChaincodeId::new(name, "")),
        };
        let header = if self.no_header {
            None
        } else {
            Some(Header {
                channel_header: channel_header.strict_serialize().unwrap(),
                signature_header,
            })
        };
        let payload = Payload {
            header,
            data: transaction.strict_serialize().unwrap(),
        }
        .strict_serialize()
        .unwrap();

        let mut signature = creator.sign(&payload);
        if self.bad_creator_signature {
            signature[0] ^= 0xFF;
        }
        Envelope { payload, signature }.strict_serialize().unwrap()
    }
}
