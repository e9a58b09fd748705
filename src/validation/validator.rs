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

use std::slice;

use super::{
    collections, CollectionError, Operation, Stage, ValidationError, Verdict,
};
use crate::capabilities::{CapabilityProvider, CapabilitySet};
use crate::chaincode::{
    ChaincodeDeploymentSpec, ChaincodeDescriptor, ChaincodeInvocationSpec,
    CollectionConfigPackage,
};
use crate::config::ValidatorConfig;
use crate::identity::{IdentityService, SignedData};
use crate::ledger::LedgerQuery;
use crate::policy::{Evaluator, PolicyEnvelope};
use crate::strict_encoding::{self, StrictDecode};
use crate::tx::{
    ChaincodeAction, ChaincodeActionPayload, ChaincodeProposalPayload,
    ChannelHeader, Envelope, HeaderType, KvWrite, Payload,
    ProposalResponsePayload, SignatureHeader, Transaction, TxRwSet,
};

/// Envelope data needed by the checks, decoded once per call
struct DecodedTx {
    channel_id: String,
    tx_id: String,
    /// Chaincode the transaction was proposed to
    chaincode: String,
    /// Transaction creator signature over the envelope payload
    creator: SignedData,
    actions: Vec<ChaincodeActionPayload>,
}

/// Lifecycle function call carried by a transaction action
struct Invocation {
    operation: Operation,
    args: Vec<Vec<u8>>,
}

impl Invocation {
    fn arg(&self, index: usize) -> &[u8] {
        self.args.get(index).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Lifecycle namespace writes of a deploy or upgrade
struct LifecycleWrites {
    descriptor: KvWrite,
    collections: Option<KvWrite>,
}

/// Decides whether transactions deploying or upgrading chaincodes may be
/// committed.
///
/// The validator keeps no state between calls: it may be shared among
/// threads and invoked concurrently as long as its collaborators allow that.
/// Capabilities are resolved once per call, and ledger state is only read.
#[derive(Clone, Debug)]
pub struct Validator<S, L, C>
where
    S: IdentityService,
    L: LedgerQuery,
    C: CapabilityProvider,
{
    config: ValidatorConfig,
    identities: S,
    ledger: L,
    capabilities: C,
}

impl<S, L, C> Validator<S, L, C>
where
    S: IdentityService,
    L: LedgerQuery,
    C: CapabilityProvider,
{
    pub fn new(identities: S, ledger: L, capabilities: C) -> Self {
        Self::with_config(ValidatorConfig::default(), identities, ledger, capabilities)
    }

    pub fn with_config(
        config: ValidatorConfig,
        identities: S,
        ledger: L,
        capabilities: C,
    ) -> Self {
        Self {
            config,
            identities,
            ledger,
            capabilities,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates a serialized transaction envelope against a serialized
    /// endorsement policy envelope.
    ///
    /// Every transaction action must be endorsed according to the policy.
    /// Deploy and upgrade invocations of the lifecycle chaincode are then
    /// subject to the lifecycle rules and result in [`Verdict::Accepted`];
    /// everything else results in [`Verdict::PassThrough`].
    pub fn validate(
        &self,
        envelope: &[u8],
        policy: &[u8],
    ) -> Result<Verdict, ValidationError> {
        self.validate_inner(envelope, policy).map_err(|err| {
            warn!(
                "Transaction rejected ({} error): {}",
                err.category(),
                err
            );
            err
        })
    }

    fn validate_inner(
        &self,
        envelope: &[u8],
        policy: &[u8],
    ) -> Result<Verdict, ValidationError> {
        let tx = self.decode(envelope)?;
        let policy = PolicyEnvelope::strict_deserialize(policy)
            .map_err(|err| ValidationError::MalformedPolicy(err.to_string()))?;
        let caps = self.capabilities.capabilities(&tx.channel_id);
        trace!(
            "Transaction {} on channel {} {} with {:?}",
            tx.tx_id,
            tx.channel_id,
            Stage::Decoded,
            caps
        );

        let mut verdict = Verdict::PassThrough;
        for (no, action) in tx.actions.iter().enumerate() {
            Evaluator::new(&self.identities)
                .evaluate(&policy, &action.action.signed_data())
                .map_err(ValidationError::PolicyNotSatisfied)?;

            if tx.chaincode != self.config.lifecycle_namespace {
                debug!(
                    "Action #{} of transaction {} targets `{}`, passing through",
                    no, tx.tx_id, tx.chaincode
                );
                continue;
            }
            if let Some(operation) = self.check_lifecycle(&tx, action, caps)? {
                verdict = Verdict::Accepted(operation);
            }
        }

        debug!("Transaction {} is valid: {}", tx.tx_id, verdict);
        Ok(verdict)
    }

    fn decode(&self, envelope: &[u8]) -> Result<DecodedTx, ValidationError> {
        let envelope = Envelope::strict_deserialize(envelope)
            .map_err(malformed_envelope("envelope"))?;
        let payload = Payload::strict_deserialize(&envelope.payload)
            .map_err(malformed_envelope("payload"))?;
        let header = payload.header.ok_or_else(|| {
            ValidationError::MalformedEnvelope(
                "payload has no header".to_string(),
            )
        })?;
        let channel_header =
            ChannelHeader::strict_deserialize(&header.channel_header)
                .map_err(malformed_envelope("channel header"))?;
        if channel_header.header_type != HeaderType::EndorserTransaction {
            return Err(ValidationError::MalformedEnvelope(format!(
                "{} is not an endorser transaction",
                channel_header.header_type
            )));
        }
        let chaincode = channel_header
            .chaincode_id
            .ok_or_else(|| {
                ValidationError::MalformedEnvelope(
                    "channel header has no chaincode id".to_string(),
                )
            })?
            .name;
        let signature_header =
            SignatureHeader::strict_deserialize(&header.signature_header)
                .map_err(malformed_envelope("signature header"))?;

        let transaction = Transaction::strict_deserialize(&payload.data)
            .map_err(malformed_envelope("transaction"))?;
        if transaction.actions.is_empty() {
            return Err(ValidationError::MalformedEnvelope(
                "transaction has no actions".to_string(),
            ));
        }
        let actions = transaction
            .actions
            .iter()
            .map(|action| ChaincodeActionPayload::strict_deserialize(&action.payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed_envelope("chaincode action payload"))?;

        Ok(DecodedTx {
            channel_id: channel_header.channel_id,
            tx_id: channel_header.tx_id,
            chaincode,
            creator: SignedData::new(
                envelope.payload,
                signature_header.creator,
                envelope.signature,
            ),
            actions,
        })
    }

    /// Runs lifecycle rules for a single action. Returns the operation when
    /// it was a deploy or upgrade, `None` for other lifecycle functions.
    fn check_lifecycle(
        &self,
        tx: &DecodedTx,
        action: &ChaincodeActionPayload,
        caps: CapabilitySet,
    ) -> Result<Option<Operation>, ValidationError> {
        let invocation = self.invocation(action)?;
        let upgrade = match invocation.operation {
            Operation::Deploy => false,
            Operation::Upgrade => true,
            Operation::Other(ref function) => {
                debug!(
                    "Lifecycle function `{}` in transaction {} is not checked",
                    function, tx.tx_id
                );
                return Ok(None);
            }
        };
        let operation = &invocation.operation;

        if invocation.args.len() < 3 {
            return Err(ValidationError::MalformedInvocation(format!(
                "{} requires at least 3 arguments, {} given",
                operation,
                invocation.args.len()
            )));
        }
        let cds = ChaincodeDeploymentSpec::strict_deserialize(invocation.arg(2))
            .map_err(|err| {
                ValidationError::MalformedInvocation(format!(
                    "invalid deployment spec: {}",
                    err
                ))
            })?;

        let writes = self.lifecycle_writes(action, &cds, operation, caps)?;
        trace!(
            "{} of `{}` {}",
            operation,
            cds.name(),
            Stage::StructurallyChecked
        );

        let descriptor =
            ChaincodeDescriptor::strict_deserialize(&writes.descriptor.value)
                .map_err(|err| {
                    ValidationError::MalformedDescriptor(err.to_string())
                })?;
        if descriptor.name != cds.name() || descriptor.version != cds.version()
        {
            return Err(ValidationError::MalformedDescriptor(format!(
                "descriptor {} {} does not match deployment spec {} {}",
                descriptor.name,
                descriptor.version,
                cds.name(),
                cds.version()
            )));
        }

        let existing =
            self.ledger.get_descriptor(&tx.channel_id, &descriptor.name)?;
        match (upgrade, existing) {
            (false, Some(_)) => {
                return Err(ValidationError::AlreadyDeployed(descriptor.name))
            }
            (false, None) => self.check_instantiation_policy(
                &descriptor.instantiation_policy,
                &tx.creator,
            )?,
            (true, None) => {
                return Err(ValidationError::NotDeployed(descriptor.name))
            }
            (true, Some(old)) if old.version == descriptor.version => {
                return Err(ValidationError::InvalidVersion(
                    descriptor.name,
                    descriptor.version,
                ))
            }
            (true, Some(old)) => {
                self.check_instantiation_policy(
                    &old.instantiation_policy,
                    &tx.creator,
                )?;
                if caps.v1_1_validation() {
                    self.check_instantiation_policy(
                        &descriptor.instantiation_policy,
                        &tx.creator,
                    )?;
                }
            }
        }
        trace!("{} of `{}` {}", operation, descriptor.name, Stage::PolicyChecked);

        self.check_collections(tx, &invocation, &writes, &descriptor.name, caps)?;
        trace!(
            "{} of `{}` {}",
            operation,
            descriptor.name,
            Stage::CollectionChecked
        );

        debug!(
            "{} of chaincode `{}` version {} in transaction {} {}",
            operation,
            descriptor.name,
            descriptor.version,
            tx.tx_id,
            Stage::Accepted
        );
        Ok(Some(invocation.operation))
    }

    fn invocation(
        &self,
        action: &ChaincodeActionPayload,
    ) -> Result<Invocation, ValidationError> {
        let malformed =
            |err: strict_encoding::Error| ValidationError::MalformedInvocation(err.to_string());

        let proposal = ChaincodeProposalPayload::strict_deserialize(
            &action.chaincode_proposal_payload,
        )
        .map_err(malformed)?;
        let args = ChaincodeInvocationSpec::strict_deserialize(&proposal.input)
            .map_err(malformed)?
            .chaincode_spec
            .input
            .args;
        let function = args.first().ok_or_else(|| {
            ValidationError::MalformedInvocation(
                "no function name given".to_string(),
            )
        })?;
        let function = String::from_utf8(function.clone()).map_err(|_| {
            ValidationError::MalformedInvocation(
                "function name is not a UTF-8 string".to_string(),
            )
        })?;

        Ok(Invocation {
            operation: self.config.operation(&function),
            args,
        })
    }

    fn lifecycle_writes(
        &self,
        action: &ChaincodeActionPayload,
        cds: &ChaincodeDeploymentSpec,
        operation: &Operation,
        caps: CapabilitySet,
    ) -> Result<LifecycleWrites, ValidationError> {
        let response = ProposalResponsePayload::strict_deserialize(
            &action.action.proposal_response_payload,
        )
        .map_err(malformed_envelope("proposal response payload"))?;
        let chaincode_action =
            ChaincodeAction::strict_deserialize(&response.extension)
                .map_err(malformed_envelope("chaincode action"))?;
        if chaincode_action.results.is_empty() {
            return Err(ValidationError::MissingRWSet);
        }
        let rwset = TxRwSet::strict_deserialize(&chaincode_action.results)
            .map_err(|err| ValidationError::MalformedRWSet(err.to_string()))?;

        let mut writes = Vec::with_capacity(2);
        for (namespace, write) in rwset.writes() {
            if namespace != self.config.lifecycle_namespace {
                return Err(ValidationError::MalformedRWSet(format!(
                    "write to namespace `{}`",
                    namespace
                )));
            }
            if write.is_delete {
                return Err(ValidationError::MalformedRWSet(format!(
                    "deletion of key `{}`",
                    write.key
                )));
            }
            writes.push(write.clone());
        }

        let mut writes = writes.into_iter();
        let descriptor = writes.next().ok_or(ValidationError::MissingRWSet)?;
        let collections = writes.next();
        if writes.next().is_some() {
            return Err(ValidationError::MalformedRWSet(format!(
                "more than 2 writes to `{}`",
                self.config.lifecycle_namespace
            )));
        }

        if descriptor.key != cds.name() {
            return Err(ValidationError::MalformedRWSet(format!(
                "descriptor key `{}` does not match chaincode `{}`",
                descriptor.key,
                cds.name()
            )));
        }
        if let Some(ref write) = collections {
            let expected = self.config.collection_key(cds.name());
            if write.key != expected {
                return Err(ValidationError::MalformedRWSet(format!(
                    "unexpected key `{}` in place of `{}`",
                    write.key, expected
                )));
            }
            if *operation == Operation::Deploy && !caps.private_channel_data() {
                return Err(ValidationError::MalformedRWSet(
                    "private data collections are not enabled".to_string(),
                ));
            }
        }

        Ok(LifecycleWrites {
            descriptor,
            collections,
        })
    }

    fn check_instantiation_policy(
        &self,
        policy: &[u8],
        creator: &SignedData,
    ) -> Result<(), ValidationError> {
        if policy.is_empty() {
            return Err(ValidationError::MalformedDescriptor(
                "no instantiation policy".to_string(),
            ));
        }
        let policy = PolicyEnvelope::strict_deserialize(policy).map_err(|err| {
            ValidationError::MalformedDescriptor(format!(
                "invalid instantiation policy: {}",
                err
            ))
        })?;
        Evaluator::new(&self.identities)
            .evaluate(&policy, slice::from_ref(creator))
            .map_err(ValidationError::InstantiationPolicyNotSatisfied)
    }

    fn check_collections(
        &self,
        tx: &DecodedTx,
        invocation: &Invocation,
        writes: &LifecycleWrites,
        name: &str,
        caps: CapabilitySet,
    ) -> Result<(), ValidationError> {
        let operation = &invocation.operation;
        let legacy_update = *operation == Operation::Upgrade
            && !caps.v1_2_validation()
            && writes.collections.is_some();
        let applies = match operation {
            Operation::Deploy => caps.private_channel_data(),
            Operation::Upgrade => caps.v1_2_validation() || legacy_update,
            Operation::Other(_) => false,
        };
        if !applies {
            return Ok(());
        }

        let existing = match operation {
            Operation::Upgrade => {
                self.ledger.get_collection_package(&tx.channel_id, name)?
            }
            _ => None,
        };
        if legacy_update && existing.is_none() {
            return Err(CollectionError::UpdatesNotSupported.into());
        }

        let value = writes
            .collections
            .as_ref()
            .map(|write| write.value.as_slice())
            .unwrap_or_default();
        if invocation.arg(6) != value {
            return Err(ValidationError::MalformedCollectionPackage(
                "collection argument differs from the written package"
                    .to_string(),
            ));
        }

        let proposed = if !value.is_empty() {
            CollectionConfigPackage::strict_deserialize(value).map_err(|err| {
                ValidationError::MalformedCollectionPackage(err.to_string())
            })?
        } else if legacy_update {
            CollectionConfigPackage::default()
        } else {
            return Ok(());
        };

        collections::check(&proposed, existing.as_ref(), operation, caps)?;
        Ok(())
    }
}

fn malformed_envelope(
    part: &'static str,
) -> impl Fn(strict_encoding::Error) -> ValidationError {
    move |err| {
        ValidationError::MalformedEnvelope(format!("invalid {}: {}", part, err))
    }
}
