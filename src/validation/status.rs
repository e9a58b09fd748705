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

use std::fmt::{self, Display, Formatter};

use super::CollectionError;
use crate::ledger::LedgerError;
use crate::policy::PolicyFailure;

/// Lifecycle operation requested by a transaction
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
    Deploy,
    Upgrade,
    /// Any other lifecycle function; not subject to lifecycle checks
    Other(String),
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deploy => f.write_str("deploy"),
            Operation::Upgrade => f.write_str("upgrade"),
            Operation::Other(function) => write!(f, "`{}` invocation", function),
        }
    }
}

/// Successful validation outcome
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display)]
pub enum Verdict {
    /// Deploy or upgrade passed all lifecycle checks
    #[display("accepted {_0}")]
    Accepted(Operation),

    /// Only the endorsement policy applied: the transaction is not a
    /// lifecycle deploy or upgrade
    #[display("pass-through")]
    PassThrough,
}

/// Validation pipeline stages, in the order they are reached
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display,
)]
pub enum Stage {
    #[display("decoded")]
    Decoded,
    #[display("structurally checked")]
    StructurallyChecked,
    #[display("policy checked")]
    PolicyChecked,
    #[display("collection checked")]
    CollectionChecked,
    #[display("accepted")]
    Accepted,
}

/// Coarse grouping of [`ValidationError`]s for logs and metrics
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display,
)]
#[display(Debug)]
pub enum ErrorCategory {
    Structural,
    Authorization,
    LifecycleState,
    Collection,
    Ledger,
}

/// Reasons for rejecting a transaction
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, From, Error)]
#[display(doc_comments)]
pub enum ValidationError {
    /// transaction envelope is malformed: {_0}
    MalformedEnvelope(String),

    /// lifecycle invocation is malformed: {_0}
    MalformedInvocation(String),

    /// endorsement policy can't be decoded: {_0}
    MalformedPolicy(String),

    /// lifecycle transaction carries no lifecycle writes
    MissingRWSet,

    /// lifecycle write set is malformed: {_0}
    MalformedRWSet(String),

    /// chaincode descriptor is malformed: {_0}
    MalformedDescriptor(String),

    /// collection configuration package is malformed: {_0}
    MalformedCollectionPackage(String),

    /// endorsement policy is not satisfied: {_0}
    PolicyNotSatisfied(PolicyFailure),

    /// instantiation policy is not satisfied: {_0}
    InstantiationPolicyNotSatisfied(PolicyFailure),

    /// chaincode `{_0}` is already deployed
    AlreadyDeployed(String),

    /// chaincode `{_0}` is not deployed and can't be upgraded
    NotDeployed(String),

    /// chaincode `{_0}` already has version `{_1}`
    InvalidVersion(String, String),

    /// invalid collection configuration: {_0}
    #[from]
    Collection(CollectionError),

    /// lifecycle state lookup failed: {_0}
    #[from]
    LedgerUnavailable(LedgerError),
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::MalformedEnvelope(_)
            | ValidationError::MalformedInvocation(_)
            | ValidationError::MalformedPolicy(_)
            | ValidationError::MissingRWSet
            | ValidationError::MalformedRWSet(_)
            | ValidationError::MalformedDescriptor(_)
            | ValidationError::MalformedCollectionPackage(_) => {
                ErrorCategory::Structural
            }
            ValidationError::PolicyNotSatisfied(_)
            | ValidationError::InstantiationPolicyNotSatisfied(_) => {
                ErrorCategory::Authorization
            }
            ValidationError::AlreadyDeployed(_)
            | ValidationError::NotDeployed(_)
            | ValidationError::InvalidVersion(_, _) => {
                ErrorCategory::LifecycleState
            }
            ValidationError::Collection(_) => ErrorCategory::Collection,
            ValidationError::LedgerUnavailable(_) => ErrorCategory::Ledger,
        }
    }

    /// Policy failure behind an authorization error
    pub fn policy_failure(&self) -> Option<PolicyFailure> {
        match self {
            ValidationError::PolicyNotSatisfied(failure)
            | ValidationError::InstantiationPolicyNotSatisfied(failure) => {
                Some(*failure)
            }
            _ => None,
        }
    }
}
