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

//! Validation of chaincode lifecycle transactions: structural checks of
//! deploy and upgrade write sets, signature policy evaluation for
//! endorsements and instantiation policies, and capability-gated rules for
//! private data collection configurations.

// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut
)]

#[macro_use]
extern crate amplify_derive;
#[macro_use]
extern crate lscc_derive;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate num_derive;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

#[macro_use]
pub mod strict_encoding;
#[cfg(test)]
#[macro_use]
mod test_helpers;

pub mod capabilities;
pub mod chaincode;
pub mod config;
pub mod identity;
pub mod ledger;
pub mod msp;
pub mod policy;
pub mod tx;
pub mod validation;

pub use capabilities::{Capability, CapabilityProvider, CapabilitySet};
pub use chaincode::{
    ChaincodeDescriptor, CollectionConfig, CollectionConfigPackage,
};
pub use config::ValidatorConfig;
pub use identity::{Identity, IdentityService, SignedData};
pub use ledger::{LedgerError, LedgerQuery, MemoryLedger};
pub use policy::{PolicyEnvelope, PolicyFailure, Principal, SignaturePolicy};
pub use validation::{
    ErrorCategory, Operation, ValidationError, Validator, Verdict,
};
