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

//! Chaincode metadata kept by the lifecycle namespace: descriptors,
//! deployment specs carried by lifecycle invocations and private data
//! collection configuration packages.

use crate::policy::PolicyEnvelope;

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ChaincodeId {
    pub path: String,
    pub name: String,
    pub version: String,
}

impl ChaincodeId {
    pub fn new(name: impl ToString, version: impl ToString) -> Self {
        Self {
            path: String::new(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }
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
pub enum ChaincodeType {
    Undefined = 0,
    Golang = 1,
    Node = 2,
    Car = 3,
    Java = 4,
}

impl_enum_strict_encoding!(ChaincodeType);

impl Default for ChaincodeType {
    fn default() -> Self {
        ChaincodeType::Golang
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeInput {
    pub args: Vec<Vec<u8>>,
}

impl ChaincodeInput {
    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeSpec {
    pub chaincode_type: ChaincodeType,
    pub chaincode_id: ChaincodeId,
    pub input: ChaincodeInput,
    pub timeout: u32,
}

/// Chaincode package sent to the lifecycle chaincode by deploy and upgrade
/// invocations as the third argument
#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeDeploymentSpec {
    pub chaincode_spec: ChaincodeSpec,
    pub code_package: Vec<u8>,
}

impl ChaincodeDeploymentSpec {
    pub fn new(name: impl ToString, version: impl ToString) -> Self {
        Self {
            chaincode_spec: ChaincodeSpec {
                chaincode_id: ChaincodeId::new(name, version),
                ..ChaincodeSpec::default()
            },
            code_package: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.chaincode_spec.chaincode_id.name
    }

    pub fn version(&self) -> &str {
        &self.chaincode_spec.chaincode_id.version
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeInvocationSpec {
    pub chaincode_spec: ChaincodeSpec,
}

/// Chaincode metadata record stored by the lifecycle namespace under the
/// chaincode name
#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct ChaincodeDescriptor {
    pub name: String,
    pub version: String,
    /// Endorsement system chaincode name
    pub escc: String,
    /// Validation system chaincode name
    pub vscc: String,
    /// Endorsement policy bytes
    pub policy: Vec<u8>,
    /// Chaincode identifier hash
    pub id: Vec<u8>,
    /// Instantiation policy bytes; empty when no policy was set
    pub instantiation_policy: Vec<u8>,
}

impl ChaincodeDescriptor {
    pub fn new(name: impl ToString, version: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            escc: "escc".to_string(),
            vscc: "vscc".to_string(),
            ..Self::default()
        }
    }

    pub fn with_instantiation_policy(mut self, policy: Vec<u8>) -> Self {
        self.instantiation_policy = policy;
        self
    }
}

/// Private data collection definition
#[derive(Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode)]
pub struct CollectionConfig {
    pub name: String,
    /// Who may be a member of the collection
    pub member_policy: PolicyEnvelope,
    pub required_peer_count: i32,
    pub maximum_peer_count: i32,
    /// Number of blocks private data are kept for; `0` means forever
    pub block_to_live: u64,
}

impl CollectionConfig {
    pub fn new(
        name: impl ToString,
        member_policy: PolicyEnvelope,
        required_peer_count: i32,
        maximum_peer_count: i32,
        block_to_live: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            member_policy,
            required_peer_count,
            maximum_peer_count,
            block_to_live,
        }
    }
}

#[derive(
    Clone, PartialEq, Eq, Hash, Debug, Default, StrictEncode, StrictDecode,
)]
pub struct CollectionConfigPackage {
    pub configs: Vec<CollectionConfig>,
}

impl CollectionConfigPackage {
    pub fn new(configs: Vec<CollectionConfig>) -> Self {
        Self { configs }
    }

    /// First configuration with the given name
    pub fn get(&self, name: &str) -> Option<&CollectionConfig> {
        self.configs.iter().find(|config| config.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}
