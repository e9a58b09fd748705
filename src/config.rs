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

use crate::validation::Operation;

pub const LIFECYCLE_NAMESPACE: &str = "lscc";
pub const DEPLOY_FUNCTION: &str = "deploy";
pub const UPGRADE_FUNCTION: &str = "upgrade";
/// Appended to the chaincode name to get the ledger key of its collection
/// configuration package
pub const COLLECTION_KEY_SUFFIX: &str = "~collection";

/// Naming conventions of the lifecycle chaincode the validator checks
/// transactions against
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", default)
)]
pub struct ValidatorConfig {
    /// Name of the lifecycle chaincode, which is also its ledger namespace
    pub lifecycle_namespace: String,
    pub deploy_function: String,
    pub upgrade_function: String,
    pub collection_key_suffix: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            lifecycle_namespace: LIFECYCLE_NAMESPACE.to_string(),
            deploy_function: DEPLOY_FUNCTION.to_string(),
            upgrade_function: UPGRADE_FUNCTION.to_string(),
            collection_key_suffix: COLLECTION_KEY_SUFFIX.to_string(),
        }
    }
}

impl ValidatorConfig {
    /// Ledger key of the collection configuration package of the chaincode
    pub fn collection_key(&self, chaincode_name: &str) -> String {
        format!("{}{}", chaincode_name, self.collection_key_suffix)
    }

    pub fn operation(&self, function: &str) -> Operation {
        if function == self.deploy_function {
            Operation::Deploy
        } else if function == self.upgrade_function {
            Operation::Upgrade
        } else {
            Operation::Other(function.to_string())
        }
    }
}

#[cfg(feature = "serde")]
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ConfigError {
    /// Unable to parse TOML format of the validator configuration:
    /// {_0}
    Toml(String),
}

#[cfg(feature = "serde")]
impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err.to_string())
    }
}

#[cfg(feature = "serde")]
impl ValidatorConfig {
    /// Reads configuration from TOML; absent fields take default values
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}
