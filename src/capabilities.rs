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

//! Protocol rule generations active on a channel.

use std::collections::BTreeMap;
use std::iter::FromIterator;
use std::str::FromStr;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
pub enum Capability {
    /// Upgrades must also satisfy the instantiation policy of the new
    /// descriptor
    #[display("V1_1")]
    V1_1,

    /// Collection configuration checks and collection upgrades; implies
    /// both other capabilities
    #[display("V1_2")]
    V1_2,

    /// Private data collections may be defined on deploy
    #[display("V1_1_PVTDATA_EXPERIMENTAL")]
    PrivateData,
}

impl FromStr for Capability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "V1_1" => Ok(Capability::V1_1),
            "V1_2" => Ok(Capability::V1_2),
            "V1_1_PVTDATA_EXPERIMENTAL" => Ok(Capability::PrivateData),
            unknown => Err(CapabilityError::Unknown(unknown.to_string())),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum CapabilityError {
    /// capability `{_0}` is not supported
    Unknown(String),
}

/// Flags of the active capabilities. Use the accessor methods for rule
/// decisions: they account for the capabilities implied by newer ones.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", default)
)]
pub struct CapabilitySet {
    pub v1_1: bool,
    pub v1_2: bool,
    pub private_data_enabled: bool,
}

impl CapabilitySet {
    /// Set with no capabilities: the original rule generation
    pub fn legacy() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::V1_1 => self.v1_1 = true,
            Capability::V1_2 => self.v1_2 = true,
            Capability::PrivateData => self.private_data_enabled = true,
        }
        self
    }

    /// Parses capability names as they appear in channel configuration
    pub fn from_names<I, S>(names: I) -> Result<Self, CapabilityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| Capability::from_str(name.as_ref()))
            .collect()
    }

    pub fn v1_1_validation(&self) -> bool {
        self.v1_1 || self.v1_2
    }

    pub fn v1_2_validation(&self) -> bool {
        self.v1_2
    }

    pub fn private_channel_data(&self) -> bool {
        self.private_data_enabled || self.v1_2
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::default(), CapabilitySet::with)
    }
}

/// Source of the capabilities active on a channel. Queried once per
/// validation call.
pub trait CapabilityProvider {
    fn capabilities(&self, channel: &str) -> CapabilitySet;
}

impl<T> CapabilityProvider for &T
where
    T: CapabilityProvider,
{
    #[inline]
    fn capabilities(&self, channel: &str) -> CapabilitySet {
        (*self).capabilities(channel)
    }
}

impl CapabilityProvider for CapabilitySet {
    fn capabilities(&self, _channel: &str) -> CapabilitySet {
        *self
    }
}

/// Per-channel capabilities; channels absent from the map run legacy rules
impl CapabilityProvider for BTreeMap<String, CapabilitySet> {
    fn capabilities(&self, channel: &str) -> CapabilitySet {
        self.get(channel).copied().unwrap_or_default()
    }
}
