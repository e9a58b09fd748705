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

//! Read access to the committed lifecycle state.

use std::collections::BTreeMap;

use crate::chaincode::{ChaincodeDescriptor, CollectionConfigPackage};
use crate::config::ValidatorConfig;
use crate::strict_encoding::{self, StrictDecode};
use crate::tx::TxRwSet;

/// Read-only view of the committed lifecycle state. Implementations must
/// allow concurrent queries and give each validation call a consistent
/// view.
pub trait LedgerQuery {
    /// Descriptor of chaincode `name` deployed on `channel`, if any
    fn get_descriptor(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<ChaincodeDescriptor>, LedgerError>;

    /// Collection configuration package of chaincode `name` on `channel`,
    /// if any
    fn get_collection_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<CollectionConfigPackage>, LedgerError>;
}

impl<T> LedgerQuery for &T
where
    T: LedgerQuery,
{
    fn get_descriptor(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<ChaincodeDescriptor>, LedgerError> {
        (*self).get_descriptor(channel, name)
    }

    fn get_collection_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<CollectionConfigPackage>, LedgerError> {
        (*self).get_collection_package(channel, name)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum LedgerError {
    /// ledger state is unavailable: {_0}
    Unavailable(String),

    /// record `{_0}` stored in the ledger can't be decoded: {_1}
    Corrupted(String, strict_encoding::Error),
}

type StateKey = (String, String, String);

/// In-memory ledger state keyed by channel, namespace and key
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MemoryLedger {
    config: ValidatorConfig,
    state: BTreeMap<StateKey, Vec<u8>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self {
            config,
            state: BTreeMap::new(),
        }
    }

    pub fn get(&self, channel: &str, namespace: &str, key: &str) -> Option<&[u8]> {
        self.state
            .get(&(channel.to_string(), namespace.to_string(), key.to_string()))
            .map(Vec::as_slice)
    }

    pub fn put(
        &mut self,
        channel: impl ToString,
        namespace: impl ToString,
        key: impl ToString,
        value: impl Into<Vec<u8>>,
    ) {
        self.state.insert(
            (channel.to_string(), namespace.to_string(), key.to_string()),
            value.into(),
        );
    }

    /// Commits all writes of a transaction
    pub fn apply(&mut self, channel: &str, rwset: &TxRwSet) {
        for (namespace, write) in rwset.writes() {
            let key = (
                channel.to_string(),
                namespace.to_string(),
                write.key.clone(),
            );
            if write.is_delete {
                self.state.remove(&key);
            } else {
                self.state.insert(key, write.value.clone());
            }
        }
        debug!("Committed {} write(s) on channel {}", rwset.writes().count(), channel);
    }

    fn decode<T: StrictDecode>(
        &self,
        channel: &str,
        key: &str,
    ) -> Result<Option<T>, LedgerError> {
        match self.get(channel, &self.config.lifecycle_namespace, key) {
            None => Ok(None),
            Some(value) if value.is_empty() => Ok(None),
            Some(value) => T::strict_deserialize(value)
                .map(Some)
                .map_err(|err| LedgerError::Corrupted(key.to_string(), err)),
        }
    }
}

impl LedgerQuery for MemoryLedger {
    fn get_descriptor(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<ChaincodeDescriptor>, LedgerError> {
        self.decode(channel, name)
    }

    fn get_collection_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Option<CollectionConfigPackage>, LedgerError> {
        self.decode(channel, &self.config.collection_key(name))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::strict_encoding::strict_serialize;

    #[test]
    fn test_descriptor_lookup() {
        let mut ledger = MemoryLedger::new();
        let descriptor = ChaincodeDescriptor::new("mycc", "1");
        ledger.put(
            "testchainid",
            "lscc",
            "mycc",
            strict_serialize(&descriptor).unwrap(),
        );

        assert_eq!(
            ledger.get_descriptor("testchainid", "mycc"),
            Ok(Some(descriptor))
        );
        assert_eq!(ledger.get_descriptor("otherchain", "mycc"), Ok(None));
        assert_eq!(ledger.get_descriptor("testchainid", "othercc"), Ok(None));
        assert_eq!(
            ledger.get_collection_package("testchainid", "mycc"),
            Ok(None)
        );
    }

    #[test]
    fn test_corrupted_record() {
        let mut ledger = MemoryLedger::new();
        ledger.put("testchainid", "lscc", "mycc", b"barf".to_vec());
        assert!(matches!(
            ledger.get_descriptor("testchainid", "mycc"),
            Err(LedgerError::Corrupted(_, _))
        ));
    }

    #[test]
    fn test_apply() {
        let mut ledger = MemoryLedger::new();
        let package = CollectionConfigPackage::default();
        let mut rwset = TxRwSet::default();
        rwset.push_write(
            "lscc",
            "mycc",
            strict_serialize(&ChaincodeDescriptor::new("mycc", "1")).unwrap(),
        );
        rwset.push_write(
            "lscc",
            "mycc~collection",
            strict_serialize(&package).unwrap(),
        );
        ledger.apply("testchainid", &rwset);

        assert!(ledger
            .get_descriptor("testchainid", "mycc")
            .unwrap()
            .is_some());
        assert_eq!(
            ledger.get_collection_package("testchainid", "mycc"),
            Ok(Some(package))
        );
    }
}
