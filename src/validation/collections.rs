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

//! Invariants of private data collection configuration packages, including
//! the rules for changing them on chaincode upgrade.

use std::collections::BTreeSet;

use super::Operation;
use crate::capabilities::CapabilitySet;
use crate::chaincode::CollectionConfigPackage;

#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum CollectionError {
    /// collection #{_0} has an empty name
    InvalidCollectionName(usize),

    /// collection `{_0}` is defined more than once
    DuplicateCollection(String),

    /// collection `{_0}` requires {_1} peers, which is more than its
    /// maximum of {_2}
    PeerCountInvariantViolated(String, i32, i32),

    /// existing collection `{_0}` is missing from the upgraded package
    MissingExistingCollection(String),

    /// `block_to_live` of collection `{_0}` can't be changed
    ImmutableFieldChanged(String),

    /// collection configuration can't be updated on chaincode upgrade
    UpdatesNotSupported,
}

/// Checks the `proposed` package on its own and, for upgrades, against the
/// `existing` one.
pub fn check(
    proposed: &CollectionConfigPackage,
    existing: Option<&CollectionConfigPackage>,
    operation: &Operation,
    caps: CapabilitySet,
) -> Result<(), CollectionError> {
    let mut names = BTreeSet::new();
    for (no, config) in proposed.iter().enumerate() {
        if config.name.is_empty() {
            return Err(CollectionError::InvalidCollectionName(no));
        }
        if !caps.v1_2_validation() {
            continue;
        }
        if config.maximum_peer_count < config.required_peer_count {
            return Err(CollectionError::PeerCountInvariantViolated(
                config.name.clone(),
                config.required_peer_count,
                config.maximum_peer_count,
            ));
        }
        if !names.insert(config.name.as_str()) {
            return Err(CollectionError::DuplicateCollection(
                config.name.clone(),
            ));
        }
    }

    match (operation, existing) {
        (Operation::Upgrade, Some(existing)) => {
            check_upgrade(proposed, existing, caps)
        }
        (Operation::Upgrade, None) if !caps.v1_2_validation() => {
            Err(CollectionError::UpdatesNotSupported)
        }
        _ => Ok(()),
    }
}

fn check_upgrade(
    proposed: &CollectionConfigPackage,
    existing: &CollectionConfigPackage,
    caps: CapabilitySet,
) -> Result<(), CollectionError> {
    if !caps.v1_2_validation() {
        return if proposed == existing {
            Ok(())
        } else {
            Err(CollectionError::UpdatesNotSupported)
        };
    }

    for old in existing.iter() {
        let new = proposed.get(&old.name).ok_or_else(|| {
            CollectionError::MissingExistingCollection(old.name.clone())
        })?;
        if new.block_to_live != old.block_to_live {
            return Err(CollectionError::ImmutableFieldChanged(
                old.name.clone(),
            ));
        }
    }
    trace!(
        "Collection upgrade keeps {} existing and adds {} new collection(s)",
        existing.len(),
        proposed.len().saturating_sub(existing.len())
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::capabilities::Capability;
    use crate::chaincode::CollectionConfig;
    use crate::policy::PolicyEnvelope;

    fn collection(name: &str, block_to_live: u64) -> CollectionConfig {
        CollectionConfig::new(
            name,
            PolicyEnvelope::signed_by_msp_member("Org1MSP"),
            1,
            2,
            block_to_live,
        )
    }

    fn v12() -> CapabilitySet {
        CapabilitySet::legacy().with(Capability::V1_2)
    }

    #[test]
    fn test_empty_name() {
        let package = CollectionConfigPackage::new(vec![
            collection("mycollection", 0),
            collection("", 0),
        ]);
        for caps in &[CapabilitySet::legacy(), v12()] {
            assert_eq!(
                check(&package, None, &Operation::Deploy, *caps),
                Err(CollectionError::InvalidCollectionName(1))
            );
        }
    }

    #[test]
    fn test_peer_counts() {
        let mut config = collection("mycollection", 0);
        config.required_peer_count = 3;
        config.maximum_peer_count = 2;
        let package = CollectionConfigPackage::new(vec![config]);
        assert_eq!(
            check(&package, None, &Operation::Deploy, v12()),
            Err(CollectionError::PeerCountInvariantViolated(
                "mycollection".to_string(),
                3,
                2
            ))
        );
        assert_eq!(
            check(&package, None, &Operation::Deploy, CapabilitySet::legacy()),
            Ok(())
        );
    }

    #[test]
    fn test_legacy_duplicates() {
        let package = CollectionConfigPackage::new(vec![
            collection("mycollection", 0),
            collection("mycollection", 0),
        ]);
        assert_eq!(
            check(&package, None, &Operation::Deploy, v12()),
            Err(CollectionError::DuplicateCollection(
                "mycollection".to_string()
            ))
        );
        let private_data =
            CapabilitySet::legacy().with(Capability::PrivateData);
        assert_eq!(
            check(&package, None, &Operation::Deploy, private_data),
            Ok(())
        );
    }

    #[test]
    fn test_superset_upgrade() {
        let existing = CollectionConfigPackage::new(vec![
            collection("A", 1000),
            collection("B", 1000),
        ]);
        let upgrade = |package: CollectionConfigPackage| {
            check(&package, Some(&existing), &Operation::Upgrade, v12())
        };

        assert_eq!(
            upgrade(CollectionConfigPackage::new(vec![
                collection("A", 1000),
                collection("B", 1000),
                collection("C", 5),
            ])),
            Ok(())
        );
        // order of collections does not matter
        assert_eq!(
            upgrade(CollectionConfigPackage::new(vec![
                collection("B", 1000),
                collection("A", 1000),
            ])),
            Ok(())
        );
        assert_eq!(
            upgrade(CollectionConfigPackage::new(vec![collection("A", 1000)])),
            Err(CollectionError::MissingExistingCollection("B".to_string()))
        );
        assert_eq!(
            upgrade(CollectionConfigPackage::new(vec![
                collection("A", 1000),
                collection("B", 1001),
            ])),
            Err(CollectionError::ImmutableFieldChanged("B".to_string()))
        );
    }

    #[test]
    fn test_upgrade_adds_first_package() {
        let package =
            CollectionConfigPackage::new(vec![collection("mycollection", 0)]);
        assert_eq!(
            check(&package, None, &Operation::Upgrade, v12()),
            Ok(())
        );
    }

    #[test]
    fn test_legacy_upgrade() {
        let existing =
            CollectionConfigPackage::new(vec![collection("A", 1000)]);
        let legacy = CapabilitySet::legacy().with(Capability::PrivateData);

        assert_eq!(
            check(&existing, None, &Operation::Upgrade, legacy),
            Err(CollectionError::UpdatesNotSupported)
        );
        assert_eq!(
            check(&existing, Some(&existing), &Operation::Upgrade, legacy),
            Ok(())
        );
        let extended = CollectionConfigPackage::new(vec![
            collection("A", 1000),
            collection("B", 1000),
        ]);
        assert_eq!(
            check(&extended, Some(&existing), &Operation::Upgrade, legacy),
            Err(CollectionError::UpdatesNotSupported)
        );
    }
}
