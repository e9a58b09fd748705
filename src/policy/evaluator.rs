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

use std::collections::BTreeSet;

use super::{PolicyEnvelope, Principal, SignaturePolicy};
use crate::identity::{Identity, IdentityService, SignedData};

/// Reasons for a policy to be not satisfied by a set of signatures
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum PolicyFailure {
    /// no signature matches the principals required by the policy
    NoMatchingSignature,

    /// matching signatures were provided, but not by enough distinct signers
    InsufficientDistinctSigners,

    /// none of the provided signatures carries a valid identity
    MalformedIdentity,

    /// none of the provided signatures can be verified
    VerificationFailed,
}

/// Signers which passed deserialization, verification and deduplication,
/// plus the counts of the dropped ones used for the rejection reason.
struct Signers<I> {
    valid: Vec<I>,
    malformed: usize,
    unverified: usize,
    duplicates: usize,
}

/// Evaluates signature policies against signed data using the provided
/// identity service. Holds no state between evaluations.
pub struct Evaluator<'service, S>
where
    S: IdentityService,
{
    service: &'service S,
}

impl<'service, S> Evaluator<'service, S>
where
    S: IdentityService,
{
    pub fn new(service: &'service S) -> Self {
        Self { service }
    }

    pub fn evaluate(
        &self,
        policy: &PolicyEnvelope,
        signed_data: &[SignedData],
    ) -> Result<(), PolicyFailure> {
        let signers = self.signers(signed_data);
        let consumed = vec![false; signers.valid.len()];

        if satisfy(
            &policy.rule,
            &policy.identities,
            &signers.valid,
            &consumed,
            &mut |_: &[bool]| true,
        ) {
            trace!(
                "Policy {} satisfied by {} distinct signer(s)",
                policy,
                signers.valid.len()
            );
            return Ok(());
        }

        let failure = if signers.valid.is_empty() {
            if signers.malformed > 0 && signers.unverified == 0 {
                PolicyFailure::MalformedIdentity
            } else if signers.unverified > 0 {
                PolicyFailure::VerificationFailed
            } else {
                PolicyFailure::NoMatchingSignature
            }
        } else if signers.duplicates > 0
            || signers.valid.iter().any(|signer| {
                policy
                    .identities
                    .iter()
                    .any(|principal| signer.satisfies_principal(principal))
            })
        {
            PolicyFailure::InsufficientDistinctSigners
        } else {
            PolicyFailure::NoMatchingSignature
        };
        debug!("Policy {} is not satisfied: {}", policy, failure);
        Err(failure)
    }

    fn signers(&self, signed_data: &[SignedData]) -> Signers<S::Identity> {
        let mut signers = Signers {
            valid: Vec::with_capacity(signed_data.len()),
            malformed: 0,
            unverified: 0,
            duplicates: 0,
        };
        let mut seen = BTreeSet::new();

        for (index, data) in signed_data.iter().enumerate() {
            let identity = match self.service.deserialize(&data.identity) {
                Ok(identity) => identity,
                Err(err) => {
                    warn!("Skipping signature #{}: {}", index, err);
                    signers.malformed += 1;
                    continue;
                }
            };
            if !self.service.verify(&identity, &data.message, &data.signature)
            {
                warn!(
                    "Skipping signature #{} by {}: verification failed",
                    index,
                    identity.identifier()
                );
                signers.unverified += 1;
                continue;
            }
            let id = identity.identifier();
            if !seen.insert(id.clone()) {
                warn!("Skipping signature #{}: duplicate signer {}", index, id);
                signers.duplicates += 1;
                continue;
            }
            signers.valid.push(identity);
        }

        signers
    }
}

/// Searches for an assignment of signers not yet marked in `consumed` which
/// satisfies `rule`, passing each candidate consumption to `then`. The search
/// stops at the first candidate accepted by `then`, trying subpolicies and
/// signers in listed order, and backtracks otherwise.
fn satisfy<I: Identity>(
    rule: &SignaturePolicy,
    principals: &[Principal],
    signers: &[I],
    consumed: &[bool],
    then: &mut dyn FnMut(&[bool]) -> bool,
) -> bool {
    match rule {
        SignaturePolicy::SignedBy(index) => {
            let principal = match principals.get(*index as usize) {
                Some(principal) => principal,
                None => return false,
            };
            for (no, signer) in signers.iter().enumerate() {
                if consumed[no] || !signer.satisfies_principal(principal) {
                    continue;
                }
                let mut next = consumed.to_vec();
                next[no] = true;
                if then(&next) {
                    return true;
                }
            }
            false
        }
        SignaturePolicy::NOutOf { n, rules } => {
            choose(rules, *n as usize, principals, signers, consumed, then)
        }
    }
}

/// Picks `n` of `rules` satisfiable with disjoint assignments, preferring
/// earlier rules.
fn choose<I: Identity>(
    rules: &[SignaturePolicy],
    n: usize,
    principals: &[Principal],
    signers: &[I],
    consumed: &[bool],
    then: &mut dyn FnMut(&[bool]) -> bool,
) -> bool {
    if n == 0 {
        return then(consumed);
    }
    let (first, rest) = match rules.split_first() {
        Some(split) if rules.len() >= n => split,
        _ => return false,
    };
    let taken = satisfy(first, principals, signers, consumed, &mut |next: &[bool]| {
        choose(rest, n - 1, principals, signers, next, &mut *then)
    });
    taken || choose(rest, n, principals, signers, consumed, then)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::policy::{and, n_out_of, or, signed_by, MspRole};
    use crate::test_helpers::*;

    fn evaluate(
        msp: &TestMsp,
        policy: &PolicyEnvelope,
        signed: &[SignedData],
    ) -> Result<(), PolicyFailure> {
        Evaluator::new(msp).evaluate(policy, signed)
    }

    #[test]
    fn test_accept_all() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::accept_all();
        assert_eq!(evaluate(&msp, &policy, &[]), Ok(()));
        let sig = msp.sign("Org1MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[sig]), Ok(()));
    }

    #[test]
    fn test_reject_all() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::reject_all();
        let sig = msp.sign("Org1MSP", 1, b"data");
        assert_eq!(
            evaluate(&msp, &policy, &[sig]),
            Err(PolicyFailure::NoMatchingSignature)
        );
        assert_eq!(
            evaluate(&msp, &policy, &[]),
            Err(PolicyFailure::NoMatchingSignature)
        );
    }

    #[test]
    fn test_signed_by_member() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::signed_by_msp_member("Org1MSP");
        let good = msp.sign("Org1MSP", 1, b"data");
        let other = msp.sign("Org2MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[good.clone()]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[other.clone()]),
            Err(PolicyFailure::NoMatchingSignature)
        );
        assert_eq!(evaluate(&msp, &policy, &[other, good]), Ok(()));
    }

    #[test]
    fn test_admin_role() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::signed_by_msp_admin("Org1MSP");
        let member = msp.sign("Org1MSP", 1, b"data");
        let admin = msp.sign("Org1MSP", ADMIN_SEED, b"data");
        assert!(evaluate(&msp, &policy, &[member]).is_err());
        assert_eq!(evaluate(&msp, &policy, &[admin]), Ok(()));
        assert_eq!(msp.role_of("Org1MSP", ADMIN_SEED), Some(MspRole::Admin));
    }

    #[test]
    fn test_identity_principal() {
        let msp = TestMsp::default();
        let signer = msp.signer("Org1MSP", 5);
        let policy = PolicyEnvelope::new(
            signed_by(0),
            vec![Principal::Identity(signer.serialized().to_vec())],
        );
        let exact = msp.sign("Org1MSP", 5, b"data");
        let sibling = msp.sign("Org1MSP", 6, b"data");
        assert_eq!(evaluate(&msp, &policy, &[exact]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[sibling]),
            Err(PolicyFailure::NoMatchingSignature)
        );
    }

    #[test]
    fn test_no_double_counting() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::new(
            n_out_of(2, vec![signed_by(0), signed_by(0)]),
            vec![Principal::member("Org1MSP")],
        );
        let first = msp.sign("Org1MSP", 1, b"data");
        let again = msp.sign("Org1MSP", 1, b"data");
        let second = msp.sign("Org1MSP", 2, b"data");

        assert_eq!(
            evaluate(&msp, &policy, &[first.clone(), again]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
        assert_eq!(
            evaluate(&msp, &policy, &[first.clone()]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
        assert_eq!(evaluate(&msp, &policy, &[first, second]), Ok(()));
    }

    #[test]
    fn test_disjoint_assignment() {
        let msp = TestMsp::default();
        // AND(OR(A, B), B): the OR branch must leave B for the second leaf
        let policy = PolicyEnvelope::new(
            and(or(signed_by(0), signed_by(1)), signed_by(1)),
            vec![Principal::member("Org1MSP"), Principal::member("Org2MSP")],
        );
        let a = msp.sign("Org1MSP", 1, b"data");
        let b = msp.sign("Org2MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[a.clone(), b.clone()]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[b]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
        assert_eq!(
            evaluate(&msp, &policy, &[a]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
    }

    #[test]
    fn test_two_of_three() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::new(
            n_out_of(2, vec![signed_by(0), signed_by(1), signed_by(2)]),
            vec![
                Principal::member("Org1MSP"),
                Principal::member("Org2MSP"),
                Principal::member("Org3MSP"),
            ],
        );
        let org1 = msp.sign("Org1MSP", 1, b"data");
        let org3 = msp.sign("Org3MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[org3.clone(), org1]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[org3]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
    }

    #[test]
    fn test_malformed_identity() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::signed_by_msp_member("Org1MSP");
        let mut sig = msp.sign("Org1MSP", 1, b"data");
        sig.identity = b"barf".to_vec();
        assert_eq!(
            evaluate(&msp, &policy, &[sig]),
            Err(PolicyFailure::MalformedIdentity)
        );
        let unknown = msp.sign("UnknownMSP", 1, b"data");
        assert_eq!(
            evaluate(&msp, &policy, &[unknown]),
            Err(PolicyFailure::MalformedIdentity)
        );
    }

    #[test]
    fn test_bad_signature() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::signed_by_msp_member("Org1MSP");
        let mut sig = msp.sign("Org1MSP", 1, b"data");
        sig.message = b"other data".to_vec();
        assert_eq!(
            evaluate(&msp, &policy, &[sig.clone()]),
            Err(PolicyFailure::VerificationFailed)
        );
        // a failing signature does not shadow a valid one by the same signer
        let good = msp.sign("Org1MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[sig, good]), Ok(()));
    }

    #[test]
    fn test_signer_order() {
        let msp = TestMsp::default();
        let policy = PolicyEnvelope::new(
            and(signed_by(0), signed_by(1)),
            vec![Principal::member("Org1MSP"), Principal::admin("Org1MSP")],
        );
        let member = msp.sign("Org1MSP", 1, b"data");
        let admin = msp.sign("Org1MSP", ADMIN_SEED, b"data");
        assert_eq!(
            evaluate(&msp, &policy, &[member.clone(), admin.clone()]),
            Ok(())
        );
        // the admin also matches the member leaf, but must be kept for the
        // admin leaf
        assert_eq!(evaluate(&msp, &policy, &[admin.clone(), member]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[admin]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
    }

    #[test]
    fn test_subpolicy_permutations() {
        let msp = TestMsp::default();
        let principals = vec![
            Principal::member("Org1MSP"),
            Principal::admin("Org1MSP"),
            Principal::member("Org2MSP"),
        ];
        let member = msp.sign("Org1MSP", 1, b"data");
        let admin = msp.sign("Org1MSP", ADMIN_SEED, b"data");
        let org2 = msp.sign("Org2MSP", 1, b"data");
        let permutations: [[u32; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in &permutations {
            let rules = || -> Vec<SignaturePolicy> {
                order.iter().map(|i| signed_by(*i)).collect()
            };
            let all = PolicyEnvelope::new(n_out_of(3, rules()), principals.clone());
            let two = PolicyEnvelope::new(n_out_of(2, rules()), principals.clone());
            for signed in &[
                vec![admin.clone(), member.clone(), org2.clone()],
                vec![org2.clone(), member.clone(), admin.clone()],
                vec![member.clone(), org2.clone(), admin.clone()],
            ] {
                assert_eq!(evaluate(&msp, &all, signed), Ok(()));
            }
            assert_eq!(
                evaluate(&msp, &all, &[admin.clone(), member.clone()]),
                Err(PolicyFailure::InsufficientDistinctSigners)
            );
            assert_eq!(
                evaluate(&msp, &two, &[admin.clone(), member.clone()]),
                Ok(())
            );
            assert_eq!(evaluate(&msp, &two, &[org2.clone(), admin.clone()]), Ok(()));
            assert_eq!(
                evaluate(&msp, &two, &[member.clone(), org2.clone()]),
                Ok(())
            );
        }
    }

    #[test]
    fn test_nested_backtracking() {
        let msp = TestMsp::default();
        // the admin signer is tried first for the member leaf of the OR
        let policy = PolicyEnvelope::new(
            and(or(signed_by(0), signed_by(2)), signed_by(1)),
            vec![
                Principal::member("Org1MSP"),
                Principal::admin("Org1MSP"),
                Principal::member("Org2MSP"),
            ],
        );
        let admin = msp.sign("Org1MSP", ADMIN_SEED, b"data");
        let org2 = msp.sign("Org2MSP", 1, b"data");
        assert_eq!(evaluate(&msp, &policy, &[admin.clone(), org2]), Ok(()));
        assert_eq!(
            evaluate(&msp, &policy, &[admin]),
            Err(PolicyFailure::InsufficientDistinctSigners)
        );
    }
}
