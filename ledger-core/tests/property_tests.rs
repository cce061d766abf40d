//! Property-based tests for ledger invariants
//!
//! - Merkle determinism: same leaves in the same order give the same root
//! - Merkle order sensitivity: swapping two distinct leaves changes the root
//! - Chain validity: a correctly linked chain always verifies
//! - Tamper evidence: changing any entry's data invalidates the chain
//! - Inclusion: every leaf proves against the root

use ledger_core::{
    chain::entry_digest, crypto::sha256_hex, merkle_root_hex, verify_chain, LedgerEntry,
    MerkleTree,
};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for hex leaf hashes
fn leaf_strategy() -> impl Strategy<Value = String> {
    any::<[u8; 16]>().prop_map(|seed| sha256_hex(&seed))
}

/// Strategy for transaction payloads
fn data_strategy() -> impl Strategy<Value = Value> {
    (1u64..1_000_000_00u64, "[A-Z]{3}", "[a-z0-9-]{1,16}").prop_map(|(cents, currency, reference)| {
        json!({
            "amount": cents,
            "currency": currency,
            "reference": reference,
        })
    })
}

/// Link payloads into a chain with declared hashes
fn build_chain(data: &[Value]) -> Vec<LedgerEntry> {
    let mut prev = String::new();
    data.iter()
        .enumerate()
        .map(|(i, d)| {
            let hash = hex::encode(entry_digest(&prev, d));
            let entry = LedgerEntry::new(i.to_string(), d.clone())
                .with_prev_hash(prev.clone())
                .with_hash(hash.clone());
            prev = hash;
            entry
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Merkle root is a pure function of the ordered leaves
    #[test]
    fn prop_merkle_root_deterministic(leaves in prop::collection::vec(leaf_strategy(), 1..64)) {
        let first = merkle_root_hex(&leaves).unwrap();
        let second = merkle_root_hex(&leaves.clone()).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), 64);
    }

    /// Property: swapping two distinct leaves changes the root
    #[test]
    fn prop_merkle_root_order_sensitive(
        leaves in prop::collection::vec(leaf_strategy(), 2..32),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let i = a.index(leaves.len());
        let j = b.index(leaves.len());
        prop_assume!(leaves[i] != leaves[j]);

        let mut swapped = leaves.clone();
        swapped.swap(i, j);

        prop_assert_ne!(merkle_root_hex(&leaves).unwrap(), merkle_root_hex(&swapped).unwrap());
    }

    /// Property: every leaf has a valid inclusion proof
    #[test]
    fn prop_every_leaf_proves(leaves in prop::collection::vec(leaf_strategy(), 1..40)) {
        let tree = MerkleTree::from_hex_leaves(&leaves).unwrap();
        for i in 0..leaves.len() {
            let proof = tree.generate_proof(i).unwrap();
            prop_assert!(proof.verify());
        }
    }

    /// Property: a correctly linked chain verifies and its root matches its hashes
    #[test]
    fn prop_linked_chain_is_valid(data in prop::collection::vec(data_strategy(), 1..30)) {
        let entries = build_chain(&data);
        let result = verify_chain(&entries);

        prop_assert!(result.valid_chain);
        prop_assert_eq!(result.hashes.len(), entries.len());
        prop_assert_eq!(Some(&result.last_hash), entries.last().and_then(|e| e.hash.as_ref()));
        prop_assert_eq!(result.merkle_root, merkle_root_hex(&result.hashes).unwrap());
    }

    /// Property: altering any entry's data is detected at that entry
    #[test]
    fn prop_tampering_is_detected(
        data in prop::collection::vec(data_strategy(), 1..30),
        target in any::<prop::sample::Index>(),
    ) {
        let mut entries = build_chain(&data);
        let index = target.index(entries.len());
        entries[index].data["amount"] = json!("tampered");

        let result = verify_chain(&entries);

        prop_assert!(!result.valid_chain);
        prop_assert_eq!(result.violations[0].index, index);
        prop_assert!(!result.merkle_root.is_empty());
    }
}
