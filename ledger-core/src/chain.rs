//! Hash chain verification
//!
//! `hash[i] = sha256_hex(prevHash[i] || canonicalize(data[i]))`, where
//! `prevHash[i]` is the string the entry declares. A chain is valid when
//! every supplied hash matches its recomputation and every entry after the
//! first links to the recomputed hash of its predecessor.

use crate::crypto::hash_bytes;
use crate::merkle::MerkleTree;
use crate::metrics::{LEDGER_ENTRIES_VERIFIED_TOTAL, LEDGER_VERIFICATIONS_TOTAL};
use crate::types::LedgerEntry;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;
use tracing::{debug, warn};

/// Compact JSON with object keys sorted at every depth
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // Display on a string Value is its escaped JSON form
    let _ = write!(out, "{}", Value::String(s.to_string()));
}

/// Hash of one entry given the predecessor hash it declares
pub fn entry_digest(prev_hash: &str, data: &Value) -> [u8; 32] {
    let mut preimage = String::from(prev_hash);
    preimage.push_str(&canonicalize(data));
    hash_bytes(preimage.as_bytes())
}

/// How an entry breaks the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// Supplied hash differs from the recomputed one
    HashMismatch,
    /// Declared prevHash differs from the predecessor's recomputed hash
    BrokenLink,
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainViolation {
    /// Position in the submitted list
    pub index: usize,
    /// Entry id
    pub id: String,
    /// What failed
    pub kind: ViolationKind,
}

/// Result of recomputing a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    /// True when no violation was found
    pub valid_chain: bool,
    /// Merkle root of the recomputed hashes, empty for no entries
    pub merkle_root: String,
    /// Last recomputed hash, empty for no entries
    pub last_hash: String,
    /// Recomputed hash per entry
    pub hashes: Vec<String>,
    /// Every failed check, in entry order
    pub violations: Vec<ChainViolation>,
}

impl ChainVerification {
    /// Turn an invalid chain into `ChainIntegrityViolation`
    pub fn ensure_valid(&self) -> Result<()> {
        match self.violations.first() {
            None => Ok(()),
            Some(first) => Err(Error::ChainIntegrityViolation {
                count: self.violations.len(),
                first_index: first.index,
            }),
        }
    }
}

/// Recompute the chain, Merkle root and violations for `entries`
pub fn verify_chain(entries: &[LedgerEntry]) -> ChainVerification {
    let mut digests = Vec::with_capacity(entries.len());
    let mut hashes = Vec::with_capacity(entries.len());
    let mut violations = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let digest = entry_digest(entry.prev_hash(), &entry.data);
        let computed = hex::encode(digest);

        if let Some(supplied) = entry.hash.as_deref() {
            if supplied != computed {
                violations.push(ChainViolation {
                    index,
                    id: entry.id.clone(),
                    kind: ViolationKind::HashMismatch,
                });
            }
        }

        if let Some(previous) = hashes.last() {
            if entry.prev_hash() != previous {
                violations.push(ChainViolation {
                    index,
                    id: entry.id.clone(),
                    kind: ViolationKind::BrokenLink,
                });
            }
        }

        digests.push(digest);
        hashes.push(computed);
    }

    let valid_chain = violations.is_empty();
    let result = if valid_chain { "valid" } else { "invalid" };
    LEDGER_VERIFICATIONS_TOTAL.with_label_values(&[result]).inc();
    LEDGER_ENTRIES_VERIFIED_TOTAL.inc_by(entries.len() as u64);

    if valid_chain {
        debug!("Verified chain of {} entries", entries.len());
    } else {
        warn!(
            "Chain of {} entries has {} violation(s), first at entry {}",
            entries.len(),
            violations.len(),
            violations[0].index
        );
    }

    ChainVerification {
        valid_chain,
        merkle_root: MerkleTree::from_leaves(digests).root_hex(),
        last_hash: hashes.last().cloned().unwrap_or_default(),
        hashes,
        violations,
    }
}
