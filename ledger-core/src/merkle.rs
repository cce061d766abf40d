//! Merkle tree over chain hashes
//!
//! Leaves are the raw 32-byte digests behind the hex hashes of a verified
//! chain. Adjacent nodes are paired and hashed as `SHA-256(left || right)`;
//! an odd level duplicates its last node. A single leaf is its own root.

use crate::crypto::decode_digest;
use crate::Result;
use sha2::{Digest, Sha256};

/// Hash a pair of nodes
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Fold one level into its parent level
fn parent_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    level
        .chunks(2)
        .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Hex Merkle root of hex-encoded leaf hashes; empty input gives ""
pub fn merkle_root_hex(hashes: &[String]) -> Result<String> {
    if hashes.is_empty() {
        return Ok(String::new());
    }
    let tree = MerkleTree::from_hex_leaves(hashes)?;
    Ok(tree.root().map(hex::encode).unwrap_or_default())
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Leaf being proven
    pub leaf_hash: [u8; 32],
    /// Siblings from the leaf level up
    pub siblings: Vec<(Direction, [u8; 32])>,
    /// Expected root
    pub root_hash: [u8; 32],
}

/// Side of the sibling relative to the running hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

impl MerkleProof {
    /// Recompute the root from the leaf and siblings and compare
    pub fn verify(&self) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(self.leaf_hash, |current, (direction, sibling)| match direction {
                Direction::Left => hash_pair(sibling, &current),
                Direction::Right => hash_pair(&current, sibling),
            });
        computed == self.root_hash
    }
}

/// Append-only Merkle tree
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    leaves: Vec<[u8; 32]>,
}

impl MerkleTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree over raw digests
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Self {
        Self { leaves }
    }

    /// Tree over hex digests, failing on the first malformed one
    pub fn from_hex_leaves(hashes: &[String]) -> Result<Self> {
        let leaves = hashes
            .iter()
            .map(|h| decode_digest(h))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_leaves(leaves))
    }

    /// Append a leaf
    pub fn append(&mut self, leaf_hash: [u8; 32]) {
        self.leaves.push(leaf_hash);
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when there are no leaves
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root digest, `None` for an empty tree
    pub fn root(&self) -> Option<[u8; 32]> {
        if self.leaves.is_empty() {
            return None;
        }

        let mut level = self.leaves.clone();
        while level.len() > 1 {
            level = parent_level(&level);
        }
        Some(level[0])
    }

    /// Hex root, empty for an empty tree
    pub fn root_hex(&self) -> String {
        self.root().map(hex::encode).unwrap_or_default()
    }

    /// Inclusion proof for the leaf at `leaf_index`
    pub fn generate_proof(&self, leaf_index: usize) -> Option<MerkleProof> {
        let leaf_hash = *self.leaves.get(leaf_index)?;
        let root_hash = self.root()?;

        let mut siblings = Vec::new();
        let mut level = self.leaves.clone();
        let mut index = leaf_index;

        while level.len() > 1 {
            let entry = if index % 2 == 0 {
                // Last node of an odd level pairs with itself
                let sibling = level.get(index + 1).copied().unwrap_or(level[index]);
                (Direction::Right, sibling)
            } else {
                (Direction::Left, level[index - 1])
            };
            siblings.push(entry);

            level = parent_level(&level);
            index /= 2;
        }

        Some(MerkleProof {
            leaf_hash,
            siblings,
            root_hash,
        })
    }

    /// True when `leaf_hash` sits at `leaf_index` and proves against the root
    pub fn verify_leaf(&self, leaf_index: usize, leaf_hash: [u8; 32]) -> bool {
        match self.generate_proof(leaf_index) {
            Some(proof) => proof.leaf_hash == leaf_hash && proof.verify(),
            None => false,
        }
    }
}
