//! SHA-256 helpers shared by the chain and the Merkle tree

use crate::{Error, Result};
use sha2::{Digest, Sha256};

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 as lower-case hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Decode a hex SHA-256 digest (either case)
pub fn decode_digest(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|e| Error::InvalidHash(format!("{}: {}", value, e)))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidHash(format!("{}: expected 32 bytes", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_decode_digest() {
        let digest = hash_bytes(b"abc");
        assert_eq!(decode_digest(&hex::encode(digest)).unwrap(), digest);
        assert_eq!(decode_digest(&hex::encode_upper(digest)).unwrap(), digest);
        assert!(decode_digest("abcd").is_err());
        assert!(decode_digest(&"zz".repeat(32)).is_err());
    }
}
