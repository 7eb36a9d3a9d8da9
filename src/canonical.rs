//! Canonical hashing of run results.
//!
//! Two runs are compared by hashing their canonical JSON encoding with
//! xxHash64. Only ordered containers (`Vec`, sorted by construction) may
//! appear in hashed values; a `HashMap` would make the fingerprint depend
//! on iteration order.

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Seed shared by every fingerprint in the crate.
const FINGERPRINT_SEED: u64 = 0;

/// Serialize a value to canonical JSON bytes.
///
/// Returns an empty buffer if the value cannot be represented as JSON
/// (only possible for maps with non-string keys).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute the canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), FINGERPRINT_SEED)
}

/// Compute the canonical hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Element, PartitionId, VertexId};

    #[test]
    fn test_same_value_same_hash() {
        let a = vec![Element::Vertex(VertexId::new(PartitionId(1), 2))];
        assert_eq!(canonical_hash(&a), canonical_hash(&a.clone()));
        assert_eq!(canonical_hash_hex(&a).len(), 16);
    }

    #[test]
    fn test_order_matters() {
        let x = Element::Vertex(VertexId::new(PartitionId(0), 1));
        let y = Element::Vertex(VertexId::new(PartitionId(0), 2));
        assert_ne!(canonical_hash(&vec![x, y]), canonical_hash(&vec![y, x]));
    }
}
