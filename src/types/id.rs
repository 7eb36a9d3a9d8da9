//! Partition-aware identifiers.
//!
//! Every vertex, edge and incidence carries a [`GlobalId`]: the partition
//! that owns it plus a 1-based slot inside that partition. The partition
//! half routes work to the right station; the local half indexes the
//! owning station's marking arrays directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of low bits holding the local id in an encoded [`GlobalId`].
pub const LOCAL_ID_BITS: u32 = 32;

const MAX_ENCODED: u64 = (1 << (LOCAL_ID_BITS + u16::BITS)) - 1;

/// Local id reserved as the "unmarked" sentinel slot.
///
/// Marking arrays are allocated with `count + 1` slots so that real
/// elements occupy `1..=count`.
pub const SENTINEL_LOCAL_ID: u32 = 0;

/// Identifier of a partition (and of the station hosting it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub u16);

impl PartitionId {
    /// Create a partition id.
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw partition number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PartitionId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Error returned when parsing an identifier from text or an integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// Missing the `partition:local` separator.
    #[error("expected `partition:local`, got {0:?}")]
    MissingSeparator(String),
    /// One of the two halves is not a number.
    #[error("invalid number in id {0:?}")]
    InvalidNumber(String),
    /// Encoded id with bits above the partition range.
    #[error("encoded id {0:#x} does not fit partition and local slot")]
    OutOfRange(u64),
    /// Typed id with the wrong prefix.
    #[error("expected prefix {expected:?} in {input:?}")]
    WrongPrefix {
        /// Prefix the typed id expects.
        expected: char,
        /// Offending input.
        input: String,
    },
}

/// Globally unique element identifier: `(partition, local)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId {
    /// Partition owning the element.
    pub partition: PartitionId,
    /// 1-based slot within the owning partition.
    pub local: u32,
}

impl GlobalId {
    /// Create a global id from its two halves.
    pub fn new(partition: PartitionId, local: u32) -> Self {
        Self { partition, local }
    }

    /// Partition that must be asked to resolve or mutate this element.
    pub fn partition_of(&self) -> PartitionId {
        self.partition
    }

    /// Slot index within the owning partition's marking arrays.
    pub fn local_of(&self) -> u32 {
        self.local
    }

    /// Whether this id points at the reserved sentinel slot.
    pub fn is_sentinel(&self) -> bool {
        self.local == SENTINEL_LOCAL_ID
    }

    /// Pack into a single integer (`partition << 32 | local`).
    pub fn encode(&self) -> u64 {
        (u64::from(self.partition.0) << LOCAL_ID_BITS) | u64::from(self.local)
    }

    /// Unpack an integer produced by [`GlobalId::encode`].
    ///
    /// Use [`GlobalId::try_decode`] for integers from outside the crate.
    pub fn decode(raw: u64) -> Self {
        debug_assert!(raw <= MAX_ENCODED, "encoded id {raw:#x} has bits above the partition");
        Self {
            partition: PartitionId((raw >> LOCAL_ID_BITS) as u16),
            local: raw as u32,
        }
    }

    /// Unpack an integer, rejecting bits above the partition range.
    pub fn try_decode(raw: u64) -> Result<Self, IdParseError> {
        if raw > MAX_ENCODED {
            return Err(IdParseError::OutOfRange(raw));
        }
        Ok(Self::decode(raw))
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.partition, self.local)
    }
}

impl FromStr for GlobalId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (partition, local) = s
            .split_once(':')
            .ok_or_else(|| IdParseError::MissingSeparator(s.to_string()))?;
        let partition = partition
            .trim()
            .parse::<u16>()
            .map_err(|_| IdParseError::InvalidNumber(s.to_string()))?;
        let local = local
            .trim()
            .parse::<u32>()
            .map_err(|_| IdParseError::InvalidNumber(s.to_string()))?;
        Ok(Self::new(PartitionId(partition), local))
    }
}

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub GlobalId);

        impl $name {
            /// Create an id from partition and local slot.
            pub fn new(partition: PartitionId, local: u32) -> Self {
                Self(GlobalId::new(partition, local))
            }

            /// Underlying global id.
            pub fn global(&self) -> GlobalId {
                self.0
            }

            /// Owning partition.
            pub fn partition(&self) -> PartitionId {
                self.0.partition
            }

            /// Local slot within the owning partition.
            pub fn local(&self) -> u32 {
                self.0.local
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let rest = s.strip_prefix($prefix).ok_or_else(|| IdParseError::WrongPrefix {
                    expected: $prefix,
                    input: s.to_string(),
                })?;
                Ok(Self(rest.parse()?))
            }
        }

        impl From<GlobalId> for $name {
            fn from(id: GlobalId) -> Self {
                Self(id)
            }
        }
    };
}

element_id!(
    /// Identifier of a vertex.
    VertexId,
    'v'
);
element_id!(
    /// Identifier of an edge (possibly a hyperedge).
    EdgeId,
    'e'
);
element_id!(
    /// Identifier of an incidence between a vertex and an edge.
    IncidenceId,
    'i'
);

/// A traversable graph element: the unit tracked by the marking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Element {
    /// A vertex.
    Vertex(VertexId),
    /// An edge.
    Edge(EdgeId),
}

impl Element {
    /// Global id of the element.
    pub fn global(&self) -> GlobalId {
        match self {
            Self::Vertex(v) => v.global(),
            Self::Edge(e) => e.global(),
        }
    }

    /// Partition owning the element.
    pub fn partition(&self) -> PartitionId {
        self.global().partition
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex(v) => fmt::Display::fmt(v, f),
            Self::Edge(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl From<VertexId> for Element {
    fn from(v: VertexId) -> Self {
        Self::Vertex(v)
    }
}

impl From<EdgeId> for Element {
    fn from(e: EdgeId) -> Self {
        Self::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_and_local_extraction() {
        let id = GlobalId::new(PartitionId(3), 17);
        assert_eq!(id.partition_of(), PartitionId(3));
        assert_eq!(id.local_of(), 17);
        assert!(!id.is_sentinel());
        assert!(GlobalId::new(PartitionId(3), 0).is_sentinel());
    }

    #[test]
    fn test_encoding_layout() {
        let id = GlobalId::new(PartitionId(1), 5);
        assert_eq!(id.encode(), (1u64 << 32) | 5);
    }

    #[test]
    fn test_display_and_parse() {
        let v = VertexId::new(PartitionId(2), 9);
        assert_eq!(v.to_string(), "v2:9");
        assert_eq!("v2:9".parse::<VertexId>().unwrap(), v);
        assert_eq!("2:9".parse::<GlobalId>().unwrap(), v.global());

        assert!(matches!(
            "e2:9".parse::<VertexId>(),
            Err(IdParseError::WrongPrefix { expected: 'v', .. })
        ));
        assert!(matches!(
            "29".parse::<GlobalId>(),
            Err(IdParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "x:9".parse::<GlobalId>(),
            Err(IdParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_element_ordering_groups_vertices_first() {
        let v = Element::from(VertexId::new(PartitionId(9), 9));
        let e = Element::from(EdgeId::new(PartitionId(0), 1));
        assert!(v < e);
        assert_eq!(e.partition(), PartitionId(0));
    }

    #[test]
    fn test_try_decode_rejects_high_bits() {
        let max = GlobalId::new(PartitionId(u16::MAX), u32::MAX);
        assert_eq!(GlobalId::try_decode(max.encode()).unwrap(), max);
        assert_eq!(
            GlobalId::try_decode(1u64 << 48).unwrap_err(),
            IdParseError::OutOfRange(1u64 << 48)
        );
        assert!(GlobalId::try_decode(u64::MAX).is_err());
    }

    #[test]
    fn test_decode_keeps_extreme_partitions_apart() {
        let high = GlobalId::new(PartitionId(u16::MAX), u32::MAX);
        let low = GlobalId::new(PartitionId(0), u32::MAX);
        assert_ne!(high.encode(), low.encode());
        assert_eq!(GlobalId::decode(high.encode()).partition_of(), PartitionId(u16::MAX));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_owner_and_slot_survive_encoding(p in any::<u16>(), l in any::<u32>()) {
                let id = GlobalId::decode(GlobalId::new(PartitionId(p), l).encode());
                prop_assert_eq!(id.partition_of(), PartitionId(p));
                prop_assert_eq!(id.local_of(), l);
            }

            #[test]
            fn prop_encoding_orders_by_partition_first(
                a in (any::<u16>(), any::<u32>()),
                b in (any::<u16>(), any::<u32>()),
            ) {
                let ea = GlobalId::new(PartitionId(a.0), a.1).encode();
                let eb = GlobalId::new(PartitionId(b.0), b.1).encode();
                prop_assert_eq!(ea.cmp(&eb), a.cmp(&b));
            }
        }
    }
}
