use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length of a git SHA-1 identifier in bytes.
pub const OID_LEN: usize = 20;

/// Length of a git SHA-1 identifier in hex characters.
pub const OID_HEX_LEN: usize = OID_LEN * 2;

/// Content-addressed identifier of a git object.
///
/// WoC keys commits, trees, blobs and tags by their 20-byte SHA-1. The raw
/// bytes are what the shard tables store; the hex form is what users type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OID_LEN]);

impl ObjectId {
    /// Create an `ObjectId` from raw hash bytes.
    pub const fn from_hash(hash: [u8; OID_LEN]) -> Self {
        Self(hash)
    }

    /// Create an `ObjectId` from a byte slice of exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; OID_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: OID_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// The null object ID (all zeros).
    pub const fn null() -> Self {
        Self([0u8; OID_LEN])
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; OID_LEN]
    }

    /// The raw 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; OID_LEN] {
        &self.0
    }

    /// Most significant byte; the corpus routes hash keys on it.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 7 characters, git style).
    pub fn short_hex(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(7);
        s
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; OID_LEN]> for ObjectId {
    fn from(bytes: [u8; OID_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; OID_LEN] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "e4af89166a17785c1d741b8b1d5775f3223f510f";

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_hex(COMMIT).unwrap();
        assert_eq!(id.to_hex(), COMMIT);
        assert_eq!(id.first_byte(), 0xe4);
    }

    #[test]
    fn rejects_short_hex() {
        let err = ObjectId::from_hex("e4af").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 20,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_non_hex() {
        let err = ObjectId::from_hex("zz").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(ObjectId::from_slice(&[0u8; 19]).is_err());
        assert!(ObjectId::from_slice(&[0u8; 20]).unwrap().is_null());
    }

    #[test]
    fn short_hex_is_7_chars() {
        let id: ObjectId = COMMIT.parse().unwrap();
        assert_eq!(id.short_hex(), "e4af891");
        assert_eq!(format!("{id:?}"), "ObjectId(e4af891)");
    }

    #[test]
    fn display_is_full_hex() {
        let id: ObjectId = COMMIT.parse().unwrap();
        assert_eq!(format!("{id}"), COMMIT);
    }

    #[test]
    fn serde_uses_hex_string() {
        let id: ObjectId = COMMIT.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{COMMIT}\""));
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_bytewise() {
        let id1 = ObjectId::from_hash([0; 20]);
        let id2 = ObjectId::from_hash([1; 20]);
        assert!(id1 < id2);
    }
}
