//! Key routing: stored key bytes, shard index and overflow fingerprint.
//!
//! Hash keys are routed on their first byte, text keys on the low bits of
//! their FNV-1a hash. Both are masked to the target's `sharding_bits`.

use woc_codec::{fnv1a_32, text_fingerprint, KeyKind};
use woc_types::{ObjectId, OID_HEX_LEN, OID_LEN};

use crate::error::{WocError, WocResult};
use crate::key::Key;

/// A key resolved against a target's key kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedKey {
    /// Bytes as stored in the shard table.
    pub bytes: Vec<u8>,
    /// Name of the overflow file that would hold this key.
    pub fingerprint: String,
    hash: u64,
}

impl RoutedKey {
    /// Shard index for a target with `sharding_bits` bits.
    pub fn shard(&self, sharding_bits: u8) -> usize {
        (self.hash & ((1u64 << sharding_bits) - 1)) as usize
    }
}

/// Parse a 20-byte object id from hex text or raw bytes.
pub fn parse_oid(key: Key<'_>) -> Result<ObjectId, String> {
    match key {
        Key::Text(s) if s.len() == OID_HEX_LEN => ObjectId::from_hex(s).map_err(|e| e.to_string()),
        Key::Bytes(b) if b.len() == OID_LEN => ObjectId::from_slice(b).map_err(|e| e.to_string()),
        Key::Bytes(b) if b.len() == OID_HEX_LEN => std::str::from_utf8(b)
            .map_err(|e| e.to_string())
            .and_then(|s| ObjectId::from_hex(s).map_err(|e| e.to_string())),
        other => Err(format!(
            "expected a {OID_HEX_LEN}-character hex or {OID_LEN}-byte hash, got {} bytes",
            other.as_bytes().len()
        )),
    }
}

/// Overflow fingerprint of a key as stored in a shard table.
pub fn fingerprint(kind: KeyKind, stored: &[u8]) -> String {
    match kind {
        KeyKind::Hash => hex::encode(stored),
        KeyKind::Text => text_fingerprint(stored),
    }
}

/// Route `key` for a target named `name` keyed by `kind`.
pub fn route(name: &str, kind: KeyKind, key: Key<'_>) -> WocResult<RoutedKey> {
    match kind {
        KeyKind::Hash => {
            let oid = parse_oid(key).map_err(|reason| WocError::InvalidKey {
                name: name.to_string(),
                reason,
            })?;
            Ok(RoutedKey {
                bytes: oid.as_bytes().to_vec(),
                fingerprint: oid.to_hex(),
                hash: u64::from(oid.first_byte()),
            })
        }
        KeyKind::Text => {
            let bytes = key.as_bytes().to_vec();
            Ok(RoutedKey {
                fingerprint: fingerprint(kind, &bytes),
                hash: u64::from(fnv1a_32(&bytes)),
                bytes,
            })
        }
    }
}
