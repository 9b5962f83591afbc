//! 32-bit FNV-1a, the shard hash for text keys.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash of `data`.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Overflow-table fingerprint of a text key: lowercase hex of the FNV-1a
/// hash without leading zeros, as the generator names `.large.<hex>` files.
pub fn text_fingerprint(key: &[u8]) -> String {
    format!("{:x}", fnv1a_32(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foo"), 0xa9f3_7ed7);
    }

    #[test]
    fn fingerprint_drops_leading_zeros() {
        let fp = text_fingerprint(b"foo");
        assert_eq!(fp, "a9f37ed7");
        // Whatever the key, the fingerprint never starts with '0' unless it is "0".
        for key in ["Audris Mockus <audris@utk.edu>", "W4D3_news", "x"] {
            let fp = text_fingerprint(key.as_bytes());
            assert!(fp == "0" || !fp.starts_with('0'));
        }
    }
}
