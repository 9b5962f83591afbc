//! Query keys as given by callers.

use std::fmt;

/// A lookup key: text (hex hashes, author names, project names) or raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl Key<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Key::Text(s) => s.as_bytes(),
            Key::Bytes(b) => b,
        }
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(s) => f.write_str(s),
            Key::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) if b.len() != 20 => f.write_str(s),
                _ => f.write_str(&hex::encode(b)),
            },
        }
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(s: &'a str) -> Self {
        Key::Text(s)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(s: &'a String) -> Self {
        Key::Text(s)
    }
}

impl<'a> From<&'a [u8]> for Key<'a> {
    fn from(b: &'a [u8]) -> Self {
        Key::Bytes(b)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Key<'a> {
    fn from(b: &'a [u8; N]) -> Self {
        Key::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for Key<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        Key::Bytes(b)
    }
}

impl<'a> From<&'a woc_types::ObjectId> for Key<'a> {
    fn from(id: &'a woc_types::ObjectId) -> Self {
        Key::Bytes(id.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_hashes_display_as_hex() {
        let raw = [0xe4u8; 20];
        assert_eq!(Key::from(&raw).to_string(), "e4".repeat(20));
        assert_eq!(Key::from("Audris Mockus").to_string(), "Audris Mockus");
        assert_eq!(Key::from(&b"W4D3_news"[..]).to_string(), "W4D3_news");
    }

    #[test]
    fn bytes_match_input() {
        let owned = String::from("abc");
        assert_eq!(Key::from(&owned).as_bytes(), b"abc");
        let id = woc_types::ObjectId::from_slice(&[7u8; 20]).unwrap();
        assert_eq!(Key::from(&id).as_bytes(), &[7u8; 20]);
    }
}
