//! Key and value kinds of relation maps.
//!
//! A relation's on-disk layout is fixed by a pair of short tags derived from
//! its name (`c2p` → `("h", "cs")`). The tags are resolved once when the
//! profile is built and carried as a [`Dtype`] from then on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// How a relation's keys are stored and routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// 20-byte git hash, routed on its first byte.
    #[serde(rename = "h")]
    Hash,
    /// UTF-8 text, routed on its FNV-1a hash.
    #[serde(rename = "s")]
    Text,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Hash => "h",
            KeyKind::Text => "s",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h" => Ok(KeyKind::Hash),
            "s" => Ok(KeyKind::Text),
            other => Err(CodecError::UnknownDtype(other.to_string())),
        }
    }
}

/// Layout of a relation's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Concatenated 20-byte hashes.
    #[serde(rename = "h")]
    Hashes,
    /// `;`-joined text.
    #[serde(rename = "s")]
    Texts,
    /// LZF-compressed `;`-joined text.
    #[serde(rename = "cs")]
    CompressedTexts,
    /// LZF-compressed `;`-joined text grouped in threes.
    #[serde(rename = "cs3")]
    CompressedTriples,
    /// `;`-joined text followed by a raw 20-byte hash.
    #[serde(rename = "sh")]
    TextWithHash,
    /// A 20-byte hash followed by a BER integer.
    #[serde(rename = "r")]
    HashCount,
    /// Recognized but never decoded.
    #[serde(rename = "hhwww")]
    Unsupported,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Hashes => "h",
            ValueKind::Texts => "s",
            ValueKind::CompressedTexts => "cs",
            ValueKind::CompressedTriples => "cs3",
            ValueKind::TextWithHash => "sh",
            ValueKind::HashCount => "r",
            ValueKind::Unsupported => "hhwww",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h" => Ok(ValueKind::Hashes),
            "s" => Ok(ValueKind::Texts),
            "cs" => Ok(ValueKind::CompressedTexts),
            "cs3" => Ok(ValueKind::CompressedTriples),
            "sh" => Ok(ValueKind::TextWithHash),
            "r" => Ok(ValueKind::HashCount),
            "hhwww" => Ok(ValueKind::Unsupported),
            other => Err(CodecError::UnknownDtype(other.to_string())),
        }
    }
}

/// The (key, value) kind pair of a relation. Serialized as `["h", "cs"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(KeyKind, ValueKind)", into = "(KeyKind, ValueKind)")]
pub struct Dtype {
    pub key: KeyKind,
    pub value: ValueKind,
}

impl Dtype {
    pub const fn new(key: KeyKind, value: ValueKind) -> Self {
        Self { key, value }
    }
}

impl From<(KeyKind, ValueKind)> for Dtype {
    fn from((key, value): (KeyKind, ValueKind)) -> Self {
        Self { key, value }
    }
}

impl From<Dtype> for (KeyKind, ValueKind) {
    fn from(d: Dtype) -> Self {
        (d.key, d.value)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.key, self.value)
    }
}

/// Derive the dtype pair of a relation from its name.
///
/// The rules are order-sensitive and reproduce the legacy `getValues` tool
/// exactly, including its special cases:
///
/// ```
/// use woc_codec::{infer_dtype, KeyKind, ValueKind};
///
/// let d = infer_dtype("c2f").unwrap();
/// assert_eq!((d.key, d.value), (KeyKind::Hash, ValueKind::CompressedTexts));
/// let d = infer_dtype("b2tac").unwrap();
/// assert_eq!((d.key, d.value), (KeyKind::Hash, ValueKind::CompressedTriples));
/// ```
pub fn infer_dtype(map_name: &str) -> CodecResult<Dtype> {
    use KeyKind::{Hash as H, Text as S};
    use ValueKind::*;

    let all = map_name.to_lowercase();
    let (src, dst) = all.split_once('2').ok_or_else(|| CodecError::Malformed {
        what: "map name",
        reason: format!("{map_name:?} has no '2' separator"),
    })?;

    let (mut key, mut value) = (H, Hashes);

    if matches!(src, "a" | "f" | "p") {
        key = S;
    }
    if matches!(dst, "a" | "f" | "p") {
        value = CompressedTexts;
    }
    if matches!(src, "c" | "b" | "w" | "ob" | "td") {
        key = H;
    }
    if matches!(dst, "c" | "b" | "cc" | "pc" | "ob" | "td") {
        value = Hashes;
    }
    if all == "b2fa" {
        value = TextWithHash;
    }
    if dst == "ta" {
        value = Texts;
    }
    if matches!(all.as_str(), "b2tk" | "td2f") {
        value = Texts;
    }
    if matches!(all.as_str(), "c2h" | "c2r") {
        value = HashCount;
    }
    if matches!(src, "ps" | "pf" | "pfs") {
        key = S;
    }
    if matches!(dst, "ps" | "pf" | "pfs") {
        value = Texts;
    }
    if dst == "rhp" {
        value = Unsupported;
    }
    match all.as_str() {
        "p2p" | "a2a" => (key, value) = (S, CompressedTexts),
        "b2baddate" | "b2manyp" => (key, value) = (S, Hashes),
        "c2fbb" | "obb2cf" | "bb2cf" => (key, value) = (H, CompressedTriples),
        "c2dat" => (key, value) = (H, Texts),
        "b2tac" => (key, value) = (H, CompressedTriples),
        _ => {}
    }

    Ok(Dtype::new(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str) -> (&'static str, &'static str) {
        let d = infer_dtype(name).unwrap();
        (d.key.as_str(), d.value.as_str())
    }

    #[test]
    fn category_rules() {
        assert_eq!(pair("c2p"), ("h", "cs"));
        assert_eq!(pair("c2f"), ("h", "cs"));
        assert_eq!(pair("a2c"), ("s", "h"));
        assert_eq!(pair("p2c"), ("s", "h"));
        assert_eq!(pair("f2b"), ("s", "h"));
        assert_eq!(pair("c2cc"), ("h", "h"));
        assert_eq!(pair("b2c"), ("h", "h"));
        assert_eq!(pair("c2ta"), ("h", "s"));
    }

    #[test]
    fn named_exceptions() {
        assert_eq!(pair("b2fa"), ("h", "sh"));
        assert_eq!(pair("c2r"), ("h", "r"));
        assert_eq!(pair("c2h"), ("h", "r"));
        assert_eq!(pair("b2tk"), ("h", "s"));
        assert_eq!(pair("td2f"), ("h", "s"));
        assert_eq!(pair("c2dat"), ("h", "s"));
        assert_eq!(pair("b2tac"), ("h", "cs3"));
        assert_eq!(pair("c2fbb"), ("h", "cs3"));
        assert_eq!(pair("obb2cf"), ("h", "cs3"));
        assert_eq!(pair("bb2cf"), ("h", "cs3"));
        assert_eq!(pair("a2a"), ("s", "cs"));
        assert_eq!(pair("p2p"), ("s", "cs"));
        assert_eq!(pair("b2manyp"), ("s", "h"));
        assert_eq!(pair("b2baddate"), ("s", "h"));
        assert_eq!(pair("c2rhp"), ("h", "hhwww"));
    }

    #[test]
    fn project_variants_are_text() {
        assert_eq!(pair("pf2a"), ("s", "cs"));
        assert_eq!(pair("c2pf"), ("h", "s"));
        assert_eq!(pair("c2ps"), ("h", "s"));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(pair("C2P"), pair("c2p"));
    }

    #[test]
    fn name_without_separator() {
        assert!(matches!(
            infer_dtype("commit"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn serde_as_tag_pair() {
        let d = infer_dtype("b2tac").unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"["h","cs3"]"#);
        let back: Dtype = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn parse_tags() {
        assert_eq!("cs3".parse::<ValueKind>().unwrap(), ValueKind::CompressedTriples);
        assert_eq!("s".parse::<KeyKind>().unwrap(), KeyKind::Text);
        assert!(matches!(
            "zz".parse::<ValueKind>(),
            Err(CodecError::UnknownDtype(_))
        ));
    }
}
