//! Decoding and encoding of relation values.

use serde::Serialize;

use crate::ber;
use crate::dtype::ValueKind;
use crate::error::{CodecError, CodecResult};
use crate::lzf;
use crate::text::decode_text;

const HASH_LEN: usize = 20;
const FIELD_SEP: u8 = b';';
/// Placeholder the generator writes for an empty compressed list.
const EMPTY_MARKER: &[u8] = b"EMPTY";

/// A decoded relation value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Hex-encoded git hashes (`h`).
    Hashes(Vec<String>),
    /// Text fields (`s` and `cs`).
    Texts(Vec<String>),
    /// Grouped text fields (`cs3`), e.g. (time, author, blob).
    Triples(Vec<[String; 3]>),
    /// Text fields followed by a hex hash (`sh`).
    TextWithHash { fields: Vec<String>, hash: String },
    /// A hex hash and an integer (`r`), e.g. root commit and distance.
    HashCount { hash: String, count: u64 },
}

impl Value {
    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        match self {
            Value::Hashes(v) | Value::Texts(v) => v.len(),
            Value::Triples(v) => v.len(),
            Value::TextWithHash { fields, .. } => fields.len() + 1,
            Value::HashCount { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a list of strings; triples are expanded in order.
    pub fn into_fields(self) -> Vec<String> {
        match self {
            Value::Hashes(v) | Value::Texts(v) => v,
            Value::Triples(v) => v.into_iter().flatten().collect(),
            Value::TextWithHash { mut fields, hash } => {
                fields.push(hash);
                fields
            }
            Value::HashCount { hash, count } => vec![hash, count.to_string()],
        }
    }
}

fn split_fields(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == FIELD_SEP)
}

fn decode_hashes(data: &[u8]) -> CodecResult<Vec<String>> {
    if data.len() % HASH_LEN != 0 {
        return Err(CodecError::Malformed {
            what: "hash list",
            reason: format!("{} bytes is not a multiple of {HASH_LEN}", data.len()),
        });
    }
    Ok(data.chunks_exact(HASH_LEN).map(hex::encode).collect())
}

fn decode_texts(data: &[u8]) -> Vec<String> {
    split_fields(data).map(decode_text).collect()
}

fn decode_compressed_texts(data: &[u8]) -> Vec<String> {
    split_fields(data)
        .filter(|f| !f.is_empty() && *f != EMPTY_MARKER)
        .map(decode_text)
        .collect()
}

fn group_triples(fields: Vec<String>) -> Vec<[String; 3]> {
    let mut out = Vec::with_capacity(fields.len() / 3);
    let mut it = fields.into_iter();
    while let (Some(a), Some(b), Some(c)) = (it.next(), it.next(), it.next()) {
        out.push([a, b, c]);
    }
    out
}

fn decode_triples(data: &[u8]) -> CodecResult<Vec<[String; 3]>> {
    let fields = decode_texts(data);
    if fields.len() % 3 != 0 {
        return Err(CodecError::Malformed {
            what: "triple list",
            reason: format!("{} fields is not a multiple of 3", fields.len()),
        });
    }
    Ok(group_triples(fields))
}

fn decode_text_with_hash(data: &[u8]) -> CodecResult<Value> {
    if data.len() < HASH_LEN {
        return Err(CodecError::Truncated {
            what: "text+hash value",
            reason: format!("{} bytes, need at least {HASH_LEN}", data.len()),
        });
    }
    let (prefix, hash) = data.split_at(data.len() - HASH_LEN);
    let prefix = prefix.strip_suffix(&[FIELD_SEP]).unwrap_or(prefix);
    Ok(Value::TextWithHash {
        fields: decode_texts(prefix),
        hash: hex::encode(hash),
    })
}

fn decode_hash_count(data: &[u8]) -> CodecResult<Value> {
    if data.len() <= HASH_LEN {
        return Err(CodecError::Truncated {
            what: "hash+count value",
            reason: format!("{} bytes, need more than {HASH_LEN}", data.len()),
        });
    }
    let (hash, rest) = data.split_at(HASH_LEN);
    let (count, used) = ber::decode_one(rest)?;
    if used != rest.len() {
        return Err(CodecError::Malformed {
            what: "hash+count value",
            reason: format!("{} trailing bytes after count", rest.len() - used),
        });
    }
    Ok(Value::HashCount {
        hash: hex::encode(hash),
        count,
    })
}

/// Decode a value read from a shard table.
pub fn decode_value(kind: ValueKind, data: &[u8]) -> CodecResult<Value> {
    match kind {
        ValueKind::Hashes => decode_hashes(data).map(Value::Hashes),
        ValueKind::Texts => Ok(Value::Texts(decode_texts(data))),
        ValueKind::CompressedTexts => {
            let raw = lzf::decompress(data)?;
            Ok(Value::Texts(decode_compressed_texts(&raw)))
        }
        ValueKind::CompressedTriples => {
            let raw = lzf::decompress(data)?;
            decode_triples(&raw).map(Value::Triples)
        }
        ValueKind::TextWithHash => decode_text_with_hash(data),
        ValueKind::HashCount => decode_hash_count(data),
        ValueKind::Unsupported => Err(CodecError::Unsupported(kind.to_string())),
    }
}

/// Decode the text body of a gzip overflow file.
///
/// The body is already decompressed and holds at most the first few fields
/// of the original value, so an incomplete trailing triple is dropped
/// instead of rejected.
pub fn decode_overflow_text(kind: ValueKind, body: &[u8]) -> CodecResult<Value> {
    match kind {
        ValueKind::Texts => Ok(Value::Texts(decode_texts(body))),
        ValueKind::CompressedTexts => Ok(Value::Texts(decode_compressed_texts(body))),
        ValueKind::CompressedTriples => Ok(Value::Triples(group_triples(decode_texts(body)))),
        other => Err(CodecError::Unsupported(format!("{other} in overflow text"))),
    }
}

fn join_fields<S: AsRef<str>>(fields: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(FIELD_SEP);
        }
        buf.extend_from_slice(f.as_ref().as_bytes());
    }
    buf
}

fn hash_bytes(hex_str: &str) -> CodecResult<Vec<u8>> {
    let bytes = hex::decode(hex_str).map_err(|e| CodecError::Malformed {
        what: "hex hash",
        reason: e.to_string(),
    })?;
    if bytes.len() != HASH_LEN {
        return Err(CodecError::Malformed {
            what: "hex hash",
            reason: format!("{} bytes, expected {HASH_LEN}", bytes.len()),
        });
    }
    Ok(bytes)
}

/// Encode a value in the on-disk layout of `kind`.
pub fn encode_value(kind: ValueKind, value: &Value) -> CodecResult<Vec<u8>> {
    match (kind, value) {
        (ValueKind::Hashes, Value::Hashes(hashes)) => {
            let mut buf = Vec::with_capacity(hashes.len() * HASH_LEN);
            for h in hashes {
                buf.extend_from_slice(&hash_bytes(h)?);
            }
            Ok(buf)
        }
        (ValueKind::Texts, Value::Texts(fields)) => Ok(join_fields(fields)),
        (ValueKind::CompressedTexts, Value::Texts(fields)) => {
            let kept: Vec<&String> = fields.iter().filter(|f| !f.is_empty()).collect();
            lzf::compress(&join_fields(&kept))
        }
        (ValueKind::CompressedTriples, Value::Triples(triples)) => {
            let flat: Vec<&String> = triples.iter().flatten().collect();
            lzf::compress(&join_fields(&flat))
        }
        (ValueKind::TextWithHash, Value::TextWithHash { fields, hash }) => {
            let mut buf = join_fields(fields);
            buf.push(FIELD_SEP);
            buf.extend_from_slice(&hash_bytes(hash)?);
            Ok(buf)
        }
        (ValueKind::HashCount, Value::HashCount { hash, count }) => {
            let mut buf = hash_bytes(hash)?;
            ber::encode_into(&mut buf, *count);
            Ok(buf)
        }
        (ValueKind::Unsupported, _) => Err(CodecError::Unsupported(kind.to_string())),
        (kind, _) => Err(CodecError::Mismatch {
            expected: kind.as_str(),
        }),
    }
}
