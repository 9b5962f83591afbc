//! Binary codecs for World of Code shard records.
//!
//! Relation values are stored in one of a handful of legacy layouts chosen
//! by the relation's dtype pair. This crate turns those bytes into
//! structured values and back, and decodes the git objects kept in the
//! content stores.
//!
//! # Architecture
//!
//! - [`dtype`]: key/value kinds and the name → dtype table
//! - [`value`]: decode/encode of relation values per value kind
//! - [`ber`]: Perl `pack("w")` BER integers (big-endian base-128)
//! - [`lzf`]: Compress::LZF framing around raw LZF blocks
//! - [`fnv`]: 32-bit FNV-1a used to shard text keys
//! - [`text`]: never-failing decode of legacy-encoded text
//! - [`git`]: commit, tree and tag object parsing

pub mod ber;
pub mod dtype;
pub mod error;
pub mod fnv;
pub mod git;
pub mod lzf;
pub mod text;
pub mod value;

pub use dtype::{infer_dtype, Dtype, KeyKind, ValueKind};
pub use error::{CodecError, CodecResult};
pub use fnv::{fnv1a_32, text_fingerprint};
pub use git::{Commit, Signature, Tag, TreeEntry};
pub use text::decode_text;
pub use value::{decode_overflow_text, decode_value, encode_value, Value};
