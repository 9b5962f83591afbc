//! Filename grammars of archive files.

use std::sync::LazyLock;

use regex::Regex;

static RELATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)2(\w+)Full(\w+)(\.\d+)?\.tch$").expect("valid relation pattern")
});

static OVERFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)2(\w+)Full(\w+)(\.\d+)?\.tch\.large\.([0-9a-f]+)$")
        .expect("valid overflow pattern")
});

static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w.]+)_(\d+)\.(idx|bin|tch)$").expect("valid content pattern")
});

/// A classified archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    /// `c2pFullU.3.tch`
    RelationShard {
        src: String,
        dst: String,
        version: String,
        index: Option<u64>,
    },
    /// `A2cFullU.15.tch.large.59016a4f`
    Overflow {
        src: String,
        dst: String,
        version: String,
        index: Option<u64>,
        fingerprint: String,
    },
    /// `commit_0.tch`, `blob_3.bin`, `sha1.blob_0.tch`
    ContentShard { name: String, index: u64, ext: String },
}

impl FileName {
    /// Classify `name`, or `None` if it matches no grammar.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(c) = RELATION_RE.captures(name) {
            return Some(FileName::RelationShard {
                src: c[1].to_string(),
                dst: c[2].to_string(),
                version: c[3].to_string(),
                index: parse_index(c.get(4).map(|m| m.as_str()))?,
            });
        }
        if let Some(c) = OVERFLOW_RE.captures(name) {
            return Some(FileName::Overflow {
                src: c[1].to_string(),
                dst: c[2].to_string(),
                version: c[3].to_string(),
                index: parse_index(c.get(4).map(|m| m.as_str()))?,
                fingerprint: c[5].to_string(),
            });
        }
        let c = CONTENT_RE.captures(name)?;
        Some(FileName::ContentShard {
            name: c[1].to_string(),
            index: c[2].parse().ok()?,
            ext: c[3].to_string(),
        })
    }
}

/// `Some(None)` when absent, `None` when unparsable.
fn parse_index(suffix: Option<&str>) -> Option<Option<u64>> {
    match suffix {
        None => Some(None),
        Some(s) => s.trim_start_matches('.').parse().ok().map(Some),
    }
}

/// Whether a file is a candidate for classification at all.
pub fn is_candidate(name: &str) -> bool {
    name.contains(".tch")
        || (name.ends_with(".idx") && !name.starts_with("pack"))
        || name.ends_with(".bin")
}

/// Number of bits needed to address `index`.
pub fn bit_length(index: u64) -> u8 {
    (u64::BITS - index.leading_zeros()) as u8
}
