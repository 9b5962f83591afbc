//! Objects served by `show_content`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use woc_codec::{Commit, Tag, TreeEntry, Value};

use crate::error::WocError;

/// Kind of git object kept in a content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }

    /// Content store holding objects of this kind, by its index name.
    pub(crate) fn store_name(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit.tch",
            ObjectKind::Tree => "tree.tch",
            ObjectKind::Blob => "sha1.blob.tch",
            ObjectKind::Tag => "tag.tch",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = WocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjectKind::Commit),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(WocError::UnknownName(other.to_string())),
        }
    }
}

/// A decoded content-store object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Content {
    Commit(Commit),
    Tree { entries: Vec<TreeEntry> },
    Blob { data: Vec<u8> },
    Tag(Tag),
}

impl Content {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Content::Commit(_) => ObjectKind::Commit,
            Content::Tree { .. } => ObjectKind::Tree,
            Content::Blob { .. } => ObjectKind::Blob,
            Content::Tag(_) => ObjectKind::Tag,
        }
    }
}

impl From<Content> for Value {
    /// Flatten an object into relation-value form.
    ///
    /// Commits become `[tree, parents, author, author_time, author_tz,
    /// committer, committer_time, committer_tz, message]` with parents joined
    /// by `:`; tree entries become `(mode, name, sha)` triples.
    fn from(content: Content) -> Self {
        match content {
            Content::Commit(c) => Value::Texts(vec![
                c.tree.to_hex(),
                c.parents
                    .iter()
                    .map(|p| p.to_hex())
                    .collect::<Vec<_>>()
                    .join(":"),
                c.author.name,
                c.author.time,
                c.author.tz,
                c.committer.name,
                c.committer.time,
                c.committer.tz,
                c.message,
            ]),
            Content::Tree { entries } => Value::Triples(
                entries
                    .into_iter()
                    .map(|e| [e.mode, e.name, e.oid.to_hex()])
                    .collect(),
            ),
            Content::Blob { data } => Value::Texts(vec![woc_codec::decode_text(&data)]),
            Content::Tag(t) => Value::Texts(vec![
                t.object.to_hex(),
                t.kind,
                t.name,
                t.tagger.map(|s| format!("{} {} {}", s.name, s.time, s.tz)).unwrap_or_default(),
                t.message,
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse() {
        assert_eq!("tree".parse::<ObjectKind>().unwrap(), ObjectKind::Tree);
        assert!("tkns".parse::<ObjectKind>().is_err());
        assert_eq!(ObjectKind::Blob.store_name(), "sha1.blob.tch");
    }

    #[test]
    fn tree_flattens_to_triples() {
        let entries = TreeEntry::decode_all(
            &[b"100644 README\0".as_slice(), &[0x11; 20]].concat(),
        )
        .unwrap();
        let v: Value = Content::Tree { entries }.into();
        assert_eq!(
            v,
            Value::Triples(vec![[
                "100644".into(),
                "README".into(),
                "11".repeat(20)
            ]])
        );
    }
}
