//! Git commit, tree and tag object parsing.
//!
//! Content stores hold loose object bodies without the `<type> <len>\0`
//! header. Commit and tag bodies are text; tree bodies are binary.

use serde::Serialize;
use woc_types::{ObjectId, OID_LEN};

use crate::error::{CodecError, CodecResult};
use crate::text::decode_text;

/// Tree entry mode of a subdirectory.
pub const SUBTREE_MODE: &str = "40000";

/// An author, committer or tagger line: `Name <email> <epoch> <tz>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// `Name <email>` as written.
    pub name: String,
    /// Seconds since the epoch, as written.
    pub time: String,
    /// Offset such as `-0400`.
    pub tz: String,
}

impl Signature {
    fn parse(line: &str) -> CodecResult<Self> {
        let mut parts = line.rsplitn(3, ' ');
        let tz = parts.next().unwrap_or_default();
        let time = parts.next();
        let name = parts.next();
        match (name, time) {
            (Some(name), Some(time)) => Ok(Self {
                name: name.to_string(),
                time: time.to_string(),
                tz: tz.to_string(),
            }),
            _ => Err(CodecError::Malformed {
                what: "signature",
                reason: format!("expected `name time tz`, got {line:?}"),
            }),
        }
    }
}

/// A decoded commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub tree: ObjectId,
    /// Empty for a root commit.
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Free-text message with its trailing newline removed.
    pub message: String,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Decode a commit body.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let text = decode_text(data);
        let (header, message) = split_message(&text);

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        for line in header.lines() {
            // Continuation lines of multi-line headers such as gpgsig.
            if line.starts_with(' ') {
                continue;
            }
            let Some((field, rest)) = line.split_once(' ') else {
                continue;
            };
            match field {
                "tree" => tree = Some(parse_oid("tree", rest)?),
                "parent" => parents.push(parse_oid("parent", rest)?),
                "author" => author = Some(Signature::parse(rest)?),
                "committer" => committer = Some(Signature::parse(rest)?),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| missing("commit", "tree"))?,
            parents,
            author: author.ok_or_else(|| missing("commit", "author"))?,
            committer: committer.ok_or_else(|| missing("commit", "committer"))?,
            message: strip_newline(message).to_string(),
        })
    }
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub mode: String,
    pub name: String,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn is_subtree(&self) -> bool {
        self.mode == SUBTREE_MODE
    }

    /// Decode a tree body: repeated `<mode> <name>\0<20-byte sha>`.
    pub fn decode_all(data: &[u8]) -> CodecResult<Vec<Self>> {
        let mut entries = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| truncated_tree("mode", entries.len()))?;
            let nul = rest[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| p + space + 1)
                .ok_or_else(|| truncated_tree("name", entries.len()))?;
            let sha_end = nul + 1 + OID_LEN;
            if rest.len() < sha_end {
                return Err(truncated_tree("sha", entries.len()));
            }
            let oid = ObjectId::from_slice(&rest[nul + 1..sha_end]).map_err(|e| {
                CodecError::Malformed {
                    what: "tree entry",
                    reason: e.to_string(),
                }
            })?;
            entries.push(TreeEntry {
                mode: decode_text(&rest[..space]),
                name: decode_text(&rest[space + 1..nul]),
                oid,
            });
            rest = &rest[sha_end..];
        }
        Ok(entries)
    }
}

/// A decoded annotated tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub object: ObjectId,
    /// Kind of the tagged object, usually `commit`.
    pub kind: String,
    pub name: String,
    /// Absent on some very old tags.
    pub tagger: Option<Signature>,
    pub message: String,
}

impl Tag {
    /// Decode a tag body.
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let text = decode_text(data);
        let (header, message) = split_message(&text);

        let mut object = None;
        let mut kind = None;
        let mut name = None;
        let mut tagger = None;
        for line in header.lines() {
            let Some((field, rest)) = line.split_once(' ') else {
                continue;
            };
            match field {
                "object" => object = Some(parse_oid("object", rest)?),
                "type" => kind = Some(rest.to_string()),
                "tag" => name = Some(rest.to_string()),
                "tagger" => tagger = Some(Signature::parse(rest)?),
                _ => {}
            }
        }

        Ok(Self {
            object: object.ok_or_else(|| missing("tag", "object"))?,
            kind: kind.ok_or_else(|| missing("tag", "type"))?,
            name: name.ok_or_else(|| missing("tag", "tag"))?,
            tagger,
            message: strip_newline(message).to_string(),
        })
    }
}

fn split_message(text: &str) -> (&str, &str) {
    text.split_once("\n\n").unwrap_or((text, ""))
}

fn strip_newline(message: &str) -> &str {
    message.strip_suffix('\n').unwrap_or(message)
}

fn parse_oid(field: &'static str, hex_str: &str) -> CodecResult<ObjectId> {
    ObjectId::from_hex(hex_str.trim()).map_err(|e| CodecError::Malformed {
        what: field,
        reason: e.to_string(),
    })
}

fn missing(what: &'static str, field: &str) -> CodecError {
    CodecError::Malformed {
        what,
        reason: format!("missing {field} header"),
    }
}

fn truncated_tree(part: &str, index: usize) -> CodecError {
    CodecError::Truncated {
        what: "tree entry",
        reason: format!("entry {index} ends inside its {part}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "tree f1b66dcca490b5c4455af319bc961a34f69c72c2\n\
parent c19ff598808b181f1ab2383ff0214520cb3ec659\n\
author Audris Mockus <audris@utk.edu> 1410029988 -0400\n\
committer Audris Mockus <audris@utk.edu> 1410029988 -0400\n\
\n\
News for Sep 5\n";

    #[test]
    fn commit_fields() {
        let c = Commit::decode(COMMIT.as_bytes()).unwrap();
        assert_eq!(c.tree.to_hex(), "f1b66dcca490b5c4455af319bc961a34f69c72c2");
        assert_eq!(c.parents.len(), 1);
        assert!(!c.is_root());
        assert_eq!(c.author.name, "Audris Mockus <audris@utk.edu>");
        assert_eq!(c.author.time, "1410029988");
        assert_eq!(c.author.tz, "-0400");
        assert_eq!(c.committer, c.author);
        assert_eq!(c.message, "News for Sep 5");
    }

    #[test]
    fn root_commit_has_no_parents() {
        let body = COMMIT.replace("parent c19ff598808b181f1ab2383ff0214520cb3ec659\n", "");
        let c = Commit::decode(body.as_bytes()).unwrap();
        assert!(c.is_root());
        assert_eq!(c.author.time, "1410029988");
        assert_eq!(c.message, "News for Sep 5");
    }

    #[test]
    fn merge_commit_and_gpgsig() {
        let body = "tree f1b66dcca490b5c4455af319bc961a34f69c72c2\n\
parent c19ff598808b181f1ab2383ff0214520cb3ec659\n\
parent e4af89166a17785c1d741b8b1d5775f3223f510f\n\
author A <a@x> 1 +0000\n\
committer B <b@x> 2 +0100\n\
gpgsig -----BEGIN PGP SIGNATURE-----\n \n abc\n -----END PGP SIGNATURE-----\n\
\n\
Merge\n\nbody\n";
        let c = Commit::decode(body.as_bytes()).unwrap();
        assert_eq!(c.parents.len(), 2);
        assert_eq!(c.committer.name, "B <b@x>");
        assert_eq!(c.message, "Merge\n\nbody");
    }

    #[test]
    fn only_one_trailing_newline_is_stripped() {
        let body = COMMIT.replace("News for Sep 5\n", "News for Sep 5\n\n\n");
        let c = Commit::decode(body.as_bytes()).unwrap();
        assert_eq!(c.message, "News for Sep 5\n\n");
        let body = COMMIT.replace("News for Sep 5\n", "News for Sep 5");
        assert_eq!(Commit::decode(body.as_bytes()).unwrap().message, "News for Sep 5");
    }

    #[test]
    fn commit_without_tree_is_malformed() {
        let err = Commit::decode(b"author A <a> 1 +0000\n\nmsg").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { what: "commit", .. }));
    }

    #[test]
    fn tree_entries() {
        let blob = [0x11u8; 20];
        let sub = [0x22u8; 20];
        let mut body = b"100644 README.md\0".to_vec();
        body.extend_from_slice(&blob);
        body.extend_from_slice(b"40000 src\0");
        body.extend_from_slice(&sub);

        let entries = TreeEntry::decode_all(&body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mode, "100644");
        assert_eq!(entries[0].name, "README.md");
        assert_eq!(entries[0].oid, ObjectId::from_hash(blob));
        assert!(!entries[0].is_subtree());
        assert!(entries[1].is_subtree());
        assert_eq!(entries[1].name, "src");
    }

    #[test]
    fn tree_name_may_contain_spaces() {
        let mut body = b"100644 my file.txt\0".to_vec();
        body.extend_from_slice(&[0u8; 20]);
        let entries = TreeEntry::decode_all(&body).unwrap();
        assert_eq!(entries[0].name, "my file.txt");
    }

    #[test]
    fn truncated_tree_is_error() {
        let mut body = b"100644 README.md\0".to_vec();
        body.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            TreeEntry::decode_all(&body),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn empty_tree() {
        assert!(TreeEntry::decode_all(b"").unwrap().is_empty());
    }

    #[test]
    fn tag_fields() {
        let body = "object e4af89166a17785c1d741b8b1d5775f3223f510f\n\
type commit\n\
tag v1.0\n\
tagger Audris Mockus <audris@utk.edu> 1410029988 -0400\n\
\n\
Release 1.0\n";
        let t = Tag::decode(body.as_bytes()).unwrap();
        assert_eq!(t.object.short_hex(), "e4af891");
        assert_eq!(t.kind, "commit");
        assert_eq!(t.name, "v1.0");
        assert_eq!(t.tagger.unwrap().tz, "-0400");
        assert_eq!(t.message, "Release 1.0");
    }

    #[test]
    fn tag_without_tagger() {
        let body = "object e4af89166a17785c1d741b8b1d5775f3223f510f\ntype commit\ntag v0.1\n\nold\n";
        let t = Tag::decode(body.as_bytes()).unwrap();
        assert!(t.tagger.is_none());
    }
}
