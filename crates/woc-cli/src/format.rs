//! Line layouts of the `show-content` pipe.

use anyhow::bail;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use woc_codec::{Commit, Tag, TreeEntry};

/// Width of a base64 line, as coreutils `base64` wraps.
const BASE64_WRAP: usize = 76;

/// Commit message with newlines escaped so it stays on one line.
fn one_line(message: &str) -> String {
    message.replace('\n', "\\n")
}

/// Layouts printed from the undecoded commit rather than its fields.
pub fn is_raw_layout(layout: u8) -> bool {
    matches!(layout, 3 | 7)
}

/// Layout 3 is the commit object itself. Layout 7 is `sha;` followed by its
/// base64, wrapped with escaped newlines so the record stays on one line.
pub fn raw_commit_line(sha: &str, raw: &[u8], layout: u8) -> anyhow::Result<Vec<u8>> {
    match layout {
        3 => Ok(raw.to_vec()),
        7 => {
            let encoded = STANDARD.encode(raw);
            let mut line = format!("{sha};");
            for chunk in encoded.as_bytes().chunks(BASE64_WRAP) {
                line.push_str(&String::from_utf8_lossy(chunk));
                line.push_str("\\n");
            }
            if encoded.is_empty() {
                line.push_str("\\n");
            }
            Ok(line.into_bytes())
        }
        other => bail!("commit layout {other} is not a raw layout"),
    }
}

/// Format a commit in one of the numbered `;`-separated layouts.
pub fn commit_line(sha: &str, c: &Commit, layout: u8) -> anyhow::Result<String> {
    let tree = c.tree.to_hex();
    let parent = c.parents.first().map(|p| p.to_hex()).unwrap_or_default();
    let msg = one_line(&c.message);
    let (tree, parent, msg) = (tree.as_str(), parent.as_str(), msg.as_str());
    let (author, a_time, a_tz) = (c.author.name.as_str(), c.author.time.as_str(), c.author.tz.as_str());
    let (committer, c_time, c_tz) = (
        c.committer.name.as_str(),
        c.committer.time.as_str(),
        c.committer.tz.as_str(),
    );
    let fields = match layout {
        0 => vec![sha, tree, parent, author, committer, a_time, c_time],
        1 => vec![sha, a_time, author],
        2 => vec![sha, author, a_time, a_tz, msg],
        4 => vec![sha, author],
        5 => vec![sha, parent],
        6 => vec![sha, a_time, a_tz, author, tree, parent],
        8 => vec![sha, a_time, c_time, author, committer, parent],
        9 => vec![sha, tree, parent, author, committer, a_time, c_time, a_tz, c_tz, msg],
        3 | 7 => bail!("commit layout {layout} needs the raw object"),
        other => bail!("unknown commit layout {other}"),
    };
    Ok(fields.join(";"))
}

/// `mode;sha;name` per entry.
pub fn tree_lines(entries: &[TreeEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{};{};{}\n", e.mode, e.oid.to_hex(), e.name))
        .collect()
}

pub fn tag_line(sha: &str, t: &Tag) -> String {
    let object = t.object.to_hex();
    let tagger = t.tagger.as_ref().map(|s| s.name.as_str()).unwrap_or("");
    let msg = one_line(&t.message);
    [sha, object.as_str(), t.kind.as_str(), t.name.as_str(), tagger, msg.as_str()].join(";")
}
