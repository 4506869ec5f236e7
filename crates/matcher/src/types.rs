//! Result and report types, plus the composite function-key codec.

use index::{RepoFile, StoreError};
use serde::{Deserialize, Serialize};
use sketch::SketchError;
use thiserror::Error;
use vocab::VocabError;

/// Errors surfaced by the query and report paths.
///
/// External-service failures never appear here: they degrade a query to its
/// duplicate set and are counted, not raised.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sketch(#[from] SketchError),

    #[error(transparent)]
    Vocab(#[from] VocabError),
}

/// One member of a similarity community or query answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    /// Whole-file member.
    File(RepoFile),
    /// Function member: provenance of the containing file plus the declared
    /// name and start line.
    Func {
        file: RepoFile,
        name: String,
        line: u32,
    },
}

/// Answer to a single query: exact duplicates and near-duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub duplicates: Vec<RepoFile>,
    pub similar: Vec<MemberRef>,
}

/// Files sharing one content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub sha: String,
    pub files: Vec<RepoFile>,
}

/// Whole-index report: duplicate groups plus similarity communities.
///
/// An empty index reports empty vectors for both fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub duplicates: Vec<DuplicateGroup>,
    pub similarities: Vec<Vec<MemberRef>>,
}

/// Compose the opaque function index key.
///
/// The composite ties a function's identity to its containing file's content
/// hash. Everywhere except [`parse_func_key`] the string is opaque.
pub fn func_key(name: &str, start_line: u32, sha: &str) -> String {
    format!("{name}:{start_line}@{sha}")
}

/// Split a function key back into `(name, start_line, sha)`.
///
/// Only result formatting may call this; the index never interprets keys.
pub fn parse_func_key(key: &str) -> Option<(&str, u32, &str)> {
    let (head, sha) = key.rsplit_once('@')?;
    let (name, line) = head.rsplit_once(':')?;
    Some((name, line.parse().ok()?, sha))
}
