//! Query and report layer of the Gemini similarity engine.
//!
//! `matcher` sits on top of the fingerprint index (`index`), the vocabulary
//! (`vocab`), and the sketcher (`sketch`). It answers two questions:
//!
//! - **Query** ([`Matcher`]): given one file (or one function in it), which
//!   indexed units are exact duplicates (same content hash) and which are
//!   near-duplicates (band collisions)?
//! - **Report** ([`Reporter`]): across the whole index, which units form
//!   communities of mutual similarity? Collision buckets stream out of an
//!   ordered scan into a union-find; connected components of size ≥ 2 are
//!   the communities.
//!
//! Both answers are deterministic for a fixed index state, including member
//! ordering, so reports can be diffed between runs.

mod community;
mod engine;
mod report;
mod types;

pub use crate::community::{CommunityBuilder, UnionFind};
pub use crate::engine::{bands_for_features, content_sha1, FunctionFilter, Matcher};
pub use crate::report::{Reporter, ReportStrategy};
pub use crate::types::{
    func_key, parse_func_key, DuplicateGroup, MatchError, MemberRef, QueryResult, Report,
};
