//! Whole-index reporting: duplicate groups and similarity communities.

use std::sync::Arc;

use tracing::{debug, info};

use index::{RepoFile, Store};
use sketch::Mode;

use crate::community::CommunityBuilder;
use crate::types::{parse_func_key, DuplicateGroup, MatchError, MemberRef, Report};

/// How collision buckets are pulled out of the backend.
///
/// Both strategies must produce identical communities for the same index
/// state; the condensed form just pushes the group-by to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportStrategy {
    /// One ordered scan; buckets form where consecutive keys are equal.
    #[default]
    Grouped,
    /// Backend-side group-by returning buckets directly.
    Condensed,
}

/// Report generator for one similarity mode.
pub struct Reporter {
    store: Arc<Store>,
    mode: Mode,
}

impl Reporter {
    pub fn new(store: Arc<Store>, mode: Mode) -> Self {
        Self { store, mode }
    }

    /// Raw similarity communities as index keys.
    pub fn community_keys(&self, strategy: ReportStrategy) -> Result<Vec<Vec<String>>, MatchError> {
        let mut builder = CommunityBuilder::new();
        match strategy {
            ReportStrategy::Grouped => {
                self.store.scan_bands(self.mode, &mut |ht, value, sha| {
                    builder.push_row(ht, value, sha);
                    Ok(())
                })?;
            }
            ReportStrategy::Condensed => {
                self.store.scan_buckets(self.mode, &mut |_, _, members| {
                    builder.push_bucket(members);
                    Ok(())
                })?;
            }
        }
        let communities = builder.finish();
        debug!(
            mode = %self.mode,
            communities = communities.len(),
            ?strategy,
            "community detection finished"
        );
        Ok(communities)
    }

    /// Exact-duplicate groups: content hashes with more than one provenance
    /// row, streamed out of the sha-ordered meta scan.
    pub fn duplicates(&self) -> Result<Vec<DuplicateGroup>, MatchError> {
        let mut groups: Vec<DuplicateGroup> = Vec::new();
        let mut current: Vec<RepoFile> = Vec::new();

        fn flush(groups: &mut Vec<DuplicateGroup>, current: &mut Vec<RepoFile>) {
            if current.len() >= 2 {
                let mut files = std::mem::take(current);
                files.sort_unstable_by(|a, b| {
                    (&a.repo, &a.path).cmp(&(&b.repo, &b.path))
                });
                groups.push(DuplicateGroup {
                    sha: files[0].sha.clone(),
                    files,
                });
            } else {
                current.clear();
            }
        }

        self.store.scan_meta(&mut |file| {
            if current.last().map(|f: &RepoFile| f.sha.as_str()) != Some(file.sha.as_str()) {
                flush(&mut groups, &mut current);
            }
            current.push(file.clone());
            Ok(())
        })?;
        flush(&mut groups, &mut current);

        Ok(groups)
    }

    /// The full report: duplicate groups plus communities resolved through
    /// `meta` into member references.
    pub fn report(&self, strategy: ReportStrategy) -> Result<Report, MatchError> {
        let duplicates = self.duplicates()?;
        let keys = self.community_keys(strategy)?;

        let mut similarities = Vec::with_capacity(keys.len());
        for community in keys {
            let mut members = Vec::new();
            for key in &community {
                self.resolve(key, &mut members)?;
            }
            if members.len() >= 2 {
                similarities.push(members);
            }
        }

        info!(
            mode = %self.mode,
            duplicate_groups = duplicates.len(),
            communities = similarities.len(),
            "report assembled"
        );
        Ok(Report {
            duplicates,
            similarities,
        })
    }

    fn resolve(&self, key: &str, out: &mut Vec<MemberRef>) -> Result<(), MatchError> {
        match self.mode {
            Mode::File => {
                for file in self.store.find_by_content_hash(key)? {
                    out.push(MemberRef::File(file));
                }
            }
            Mode::Func => {
                let Some((name, line, sha)) = parse_func_key(key) else {
                    return Ok(());
                };
                for file in self.store.find_by_content_hash(sha)? {
                    out.push(MemberRef::Func {
                        file,
                        name: name.to_string(),
                        line,
                    });
                }
            }
        }
        Ok(())
    }
}
