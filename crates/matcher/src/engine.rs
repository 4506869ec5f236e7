//! Query orchestration: one unit in, duplicates and near-duplicates out.

use std::sync::Arc;

use hashbrown::HashSet;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use extract::{enumerate_functions, AstService, ExtractRequest, Feature, FeatureService};
use index::Store;
use sketch::{split_bands, Mode, WeightedMinHasher};
use vocab::{BagBuilder, OrderedDocFreq};

use crate::types::{func_key, parse_func_key, MatchError, MemberRef, QueryResult};

/// SHA-1 hex digest of raw content bytes.
pub fn content_sha1(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Bag, sketch, and band a feature stream in one step.
///
/// Returns `None` when every feature falls outside the vocabulary: an empty
/// bag has no meaningful sketch and must not reach the index.
pub fn bands_for_features(
    vocab: &OrderedDocFreq,
    hasher: &WeightedMinHasher,
    mode: Mode,
    features: &[Feature],
) -> Result<Option<Vec<Vec<u8>>>, MatchError> {
    let mut builder = BagBuilder::new(vocab);
    for feature in features {
        builder.add(&feature.name, feature.weight);
    }
    let bag = builder.build();
    if bag.is_empty() {
        return Ok(None);
    }
    let sketch = hasher.hash(bag.entries())?;
    Ok(Some(split_bands(&sketch, mode.params())?))
}

/// Restrict a function-mode query to one declared function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionFilter {
    pub name: String,
    pub start_line: u32,
}

/// Query-side orchestrator for one similarity mode.
pub struct Matcher {
    store: Arc<Store>,
    vocab: Arc<OrderedDocFreq>,
    hasher: WeightedMinHasher,
    mode: Mode,
    ast: Arc<dyn AstService>,
    features: Arc<dyn FeatureService>,
}

impl Matcher {
    pub fn new(
        store: Arc<Store>,
        vocab: Arc<OrderedDocFreq>,
        hasher: WeightedMinHasher,
        mode: Mode,
        ast: Arc<dyn AstService>,
        features: Arc<dyn FeatureService>,
    ) -> Self {
        Self {
            store,
            vocab,
            hasher,
            mode,
            ast,
            features,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Find duplicates and near-duplicates of one file (or one function in
    /// it, when `filter` is set in function mode).
    ///
    /// External-service failures degrade the answer to its duplicate set;
    /// only storage failures propagate.
    pub fn query(
        &self,
        filename: &str,
        content: &[u8],
        filter: Option<&FunctionFilter>,
    ) -> Result<QueryResult, MatchError> {
        let sha = content_sha1(content);
        let duplicates = self.store.find_by_content_hash(&sha)?;
        debug!(filename, %sha, duplicates = duplicates.len(), "duplicate lookup done");

        let uast = match self.ast.parse(filename, content) {
            Ok(response) => {
                if !response.errors.is_empty() {
                    warn!(
                        filename,
                        errors = response.errors.len(),
                        "ast service reported parse errors"
                    );
                }
                response.uast
            }
            Err(err) => {
                warn!(filename, %err, "ast service failed; similar set unavailable");
                None
            }
        };

        let Some(root) = uast else {
            return Ok(QueryResult {
                duplicates,
                similar: Vec::new(),
            });
        };

        let mut candidates: HashSet<String> = HashSet::new();
        let mut own_keys: HashSet<String> = HashSet::new();

        match self.mode {
            Mode::File => {
                own_keys.insert(sha.clone());
                self.collect_candidates(&root, &ExtractRequest::file_level(), &mut candidates)?;
            }
            Mode::Func => {
                let request = ExtractRequest::function_level();
                for function in enumerate_functions(&root) {
                    if let Some(filter) = filter {
                        if function.name != filter.name || function.start_line != filter.start_line
                        {
                            continue;
                        }
                    }
                    own_keys.insert(func_key(&function.name, function.start_line, &sha));
                    self.collect_candidates(function.node, &request, &mut candidates)?;
                }
            }
        }

        for dup in &duplicates {
            own_keys.insert(dup.sha.clone());
        }

        let mut similar = Vec::new();
        let mut keys: Vec<String> = candidates
            .into_iter()
            .filter(|key| !own_keys.contains(key))
            .collect();
        keys.sort_unstable();

        for key in keys {
            self.resolve(&key, &mut similar)?;
        }

        Ok(QueryResult {
            duplicates,
            similar,
        })
    }

    fn collect_candidates(
        &self,
        node: &extract::UastNode,
        request: &ExtractRequest,
        candidates: &mut HashSet<String>,
    ) -> Result<(), MatchError> {
        let features = match self.features.extract(node, request) {
            Ok(features) => features,
            Err(err) => {
                warn!(%err, "feature extraction failed; unit skipped");
                return Ok(());
            }
        };

        let Some(bands) = bands_for_features(&self.vocab, &self.hasher, self.mode, &features)?
        else {
            debug!("no known features; unit not sketched");
            return Ok(());
        };

        for (hashtable, band) in bands.iter().enumerate() {
            self.store
                .lookup(self.mode, hashtable as u32, band, &mut |hit| {
                    candidates.insert(hit.to_string());
                    Ok(())
                })?;
        }
        Ok(())
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
                    warn!(key, "unparseable function key in index");
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
