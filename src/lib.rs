//! Workspace umbrella crate for Gemini.
//!
//! Gemini finds duplicate and near-duplicate source files (and functions)
//! across many code repositories. The member crates own the stages:
//! `vocab` (document-frequency vocabulary and feature bags), `sketch`
//! (weighted MinHash and band partitioning), `index` (fingerprint-band
//! storage), `extract` (AST and feature-extraction service clients), and
//! `matcher` (query and report). This crate re-exports them and
//! provides the build pipeline that wires them together.
//!
//! ## Indexing
//!
//! [`HashPipeline`] drives one unit at a time: provenance into `meta`, UAST
//! from the AST service, features from the extraction service, bag → sketch
//! → bands, and the band rows into the store. Rows are independent and
//! CPU-bound, so [`HashPipeline::hash_batch`] fans out with rayon; every
//! collaborator is constructor-injected and read-only, which keeps row
//! computations bit-identical no matter how the scheduler interleaves them.
//!
//! ## Degradation
//!
//! External services fail routinely on a big corpus. Any failure that skips
//! a unit lands in a per-class counter ([`SkipCounts`]) that the caller can
//! read at any point and print in the report footer; a skipped unit never
//! aborts a build. Storage failures, by contrast, are fatal once the retry
//! budget is exhausted.

pub use extract::{
    enumerate_functions, AstService, ExtractRequest, Feature, FeatureService, FunctionUnit,
    HttpAstService, HttpFeatureService, ParseResponse, ServiceError, StubAstService,
    StubFeatureService, UastNode,
};
pub use index::{
    BackendConfig, MemoryBackend, RepoFile, RetryConfig, Store, StoreBackend, StoreError,
};
pub use matcher::{
    bands_for_features, content_sha1, func_key, DuplicateGroup, FunctionFilter, MatchError,
    Matcher, MemberRef, QueryResult, Report, Reporter, ReportStrategy,
};
pub use sketch::{
    split_bands, Mode, ModeParams, Sketch, SketchError, WeightedMinHasher, WmhParams, DEFAULT_SEED,
};
pub use vocab::{BagBuilder, FeatureBag, OrderedDocFreq, VocabError};

pub mod config;

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Errors that stop a pipeline operation.
#[derive(Debug)]
pub enum PipelineError {
    Vocab(VocabError),
    Sketch(SketchError),
    Store(StoreError),
    Match(MatchError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Vocab(err) => write!(f, "vocabulary failure: {err}"),
            PipelineError::Sketch(err) => write!(f, "sketching failure: {err}"),
            PipelineError::Store(err) => write!(f, "storage failure: {err}"),
            PipelineError::Match(err) => write!(f, "match failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Vocab(err) => Some(err),
            PipelineError::Sketch(err) => Some(err),
            PipelineError::Store(err) => Some(err),
            PipelineError::Match(err) => Some(err),
        }
    }
}

impl From<VocabError> for PipelineError {
    fn from(value: VocabError) -> Self {
        PipelineError::Vocab(value)
    }
}

impl From<SketchError> for PipelineError {
    fn from(value: SketchError) -> Self {
        PipelineError::Sketch(value)
    }
}

impl From<StoreError> for PipelineError {
    fn from(value: StoreError) -> Self {
        PipelineError::Store(value)
    }
}

impl From<MatchError> for PipelineError {
    fn from(value: MatchError) -> Self {
        PipelineError::Match(value)
    }
}

/// Per-error-class counters for skipped units.
///
/// Classes: `"ast"` (the AST service failed or produced no tree),
/// `"features"` (feature extraction failed), `"timeout"` (either service
/// exceeded its deadline).
///
/// A poisoned lock still holds a valid map; accounting never aborts a build.
#[derive(Debug, Default)]
pub struct SkipCounts {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl SkipCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self, class: &str) {
        let mut guard = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *guard.entry(class.to_string()).or_insert(0) += 1;
    }

    /// Current counters, ordered by class name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

/// Skip-counter class for a service failure at the given pipeline stage.
fn skip_class(stage: &'static str, err: &ServiceError) -> &'static str {
    match err.class() {
        "timeout" => "timeout",
        _ => stage,
    }
}

/// Cooperative cancellation flag, checked at row boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Outcome of hashing one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Band rows written for this many sub-units (1 in file mode, one per
    /// function in function mode).
    Indexed(usize),
    /// No usable tree or features; counted, not fatal.
    Skipped,
    /// Every feature fell outside the vocabulary; nothing to index.
    Empty,
    /// The cancel token fired before this row ran.
    Cancelled,
}

/// Totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub empty: usize,
    pub cancelled: usize,
}

/// The corpus build pipeline: features → bag → sketch → bands → store.
pub struct HashPipeline {
    store: Arc<Store>,
    vocab: Arc<OrderedDocFreq>,
    hasher: WeightedMinHasher,
    mode: Mode,
    ast: Arc<dyn AstService>,
    features: Arc<dyn FeatureService>,
    skips: Arc<SkipCounts>,
    cancel: CancelToken,
}

impl HashPipeline {
    pub fn new(
        store: Arc<Store>,
        vocab: Arc<OrderedDocFreq>,
        params: Arc<WmhParams>,
        mode: Mode,
        ast: Arc<dyn AstService>,
        features: Arc<dyn FeatureService>,
    ) -> Self {
        Self {
            store,
            vocab,
            hasher: WeightedMinHasher::new(params),
            mode,
            ast,
            features,
            skips: Arc::new(SkipCounts::new()),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn skip_counts(&self) -> Arc<SkipCounts> {
        self.skips.clone()
    }

    pub fn vocabulary(&self) -> Arc<OrderedDocFreq> {
        self.vocab.clone()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Build a query-side matcher over the same collaborators.
    pub fn matcher(&self) -> Matcher {
        Matcher::new(
            self.store.clone(),
            self.vocab.clone(),
            self.hasher.clone(),
            self.mode,
            self.ast.clone(),
            self.features.clone(),
        )
    }

    /// Index one unit: record provenance, sketch its features, store bands.
    pub fn hash_unit(&self, file: &RepoFile, content: &[u8]) -> Result<UnitOutcome, PipelineError> {
        if self.cancel.is_cancelled() {
            return Ok(UnitOutcome::Cancelled);
        }

        self.store.insert_meta(file)?;

        let uast = match self.ast.parse(&file.path, content) {
            Ok(response) => {
                if !response.errors.is_empty() && response.uast.is_some() {
                    debug!(
                        path = %file.path,
                        errors = response.errors.len(),
                        "using partial uast"
                    );
                }
                response.uast
            }
            Err(err) => {
                warn!(path = %file.path, %err, "ast service failed; unit skipped");
                self.skips.bump(skip_class("ast", &err));
                return Ok(UnitOutcome::Skipped);
            }
        };

        let Some(root) = uast else {
            self.skips.bump("ast");
            return Ok(UnitOutcome::Skipped);
        };

        match self.mode {
            Mode::File => self.hash_file_unit(file, &root),
            Mode::Func => self.hash_function_units(file, &root),
        }
    }

    fn hash_file_unit(
        &self,
        file: &RepoFile,
        root: &UastNode,
    ) -> Result<UnitOutcome, PipelineError> {
        let features = match self.features.extract(root, &ExtractRequest::file_level()) {
            Ok(features) => features,
            Err(err) => {
                warn!(path = %file.path, %err, "feature extraction failed; unit skipped");
                self.skips.bump(skip_class("features", &err));
                return Ok(UnitOutcome::Skipped);
            }
        };

        let Some(bands) =
            bands_for_features(&self.vocab, &self.hasher, self.mode, &features)
                .map_err(PipelineError::from)?
        else {
            return Ok(UnitOutcome::Empty);
        };

        self.store.upsert_bands(self.mode, &file.sha, &bands)?;
        Ok(UnitOutcome::Indexed(1))
    }

    fn hash_function_units(
        &self,
        file: &RepoFile,
        root: &UastNode,
    ) -> Result<UnitOutcome, PipelineError> {
        let request = ExtractRequest::function_level();
        let mut indexed = 0usize;

        for function in enumerate_functions(root) {
            let features = match self.features.extract(function.node, &request) {
                Ok(features) => features,
                Err(err) => {
                    warn!(
                        path = %file.path,
                        function = %function.name,
                        %err,
                        "feature extraction failed; function skipped"
                    );
                    self.skips.bump(skip_class("features", &err));
                    continue;
                }
            };

            let Some(bands) =
                bands_for_features(&self.vocab, &self.hasher, self.mode, &features)
                    .map_err(PipelineError::from)?
            else {
                continue;
            };

            let key = func_key(&function.name, function.start_line, &file.sha);
            self.store.upsert_bands(self.mode, &key, &bands)?;
            indexed += 1;
        }

        if indexed == 0 {
            Ok(UnitOutcome::Empty)
        } else {
            Ok(UnitOutcome::Indexed(indexed))
        }
    }

    /// Index a batch of rows in parallel.
    ///
    /// Rows are independent; the scheduler may interleave them freely. The
    /// first storage failure aborts the batch (a partial build is only
    /// acceptable ahead of a full re-hash).
    pub fn hash_batch(
        &self,
        units: &[(RepoFile, Vec<u8>)],
    ) -> Result<BatchSummary, PipelineError> {
        let outcomes: Result<Vec<UnitOutcome>, PipelineError> = units
            .par_iter()
            .map(|(file, content)| self.hash_unit(file, content))
            .collect();

        let mut summary = BatchSummary::default();
        for outcome in outcomes? {
            match outcome {
                UnitOutcome::Indexed(_) => summary.indexed += 1,
                UnitOutcome::Skipped => summary.skipped += 1,
                UnitOutcome::Empty => summary.empty += 1,
                UnitOutcome::Cancelled => summary.cancelled += 1,
            }
        }

        info!(
            mode = %self.mode,
            indexed = summary.indexed,
            skipped = summary.skipped,
            empty = summary.empty,
            cancelled = summary.cancelled,
            "batch hashed"
        );
        Ok(summary)
    }
}

/// Load the vocabulary for `mode`, preferring the JSON file channel over the
/// copy persisted in the store.
pub fn load_vocabulary(
    json_path: Option<&std::path::Path>,
    store: &Store,
    mode: Mode,
) -> Result<Option<OrderedDocFreq>, PipelineError> {
    if let Some(path) = json_path {
        debug!(path = %path.display(), "loading vocabulary from json");
        return Ok(Some(OrderedDocFreq::from_path(path)?));
    }
    match store.get_docfreq(mode)? {
        Some((docs, df)) => Ok(Some(OrderedDocFreq::from_counts(docs, df)?)),
        None => Ok(None),
    }
}

/// Persist the vocabulary into the store channel.
pub fn persist_vocabulary(
    store: &Store,
    mode: Mode,
    vocab: &OrderedDocFreq,
) -> Result<(), PipelineError> {
    let df: Vec<(String, u64)> = vocab
        .iter()
        .map(|(token, count)| (token.to_string(), count))
        .collect();
    store.put_docfreq(mode, vocab.docs(), &df)?;
    Ok(())
}
