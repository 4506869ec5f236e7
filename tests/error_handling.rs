//! Failure-path behavior: external services degrade and get counted,
//! storage faults are fatal, and scans are never silently partial.

use std::sync::Arc;

use gemini::{
    BackendConfig, HashPipeline, Mode, OrderedDocFreq, RepoFile, Reporter, ReportStrategy,
    RetryConfig, Store, StoreBackend, StoreError, StubAstService, StubFeatureService, UastNode,
    UnitOutcome, WmhParams, DEFAULT_SEED,
};

const VOCAB_JSON: &str =
    r#"{"docs": 10, "tokens": ["t.a", "t.b"], "df": {"t.a": 2, "t.b": 5}}"#;

fn vocab() -> Arc<OrderedDocFreq> {
    Arc::new(OrderedDocFreq::from_json(VOCAB_JSON).unwrap())
}

fn unit(path: &str) -> (RepoFile, Vec<u8>) {
    let content = path.as_bytes().to_vec();
    (
        RepoFile {
            repo: "r".into(),
            commit: "c".into(),
            path: path.into(),
            sha: gemini::content_sha1(&content),
        },
        content,
    )
}

fn pipeline_with(
    store: Arc<Store>,
    ast: StubAstService,
    features: StubFeatureService,
) -> HashPipeline {
    let vocab = vocab();
    let params = WmhParams::generate(Mode::File.params(), vocab.len(), DEFAULT_SEED).unwrap();
    HashPipeline::new(
        store,
        vocab,
        Arc::new(params),
        Mode::File,
        Arc::new(ast),
        Arc::new(features),
    )
}

fn file_node(id: u64) -> UastNode {
    UastNode {
        id,
        internal_type: "File".into(),
        token: None,
        roles: Vec::new(),
        start_line: Some(1),
        children: Vec::new(),
    }
}

#[test]
fn ast_failures_skip_units_and_count_them() {
    let store = Arc::new(Store::new(BackendConfig::InMemory).unwrap());
    let pipeline = pipeline_with(store, StubAstService::failing(), StubFeatureService::new());

    let units = vec![unit("a.go"), unit("b.go")];
    let summary = pipeline.hash_batch(&units).unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.indexed, 0);
    let counts = pipeline.skip_counts().snapshot();
    assert_eq!(counts.get("ast"), Some(&2));
}

#[test]
fn null_uast_counts_as_an_ast_skip() {
    let store = Arc::new(Store::new(BackendConfig::InMemory).unwrap());
    // A stub with no registered file returns uast: null plus an error string.
    let pipeline = pipeline_with(store, StubAstService::new(), StubFeatureService::new());

    let (file, content) = unit("unparseable.bin");
    let outcome = pipeline.hash_unit(&file, &content).unwrap();

    assert_eq!(outcome, UnitOutcome::Skipped);
    assert_eq!(pipeline.skip_counts().snapshot().get("ast"), Some(&1));
}

#[test]
fn feature_failures_skip_units_without_aborting_the_batch() {
    let store = Arc::new(Store::new(BackendConfig::InMemory).unwrap());
    let ast = StubAstService::new()
        .with_uast("a.go", file_node(1))
        .with_uast("b.go", file_node(2));
    let pipeline = pipeline_with(store, ast, StubFeatureService::failing());

    let summary = pipeline.hash_batch(&[unit("a.go"), unit("b.go")]).unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(
        pipeline.skip_counts().snapshot().get("features"),
        Some(&2)
    );
}

/// Backend whose every operation reports a transport fault.
struct DownBackend;

impl StoreBackend for DownBackend {
    fn upsert_bands(&self, _: Mode, _: &str, _: &[Vec<u8>]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn lookup(
        &self,
        _: Mode,
        _: u32,
        _: &[u8],
        _: &mut dyn FnMut(&str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn scan_bands(
        &self,
        _: Mode,
        _: &mut dyn FnMut(u32, &[u8], &str) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        Err(StoreError::ScanInterrupted("connection reset".into()))
    }

    fn insert_meta(&self, _: &RepoFile) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn find_by_content_hash(&self, _: &str) -> Result<Vec<RepoFile>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn scan_meta(
        &self,
        _: &mut dyn FnMut(&RepoFile) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        Err(StoreError::ScanInterrupted("connection reset".into()))
    }

    fn put_docfreq(&self, _: Mode, _: u64, _: &[(String, u64)]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn get_docfreq(&self, _: Mode) -> Result<Option<(u64, Vec<(String, u64)>)>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn drop_hashtables(&self, _: Mode) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[test]
fn unavailable_backend_is_fatal_to_the_build() {
    let store =
        Arc::new(Store::with_backend(Box::new(DownBackend)).with_retry(RetryConfig::none()));
    let ast = StubAstService::new().with_uast("a.go", file_node(1));
    let pipeline = pipeline_with(store, ast, StubFeatureService::new());

    let (file, content) = unit("a.go");
    let err = pipeline.hash_unit(&file, &content).unwrap_err();
    assert!(matches!(
        err,
        gemini::PipelineError::Store(StoreError::Unavailable(_))
    ));
}

#[test]
fn interrupted_scan_fails_the_report() {
    let store =
        Arc::new(Store::with_backend(Box::new(DownBackend)).with_retry(RetryConfig::none()));
    let reporter = Reporter::new(store, Mode::File);

    let err = reporter.report(ReportStrategy::Grouped).unwrap_err();
    assert!(matches!(
        err,
        gemini::MatchError::Store(StoreError::ScanInterrupted(_))
    ));
}

#[test]
fn cancellation_stops_rows_before_they_run() {
    let store = Arc::new(Store::new(BackendConfig::InMemory).unwrap());
    let ast = StubAstService::new().with_uast("a.go", file_node(1));
    let cancel = gemini::CancelToken::new();
    cancel.cancel();
    let pipeline =
        pipeline_with(store, ast, StubFeatureService::new()).with_cancel(cancel);

    let summary = pipeline.hash_batch(&[unit("a.go")]).unwrap();
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.indexed, 0);
}

#[test]
fn malformed_vocabulary_is_fatal() {
    let err = OrderedDocFreq::from_json(
        r#"{"docs": 3, "tokens": ["a", "b"], "df": {"a": 1}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("malformed vocabulary"));
}
