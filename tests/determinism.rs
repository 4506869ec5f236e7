//! Bit-for-bit determinism guarantees: parameter tables, sketches, band
//! keys, and report output must be identical across runs, instances, and
//! worker threads.

use std::sync::Arc;

use gemini::{
    bands_for_features, content_sha1, BackendConfig, Feature, Mode, OrderedDocFreq, Reporter,
    ReportStrategy, Store, WeightedMinHasher, WmhParams, DEFAULT_SEED,
};

const VOCAB_JSON: &str = r#"{
    "docs": 40,
    "tokens": ["t.a", "t.b", "t.c", "t.d", "t.e", "t.f", "t.g", "t.h"],
    "df": {"t.a": 2, "t.b": 5, "t.c": 9, "t.d": 13, "t.e": 21, "t.f": 1,
           "t.g": 34, "t.h": 8}
}"#;

fn vocab() -> Arc<OrderedDocFreq> {
    Arc::new(OrderedDocFreq::from_json(VOCAB_JSON).unwrap())
}

fn features() -> Vec<Feature> {
    [("t.a", 4u32), ("t.c", 1), ("t.e", 11), ("t.h", 2)]
        .iter()
        .map(|&(name, weight)| Feature {
            name: name.into(),
            weight,
        })
        .collect()
}

#[test]
fn parameter_tables_are_byte_identical_for_a_fixed_seed() {
    let a = WmhParams::generate(Mode::File.params(), 8, DEFAULT_SEED).unwrap();
    let b = WmhParams::generate(Mode::File.params(), 8, DEFAULT_SEED).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn sketches_are_identical_across_hasher_instances() {
    let vocab = vocab();
    let bag: Vec<(u32, f64)> = vec![(0, 1.5), (2, 0.25), (4, 9.0)];

    let sketch_a = {
        let params = WmhParams::generate(Mode::File.params(), vocab.len(), DEFAULT_SEED).unwrap();
        WeightedMinHasher::new(Arc::new(params)).hash(&bag).unwrap()
    };
    let sketch_b = {
        let params = WmhParams::generate(Mode::File.params(), vocab.len(), DEFAULT_SEED).unwrap();
        WeightedMinHasher::new(Arc::new(params)).hash(&bag).unwrap()
    };

    assert_eq!(sketch_a.to_bytes(), sketch_b.to_bytes());
}

#[test]
fn band_keys_are_stable_across_threads() {
    let vocab = vocab();
    let params =
        Arc::new(WmhParams::generate(Mode::File.params(), vocab.len(), DEFAULT_SEED).unwrap());
    let hasher = WeightedMinHasher::new(params);
    let feats = features();

    let reference =
        bands_for_features(&vocab, &hasher, Mode::File, &feats)
            .unwrap()
            .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let vocab = vocab.clone();
            let hasher = hasher.clone();
            let feats = feats.clone();
            std::thread::spawn(move || {
                bands_for_features(&vocab, &hasher, Mode::File, &feats)
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), reference);
    }
}

#[test]
fn banding_reconstructs_the_full_sketch() {
    let vocab = vocab();
    let params =
        Arc::new(WmhParams::generate(Mode::Func.params(), vocab.len(), DEFAULT_SEED).unwrap());
    let hasher = WeightedMinHasher::new(params);

    let sketch = hasher.hash(&[(1, 2.0), (6, 0.5)]).unwrap();
    let bands = gemini::split_bands(&sketch, Mode::Func.params()).unwrap();

    assert_eq!(bands.len(), Mode::Func.params().htnum);
    let joined: Vec<u8> = bands.into_iter().flatten().collect();
    assert_eq!(joined, sketch.to_bytes());
}

#[test]
fn content_hash_is_stable() {
    assert_eq!(content_sha1(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    assert_eq!(
        content_sha1(b"hello\n"),
        "f572d396fae9206628714fb2ce00f72e94f2258f"
    );
}

#[test]
fn report_output_is_identical_between_runs() {
    let store = Arc::new(Store::new(BackendConfig::InMemory).unwrap());
    for (sha, path) in [("s1", "a.go"), ("s2", "b.go"), ("s3", "c.go")] {
        store
            .insert_meta(&gemini::RepoFile {
                repo: "r".into(),
                commit: "c".into(),
                path: path.into(),
                sha: sha.into(),
            })
            .unwrap();
    }
    store
        .upsert_bands(Mode::File, "s1", &[vec![1u8; 32], vec![2u8; 32]])
        .unwrap();
    store
        .upsert_bands(Mode::File, "s2", &[vec![1u8; 32], vec![3u8; 32]])
        .unwrap();
    store
        .upsert_bands(Mode::File, "s3", &[vec![4u8; 32], vec![3u8; 32]])
        .unwrap();

    let reporter = Reporter::new(store, Mode::File);
    let a = reporter.report(ReportStrategy::Grouped).unwrap();
    let b = reporter.report(ReportStrategy::Grouped).unwrap();

    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
