//! Ordered document-frequency vocabulary.
//!
//! Serialized shape is `{"docs": N, "tokens": [...], "df": {token: count}}`.
//! The token order is identity-bearing: position in `tokens` is the feature
//! index used by every sketch in the corpus, so load preserves the stored
//! order and only the `from_counts` constructor sorts.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes of a zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Errors raised while loading or validating a vocabulary.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("malformed vocabulary: token '{token}' listed without a document count")]
    MissingCount { token: String },

    #[error("malformed vocabulary: count present for unknown token '{token}'")]
    UnknownToken { token: String },

    #[error("malformed vocabulary: token '{token}' repeats in the ordered list")]
    DuplicateToken { token: String },

    #[error(
        "malformed vocabulary: token '{token}' has document count {count}, outside [1, {docs}]"
    )]
    CountOutOfRange {
        token: String,
        count: f64,
        docs: u64,
    },

    #[error("malformed vocabulary: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read vocabulary: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Deserialize)]
struct RawDocFreq {
    docs: u64,
    tokens: Vec<String>,
    df: BTreeMap<String, serde_json::Number>,
}

#[derive(Serialize)]
struct CanonicalDocFreq<'a> {
    docs: u64,
    tokens: &'a [String],
    df: BTreeMap<&'a str, u64>,
}

/// Immutable, ordered per-token document frequencies for one corpus.
#[derive(Debug, Clone)]
pub struct OrderedDocFreq {
    docs: u64,
    tokens: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, u32, FxBuildHasher>,
}

impl OrderedDocFreq {
    /// Build a vocabulary from raw `(token, count)` pairs, sorting tokens
    /// lexicographically to fix the index order.
    pub fn from_counts<I>(docs: u64, counts: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut pairs: Vec<(String, u64)> = counts.into_iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut tokens = Vec::with_capacity(pairs.len());
        let mut df = BTreeMap::new();
        for (token, count) in pairs {
            if df.insert(token.clone(), count).is_some() {
                return Err(VocabError::DuplicateToken { token });
            }
            tokens.push(token);
        }
        Self::assemble(docs, tokens, |t| df.get(t).map(|&c| c as f64))
    }

    /// Parse the JSON shape `{docs, tokens, df}`, preserving token order.
    pub fn from_json(json: &str) -> Result<Self, VocabError> {
        let raw: RawDocFreq = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Read a vocabulary from a reader, transparently decompressing zstd.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, VocabError> {
        let mut head = [0u8; 4];
        let mut read = 0;
        while read < head.len() {
            let n = reader.read(&mut head[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }

        let mut buf = Vec::new();
        if read == 4 && head == ZSTD_MAGIC {
            let chained = head.as_slice().chain(reader);
            zstd::stream::Decoder::new(chained)?.read_to_end(&mut buf)?;
        } else {
            buf.extend_from_slice(&head[..read]);
            reader.read_to_end(&mut buf)?;
        }

        let raw: RawDocFreq = serde_json::from_slice(&buf)?;
        Self::from_raw(raw)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, VocabError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    fn from_raw(raw: RawDocFreq) -> Result<Self, VocabError> {
        let RawDocFreq { docs, tokens, df } = raw;

        // Older exporters wrote counts as floats; accept them when integral.
        let vocab = Self::assemble(docs, tokens, |t| df.get(t).and_then(|n| n.as_f64()))?;

        // Every token now has a count; a larger df map means stray keys.
        if df.len() > vocab.tokens.len() {
            let token = df
                .keys()
                .find(|t| vocab.token_index(t).is_none())
                .cloned()
                .unwrap_or_default();
            return Err(VocabError::UnknownToken { token });
        }
        Ok(vocab)
    }

    fn assemble<F>(docs: u64, tokens: Vec<String>, count_of: F) -> Result<Self, VocabError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut counts = Vec::with_capacity(tokens.len());
        let mut index: HashMap<String, u32, FxBuildHasher> =
            HashMap::with_capacity_and_hasher(tokens.len(), FxBuildHasher::default());

        for (i, token) in tokens.iter().enumerate() {
            let raw = count_of(token).ok_or_else(|| VocabError::MissingCount {
                token: token.clone(),
            })?;
            if raw < 1.0 || raw > docs as f64 || raw.fract() != 0.0 {
                return Err(VocabError::CountOutOfRange {
                    token: token.clone(),
                    count: raw,
                    docs,
                });
            }
            counts.push(raw as u64);
            if index.insert(token.clone(), i as u32).is_some() {
                return Err(VocabError::DuplicateToken {
                    token: token.clone(),
                });
            }
        }

        Ok(Self {
            docs,
            tokens,
            counts,
            index,
        })
    }

    /// Total number of documents in the corpus.
    pub fn docs(&self) -> u64 {
        self.docs
    }

    /// Vocabulary size `k`.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Position of `token` in the ordered list, if present.
    pub fn token_index(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// Document count for the token at `index`.
    pub fn count_at(&self, index: u32) -> u64 {
        self.counts[index as usize]
    }

    /// Inverse-document-frequency scale `ln(docs / df[token])`.
    pub fn weight(&self, token: &str) -> Option<f64> {
        self.token_index(token).map(|i| self.weight_at(i))
    }

    pub fn weight_at(&self, index: u32) -> f64 {
        (self.docs as f64 / self.counts[index as usize] as f64).ln()
    }

    /// Canonical JSON dump: sorted `df` keys, integer counts.
    pub fn to_json(&self) -> String {
        let df: BTreeMap<&str, u64> = self
            .tokens
            .iter()
            .zip(&self.counts)
            .map(|(t, &c)| (t.as_str(), c))
            .collect();
        let canonical = CanonicalDocFreq {
            docs: self.docs,
            tokens: &self.tokens,
            df,
        };
        serde_json::to_string(&canonical).expect("vocabulary serializes")
    }

    /// Iterate `(token, count)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.tokens
            .iter()
            .zip(&self.counts)
            .map(|(t, &c)| (t.as_str(), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str =
        r#"{"docs": 10, "tokens": ["alpha", "beta", "gamma"], "df": {"alpha": 4, "beta": 10, "gamma": 1}}"#;

    #[test]
    fn loads_and_indexes_tokens() {
        let v = OrderedDocFreq::from_json(SAMPLE).unwrap();
        assert_eq!(v.docs(), 10);
        assert_eq!(v.len(), 3);
        assert_eq!(v.token_index("alpha"), Some(0));
        assert_eq!(v.token_index("gamma"), Some(2));
        assert_eq!(v.token_index("delta"), None);
    }

    #[test]
    fn weight_is_natural_log_idf() {
        let v = OrderedDocFreq::from_json(SAMPLE).unwrap();
        let w = v.weight("alpha").unwrap();
        assert!((w - (10.0f64 / 4.0).ln()).abs() < 1e-12);
        // df == docs means the token carries no signal.
        assert_eq!(v.weight("beta").unwrap(), 0.0);
    }

    #[test]
    fn rejects_token_without_count() {
        let json = r#"{"docs": 5, "tokens": ["a", "b"], "df": {"a": 2}}"#;
        assert!(matches!(
            OrderedDocFreq::from_json(json),
            Err(VocabError::MissingCount { .. })
        ));
    }

    #[test]
    fn rejects_count_for_unknown_token() {
        let json = r#"{"docs": 5, "tokens": ["a"], "df": {"a": 2, "b": 1}}"#;
        assert!(matches!(
            OrderedDocFreq::from_json(json),
            Err(VocabError::UnknownToken { .. })
        ));
    }

    #[test]
    fn rejects_count_out_of_range() {
        let json = r#"{"docs": 5, "tokens": ["a"], "df": {"a": 6}}"#;
        assert!(matches!(
            OrderedDocFreq::from_json(json),
            Err(VocabError::CountOutOfRange { .. })
        ));
        let json = r#"{"docs": 5, "tokens": ["a"], "df": {"a": 0}}"#;
        assert!(OrderedDocFreq::from_json(json).is_err());
    }

    #[test]
    fn accepts_integral_float_counts() {
        let json = r#"{"docs": 5, "tokens": ["a"], "df": {"a": 2.0}}"#;
        let v = OrderedDocFreq::from_json(json).unwrap();
        assert_eq!(v.count_at(0), 2);
    }

    #[test]
    fn rejects_fractional_counts() {
        let json = r#"{"docs": 5, "tokens": ["a"], "df": {"a": 2.5}}"#;
        assert!(matches!(
            OrderedDocFreq::from_json(json),
            Err(VocabError::CountOutOfRange { .. })
        ));
    }

    #[test]
    fn dump_round_trips_canonically() {
        let v = OrderedDocFreq::from_json(SAMPLE).unwrap();
        let dumped = v.to_json();
        let reloaded = OrderedDocFreq::from_json(&dumped).unwrap();
        assert_eq!(reloaded.to_json(), dumped);
    }

    #[test]
    fn from_counts_sorts_tokens() {
        let v = OrderedDocFreq::from_counts(
            4,
            vec![("zeta".to_string(), 1), ("alpha".to_string(), 2)],
        )
        .unwrap();
        assert_eq!(v.tokens(), &["alpha".to_string(), "zeta".to_string()]);
        assert_eq!(v.token_index("zeta"), Some(1));
    }

    #[test]
    fn load_preserves_stored_token_order() {
        let json = r#"{"docs": 5, "tokens": ["z", "a"], "df": {"a": 1, "z": 2}}"#;
        let v = OrderedDocFreq::from_json(json).unwrap();
        assert_eq!(v.token_index("z"), Some(0));
        assert_eq!(v.token_index("a"), Some(1));
    }

    #[test]
    fn reads_plain_and_zstd_files() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("docfreq.json");
        std::fs::write(&plain, SAMPLE).unwrap();
        let v = OrderedDocFreq::from_path(&plain).unwrap();
        assert_eq!(v.len(), 3);

        let packed = dir.path().join("docfreq.json.zst");
        let file = File::create(&packed).unwrap();
        let mut enc = zstd::stream::Encoder::new(file, 3).unwrap();
        enc.write_all(SAMPLE.as_bytes()).unwrap();
        enc.finish().unwrap();
        let v = OrderedDocFreq::from_path(&packed).unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v.token_index("gamma"), Some(2));
    }
}
