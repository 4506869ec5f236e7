//! Feature-bag building over a fixed vocabulary.

use fxhash::FxHashMap;

use crate::docfreq::OrderedDocFreq;

/// Sparse bag of `(vocabulary index, scaled weight)` entries.
///
/// Logically a dense vector of length `k` (the vocabulary size); only the
/// non-zero entries are stored, sorted by index.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBag {
    k: u32,
    entries: Vec<(u32, f64)>,
}

impl FeatureBag {
    /// Logical length of the bag (= vocabulary size).
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Non-zero entries, sorted by index.
    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Accumulates raw `(token, weight)` features into a [`FeatureBag`].
///
/// Each raw weight is scaled by the token's inverse-document-frequency;
/// tokens missing from the vocabulary are dropped without error, as are
/// tokens whose scale is zero (`df == docs`).
pub struct BagBuilder<'a> {
    vocab: &'a OrderedDocFreq,
    acc: FxHashMap<u32, f64>,
}

impl<'a> BagBuilder<'a> {
    pub fn new(vocab: &'a OrderedDocFreq) -> Self {
        Self {
            vocab,
            acc: FxHashMap::default(),
        }
    }

    /// Add one raw feature occurrence.
    pub fn add(&mut self, token: &str, raw_weight: u32) {
        if let Some(i) = self.vocab.token_index(token) {
            let scaled = raw_weight as f64 * self.vocab.weight_at(i);
            if scaled > 0.0 {
                *self.acc.entry(i).or_insert(0.0) += scaled;
            }
        }
    }

    /// Add a whole feature stream.
    pub fn extend<I, S>(&mut self, features: I)
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        for (token, weight) in features {
            self.add(token.as_ref(), weight);
        }
    }

    pub fn build(self) -> FeatureBag {
        let mut entries: Vec<(u32, f64)> = self.acc.into_iter().collect();
        entries.sort_unstable_by_key(|&(i, _)| i);
        FeatureBag {
            k: self.vocab.len() as u32,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> OrderedDocFreq {
        OrderedDocFreq::from_json(
            r#"{"docs": 8, "tokens": ["id.main", "id.parse", "lit.42", "seq.ab"],
                "df": {"id.main": 2, "id.parse": 4, "lit.42": 8, "seq.ab": 1}}"#,
        )
        .unwrap()
    }

    #[test]
    fn scales_raw_weights_by_idf() {
        let v = vocab();
        let mut b = BagBuilder::new(&v);
        b.add("id.parse", 3);
        let bag = b.build();

        assert_eq!(bag.len(), 1);
        let (index, w) = bag.entries()[0];
        assert_eq!(index, 1);
        assert!((w - 3.0 * (8.0f64 / 4.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn repeated_tokens_accumulate() {
        let v = vocab();
        let mut b = BagBuilder::new(&v);
        b.add("seq.ab", 1);
        b.add("seq.ab", 2);
        let bag = b.build();

        let (_, w) = bag.entries()[0];
        assert!((w - 3.0 * 8.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn unknown_tokens_are_dropped() {
        let v = vocab();
        let mut b = BagBuilder::new(&v);
        b.extend(vec![("not.in.vocab", 5u32), ("also.unknown", 1)]);
        assert!(b.build().is_empty());
    }

    #[test]
    fn ubiquitous_tokens_carry_no_weight() {
        // df == docs gives ln(1) == 0, so the entry never materializes.
        let v = vocab();
        let mut b = BagBuilder::new(&v);
        b.add("lit.42", 100);
        assert!(b.build().is_empty());
    }

    #[test]
    fn entries_are_sorted_by_index() {
        let v = vocab();
        let mut b = BagBuilder::new(&v);
        b.add("seq.ab", 1);
        b.add("id.main", 1);
        b.add("id.parse", 1);
        let bag = b.build();
        let indices: Vec<u32> = bag.entries().iter().map(|&(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 3]);
    }

    #[test]
    fn bag_length_matches_vocabulary() {
        let v = vocab();
        let bag = BagBuilder::new(&v).build();
        assert_eq!(bag.k(), 4);
    }
}
