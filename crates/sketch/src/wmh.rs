//! Consistent weighted sampling (Ioffe-style weighted MinHash).
//!
//! Each sketch row selects, for one sample of static randomness, the feature
//! index minimizing the CWS score together with its quantized "time"
//! component. Two bags agree on a row with probability equal to their
//! weighted Jaccard similarity, which is what makes the banded sketch a
//! locality-sensitive key.

use std::sync::Arc;

use crate::mode::SketchError;
use crate::packing::encode_rows;
use crate::params::WmhParams;

/// A fixed-length weighted MinHash sketch: one `(index, time)` row per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    rows: Vec<[u64; 2]>,
}

impl Sketch {
    pub fn rows(&self) -> &[[u64; 2]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Big-endian encoding of the full sketch, row by row.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_rows(&self.rows)
    }

    pub(crate) fn from_rows(rows: Vec<[u64; 2]>) -> Self {
        Self { rows }
    }
}

/// Sketcher over a shared parameter bundle.
///
/// The parameters are read-only after generation; cloning the hasher is cheap
/// and every clone produces bit-identical sketches, so one hasher can be
/// shared freely across worker threads.
#[derive(Debug, Clone)]
pub struct WeightedMinHasher {
    params: Arc<WmhParams>,
}

impl WeightedMinHasher {
    pub fn new(params: Arc<WmhParams>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WmhParams {
        &self.params
    }

    /// Sketch a sparse bag of `(index, weight)` entries.
    ///
    /// Only entries with a strictly positive weight participate. An empty bag
    /// produces the all-`(0, 0)` sketch; callers that feed an index must skip
    /// those. Ties on the CWS score resolve to the lowest index.
    pub fn hash(&self, bag: &[(u32, f64)]) -> Result<Sketch, SketchError> {
        let k = self.params.k();
        let sample_size = self.params.sample_size();

        let mut entries: Vec<(u32, f64)> = bag
            .iter()
            .copied()
            .filter(|&(_, w)| w > 0.0)
            .collect();
        entries.sort_unstable_by_key(|&(i, _)| i);
        entries.dedup_by_key(|&mut (i, _)| i);

        for &(i, _) in &entries {
            if i as usize >= k {
                return Err(SketchError::IndexOutOfRange { index: i, k });
            }
        }

        if entries.is_empty() {
            return Ok(Sketch::from_rows(vec![[0, 0]; sample_size]));
        }

        let ln_w: Vec<f64> = entries.iter().map(|&(_, w)| w.ln()).collect();

        let rs = self.params.rs();
        let ln_cs = self.params.ln_cs();
        let betas = self.params.betas();

        let mut rows = Vec::with_capacity(sample_size);
        for s in 0..sample_size {
            let rs_row = rs.row(s);
            let ln_cs_row = ln_cs.row(s);
            let betas_row = betas.row(s);

            let mut min_ln_a = f64::INFINITY;
            let mut best_index = 0u64;
            let mut best_t = 0i64;

            for (pos, &(i, _)) in entries.iter().enumerate() {
                let i_us = i as usize;
                let r = rs_row[i_us];
                let beta = betas_row[i_us];

                let t = (ln_w[pos] / r + beta).floor();
                let ln_y = r * (t - beta);
                let ln_a = ln_cs_row[i_us] - ln_y - r;

                if ln_a < min_ln_a {
                    min_ln_a = ln_a;
                    best_index = i as u64;
                    best_t = t as i64;
                }
            }

            rows.push([best_index, best_t as u64]);
        }

        Ok(Sketch::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::params::{WmhParams, DEFAULT_SEED};

    fn hasher(k: usize) -> WeightedMinHasher {
        let params = WmhParams::generate(Mode::Func.params(), k, DEFAULT_SEED).unwrap();
        WeightedMinHasher::new(Arc::new(params))
    }

    #[test]
    fn sketch_has_sample_size_rows() {
        let h = hasher(16);
        let sketch = h.hash(&[(0, 1.5), (3, 2.0)]).unwrap();
        assert_eq!(sketch.len(), 96);
    }

    #[test]
    fn sketch_is_deterministic() {
        let h = hasher(16);
        let bag = [(1, 0.7), (5, 3.0), (9, 1.0)];
        assert_eq!(h.hash(&bag).unwrap(), h.hash(&bag).unwrap());
    }

    #[test]
    fn entry_order_does_not_matter() {
        let h = hasher(16);
        let a = h.hash(&[(1, 0.7), (5, 3.0), (9, 1.0)]).unwrap();
        let b = h.hash(&[(9, 1.0), (1, 0.7), (5, 3.0)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_bag_sketches_to_zero_rows() {
        let h = hasher(16);
        let sketch = h.hash(&[]).unwrap();
        assert!(sketch.rows().iter().all(|&row| row == [0, 0]));
    }

    #[test]
    fn zero_and_negative_weights_are_dropped() {
        let h = hasher(16);
        let sketch = h.hash(&[(2, 0.0), (4, -1.0)]).unwrap();
        assert!(sketch.rows().iter().all(|&row| row == [0, 0]));
    }

    #[test]
    fn chosen_indices_come_from_the_bag() {
        let h = hasher(32);
        let bag = [(3, 1.0), (17, 2.5), (29, 0.5)];
        let sketch = h.hash(&bag).unwrap();
        for &[index, _] in sketch.rows() {
            assert!(bag.iter().any(|&(i, _)| i as u64 == index));
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let h = hasher(4);
        assert!(matches!(
            h.hash(&[(4, 1.0)]),
            Err(SketchError::IndexOutOfRange { index: 4, k: 4 })
        ));
    }

    #[test]
    fn similar_bags_share_more_rows_than_dissimilar_ones() {
        let h = hasher(64);
        let base: Vec<(u32, f64)> = (0..40).map(|i| (i, 1.0 + i as f64 / 10.0)).collect();
        let mut near = base.clone();
        near[0].1 += 0.2;
        let far: Vec<(u32, f64)> = (24..64).map(|i| (i, 2.0)).collect();

        let s_base = h.hash(&base).unwrap();
        let s_near = h.hash(&near).unwrap();
        let s_far = h.hash(&far).unwrap();

        let agree = |a: &Sketch, b: &Sketch| {
            a.rows()
                .iter()
                .zip(b.rows())
                .filter(|(x, y)| x == y)
                .count()
        };

        assert!(agree(&s_base, &s_near) > agree(&s_base, &s_far));
    }

    #[test]
    fn small_weights_produce_negative_times() {
        let h = hasher(8);
        let sketch = h.hash(&[(0, 1e-6)]).unwrap();
        // ln(1e-6) is deeply negative, so every row picks index 0 with t < 0,
        // stored as a two's-complement bit pattern.
        assert!(sketch.rows().iter().any(|&[_, t]| (t as i64) < 0));
        assert!(sketch.rows().iter().all(|&[i, _]| i == 0));
    }
}
