//! Band partitioning: slicing a sketch into hashtable keys.

use crate::mode::{ModeParams, SketchError};
use crate::packing::encode_rows;
use crate::wmh::Sketch;

/// Split a sketch into exactly `htnum` band keys of `band_size` rows each.
///
/// The band bytes are the raw big-endian row encoding; concatenating all
/// bands in order reproduces `sketch.to_bytes()` exactly.
pub fn split_bands(sketch: &Sketch, mode: ModeParams) -> Result<Vec<Vec<u8>>, SketchError> {
    mode.validate()?;
    if sketch.len() != mode.sample_size {
        return Err(SketchError::RowCountMismatch {
            rows: sketch.len(),
            expected: mode.sample_size,
        });
    }

    let rows = sketch.rows();
    let mut bands = Vec::with_capacity(mode.htnum);
    for h in 0..mode.htnum {
        let start = h * mode.band_size;
        bands.push(encode_rows(&rows[start..start + mode.band_size]));
    }
    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::packing::ROW_BYTES;
    use crate::params::{WmhParams, DEFAULT_SEED};
    use crate::wmh::WeightedMinHasher;
    use std::sync::Arc;

    fn sample_sketch() -> Sketch {
        let params = WmhParams::generate(Mode::File.params(), 8, DEFAULT_SEED).unwrap();
        WeightedMinHasher::new(Arc::new(params))
            .hash(&[(0, 1.0), (2, 4.5), (7, 0.3)])
            .unwrap()
    }

    #[test]
    fn produces_htnum_fixed_width_bands() {
        let mode = Mode::File.params();
        let bands = split_bands(&sample_sketch(), mode).unwrap();
        assert_eq!(bands.len(), mode.htnum);
        assert!(bands
            .iter()
            .all(|b| b.len() == mode.band_size * ROW_BYTES));
    }

    #[test]
    fn band_concatenation_equals_full_sketch_encoding() {
        let sketch = sample_sketch();
        let bands = split_bands(&sketch, Mode::File.params()).unwrap();
        let joined: Vec<u8> = bands.into_iter().flatten().collect();
        assert_eq!(joined, sketch.to_bytes());
    }

    #[test]
    fn rejects_sketch_of_wrong_length() {
        let err = split_bands(&sample_sketch(), Mode::Func.params());
        assert!(matches!(
            err,
            Err(SketchError::RowCountMismatch {
                rows: 128,
                expected: 96
            })
        ));
    }
}
