//! Similarity modes and their LSH geometry.
//!
//! The file and function granularities use different sketch sizes. The
//! constants below are part of the on-disk contract: parameter tables and
//! band keys generated under one geometry are meaningless under another, so
//! changing them invalidates every populated index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Granularity of a similarity unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Whole-file similarity.
    File,
    /// Per-function similarity.
    Func,
}

impl Mode {
    /// Stable identifier used in table names and the docfreq store.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::File => "file",
            Mode::Func => "func",
        }
    }

    /// The sketch geometry baked in for this mode.
    pub fn params(self) -> ModeParams {
        match self {
            Mode::File => ModeParams {
                sample_size: 128,
                htnum: 64,
                band_size: 2,
            },
            Mode::Func => ModeParams {
                sample_size: 96,
                htnum: 48,
                band_size: 2,
            },
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Mode::File),
            "func" => Ok(Mode::Func),
            other => Err(SketchError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Sketch geometry: `sample_size = htnum * band_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeParams {
    /// Number of weighted samples in a sketch.
    pub sample_size: usize,
    /// Number of hashtables (= number of bands).
    pub htnum: usize,
    /// Sketch rows per band.
    pub band_size: usize,
}

impl ModeParams {
    /// Check the banding identity `htnum * band_size == sample_size`.
    pub fn validate(&self) -> Result<(), SketchError> {
        if self.sample_size == 0 || self.htnum == 0 || self.band_size == 0 {
            return Err(SketchError::InvalidGeometry {
                sample_size: self.sample_size,
                htnum: self.htnum,
                band_size: self.band_size,
            });
        }
        if self.htnum * self.band_size != self.sample_size {
            return Err(SketchError::InvalidGeometry {
                sample_size: self.sample_size,
                htnum: self.htnum,
                band_size: self.band_size,
            });
        }
        Ok(())
    }
}

/// Errors produced by the sketching layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SketchError {
    #[error("unknown similarity mode '{mode}'; expected 'file' or 'func'")]
    UnknownMode { mode: String },

    #[error(
        "invalid sketch geometry: sample_size={sample_size} htnum={htnum} band_size={band_size}"
    )]
    InvalidGeometry {
        sample_size: usize,
        htnum: usize,
        band_size: usize,
    },

    #[error("sketch has {rows} rows; geometry expects {expected}")]
    RowCountMismatch { rows: usize, expected: usize },

    #[error("bag index {index} outside vocabulary of size {k}")]
    IndexOutOfRange { index: u32, k: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_mode_geometry() {
        let p = Mode::File.params();
        assert_eq!(p.sample_size, 128);
        assert_eq!(p.htnum, 64);
        assert_eq!(p.band_size, 2);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn func_mode_geometry() {
        let p = Mode::Func.params();
        assert_eq!(p.sample_size, 96);
        assert_eq!(p.htnum, 48);
        assert_eq!(p.band_size, 2);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn geometry_rejects_mismatch() {
        let p = ModeParams {
            sample_size: 128,
            htnum: 63,
            band_size: 2,
        };
        assert!(matches!(
            p.validate(),
            Err(SketchError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn geometry_rejects_zero() {
        let p = ModeParams {
            sample_size: 0,
            htnum: 0,
            band_size: 0,
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn mode_round_trips_via_str() {
        assert_eq!("file".parse::<Mode>().unwrap(), Mode::File);
        assert_eq!("func".parse::<Mode>().unwrap(), Mode::Func);
        assert_eq!(Mode::File.to_string(), "file");
        assert!("files".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Func).unwrap(), "\"func\"");
        let m: Mode = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(m, Mode::File);
    }
}
