//! Weighted MinHash sketching for Gemini.
//!
//! This crate turns a weighted bag of feature indices into a compact
//! locality-sensitive sketch, then slices the sketch into hashtable bands
//! whose raw bytes serve as inverted-index keys. Two items whose bags have a
//! high weighted-Jaccard similarity collide on at least one band with a
//! probability that grows with the number of hashtables.
//!
//! ## What you need to know
//!
//! - Everything here is a pure function of `(parameters, bag)`. No I/O, no
//!   clocks, no ambient randomness.
//! - Sketches are **bit-identical** across runs and platforms for a fixed
//!   seed, vocabulary size, and sample count. The band bytes go straight into
//!   a persistent index, so any change that can shift a single bit must bump
//!   the parameter seed or the mode constants and re-hash the corpus.
//!
//! ## The pipeline (three stages)
//!
//! 1. **Parameters**: three `sample_size × k` tables of Gamma/Uniform draws
//!    from a seeded Mersenne Twister ([`WmhParams`]).
//! 2. **Sketching**: consistent weighted sampling picks one `(index, time)`
//!    pair per sample row ([`WeightedMinHasher`]).
//! 3. **Banding**: consecutive sketch rows are concatenated big-endian into
//!    `htnum` band keys ([`split_bands`]).

mod bands;
mod mode;
mod mt19937;
mod packing;
mod params;
mod wmh;

pub use crate::bands::split_bands;
pub use crate::mode::{Mode, ModeParams, SketchError};
pub use crate::mt19937::Mt19937_64;
pub use crate::packing::{encode_row, encode_rows, ROW_BYTES};
pub use crate::params::{WmhParams, DEFAULT_SEED};
pub use crate::wmh::{Sketch, WeightedMinHasher};
