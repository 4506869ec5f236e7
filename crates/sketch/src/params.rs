//! Static randomness for consistent weighted sampling.
//!
//! Three `sample_size × k` tables parameterize the sketcher: `rs` and `ln_cs`
//! derive from Gamma(2,1) draws (`ln_cs` stores the logarithm so the sampling
//! loop can use it directly as `ln c`), `betas` from Uniform(0,1). All three
//! are drawn table-at-a-time, row-major, from a single seeded MT19937-64
//! stream, which makes the whole bundle a deterministic function of
//! `(seed, k, sample_size)`.
//!
//! The tables are generated once per corpus and shared read-only across every
//! sketching call; the inner sampling loop walks rows of `rs`/`ln_cs`/`betas`
//! in lockstep, so they are kept as contiguous row-major arrays.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::mode::{ModeParams, SketchError};
use crate::mt19937::Mt19937_64;

/// Reference seed for parameter generation.
pub const DEFAULT_SEED: u64 = 1;

/// The randomly generated parameters of the weighted MinHasher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WmhParams {
    seed: u64,
    k: usize,
    sample_size: usize,
    rs: Array2<f64>,
    ln_cs: Array2<f64>,
    betas: Array2<f64>,
}

impl WmhParams {
    /// Generate the parameter tables for a vocabulary of `k` tokens.
    ///
    /// `k == 0` is legal (an empty vocabulary yields zero-width tables and
    /// only empty bags, which are never indexed).
    pub fn generate(mode: ModeParams, k: usize, seed: u64) -> Result<Self, SketchError> {
        mode.validate()?;
        let sample_size = mode.sample_size;

        let mut rng = Mt19937_64::new(seed);
        let rs = fill_table(sample_size, k, || gamma2(&mut rng));
        let ln_cs = fill_table(sample_size, k, || gamma2(&mut rng).ln());
        let betas = fill_table(sample_size, k, || rng.next_f64());

        Ok(Self {
            seed,
            k,
            sample_size,
            rs,
            ln_cs,
            betas,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Vocabulary size the tables were generated for.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn rs(&self) -> &Array2<f64> {
        &self.rs
    }

    pub fn ln_cs(&self) -> &Array2<f64> {
        &self.ln_cs
    }

    pub fn betas(&self) -> &Array2<f64> {
        &self.betas
    }
}

/// Fill a `rows × cols` table, drawing cells in row-major order. The draw
/// order is part of the sketch contract.
fn fill_table<F: FnMut() -> f64>(rows: usize, cols: usize, mut draw: F) -> Array2<f64> {
    let mut data = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        data.push(draw());
    }
    Array2::from_shape_vec((rows, cols), data).expect("vector length matches shape")
}

/// Gamma(shape=2, scale=1) via the sum of two exponentials.
fn gamma2(rng: &mut Mt19937_64) -> f64 {
    -rng.next_f64().ln() - rng.next_f64().ln()
}
