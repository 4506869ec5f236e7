//! Big-endian byte packing for sketch rows and band keys.
//!
//! Band keys are stored verbatim in the backend, so the encoding is part of
//! the index contract: each `u64` is serialized high-byte-first, a sketch row
//! `(k, t)` is 16 bytes, and a band is the in-order concatenation of its rows.

/// Encoded width of one sketch row: two big-endian `u64`s.
pub const ROW_BYTES: usize = 16;

/// Encode a single `(k, t)` sketch row into 16 big-endian bytes.
pub fn encode_row(row: [u64; 2]) -> [u8; ROW_BYTES] {
    let mut out = [0u8; ROW_BYTES];
    out[..8].copy_from_slice(&row[0].to_be_bytes());
    out[8..].copy_from_slice(&row[1].to_be_bytes());
    out
}

/// Encode consecutive sketch rows into one contiguous byte string.
pub fn encode_rows(rows: &[[u64; 2]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rows.len() * ROW_BYTES);
    for &row in rows {
        out.extend_from_slice(&encode_row(row));
    }
    out
}
