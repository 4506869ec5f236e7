//! Document-frequency vocabulary and feature bags for Gemini.
//!
//! The vocabulary fixes the universe of features once per corpus: an ordered
//! token list, the number of documents each token appeared in, and the total
//! document count. Every downstream artifact (bags, sketches, band keys)
//! is expressed in vocabulary indices, so the vocabulary is immutable after
//! load and shared read-only.
//!
//! [`BagBuilder`] turns raw `(token, weight)` features into a sparse bag of
//! `(index, scaled_weight)` entries, scaling each raw weight by the token's
//! inverse-document-frequency. Tokens outside the vocabulary are silently
//! dropped; a unit whose features are all unknown produces an empty bag and
//! is never sketched.

mod bag;
mod docfreq;

pub use crate::bag::{BagBuilder, FeatureBag};
pub use crate::docfreq::{OrderedDocFreq, VocabError};
