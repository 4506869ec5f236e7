//! Extractor kinds and the fixed option profiles.
//!
//! The feature-extraction service exposes four extractors. The engine only
//! ever calls the batched `extract` endpoint with one of two frozen
//! profiles; the per-extractor weights below are part of the index contract
//! and changing them requires a corpus re-hash.

use serde::{Deserialize, Serialize};

/// Tokens must appear in at least this many documents to be emitted.
pub const DOCFREQ_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiersOptions {
    pub docfreq_threshold: u32,
    pub weight: u32,
    #[serde(default)]
    pub split_stem: bool,
    #[serde(default)]
    pub split: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralsOptions {
    pub docfreq_threshold: u32,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uast2SeqOptions {
    pub docfreq_threshold: u32,
    pub weight: u32,
    pub seq_len: Vec<u32>,
    pub stride: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphletOptions {
    pub docfreq_threshold: u32,
    pub weight: u32,
}

/// Batched extraction request: a record of optional per-extractor options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExtractRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<IdentifiersOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literals: Option<LiteralsOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uast2seq: Option<Uast2SeqOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphlet: Option<GraphletOptions>,
}

impl ExtractRequest {
    /// Profile for whole-file similarity.
    pub fn file_level() -> Self {
        Self {
            identifiers: Some(IdentifiersOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 194,
                split_stem: true,
                split: false,
            }),
            literals: Some(LiteralsOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 264,
            }),
            uast2seq: None,
            graphlet: Some(GraphletOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 548,
            }),
        }
    }

    /// Profile for per-function similarity.
    pub fn function_level() -> Self {
        Self {
            identifiers: Some(IdentifiersOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 535,
                split_stem: false,
                split: true,
            }),
            literals: None,
            uast2seq: Some(Uast2SeqOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 369,
                seq_len: vec![3],
                stride: 1,
            }),
            graphlet: Some(GraphletOptions {
                docfreq_threshold: DOCFREQ_THRESHOLD,
                weight: 5707,
            }),
        }
    }

    /// The individual extractors this request enables.
    pub fn kinds(&self) -> Vec<ExtractorKind> {
        let mut kinds = Vec::new();
        if let Some(o) = &self.identifiers {
            kinds.push(ExtractorKind::Identifiers(o.clone()));
        }
        if let Some(o) = &self.literals {
            kinds.push(ExtractorKind::Literals(o.clone()));
        }
        if let Some(o) = &self.uast2seq {
            kinds.push(ExtractorKind::Uast2Seq(o.clone()));
        }
        if let Some(o) = &self.graphlet {
            kinds.push(ExtractorKind::Graphlet(o.clone()));
        }
        kinds
    }
}

/// One extractor with its options, for the per-extractor endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorKind {
    Identifiers(IdentifiersOptions),
    Literals(LiteralsOptions),
    Uast2Seq(Uast2SeqOptions),
    Graphlet(GraphletOptions),
}

impl ExtractorKind {
    /// Remote endpoint name for this extractor.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ExtractorKind::Identifiers(_) => "identifiers",
            ExtractorKind::Literals(_) => "literals",
            ExtractorKind::Uast2Seq(_) => "uast2seq",
            ExtractorKind::Graphlet(_) => "graphlet",
        }
    }
}
