//! Service traits and the shared error surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::ExtractRequest;
use crate::uast::UastNode;

/// A weighted feature emitted by one of the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub weight: u32,
}

/// Result of parsing one file.
///
/// Errors do not preclude a usable tree: a partial UAST alongside parse
/// errors is still consumed, and only a null UAST means "skip this file".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub uast: Option<UastNode>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Remote AST service: `(filename, content) → UAST + errors`.
pub trait AstService: Send + Sync {
    fn parse(&self, filename: &str, content: &[u8]) -> Result<ParseResponse, ServiceError>;
}

/// Remote feature-extraction service, batched form.
pub trait FeatureService: Send + Sync {
    fn extract(
        &self,
        uast: &UastNode,
        request: &ExtractRequest,
    ) -> Result<Vec<Feature>, ServiceError>;
}

/// Failures talking to an external service.
///
/// These are recovered locally: the caller skips the unit, bumps the
/// per-class skip counter, and keeps building.
#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("call exceeded the {0}s deadline")]
    Timeout(u64),

    #[error("service rejected the request: {0}")]
    Remote(String),

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Counter class for skip accounting.
    pub fn class(&self) -> &'static str {
        match self {
            ServiceError::Timeout(_) => "timeout",
            ServiceError::Transport(_) => "transport",
            ServiceError::Remote(_) => "remote",
            ServiceError::Decode(_) => "decode",
        }
    }

    /// Whether another attempt can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transport(_) | ServiceError::Timeout(_))
    }
}
