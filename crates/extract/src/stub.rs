//! In-memory service stubs for tests and offline runs.

use hashbrown::HashMap;
use std::sync::RwLock;

use crate::options::ExtractRequest;
use crate::service::{AstService, Feature, FeatureService, ParseResponse, ServiceError};
use crate::uast::UastNode;

/// AST service answering from a fixed filename → response table.
#[derive(Default)]
pub struct StubAstService {
    responses: RwLock<HashMap<String, ParseResponse>>,
    fail: bool,
}

impl StubAstService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transport error.
    pub fn failing() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn with_uast(self, filename: impl Into<String>, uast: UastNode) -> Self {
        self.with_response(
            filename,
            ParseResponse {
                uast: Some(uast),
                errors: Vec::new(),
            },
        )
    }

    pub fn with_response(self, filename: impl Into<String>, response: ParseResponse) -> Self {
        self.responses
            .write()
            .expect("stub lock")
            .insert(filename.into(), response);
        self
    }
}

impl AstService for StubAstService {
    fn parse(&self, filename: &str, _content: &[u8]) -> Result<ParseResponse, ServiceError> {
        if self.fail {
            return Err(ServiceError::Transport("stub ast service down".into()));
        }
        let guard = self.responses.read().expect("stub lock");
        match guard.get(filename) {
            Some(response) => Ok(response.clone()),
            None => Ok(ParseResponse {
                uast: None,
                errors: vec![format!("no parser for {filename}")],
            }),
        }
    }
}

/// Feature service answering from a node-id → features table.
#[derive(Default)]
pub struct StubFeatureService {
    by_node: RwLock<HashMap<u64, Vec<Feature>>>,
    fail: bool,
}

impl StubFeatureService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            by_node: RwLock::new(HashMap::new()),
            fail: true,
        }
    }

    pub fn with_features<I, S>(self, node_id: u64, features: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let features = features
            .into_iter()
            .map(|(name, weight)| Feature {
                name: name.into(),
                weight,
            })
            .collect();
        self.by_node
            .write()
            .expect("stub lock")
            .insert(node_id, features);
        self
    }
}

impl FeatureService for StubFeatureService {
    fn extract(
        &self,
        uast: &UastNode,
        _request: &ExtractRequest,
    ) -> Result<Vec<Feature>, ServiceError> {
        if self.fail {
            return Err(ServiceError::Transport("stub feature service down".into()));
        }
        let guard = self.by_node.read().expect("stub lock");
        Ok(guard.get(&uast.id).cloned().unwrap_or_default())
    }
}
