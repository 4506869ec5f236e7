//! HTTP JSON clients for the AST and feature-extraction services.
//!
//! Both clients share the same shape: a pooled agent with a hard per-call
//! deadline, a small transient-retry loop, and JSON bodies. A call that runs
//! past the deadline is reported as a timeout so the caller can account for
//! it separately from plain transport faults.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::options::ExtractRequest;
use crate::service::{AstService, Feature, FeatureService, ParseResponse, ServiceError};
use crate::uast::UastNode;

/// Per-call deadline for both services.
const CALL_TIMEOUT_SECS: u64 = 30;

/// Transient transport failures are re-attempted this many extra times.
const TRANSIENT_RETRIES: u32 = 2;

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
        .build()
}

fn classify(err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            ServiceError::Remote(format!("status {code}: {body}"))
        }
        ureq::Error::Transport(t) => {
            let msg = t.to_string();
            if msg.contains("timed out") {
                ServiceError::Timeout(CALL_TIMEOUT_SECS)
            } else {
                ServiceError::Transport(msg)
            }
        }
    }
}

fn post_json<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    body: &serde_json::Value,
) -> Result<T, ServiceError> {
    let mut attempt = 0u32;
    loop {
        let result = agent
            .post(url)
            .send_json(body.clone())
            .map_err(classify)
            .and_then(|resp| {
                resp.into_json::<T>()
                    .map_err(|e| ServiceError::Decode(e.to_string()))
            });

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < TRANSIENT_RETRIES => {
                attempt += 1;
                warn!(%err, attempt, url, "transient service failure, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Client for the remote AST service.
pub struct HttpAstService {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpAstService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            endpoint: endpoint.into(),
        }
    }
}

impl AstService for HttpAstService {
    fn parse(&self, filename: &str, content: &[u8]) -> Result<ParseResponse, ServiceError> {
        debug!(filename, bytes = content.len(), "requesting uast");
        let body = json!({
            "filename": filename,
            "content": String::from_utf8_lossy(content),
        });
        post_json(&self.agent, &self.endpoint, &body)
    }
}

/// Client for the batched feature-extraction endpoint.
pub struct HttpFeatureService {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpFeatureService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct FeaturesReply {
    features: Vec<Feature>,
}

impl FeatureService for HttpFeatureService {
    fn extract(
        &self,
        uast: &UastNode,
        request: &ExtractRequest,
    ) -> Result<Vec<Feature>, ServiceError> {
        let body = json!({
            "uast": uast,
            "options": request,
        });
        let reply: FeaturesReply = post_json(&self.agent, &self.endpoint, &body)?;
        debug!(count = reply.features.len(), "features extracted");
        Ok(reply.features)
    }
}
