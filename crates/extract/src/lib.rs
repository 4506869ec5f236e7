//! External collaborators of the similarity engine: the AST service and the
//! feature-extraction service.
//!
//! Parsing source code and turning syntax trees into weighted features are
//! delegated to remote services; this crate owns the client side only: the
//! UAST node model, the extractor option profiles, the HTTP clients with
//! their timeout/retry policy, and in-memory stubs for tests.
//!
//! Failures here are **recoverable by design**: a unit whose parse or
//! extraction fails is skipped and counted, never aborting a corpus build.

mod client;
mod options;
mod service;
mod stub;
mod uast;

pub use crate::client::{HttpAstService, HttpFeatureService};
pub use crate::options::{
    ExtractRequest, ExtractorKind, GraphletOptions, IdentifiersOptions, LiteralsOptions,
    Uast2SeqOptions, DOCFREQ_THRESHOLD,
};
pub use crate::service::{AstService, Feature, FeatureService, ParseResponse, ServiceError};
pub use crate::stub::{StubAstService, StubFeatureService};
pub use crate::uast::{enumerate_functions, FunctionUnit, UastNode};
